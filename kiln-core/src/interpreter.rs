//! Interpreter - Execute Effects using a Provider
//!
//! The Interpreter executes Effects contained in a Plan in order,
//! collecting the results. This is where side effects actually occur.
//! References are resolved right before each Effect runs, so a resource can
//! use attributes of a resource created earlier in the same apply.

use crate::effect::Effect;
use crate::plan::Plan;
use crate::provider::{Provider, ProviderError, ProviderResult};
use crate::resolver::{Bindings, resolve_refs};
use crate::resource::{Resource, ResourceId, State};

/// Result of executing each Effect
#[derive(Debug)]
pub enum EffectOutcome {
    /// Create succeeded
    Created { state: State },
    /// Update succeeded
    Updated { state: State },
    /// Delete and re-create succeeded
    Replaced { state: State },
    /// Delete succeeded
    Deleted { id: ResourceId },
    /// Skipped (e.g., dry-run)
    Skipped { reason: String },
}

/// Result of executing the entire Plan
#[derive(Debug)]
pub struct ApplyResult {
    pub outcomes: Vec<(ResourceId, Result<EffectOutcome, ProviderError>)>,
    pub success_count: usize,
    pub failure_count: usize,
}

impl ApplyResult {
    pub fn is_success(&self) -> bool {
        self.failure_count == 0
    }
}

/// Interpreter configuration
#[derive(Debug, Clone, Default)]
pub struct InterpreterConfig {
    /// If true, skip actual side effects
    pub dry_run: bool,
    /// Continue on error
    pub continue_on_error: bool,
}

/// Interpreter that executes Effects using a Provider
pub struct Interpreter<P: Provider> {
    provider: P,
    config: InterpreterConfig,
}

impl<P: Provider> Interpreter<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            config: InterpreterConfig::default(),
        }
    }

    pub fn with_config(mut self, config: InterpreterConfig) -> Self {
        self.config = config;
        self
    }

    /// Execute a Plan, interpreting all Effects and causing side effects
    ///
    /// `bindings` holds the known attributes of every resource; it is updated
    /// as Effects complete.
    pub async fn apply(&self, plan: &Plan, mut bindings: Bindings) -> ApplyResult {
        let mut outcomes = Vec::new();
        let mut success_count = 0;
        let mut failure_count = 0;

        for effect in plan.effects() {
            let id = effect.resource_id().clone();
            log::info!("{} {}", effect.kind(), id);

            let result = self.execute_effect(effect, &bindings).await;

            let failed = match &result {
                Ok(outcome) => {
                    success_count += 1;
                    match outcome {
                        EffectOutcome::Created { state }
                        | EffectOutcome::Updated { state }
                        | EffectOutcome::Replaced { state } => {
                            bindings.insert(state.id.name.clone(), state.attributes.clone());
                        }
                        EffectOutcome::Deleted { id } => {
                            bindings.remove(&id.name);
                        }
                        EffectOutcome::Skipped { .. } => {}
                    }
                    false
                }
                Err(e) => {
                    log::error!("{} failed: {}", id, e);
                    failure_count += 1;
                    true
                }
            };

            outcomes.push((id, result));
            if failed && !self.config.continue_on_error {
                break;
            }
        }

        ApplyResult {
            outcomes,
            success_count,
            failure_count,
        }
    }

    /// Execute a single Effect
    async fn execute_effect(
        &self,
        effect: &Effect,
        bindings: &Bindings,
    ) -> ProviderResult<EffectOutcome> {
        if self.config.dry_run {
            return Ok(EffectOutcome::Skipped {
                reason: "dry-run mode".to_string(),
            });
        }

        match effect {
            Effect::Create(resource) => {
                let resource = resolved(resource, bindings)?;
                let mut state = self.provider.create(&resource).await?;
                state.merge_missing(&resource.attributes);
                Ok(EffectOutcome::Created { state })
            }
            Effect::Update {
                id,
                identifier,
                from,
                to,
                ..
            } => {
                let to = resolved(to, bindings)?;
                let mut state = self.provider.update(id, identifier, from, &to).await?;
                state.merge_missing(&to.attributes);
                Ok(EffectOutcome::Updated { state })
            }
            Effect::Replace {
                id, identifier, to, ..
            } => {
                let to = resolved(to, bindings)?;
                self.provider.delete(id, identifier).await?;
                let mut state = self.provider.create(&to).await?;
                state.merge_missing(&to.attributes);
                Ok(EffectOutcome::Replaced { state })
            }
            Effect::Delete { id, identifier } => {
                self.provider.delete(id, identifier).await?;
                Ok(EffectOutcome::Deleted { id: id.clone() })
            }
        }
    }
}

/// Resolve references, failing if any remain
fn resolved(resource: &Resource, bindings: &Bindings) -> ProviderResult<Resource> {
    let resource = resolve_refs(resource, bindings);
    let mut unresolved: Vec<&String> = resource
        .attributes
        .iter()
        .filter(|(_, v)| v.contains_ref())
        .map(|(k, _)| k)
        .collect();

    if unresolved.is_empty() {
        return Ok(resource);
    }

    unresolved.sort();
    Err(ProviderError::new(format!(
        "Unresolved references in: {}",
        unresolved
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    ))
    .for_resource(resource.id.clone()))
}
