//! Differ - Compare desired state with current state to generate a Plan
//!
//! Compares the "desired state" declared in configuration with the "current
//! state" fetched from the Provider, and generates a list of required Effects
//! (Plan).

use std::collections::HashMap;

use crate::effect::Effect;
use crate::plan::Plan;
use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with updatable differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists and a force-new attribute changed -> needs replacement
    Replace {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
///
/// Without a schema every change is treated as updatable.
pub fn diff(desired: &Resource, current: &State, schema: Option<&ResourceSchema>) -> Diff {
    if !current.exists || current.identifier.is_none() {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes);

    if changed.is_empty() && !current.tainted {
        return Diff::NoChange(desired.id.clone());
    }

    let replace = current.tainted
        || schema.is_some_and(|s| changed.iter().any(|name| s.is_force_new(name)));
    if replace {
        Diff::Replace {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state
fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (key, desired_value) in desired {
        // Skip internal attributes (starting with _)
        if key.starts_with('_') {
            continue;
        }

        match current.get(key) {
            Some(current_value) if value_matches(desired_value, current_value) => {}
            _ => changed.push(key.clone()),
        }
    }

    changed.sort();
    changed
}

/// Lists compare item by item; maps inside lists (block items) only need
/// the keys the user declared, so values filled in by the API don't show up
/// as drift. Top-level maps such as tags compare exactly.
fn value_matches(desired: &Value, current: &Value) -> bool {
    match (desired, current) {
        (Value::List(d), Value::List(c)) => {
            d.len() == c.len() && d.iter().zip(c).all(|(d, c)| item_matches(d, c))
        }
        _ => desired == current,
    }
}

fn item_matches(desired: &Value, current: &Value) -> bool {
    match (desired, current) {
        (Value::Map(d), Value::Map(c)) => d
            .iter()
            .all(|(k, dv)| c.get(k).is_some_and(|cv| value_matches(dv, cv))),
        _ => value_matches(desired, current),
    }
}

/// Compute Diff for multiple resources and generate a Plan
///
/// `desired` must already be in dependency order. `orphans` are resources
/// recorded in state that are no longer declared; they are deleted last, in
/// reverse order.
pub fn create_plan(
    desired: &[Resource],
    current_states: &HashMap<ResourceId, State>,
    schemas: &HashMap<String, ResourceSchema>,
    orphans: &[State],
) -> Plan {
    let mut plan = Plan::new();

    for resource in desired {
        let current = current_states
            .get(&resource.id)
            .cloned()
            .unwrap_or_else(|| State::not_found(resource.id.clone()));

        let schema = schemas.get(&resource.id.resource_type);

        match diff(resource, &current, schema) {
            Diff::Create(r) => plan.add(Effect::Create(r)),
            Diff::Update {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Update {
                identifier: from.identifier.clone().unwrap_or_default(),
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::Replace {
                id,
                from,
                to,
                changed_attributes,
            } => plan.add(Effect::Replace {
                identifier: from.identifier.clone().unwrap_or_default(),
                id,
                from,
                to,
                changed_attributes,
            }),
            Diff::NoChange(_) => {}
        }
    }

    for orphan in orphans.iter().rev() {
        match &orphan.identifier {
            Some(identifier) => plan.add(Effect::Delete {
                id: orphan.id.clone(),
                identifier: identifier.clone(),
            }),
            None => log::warn!("{} has no identifier in state, skipping delete", orphan.id),
        }
    }

    plan
}
