use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;

use kiln_core::config::{self, Config};
use kiln_core::differ::{Diff, create_plan, diff};
use kiln_core::effect::Effect;
use kiln_core::interpreter::{ApplyResult, EffectOutcome, Interpreter};
use kiln_core::plan::Plan;
use kiln_core::provider::Provider;
use kiln_core::resolver::{Bindings, resolve_refs, sort_by_dependencies};
use kiln_core::resource::{Resource, ResourceId, State, Value};
use kiln_core::schema::ResourceSchema;
use kiln_provider_imagebuilder::ImageBuilderProvider;
use kiln_provider_imagebuilder::resources::resource_types;
use kiln_state::{LockInfo, ResourceState, StateBackend, StateFile, create_backend};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Manage AWS Image Builder images and container recipes", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "kiln.json")]
    config: PathBuf,

    /// Increase log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the configuration file
    Validate,
    /// Show execution plan without applying changes
    Plan,
    /// Apply changes to reach the desired state
    Apply {
        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },
    /// Destroy all resources tracked in state
    Destroy {
        /// Skip confirmation prompt
        #[arg(long)]
        auto_approve: bool,
    },
    /// Bring an existing resource under management
    Import {
        /// Resource address (e.g., imagebuilder.image.web)
        address: String,
        /// Resource ARN
        identifier: String,
    },
    /// Release a stuck state lock
    ForceUnlock {
        /// Lock ID shown in the lock error
        lock_id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let result = match cli.command {
        Commands::Validate => run_validate(&cli.config),
        Commands::Plan => run_plan(&cli.config).await,
        Commands::Apply { auto_approve } => run_apply(&cli.config, auto_approve).await,
        Commands::Destroy { auto_approve } => run_destroy(&cli.config, auto_approve).await,
        Commands::Import {
            address,
            identifier,
        } => run_import(&cli.config, &address, &identifier).await,
        Commands::ForceUnlock { lock_id } => run_force_unlock(&cli.config, &lock_id).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// A validated configuration with defaults applied and resources in dependency order
struct Workspace {
    config: Config,
    schemas: HashMap<String, ResourceSchema>,
    resources: Vec<Resource>,
}

impl Workspace {
    fn load(path: &Path) -> Result<Self, String> {
        let config = config::load(path).map_err(|e| e.to_string())?;
        let schemas = get_schemas();

        validate_resources(&config.resources, &schemas)?;

        let mut resources = config.resources.clone();
        for resource in &mut resources {
            if let Some(schema) = schemas.get(&resource.id.resource_type) {
                schema.apply_defaults(&mut resource.attributes);
            }
        }
        let resources = sort_by_dependencies(&resources).map_err(|e| e.to_string())?;

        Ok(Self {
            config,
            schemas,
            resources,
        })
    }

    fn backend(&self) -> Result<Box<dyn StateBackend>, String> {
        create_backend(self.config.backend.as_ref()).map_err(|e| e.to_string())
    }
}

fn get_schemas() -> HashMap<String, ResourceSchema> {
    resource_types()
        .iter()
        .map(|t| (t.name().to_string(), t.schema()))
        .collect()
}

fn validate_resources(
    resources: &[Resource],
    schemas: &HashMap<String, ResourceSchema>,
) -> Result<(), String> {
    let mut all_errors = Vec::new();

    for resource in resources {
        match schemas.get(&resource.id.resource_type) {
            None => all_errors.push(format!(
                "{}: unknown resource type '{}'",
                resource.id, resource.id.resource_type
            )),
            Some(schema) => {
                let errors = [
                    schema.validate(&resource.attributes),
                    schema.validate_timeouts(&resource.timeouts),
                ]
                .into_iter()
                .filter_map(Result::err)
                .flatten();
                for error in errors {
                    all_errors.push(format!("{}: {}", resource.id, error));
                }
            }
        }
    }

    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors.join("\n"))
    }
}

fn run_validate(path: &Path) -> Result<(), String> {
    println!("{}", "Validating...".cyan());

    let workspace = Workspace::load(path)?;

    println!(
        "{}",
        format!(
            "✓ {} resources validated successfully.",
            workspace.resources.len()
        )
        .green()
        .bold()
    );
    for resource in &workspace.resources {
        println!("  • {}", resource.id);
    }

    Ok(())
}

async fn run_plan(path: &Path) -> Result<(), String> {
    let workspace = Workspace::load(path)?;
    let backend = workspace.backend()?;
    let provider = ImageBuilderProvider::new(&workspace.config.provider).await;

    // Refreshed state is only displayed, never written
    let mut state = read_state(backend.as_ref()).await?;
    let current = refresh(&provider, &mut state).await?;

    let (plan, _) = build_plan(&workspace.resources, &current, &workspace.schemas);
    print_plan(&plan);
    Ok(())
}

async fn run_apply(path: &Path, auto_approve: bool) -> Result<(), String> {
    let workspace = Workspace::load(path)?;
    let backend = workspace.backend()?;
    let lock = backend
        .acquire_lock("apply")
        .await
        .map_err(|e| e.to_string())?;

    let result = apply_locked(&workspace, backend.as_ref(), auto_approve).await;
    release_lock(backend.as_ref(), &lock).await;
    result
}

async fn apply_locked(
    workspace: &Workspace,
    backend: &dyn StateBackend,
    auto_approve: bool,
) -> Result<(), String> {
    let provider = ImageBuilderProvider::new(&workspace.config.provider).await;
    let provider_name = provider.name();

    let mut state = read_state(backend).await?;
    let current = refresh(&provider, &mut state).await?;
    let (plan, bindings) = build_plan(&workspace.resources, &current, &workspace.schemas);

    if plan.is_empty() {
        write_state(backend, &mut state).await?;
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return Ok(());
    }

    print_plan(&plan);
    println!();

    if !auto_approve && !confirm("Do you want to apply these changes?")? {
        println!("{}", "Apply cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Applying changes...".cyan().bold());
    println!();

    let result = Interpreter::new(provider).apply(&plan, bindings).await;
    record_outcomes(&mut state, &result, provider_name);
    write_state(backend, &mut state).await?;

    report(&plan, &result, "Apply")
}

async fn run_destroy(path: &Path, auto_approve: bool) -> Result<(), String> {
    let workspace = Workspace::load(path)?;
    let backend = workspace.backend()?;
    let lock = backend
        .acquire_lock("destroy")
        .await
        .map_err(|e| e.to_string())?;

    let result = destroy_locked(&workspace, backend.as_ref(), auto_approve).await;
    release_lock(backend.as_ref(), &lock).await;
    result
}

async fn destroy_locked(
    workspace: &Workspace,
    backend: &dyn StateBackend,
    auto_approve: bool,
) -> Result<(), String> {
    let provider = ImageBuilderProvider::new(&workspace.config.provider).await;
    let provider_name = provider.name();

    let mut state = read_state(backend).await?;
    let current = refresh(&provider, &mut state).await?;

    // Everything in state is an orphan once nothing is desired
    let plan = create_plan(&[], &HashMap::new(), &workspace.schemas, &current);

    if plan.is_empty() {
        write_state(backend, &mut state).await?;
        println!("{}", "No resources to destroy.".green());
        return Ok(());
    }

    print_plan(&plan);
    println!();

    if !auto_approve && !confirm("Do you really want to destroy all resources?")? {
        println!("{}", "Destroy cancelled.".yellow());
        return Ok(());
    }

    println!("{}", "Destroying resources...".red().bold());
    println!();

    let result = Interpreter::new(provider)
        .apply(&plan, Bindings::new())
        .await;
    record_outcomes(&mut state, &result, provider_name);
    write_state(backend, &mut state).await?;

    report(&plan, &result, "Destroy")
}

async fn run_import(path: &Path, address: &str, identifier: &str) -> Result<(), String> {
    let workspace = Workspace::load(path)?;
    let id = ResourceId::parse_address(address)
        .ok_or_else(|| format!("Invalid resource address '{}' (expected type.name)", address))?;
    if !workspace.resources.iter().any(|r| r.id == id) {
        return Err(format!(
            "{} is not declared in {}",
            id,
            path.display()
        ));
    }

    let backend = workspace.backend()?;
    let lock = backend
        .acquire_lock("import")
        .await
        .map_err(|e| e.to_string())?;

    let result = import_locked(&workspace, backend.as_ref(), &id, identifier).await;
    release_lock(backend.as_ref(), &lock).await;
    result
}

async fn import_locked(
    workspace: &Workspace,
    backend: &dyn StateBackend,
    id: &ResourceId,
    identifier: &str,
) -> Result<(), String> {
    let mut state = read_state(backend).await?;
    if state.find_resource(id).is_some() {
        return Err(format!("{} is already managed", id));
    }

    let provider = ImageBuilderProvider::new(&workspace.config.provider).await;
    let current = provider
        .import(id, identifier)
        .await
        .map_err(|e| e.to_string())?;

    state.upsert_resource(ResourceState::from_state(&current, provider.name()));
    write_state(backend, &mut state).await?;

    println!("{}", format!("✓ Imported {}", id).green().bold());
    Ok(())
}

async fn run_force_unlock(path: &Path, lock_id: &str) -> Result<(), String> {
    let config = config::load(path).map_err(|e| e.to_string())?;
    let backend = create_backend(config.backend.as_ref()).map_err(|e| e.to_string())?;
    backend
        .force_unlock(lock_id)
        .await
        .map_err(|e| e.to_string())?;

    println!("{}", format!("Lock {} released.", lock_id).green());
    Ok(())
}

async fn read_state(backend: &dyn StateBackend) -> Result<StateFile, String> {
    Ok(backend
        .read_state()
        .await
        .map_err(|e| e.to_string())?
        .unwrap_or_default())
}

async fn write_state(backend: &dyn StateBackend, state: &mut StateFile) -> Result<(), String> {
    state.increment_serial();
    backend
        .write_state(state)
        .await
        .map_err(|e| format!("Failed to save state: {}", e))
}

async fn release_lock(backend: &dyn StateBackend, lock: &LockInfo) {
    if let Err(e) = backend.release_lock(lock).await {
        eprintln!(
            "{} failed to release state lock {}: {}",
            "Warning:".yellow().bold(),
            lock.id,
            e
        );
    }
}

/// Read every resource tracked in state from the provider
///
/// Resources that no longer exist are dropped from `state`. Returns the
/// live states in state order.
async fn refresh<P: Provider>(provider: &P, state: &mut StateFile) -> Result<Vec<State>, String> {
    let mut live = Vec::new();
    let mut vanished = Vec::new();

    for stored in &state.resources {
        let id = stored.id();
        let mut current = provider
            .read(&id, stored.identifier.as_deref())
            .await
            .map_err(|e| format!("Failed to read {}: {}", id, e))?;

        if !current.exists {
            log::warn!("{} no longer exists, removing it from state", id);
            vanished.push(id);
            continue;
        }

        current.merge_missing(&stored.attribute_values());
        current.tainted = stored.tainted;
        live.push(current);
    }

    for id in &vanished {
        state.remove_resource(id);
    }
    for current in &live {
        state.upsert_resource(ResourceState::from_state(current, provider.name()));
    }

    Ok(live)
}

/// Resolve references and diff declared resources against live state
///
/// A reference to a resource that will be created or replaced stays
/// unresolved, so its dependents see the change too. The returned bindings
/// seed the interpreter.
fn build_plan(
    resources: &[Resource],
    current: &[State],
    schemas: &HashMap<String, ResourceSchema>,
) -> (Plan, Bindings) {
    let current_states: HashMap<ResourceId, State> = current
        .iter()
        .map(|s| (s.id.clone(), s.clone()))
        .collect();

    let mut bindings = Bindings::new();
    let mut resolved = Vec::with_capacity(resources.len());
    for resource in resources {
        let resource = resolve_refs(resource, &bindings);
        if let Some(state) = current_states.get(&resource.id) {
            let schema = schemas.get(&resource.id.resource_type);
            if !matches!(
                diff(&resource, state, schema),
                Diff::Create(_) | Diff::Replace { .. }
            ) {
                bindings.insert(resource.id.name.clone(), state.attributes.clone());
            }
        }
        resolved.push(resource);
    }

    let declared: HashSet<&ResourceId> = resources.iter().map(|r| &r.id).collect();
    let orphans: Vec<State> = current
        .iter()
        .filter(|s| !declared.contains(&s.id))
        .cloned()
        .collect();

    (
        create_plan(&resolved, &current_states, schemas, &orphans),
        bindings,
    )
}

/// Save what the apply did to state
///
/// A resource that was created but failed afterwards is kept as tainted so
/// the next apply replaces it.
fn record_outcomes(state: &mut StateFile, result: &ApplyResult, provider: &str) {
    for (id, outcome) in &result.outcomes {
        match outcome {
            Ok(EffectOutcome::Created { state: live })
            | Ok(EffectOutcome::Updated { state: live })
            | Ok(EffectOutcome::Replaced { state: live }) => {
                state.upsert_resource(ResourceState::from_state(live, provider));
            }
            Ok(EffectOutcome::Deleted { id }) => {
                state.remove_resource(id);
            }
            Err(e) => {
                if let Some(identifier) = &e.identifier {
                    log::warn!("{} ({}) is tainted and will be replaced", id, identifier);
                    state.upsert_resource(
                        ResourceState::new(&id.resource_type, &id.name, provider)
                            .with_identifier(identifier)
                            .tainted(),
                    );
                }
            }
            Ok(EffectOutcome::Skipped { .. }) => {}
        }
    }
}

fn report(plan: &Plan, result: &ApplyResult, operation: &str) -> Result<(), String> {
    for (effect, (_, outcome)) in plan.effects().iter().zip(&result.outcomes) {
        match outcome {
            Ok(_) => println!("  {} {}", "✓".green(), format_effect(effect)),
            Err(e) => println!("  {} {} - {}", "✗".red(), format_effect(effect), e),
        }
    }

    let not_attempted = plan.effects().len() - result.outcomes.len();
    println!();
    if result.is_success() {
        println!(
            "{}",
            format!(
                "{} complete! {} changes applied.",
                operation, result.success_count
            )
            .green()
            .bold()
        );
        Ok(())
    } else {
        Err(format!(
            "{} failed. {} succeeded, {} failed, {} not attempted.",
            operation, result.success_count, result.failure_count, not_attempted
        ))
    }
}

fn confirm(question: &str) -> Result<bool, String> {
    println!("{}", question.yellow().bold());
    println!("  {}", "Only 'yes' will be accepted to confirm.".yellow());
    print!("\n  Enter a value: ");
    std::io::stdout().flush().map_err(|e| e.to_string())?;

    let mut input = String::new();
    std::io::stdin()
        .read_line(&mut input)
        .map_err(|e| e.to_string())?;
    println!();

    Ok(input.trim() == "yes")
}

fn print_plan(plan: &Plan) {
    if plan.is_empty() {
        println!("{}", "No changes. Infrastructure is up-to-date.".green());
        return;
    }

    println!("{}", "Execution Plan:".cyan().bold());
    println!();

    for effect in plan.effects() {
        print_effect(effect);
    }

    println!();
    println!("{}", plan.summary());
}

fn print_effect(effect: &Effect) {
    let attr_prefix = "      ";

    match effect {
        Effect::Create(r) => {
            println!("  {} {}", "+".green().bold(), r.id.to_string().cyan().bold());
            for key in sorted_keys(&r.attributes) {
                println!(
                    "{}{}: {}",
                    attr_prefix,
                    key,
                    format_value(&r.attributes[key]).green()
                );
            }
        }
        Effect::Update {
            id,
            from,
            to,
            changed_attributes,
            ..
        } => {
            println!("  {} {}", "~".yellow().bold(), id.to_string().cyan().bold());
            print_changes(attr_prefix, from, to, changed_attributes);
        }
        Effect::Replace {
            id,
            from,
            to,
            changed_attributes,
            ..
        } => {
            let reason = if from.tainted {
                "(tainted, must be replaced)"
            } else {
                "(must be replaced)"
            };
            println!(
                "  {} {} {}",
                "-/+".magenta().bold(),
                id.to_string().cyan().bold(),
                reason.magenta()
            );
            print_changes(attr_prefix, from, to, changed_attributes);
        }
        Effect::Delete { id, identifier } => {
            println!("  {} {}", "-".red().bold(), id.to_string().cyan().bold());
            println!("{}{}: {}", attr_prefix, "identifier".bold(), identifier.red());
        }
    }
}

fn print_changes(prefix: &str, from: &State, to: &Resource, changed: &[String]) {
    for key in changed {
        let old = from
            .attributes
            .get(key)
            .map(format_value)
            .unwrap_or_else(|| "(none)".to_string());
        let new = to
            .attributes
            .get(key)
            .map(format_value)
            .unwrap_or_else(|| "(none)".to_string());
        println!("{}{}: {} → {}", prefix, key, old.red(), new.green());
    }
}

fn sorted_keys(attributes: &HashMap<String, Value>) -> Vec<&String> {
    let mut keys: Vec<_> = attributes.keys().filter(|k| !k.starts_with('_')).collect();
    keys.sort_by(|a, b| match (a.as_str(), b.as_str()) {
        ("name", _) => std::cmp::Ordering::Less,
        (_, "name") => std::cmp::Ordering::Greater,
        _ => a.cmp(b),
    });
    keys
}

fn format_effect(effect: &Effect) -> String {
    match effect {
        Effect::Create(r) => format!("Create {}", r.id),
        Effect::Update { id, .. } => format!("Update {}", id),
        Effect::Replace { id, .. } => format!("Replace {}", id),
        Effect::Delete { id, .. } => format!("Delete {}", id),
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => format!("\"{}\"", s),
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::List(items) => {
            let strs: Vec<_> = items.iter().map(format_value).collect();
            format!("[{}]", strs.join(", "))
        }
        Value::Map(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let strs: Vec<_> = entries
                .into_iter()
                .map(|(k, v)| format!("{}: {}", k, format_value(v)))
                .collect();
            format!("{{{}}}", strs.join(", "))
        }
        Value::ResourceRef(binding, attr) => {
            format!("${{{}.{}}} (known after apply)", binding, attr)
        }
    }
}
