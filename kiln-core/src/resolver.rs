//! Resolver - Resource references and dependency ordering
//!
//! A resource may refer to another resource's attribute with
//! `${binding.attribute}`. References decide the order resources are
//! created in, and are replaced with concrete values once the target
//! attribute is known.

use std::collections::{HashMap, HashSet};

use crate::resource::{Resource, Value};

/// Attributes of each binding, keyed by binding (resource) name
pub type Bindings = HashMap<String, HashMap<String, Value>>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("{resource} references unknown resource '{binding}'")]
    UnknownBinding { resource: String, binding: String },

    #[error("Dependency cycle between: {}", names.join(", "))]
    Cycle { names: Vec<String> },
}

/// Bindings referenced by a resource
pub fn dependencies(resource: &Resource) -> HashSet<String> {
    let mut deps = HashSet::new();
    for value in resource.attributes.values() {
        collect_dependencies(value, &mut deps);
    }
    deps
}

fn collect_dependencies(value: &Value, deps: &mut HashSet<String>) {
    match value {
        Value::ResourceRef(binding, _) => {
            deps.insert(binding.clone());
        }
        Value::List(items) => {
            for item in items {
                collect_dependencies(item, deps);
            }
        }
        Value::Map(map) => {
            for v in map.values() {
                collect_dependencies(v, deps);
            }
        }
        _ => {}
    }
}

/// Order resources so every resource comes after the resources it references
///
/// Independent resources keep their declared order.
pub fn sort_by_dependencies(resources: &[Resource]) -> Result<Vec<Resource>, ResolveError> {
    let names: HashSet<&str> = resources.iter().map(|r| r.id.name.as_str()).collect();

    let mut pending: Vec<(&Resource, HashSet<String>)> = Vec::with_capacity(resources.len());
    for resource in resources {
        let deps = dependencies(resource);
        if let Some(unknown) = deps.iter().find(|d| !names.contains(d.as_str())) {
            return Err(ResolveError::UnknownBinding {
                resource: resource.id.to_string(),
                binding: unknown.clone(),
            });
        }
        pending.push((resource, deps));
    }

    let mut sorted = Vec::with_capacity(resources.len());
    let mut placed: HashSet<String> = HashSet::new();

    while !pending.is_empty() {
        let ready = pending
            .iter()
            .position(|(_, deps)| deps.iter().all(|d| placed.contains(d)));

        match ready {
            Some(index) => {
                let (resource, _) = pending.remove(index);
                placed.insert(resource.id.name.clone());
                sorted.push(resource.clone());
            }
            None => {
                let mut names: Vec<String> =
                    pending.iter().map(|(r, _)| r.id.name.clone()).collect();
                names.sort();
                return Err(ResolveError::Cycle { names });
            }
        }
    }

    Ok(sorted)
}

/// Replace references whose target attribute is known
///
/// References to unknown attributes stay in place so the plan can show them
/// as values known only after apply.
pub fn resolve_refs(resource: &Resource, bindings: &Bindings) -> Resource {
    let mut resolved = resource.clone();
    for value in resolved.attributes.values_mut() {
        resolve_value(value, bindings);
    }
    resolved
}

fn resolve_value(value: &mut Value, bindings: &Bindings) {
    match value {
        Value::ResourceRef(binding, attribute) => {
            if let Some(target) = bindings.get(binding.as_str()).and_then(|b| b.get(attribute.as_str()))
                && !target.contains_ref()
            {
                *value = target.clone();
            }
        }
        Value::List(items) => {
            for item in items {
                resolve_value(item, bindings);
            }
        }
        Value::Map(map) => {
            for v in map.values_mut() {
                resolve_value(v, bindings);
            }
        }
        _ => {}
    }
}
