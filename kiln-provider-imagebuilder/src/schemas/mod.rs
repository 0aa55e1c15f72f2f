//! Image Builder resource schema definitions

pub mod container_recipe;
pub mod image;

use std::collections::HashMap;

use kiln_core::schema::{AttributeType, ResourceSchema, types};

/// Image Builder ARN of the given resource kind (e.g., "image-recipe")
///
/// Versioned resources end in `/<name>/<major>.<minor>.<patch>`.
pub(crate) fn imagebuilder_arn(kind: &str, versioned: bool) -> AttributeType {
    let suffix = if versioned {
        r"[a-z0-9_-]+/\d+\.\d+\.\d+"
    } else {
        r"[a-z0-9_-]+"
    };
    let pattern = format!(
        r"^arn:aws[^:]*:imagebuilder:[^:]+:(?:\d{{12}}|aws):{}/{}$",
        kind, suffix
    );
    types::string_match(&pattern, &format!("value must be a {} ARN", kind))
}

/// Returns all Image Builder schemas keyed by resource type
pub fn all_schemas() -> HashMap<String, ResourceSchema> {
    [image::schema(), container_recipe::schema()]
        .into_iter()
        .map(|s| (s.resource_type.clone(), s))
        .collect()
}
