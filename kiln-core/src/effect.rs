//! Effect - Side effects as values
//!
//! Each Effect describes one operation against a Provider. Nothing happens
//! until the Interpreter executes it.

use crate::resource::{Resource, ResourceId, State};

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Create a new resource
    Create(Resource),
    /// Update an existing resource in place
    Update {
        id: ResourceId,
        identifier: String,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete an existing resource and create it again with the new attributes
    Replace {
        id: ResourceId,
        identifier: String,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Delete a resource that is no longer declared
    Delete { id: ResourceId, identifier: String },
}

impl Effect {
    /// The resource this Effect operates on
    pub fn resource_id(&self) -> &ResourceId {
        match self {
            Effect::Create(resource) => &resource.id,
            Effect::Update { id, .. } | Effect::Replace { id, .. } | Effect::Delete { id, .. } => {
                id
            }
        }
    }

    /// Short verb used in plan output
    pub fn kind(&self) -> &'static str {
        match self {
            Effect::Create(_) => "create",
            Effect::Update { .. } => "update",
            Effect::Replace { .. } => "replace",
            Effect::Delete { .. } => "delete",
        }
    }
}
