//! State file structures for persisting infrastructure state

use kiln_core::resource::{ResourceId, State, Value};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The main state file structure that persists to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage (prevents accidental overwrites)
    pub lineage: String,
    /// Version of kiln that last modified this state
    pub kiln_version: String,
    /// All managed resources and their current state
    pub resources: Vec<ResourceState>,
}

impl StateFile {
    /// Current state file format version
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage: uuid::Uuid::new_v4().to_string(),
            kiln_version: env!("CARGO_PKG_VERSION").to_string(),
            resources: Vec::new(),
        }
    }

    /// Increment serial and stamp the current kiln version
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.kiln_version = env!("CARGO_PKG_VERSION").to_string();
    }

    pub fn find_resource(&self, id: &ResourceId) -> Option<&ResourceState> {
        self.resources
            .iter()
            .find(|r| r.resource_type == id.resource_type && r.name == id.name)
    }

    /// Add or update a resource in the state
    pub fn upsert_resource(&mut self, resource: ResourceState) {
        match self
            .resources
            .iter_mut()
            .find(|r| r.resource_type == resource.resource_type && r.name == resource.name)
        {
            Some(existing) => *existing = resource,
            None => self.resources.push(resource),
        }
    }

    /// Remove a resource from the state
    pub fn remove_resource(&mut self, id: &ResourceId) -> Option<ResourceState> {
        let pos = self
            .resources
            .iter()
            .position(|r| r.resource_type == id.resource_type && r.name == id.name)?;
        Some(self.resources.remove(pos))
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// State of a single managed resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceState {
    /// Resource type (e.g., "imagebuilder.image")
    pub resource_type: String,
    /// Resource name from the configuration
    pub name: String,
    /// Provider name (e.g., "aws")
    pub provider: String,
    /// Provider-side identifier, such as the resource ARN
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    /// Created but never became usable; replaced on the next apply
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub tainted: bool,
    /// All attributes of the resource as JSON values
    pub attributes: HashMap<String, serde_json::Value>,
}

impl ResourceState {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
            provider: provider.into(),
            identifier: None,
            tainted: false,
            attributes: HashMap::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn tainted(mut self) -> Self {
        self.tainted = true;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Snapshot a live state for storage
    pub fn from_state(state: &State, provider: impl Into<String>) -> Self {
        Self {
            resource_type: state.id.resource_type.clone(),
            name: state.id.name.clone(),
            provider: provider.into(),
            identifier: state.identifier.clone(),
            tainted: state.tainted,
            attributes: state
                .attributes
                .iter()
                .filter_map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                .collect(),
        }
    }

    pub fn id(&self) -> ResourceId {
        ResourceId::new(&self.resource_type, &self.name)
    }

    /// Stored attributes as resource values
    pub fn attribute_values(&self) -> HashMap<String, Value> {
        self.attributes
            .iter()
            .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
            .collect()
    }
}
