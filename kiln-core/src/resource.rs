//! Resource - Representing resources and their state

use std::collections::HashMap;
use std::time::Duration;

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// Resource type (e.g., "imagebuilder.image")
    pub resource_type: String,
    /// Resource name (also the binding used by references)
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }

    /// Parse an address of the form `type.name` where the type may itself contain dots
    /// (e.g., `imagebuilder.image.web`)
    pub fn parse_address(address: &str) -> Option<Self> {
        let (resource_type, name) = address.rsplit_once('.')?;
        if resource_type.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self::new(resource_type, name))
    }

    /// `type.name`
    pub fn address(&self) -> String {
        format!("{}.{}", self.resource_type, self.name)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
    /// Reference to another resource's attribute (binding_name, attribute_name)
    ResourceRef(String, String),
}

impl Value {
    /// Convert a JSON value into a Value
    ///
    /// Strings of the exact form `${binding.attribute}` become references.
    /// Numbers without an integer value and `null` have no Value form and
    /// yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Value> {
        match value {
            serde_json::Value::String(s) => {
                Some(parse_reference(s).unwrap_or_else(|| Value::String(s.clone())))
            }
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .map(Value::Int),
            serde_json::Value::Array(items) => Some(Value::List(
                items.iter().filter_map(Value::from_json).collect(),
            )),
            serde_json::Value::Object(map) => Some(Value::Map(
                map.iter()
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
            serde_json::Value::Null => None,
        }
    }

    /// Convert a Value into JSON
    ///
    /// Unresolved references have no JSON form and yield `None`.
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Value::String(s) => Some(serde_json::Value::String(s.clone())),
            Value::Int(i) => Some(serde_json::Value::from(*i)),
            Value::Bool(b) => Some(serde_json::Value::Bool(*b)),
            Value::List(items) => Some(serde_json::Value::Array(
                items.iter().filter_map(Value::to_json).collect(),
            )),
            Value::Map(map) => Some(serde_json::Value::Object(
                map.iter()
                    .filter_map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                    .collect(),
            )),
            Value::ResourceRef(_, _) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// True if this value or anything nested in it is a reference
    pub fn contains_ref(&self) -> bool {
        match self {
            Value::ResourceRef(_, _) => true,
            Value::List(items) => items.iter().any(Value::contains_ref),
            Value::Map(map) => map.values().any(Value::contains_ref),
            _ => false,
        }
    }
}

/// Parse `${binding.attribute}`
fn parse_reference(s: &str) -> Option<Value> {
    let inner = s.strip_prefix("${")?.strip_suffix('}')?;
    let (binding, attribute) = inner.split_once('.')?;
    if binding.is_empty() || attribute.is_empty() || attribute.contains('.') {
        return None;
    }
    Some(Value::ResourceRef(
        binding.to_string(),
        attribute.to_string(),
    ))
}

/// Per-operation timeouts declared on a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Option<Duration>,
    pub update: Option<Duration>,
    pub delete: Option<Duration>,
}

/// Desired state declared in configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
    pub timeouts: Timeouts,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
            timeouts: Timeouts::default(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// String attribute, if set
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// Current state fetched from actual infrastructure
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Provider-side identifier (e.g., an image build version ARN)
    pub identifier: Option<String>,
    pub attributes: HashMap<String, Value>,
    /// Whether this state exists
    pub exists: bool,
    /// Created but never became usable; the next plan replaces it
    pub tainted: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: HashMap::new(),
            exists: false,
            tainted: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: HashMap<String, Value>) -> Self {
        Self {
            id,
            identifier: None,
            attributes,
            exists: true,
            tainted: false,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_tainted(mut self, tainted: bool) -> Self {
        self.tainted = tainted;
        self
    }

    /// Keep values for attributes the provider did not report
    ///
    /// Some inputs (e.g., a Dockerfile template URI) are never echoed back by
    /// the API; the configured or previously stored value stands in for them.
    pub fn merge_missing(&mut self, attributes: &HashMap<String, Value>) {
        for (key, value) in attributes {
            if !self.attributes.contains_key(key) && !value.contains_ref() {
                self.attributes.insert(key.clone(), value.clone());
            }
        }
    }
}
