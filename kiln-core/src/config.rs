//! Config - Load resource declarations from a JSON file
//!
//! ```json
//! {
//!   "provider": { "region": "us-east-1", "ignore_tags": { "key_prefixes": ["kubernetes.io/"] } },
//!   "backend": { "type": "local", "path": "kiln.state.json" },
//!   "resources": [
//!     {
//!       "type": "imagebuilder.image",
//!       "name": "web",
//!       "attributes": { "container_recipe_arn": "${recipe.arn}" },
//!       "timeouts": { "create": "90m" }
//!     }
//!   ]
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::resource::{Resource, Timeouts, Value};
use crate::tags::IgnoreTagsConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid duration '{0}' (expected e.g. \"60m\", \"1h30m\", \"45s\")")]
    InvalidDuration(String),

    #[error("Invalid resource name '{0}': names must be non-empty and contain no '.'")]
    InvalidName(String),

    #[error("Duplicate resource name: {0}")]
    DuplicateName(String),

    #[error("Invalid number {value} for '{attribute}': only integers are supported")]
    InvalidNumber { attribute: String, value: String },
}

/// Provider-level settings
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// AWS region; the SDK default chain is used when absent
    #[serde(default)]
    pub region: Option<String>,
    /// Tags the provider never reports or manages
    #[serde(default)]
    pub ignore_tags: IgnoreTagsConfig,
}

/// Backend configuration for state storage
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    /// Backend type (e.g., "local")
    pub backend_type: String,
    /// Backend-specific attributes
    pub attributes: HashMap<String, Value>,
}

impl BackendConfig {
    /// Get a string attribute value
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(Value::as_str)
    }
}

/// A loaded configuration file
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub backend: Option<BackendConfig>,
    /// Resources in declared order
    pub resources: Vec<Resource>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    provider: ProviderConfig,
    #[serde(default)]
    backend: Option<RawBackend>,
    #[serde(default)]
    resources: Vec<RawResource>,
}

#[derive(Deserialize)]
struct RawBackend {
    #[serde(rename = "type")]
    backend_type: String,
    #[serde(flatten)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawResource {
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    timeouts: RawTimeouts,
}

#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTimeouts {
    create: Option<String>,
    update: Option<String>,
    delete: Option<String>,
}

/// Load a configuration file
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse(&content)
}

/// Parse configuration text
pub fn parse(input: &str) -> Result<Config, ConfigError> {
    let raw: RawConfig = serde_json::from_str(input)?;

    let backend = raw
        .backend
        .map(|b| -> Result<BackendConfig, ConfigError> {
            Ok(BackendConfig {
                backend_type: b.backend_type,
                attributes: convert_attributes(&b.attributes)?,
            })
        })
        .transpose()?;

    let mut names = HashSet::new();
    let mut resources = Vec::with_capacity(raw.resources.len());
    for r in raw.resources {
        if r.name.is_empty() || r.name.contains('.') {
            return Err(ConfigError::InvalidName(r.name));
        }
        // Names double as reference bindings, so they must be unique across types
        if !names.insert(r.name.clone()) {
            return Err(ConfigError::DuplicateName(r.name));
        }

        let timeouts = Timeouts {
            create: r.timeouts.create.as_deref().map(parse_duration).transpose()?,
            update: r.timeouts.update.as_deref().map(parse_duration).transpose()?,
            delete: r.timeouts.delete.as_deref().map(parse_duration).transpose()?,
        };

        let mut resource = Resource::new(r.resource_type, r.name).with_timeouts(timeouts);
        resource.attributes = convert_attributes(&r.attributes)?;
        resources.push(resource);
    }

    Ok(Config {
        provider: raw.provider,
        backend,
        resources,
    })
}

fn convert_attributes(
    attributes: &serde_json::Map<String, serde_json::Value>,
) -> Result<HashMap<String, Value>, ConfigError> {
    let mut converted = HashMap::new();
    for (key, value) in attributes {
        check_integers(key, value)?;
        if let Some(value) = Value::from_json(value) {
            converted.insert(key.clone(), value);
        }
    }
    Ok(converted)
}

/// Reject fractional numbers anywhere inside an attribute value
fn check_integers(path: &str, value: &serde_json::Value) -> Result<(), ConfigError> {
    match value {
        serde_json::Value::Number(n) if Value::from_json(value).is_none() => {
            Err(ConfigError::InvalidNumber {
                attribute: path.to_string(),
                value: n.to_string(),
            })
        }
        serde_json::Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| check_integers(&format!("{}[{}]", path, i), item)),
        serde_json::Value::Object(map) => map
            .iter()
            .try_for_each(|(k, v)| check_integers(&format!("{}.{}", path, k), v)),
        _ => Ok(()),
    }
}

/// Parse a duration such as `"60m"`, `"1h30m"`, `"45s"` or `"500ms"`
pub fn parse_duration(input: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(input.to_string());

    let mut rest = input.trim();
    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let amount: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let millis_per_unit = match &rest[..unit_len] {
            "h" => 3_600_000,
            "m" => 60_000,
            "s" => 1_000,
            "ms" => 1,
            _ => return Err(invalid()),
        };
        let millis = amount.checked_mul(millis_per_unit).ok_or_else(invalid)?;
        total += Duration::from_millis(millis);
        rest = &rest[unit_len..];
    }

    Ok(total)
}
