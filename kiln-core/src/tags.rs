//! Tags - Key/value tag reconciliation
//!
//! Tags are compared as plain string maps. System tags (`aws:` prefix) and
//! tags matched by the provider's ignore rules never show up in state and are
//! never touched on update.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::resource::Value;

/// Prefix reserved for tags managed by AWS itself
pub const AWS_TAG_PREFIX: &str = "aws:";

/// Provider-level rules for tags that should be left alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IgnoreTagsConfig {
    /// Exact keys to ignore
    pub keys: Vec<String>,
    /// Key prefixes to ignore
    pub key_prefixes: Vec<String>,
}

impl IgnoreTagsConfig {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty() && self.key_prefixes.is_empty()
    }

    pub fn ignores(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
            || self.key_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }
}

/// Ordered set of key/value tags
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueTags(BTreeMap<String, String>);

impl KeyValueTags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tags from a `tags` attribute value; non-string entries are skipped
    pub fn from_value(value: Option<&Value>) -> Self {
        let mut tags = BTreeMap::new();
        if let Some(Value::Map(map)) = value {
            for (key, value) in map {
                if let Value::String(v) = value {
                    tags.insert(key.clone(), v.clone());
                }
            }
        }
        Self(tags)
    }

    /// Tags from an API tag map
    pub fn from_map(map: &HashMap<String, String>) -> Self {
        Self(
            map.iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Drop system tags
    pub fn ignore_aws(self) -> Self {
        Self(
            self.0
                .into_iter()
                .filter(|(k, _)| !k.starts_with(AWS_TAG_PREFIX))
                .collect(),
        )
    }

    /// Drop tags matched by the ignore configuration
    pub fn ignore_config(self, config: &IgnoreTagsConfig) -> Self {
        if config.is_empty() {
            return self;
        }
        Self(
            self.0
                .into_iter()
                .filter(|(k, _)| !config.ignores(k))
                .collect(),
        )
    }

    /// Tags present here but missing from `new` (to untag)
    pub fn removed(&self, new: &KeyValueTags) -> KeyValueTags {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| !new.0.contains_key(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// Tags in `new` that are absent or different here (to tag)
    pub fn updated(&self, new: &KeyValueTags) -> KeyValueTags {
        Self(
            new.0
                .iter()
                .filter(|(k, v)| self.0.get(*k) != Some(*v))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_map(self) -> HashMap<String, String> {
        self.0.into_iter().collect()
    }

    /// Tags as a `Value::Map`
    pub fn to_value(&self) -> Value {
        Value::Map(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

impl FromIterator<(String, String)> for KeyValueTags {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> KeyValueTags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn ignore_aws_drops_system_tags() {
        let t = tags(&[("aws:cloudformation:stack-name", "x"), ("team", "infra")]);
        assert_eq!(t.ignore_aws(), tags(&[("team", "infra")]));
    }

    #[test]
    fn ignore_config_drops_keys_and_prefixes() {
        let config = IgnoreTagsConfig {
            keys: vec!["owner".to_string()],
            key_prefixes: vec!["kubernetes.io/".to_string()],
        };
        let t = tags(&[
            ("owner", "me"),
            ("kubernetes.io/cluster", "shared"),
            ("env", "prod"),
        ]);
        assert_eq!(t.ignore_config(&config), tags(&[("env", "prod")]));
    }

    #[test]
    fn removed_and_updated() {
        let old = tags(&[("a", "1"), ("b", "2"), ("c", "3")]);
        let new = tags(&[("b", "2"), ("c", "30"), ("d", "4")]);

        assert_eq!(old.removed(&new).keys(), vec!["a".to_string()]);
        assert_eq!(old.updated(&new), tags(&[("c", "30"), ("d", "4")]));
    }

    #[test]
    fn no_changes_between_equal_sets() {
        let old = tags(&[("a", "1")]);
        assert!(old.removed(&old).is_empty());
        assert!(old.updated(&old).is_empty());
    }

    #[test]
    fn value_round_trip_skips_non_strings() {
        let value = Value::Map(HashMap::from([
            ("name".to_string(), Value::String("web".to_string())),
            ("count".to_string(), Value::Int(1)),
        ]));
        let t = KeyValueTags::from_value(Some(&value));
        assert_eq!(t, tags(&[("name", "web")]));
        assert_eq!(
            t.to_value(),
            Value::Map(HashMap::from([(
                "name".to_string(),
                Value::String("web".to_string())
            )]))
        );
        assert!(KeyValueTags::from_value(None).is_empty());
    }
}
