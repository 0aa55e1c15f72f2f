//! Tag reads and updates shared by all Image Builder resources

use std::collections::HashMap;

use kiln_core::resource::Value;
use kiln_core::tags::{IgnoreTagsConfig, KeyValueTags};

use crate::api::{ApiError, ImageBuilderApi};

/// Tags to send on create; system tags are never sent
pub fn create_tags(value: Option<&Value>) -> HashMap<String, String> {
    KeyValueTags::from_value(value).ignore_aws().into_map()
}

/// Tags as reported in state, without system or ignored tags
pub fn flatten_tags(tags: &HashMap<String, String>, ignore: &IgnoreTagsConfig) -> Value {
    KeyValueTags::from_map(tags)
        .ignore_aws()
        .ignore_config(ignore)
        .to_value()
}

/// Bring the tags of `arn` from `old` to `new`
///
/// Removed keys are untagged first, then added or changed keys are tagged.
/// System and ignored tags are left alone.
pub async fn update_tags(
    api: &dyn ImageBuilderApi,
    arn: &str,
    old: Option<&Value>,
    new: Option<&Value>,
    ignore: &IgnoreTagsConfig,
) -> Result<(), ApiError> {
    let old = KeyValueTags::from_value(old);
    let new = KeyValueTags::from_value(new);

    let removed = old.removed(&new).ignore_aws().ignore_config(ignore);
    if !removed.is_empty() {
        log::debug!("Untagging {}: {:?}", arn, removed.keys());
        api.untag_resource(arn, removed.keys()).await?;
    }

    let updated = old.updated(&new).ignore_aws().ignore_config(ignore);
    if !updated.is_empty() {
        log::debug!("Tagging {}: {:?}", arn, updated.keys());
        api.tag_resource(arn, updated.into_map()).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ContainerRecipeDetails;
    use crate::testing::FakeImageBuilder;

    fn tags(pairs: &[(&str, &str)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
        )
    }

    #[tokio::test]
    async fn untags_removed_then_tags_changed() {
        let fake = FakeImageBuilder::new();
        let arn = fake.insert_recipe(ContainerRecipeDetails {
            tags: HashMap::from([
                ("env".to_string(), "dev".to_string()),
                ("team".to_string(), "infra".to_string()),
            ]),
            ..Default::default()
        });

        update_tags(
            &fake,
            &arn,
            Some(&tags(&[("env", "dev"), ("team", "infra")])),
            Some(&tags(&[("env", "prod"), ("owner", "ops")])),
            &IgnoreTagsConfig::default(),
        )
        .await
        .unwrap();

        assert_eq!(
            fake.calls(),
            vec!["UntagResource team", "TagResource env,owner"]
        );
        assert_eq!(
            fake.recipe(&arn).unwrap().tags,
            HashMap::from([
                ("env".to_string(), "prod".to_string()),
                ("owner".to_string(), "ops".to_string()),
            ])
        );
    }

    #[tokio::test]
    async fn no_calls_when_unchanged() {
        let fake = FakeImageBuilder::new();
        let same = tags(&[("env", "dev")]);
        update_tags(
            &fake,
            "arn:unused",
            Some(&same),
            Some(&same),
            &IgnoreTagsConfig::default(),
        )
        .await
        .unwrap();
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn leaves_system_and_ignored_tags_alone() {
        let fake = FakeImageBuilder::new();
        let arn = fake.insert_recipe(ContainerRecipeDetails::default());
        let ignore = IgnoreTagsConfig {
            keys: vec![],
            key_prefixes: vec!["team:".to_string()],
        };

        update_tags(
            &fake,
            &arn,
            Some(&tags(&[("aws:owner", "x"), ("team:a", "1")])),
            Some(&tags(&[("team:b", "2")])),
            &ignore,
        )
        .await
        .unwrap();
        assert!(fake.calls().is_empty());
    }

    #[test]
    fn flatten_drops_system_and_ignored_tags() {
        let api_tags = HashMap::from([
            ("aws:imagebuilder:source".to_string(), "x".to_string()),
            ("skip".to_string(), "y".to_string()),
            ("env".to_string(), "prod".to_string()),
        ]);
        let ignore = IgnoreTagsConfig {
            keys: vec!["skip".to_string()],
            key_prefixes: vec![],
        };
        assert_eq!(flatten_tags(&api_tags, &ignore), tags(&[("env", "prod")]));
    }

    #[test]
    fn create_tags_drop_system_tags() {
        let sent = create_tags(Some(&tags(&[("aws:x", "1"), ("env", "prod")])));
        assert_eq!(
            sent,
            HashMap::from([("env".to_string(), "prod".to_string())])
        );
    }
}
