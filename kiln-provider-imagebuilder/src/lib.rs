//! Kiln AWS Image Builder Provider
//!
//! Manages EC2 Image Builder images and container recipes.
//!
//! ## Module Structure
//!
//! - `api` - Mediator trait and plain request/response types
//! - `client` - `ImageBuilderApi` over the AWS SDK
//! - `provider` - ImageBuilderProvider implementation
//! - `image`, `container_recipe` - Per-resource expand/flatten and CRUD
//! - `schemas` - Resource schemas
//! - `tags`, `waiter` - Tag updates and the image build waiter

pub mod api;
pub mod client;
mod container_recipe;
mod image;
pub mod provider;
pub mod resources;
pub mod schemas;
mod tags;
mod utils;
pub mod waiter;

#[cfg(test)]
mod testing;

// Re-export main types
pub use api::{ApiError, ImageBuilderApi};
pub use client::SdkImageBuilder;
pub use provider::ImageBuilderProvider;

use kiln_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use kiln_core::resource::{Resource, ResourceId, State};

use resources::resource_types;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for ImageBuilderProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        Box::pin(async move { self.read_resource(&id, identifier.as_deref()).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &from, &to).await })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move { self.delete_resource(&id, &identifier).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ContainerRecipeDetails;
    use crate::testing::FakeImageBuilder;
    use kiln_core::resource::Value;
    use kiln_core::tags::IgnoreTagsConfig;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    const RECIPE: &str = "imagebuilder.container_recipe";
    const IMAGE: &str = "imagebuilder.image";

    fn tags(pairs: &[(&str, &str)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
        )
    }

    fn setup() -> (Arc<FakeImageBuilder>, ImageBuilderProvider) {
        let fake = Arc::new(FakeImageBuilder::new());
        let provider =
            ImageBuilderProvider::with_api(fake.clone()).with_poll_interval(Duration::from_millis(1));
        (fake, provider)
    }

    #[test]
    fn exposes_both_resource_types() {
        let (_, provider) = setup();
        let mut names: Vec<&str> = provider.resource_types().iter().map(|t| t.name()).collect();
        names.sort();
        assert_eq!(names, vec![IMAGE, RECIPE]);
        assert_eq!(provider.name(), "aws");
    }

    #[tokio::test]
    async fn read_without_identifier_is_not_found() {
        let (fake, provider) = setup();
        let state = provider
            .read(&ResourceId::new(IMAGE, "web"), None)
            .await
            .unwrap();
        assert!(!state.exists);
        assert!(fake.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_resource_type_is_an_error() {
        let (_, provider) = setup();
        let err = provider
            .read(&ResourceId::new("imagebuilder.pipeline", "p"), Some("arn:x"))
            .await
            .unwrap_err();
        assert!(err.message.contains("Unknown resource type"));
    }

    #[tokio::test]
    async fn update_only_touches_tags() {
        let (fake, provider) = setup();
        let arn = fake.insert_recipe(ContainerRecipeDetails {
            name: Some("app".to_string()),
            tags: HashMap::from([
                ("env".to_string(), "dev".to_string()),
                ("aws:imagebuilder:managed".to_string(), "true".to_string()),
            ]),
            ..Default::default()
        });
        let id = ResourceId::new(RECIPE, "app");

        let from = provider.read(&id, Some(&arn)).await.unwrap();
        assert_eq!(from.attributes.get("tags"), Some(&tags(&[("env", "dev")])));

        let to = Resource::new(RECIPE, "app").with_attribute("tags", tags(&[("team", "infra")]));
        let state = provider.update(&id, &arn, &from, &to).await.unwrap();

        assert_eq!(state.attributes.get("tags"), Some(&tags(&[("team", "infra")])));
        // System tag survives
        assert!(
            fake.recipe(&arn)
                .unwrap()
                .tags
                .contains_key("aws:imagebuilder:managed")
        );
        assert_eq!(
            fake.calls()
                .into_iter()
                .filter(|c| c.contains("Tag"))
                .collect::<Vec<_>>(),
            vec!["UntagResource env", "TagResource team"]
        );
    }

    #[tokio::test]
    async fn ignored_tags_are_hidden_from_state() {
        let fake = Arc::new(FakeImageBuilder::new());
        let provider = ImageBuilderProvider::with_api(fake.clone()).with_ignore_tags(IgnoreTagsConfig {
            keys: vec!["CostCenter".to_string()],
            key_prefixes: vec![],
        });
        let arn = fake.insert_recipe(ContainerRecipeDetails {
            tags: HashMap::from([
                ("CostCenter".to_string(), "42".to_string()),
                ("env".to_string(), "prod".to_string()),
            ]),
            ..Default::default()
        });

        let state = provider
            .read(&ResourceId::new(RECIPE, "app"), Some(&arn))
            .await
            .unwrap();
        assert_eq!(state.attributes.get("tags"), Some(&tags(&[("env", "prod")])));
    }

    #[tokio::test]
    async fn delete_tolerates_missing_resources() {
        let (fake, provider) = setup();
        let arn = fake.insert_recipe(ContainerRecipeDetails::default());
        let id = ResourceId::new(RECIPE, "app");

        provider.delete(&id, &arn).await.unwrap();
        assert!(fake.recipe(&arn).is_none());

        // Second delete hits ResourceNotFoundException
        provider.delete(&id, &arn).await.unwrap();
        provider
            .delete(&ResourceId::new(IMAGE, "web"), "arn:gone")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn image_create_through_provider_trait() {
        let (fake, provider) = setup();
        fake.set_create_statuses(&["BUILDING", "AVAILABLE"]);

        let resource = Resource::new(IMAGE, "web")
            .with_attribute(
                "infrastructure_configuration_arn",
                Value::String(
                    "arn:aws:imagebuilder:us-east-1:123456789012:infrastructure-configuration/b"
                        .to_string(),
                ),
            )
            .with_attribute(
                "image_recipe_arn",
                Value::String(
                    "arn:aws:imagebuilder:us-east-1:123456789012:image-recipe/web/1.0.0"
                        .to_string(),
                ),
            );

        let state = provider.create(&resource).await.unwrap();
        assert!(state.exists);
        assert_eq!(
            state.attributes.get("enhanced_image_metadata_enabled"),
            Some(&Value::Bool(true))
        );
        assert_eq!(fake.image_requests().len(), 1);
    }
}
