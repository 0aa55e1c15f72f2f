//! Image Builder provider implementation
//!
//! Dispatches resource operations to the per-resource modules and maps API
//! failures to `ProviderError`s.

use std::sync::Arc;
use std::time::Duration;

use kiln_core::config::ProviderConfig;
use kiln_core::provider::{ProviderError, ProviderResult};
use kiln_core::resource::{Resource, ResourceId, State, Value};
use kiln_core::tags::IgnoreTagsConfig;

use crate::api::{ApiError, ImageBuilderApi};
use crate::client::SdkImageBuilder;
use crate::schemas::{container_recipe, image};
use crate::tags::update_tags;
use crate::waiter::DEFAULT_POLL_INTERVAL;

/// AWS EC2 Image Builder Provider
pub struct ImageBuilderProvider {
    api: Arc<dyn ImageBuilderApi>,
    ignore_tags: IgnoreTagsConfig,
    poll_interval: Duration,
}

impl ImageBuilderProvider {
    /// Create a provider talking to Image Builder with the default credential chain
    pub async fn new(config: &ProviderConfig) -> Self {
        let api = SdkImageBuilder::new(config.region.as_deref()).await;
        Self::with_api(Arc::new(api)).with_ignore_tags(config.ignore_tags.clone())
    }

    /// Create with a specific API implementation (for testing)
    pub fn with_api(api: Arc<dyn ImageBuilderApi>) -> Self {
        Self {
            api,
            ignore_tags: IgnoreTagsConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_ignore_tags(mut self, ignore_tags: IgnoreTagsConfig) -> Self {
        self.ignore_tags = ignore_tags;
        self
    }

    /// Delay between status checks while waiting for an image build
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub(crate) fn api(&self) -> &dyn ImageBuilderApi {
        self.api.as_ref()
    }

    pub(crate) fn ignore_tags(&self) -> &IgnoreTagsConfig {
        &self.ignore_tags
    }

    pub(crate) fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Read a resource by its ARN
    pub async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> ProviderResult<State> {
        let Some(arn) = identifier else {
            return Ok(State::not_found(id.clone()));
        };

        match id.resource_type.as_str() {
            image::RESOURCE_TYPE => self.read_image(id, arn, false).await,
            container_recipe::RESOURCE_TYPE => self.read_container_recipe(id, arn, false).await,
            _ => Err(unknown_type(id)),
        }
    }

    pub async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        match resource.id.resource_type.as_str() {
            image::RESOURCE_TYPE => self.create_image(resource).await,
            container_recipe::RESOURCE_TYPE => self.create_container_recipe(resource).await,
            _ => Err(unknown_type(&resource.id)),
        }
    }

    /// Update a resource in place
    ///
    /// Only tags can change without replacement, for both resource types.
    pub async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        if !matches!(
            id.resource_type.as_str(),
            image::RESOURCE_TYPE | container_recipe::RESOURCE_TYPE
        ) {
            return Err(unknown_type(id));
        }

        let old_tags = from.attributes.get("tags");
        let new_tags = to.attributes.get("tags");
        if old_tags != new_tags {
            update_tags(self.api(), identifier, old_tags, new_tags, &self.ignore_tags)
                .await
                .map_err(|e| api_failure(&format!("Failed to update tags for {}", identifier), id, e))?;
        }

        self.read_resource(id, Some(identifier)).await
    }

    /// Delete a resource; a resource that is already gone counts as deleted
    pub async fn delete_resource(&self, id: &ResourceId, identifier: &str) -> ProviderResult<()> {
        let result = match id.resource_type.as_str() {
            image::RESOURCE_TYPE => self.api.delete_image(identifier).await,
            container_recipe::RESOURCE_TYPE => self.api.delete_container_recipe(identifier).await,
            _ => return Err(unknown_type(id)),
        };

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => {
                log::debug!("{} ({}) already deleted", id, identifier);
                Ok(())
            }
            Err(e) => Err(api_failure(&format!("Failed to delete {}", identifier), id, e)),
        }
    }
}

fn unknown_type(id: &ResourceId) -> ProviderError {
    ProviderError::new(format!("Unknown resource type: {}", id.resource_type))
        .for_resource(id.clone())
}

/// Wrap an API error, keeping it as the cause
pub(crate) fn api_failure(action: &str, id: &ResourceId, err: ApiError) -> ProviderError {
    ProviderError::new(format!("{}: {}", action, err))
        .for_resource(id.clone())
        .with_cause(err)
}

/// String attribute that must be present for an API call
pub(crate) fn required_string(resource: &Resource, key: &str) -> ProviderResult<String> {
    match resource.attributes.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        _ => Err(
            ProviderError::new(format!("Required attribute '{}' is missing", key))
                .for_resource(resource.id.clone()),
        ),
    }
}
