//! Provider - Trait abstracting resource operations
//!
//! A Provider defines operations for a specific infrastructure API.
//! It is responsible for converting Effects into actual API calls.

use std::future::Future;
use std::pin::Pin;

use crate::resource::{Resource, ResourceId, State};
use crate::schema::ResourceSchema;

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    pub resource_id: Option<ResourceId>,
    /// Set when the operation failed after the resource was created; the
    /// resource exists under this identifier but is not usable
    pub identifier: Option<String>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref id) = self.resource_id {
            write!(f, "[{}.{}] {}", id.resource_type, id.name, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource_id: None,
            identifier: None,
            cause: None,
        }
    }

    pub fn for_resource(mut self, id: ResourceId) -> Self {
        self.resource_id = Some(id);
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Definition of resource types that a Provider can handle
pub trait ResourceType: Send + Sync {
    /// Resource type name (e.g., "imagebuilder.image")
    fn name(&self) -> &'static str;

    /// Attribute schema for this resource type
    fn schema(&self) -> ResourceSchema;
}

/// Main Provider trait
///
/// Each infrastructure provider implements this trait.
/// All operations are async and involve side effects.
pub trait Provider: Send + Sync {
    /// Name of this Provider (e.g., "aws")
    fn name(&self) -> &'static str;

    /// List of resource types this Provider can handle
    fn resource_types(&self) -> Vec<Box<dyn ResourceType>>;

    /// Get the current state of a resource
    ///
    /// Returns `State::not_found()` if no identifier is given or the resource
    /// no longer exists.
    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Create a resource
    ///
    /// Returns State with identifier set to the provider-side ID (e.g., an ARN)
    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>>;

    /// Update a resource in place
    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>>;

    /// Delete a resource
    ///
    /// Deleting a resource that is already gone succeeds.
    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>>;

    /// Read an existing, unmanaged resource so it can be tracked
    ///
    /// Fails if nothing exists under `identifier`.
    fn import(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<State>> {
        let read = self.read(id, Some(identifier));
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            let state = read.await?;
            if state.exists {
                Ok(state)
            } else {
                Err(
                    ProviderError::new(format!("Cannot import {}: no such resource", identifier))
                        .for_resource(id),
                )
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Knows a single resource, `arn:noop:existing`
    struct NoopProvider;

    impl Provider for NoopProvider {
        fn name(&self) -> &'static str {
            "noop"
        }

        fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
            vec![]
        }

        fn read(
            &self,
            id: &ResourceId,
            identifier: Option<&str>,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let state = match identifier {
                Some(arn @ "arn:noop:existing") => {
                    State::existing(id.clone(), HashMap::new()).with_identifier(arn)
                }
                _ => State::not_found(id.clone()),
            };
            Box::pin(async move { Ok(state) })
        }

        fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
            let id = resource.id.clone();
            let attrs = resource.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs).with_identifier("arn:noop")) })
        }

        fn update(
            &self,
            id: &ResourceId,
            _identifier: &str,
            _from: &State,
            to: &Resource,
        ) -> BoxFuture<'_, ProviderResult<State>> {
            let id = id.clone();
            let attrs = to.attributes.clone();
            Box::pin(async move { Ok(State::existing(id, attrs)) })
        }

        fn delete(&self, _id: &ResourceId, _identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
            Box::pin(async { Ok(()) })
        }
    }

    #[tokio::test]
    async fn create_then_read_without_identifier() {
        let provider = NoopProvider;
        let resource = Resource::new("test", "example");
        let state = provider.create(&resource).await.unwrap();
        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some("arn:noop"));

        let state = provider.read(&resource.id, None).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn import_requires_existing_resource() {
        let provider = NoopProvider;
        let id = ResourceId::new("imagebuilder.image", "web");

        let state = provider.import(&id, "arn:noop:existing").await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some("arn:noop:existing"));

        let err = provider.import(&id, "arn:noop:missing").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "[imagebuilder.image.web] Cannot import arn:noop:missing: no such resource"
        );
    }

    #[test]
    fn error_display_includes_resource() {
        let err = ProviderError::new("boom")
            .for_resource(ResourceId::new("imagebuilder.image", "web"));
        assert_eq!(err.to_string(), "[imagebuilder.image.web] boom");
    }
}
