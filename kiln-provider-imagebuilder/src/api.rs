//! Image Builder API mediator
//!
//! The provider talks to Image Builder only through [`ImageBuilderApi`], using
//! the plain request/response types below. `SdkImageBuilder` implements it
//! over the AWS SDK; tests use an in-memory fake.

use std::collections::HashMap;

use async_trait::async_trait;

/// Error code returned for unknown ARNs
pub const RESOURCE_NOT_FOUND: &str = "ResourceNotFoundException";

/// Error returned by an Image Builder API call
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    /// Service error code (e.g., "ResourceNotFoundException")
    pub code: Option<String>,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(RESOURCE_NOT_FOUND, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.code.as_deref() == Some(RESOURCE_NOT_FOUND)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.code {
            Some(code) => write!(f, "{}: {}", code, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ApiError {}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageTestsConfiguration {
    pub image_tests_enabled: Option<bool>,
    pub timeout_minutes: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateImageRequest {
    /// Idempotency token
    pub client_token: String,
    pub container_recipe_arn: Option<String>,
    pub distribution_configuration_arn: Option<String>,
    pub enhanced_image_metadata_enabled: Option<bool>,
    pub image_recipe_arn: Option<String>,
    pub image_tests_configuration: Option<ImageTestsConfiguration>,
    pub infrastructure_configuration_arn: String,
    pub tags: HashMap<String, String>,
}

/// Build status of an image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStatus {
    /// e.g. "BUILDING", "AVAILABLE"
    pub status: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ami {
    pub account_id: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub name: Option<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerOutput {
    pub image_uris: Vec<String>,
    pub region: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutputResources {
    pub amis: Vec<Ami>,
    pub containers: Vec<ContainerOutput>,
}

/// An image as reported by GetImage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageDetails {
    pub arn: Option<String>,
    pub container_recipe_arn: Option<String>,
    pub date_created: Option<String>,
    pub distribution_configuration_arn: Option<String>,
    pub enhanced_image_metadata_enabled: Option<bool>,
    pub image_recipe_arn: Option<String>,
    pub image_tests_configuration: Option<ImageTestsConfiguration>,
    pub infrastructure_configuration_arn: Option<String>,
    pub name: Option<String>,
    pub os_version: Option<String>,
    pub output_resources: Option<OutputResources>,
    pub platform: Option<String>,
    pub state: Option<ImageStatus>,
    pub tags: HashMap<String, String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetRepository {
    pub repository_name: String,
    /// Only "ECR" today
    pub service: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateContainerRecipeRequest {
    pub client_token: String,
    /// Component ARNs in build order
    pub components: Vec<String>,
    pub container_type: String,
    pub description: Option<String>,
    pub dockerfile_template_data: Option<String>,
    pub dockerfile_template_uri: Option<String>,
    pub image_os_version_override: Option<String>,
    pub kms_key_id: Option<String>,
    pub name: String,
    pub parent_image: String,
    pub platform_override: Option<String>,
    pub semantic_version: String,
    pub tags: HashMap<String, String>,
    pub target_repository: TargetRepository,
    pub working_directory: Option<String>,
}

/// A container recipe as reported by GetContainerRecipe
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerRecipeDetails {
    pub arn: Option<String>,
    pub components: Vec<String>,
    pub container_type: Option<String>,
    pub date_created: Option<String>,
    pub description: Option<String>,
    pub dockerfile_template_data: Option<String>,
    pub encrypted: Option<bool>,
    pub kms_key_id: Option<String>,
    pub name: Option<String>,
    pub owner: Option<String>,
    pub parent_image: Option<String>,
    pub platform: Option<String>,
    pub tags: HashMap<String, String>,
    pub target_repository: Option<TargetRepository>,
    pub version: Option<String>,
    pub working_directory: Option<String>,
}

/// Image Builder operations used by the provider
///
/// Create calls return the new ARN, or `None` when the service answered
/// without one. Get calls return `None` for an empty response; unknown ARNs
/// are reported as an error for which [`ApiError::is_not_found`] holds.
#[async_trait]
pub trait ImageBuilderApi: Send + Sync {
    async fn create_image(&self, request: CreateImageRequest) -> Result<Option<String>, ApiError>;

    async fn get_image(&self, arn: &str) -> Result<Option<ImageDetails>, ApiError>;

    async fn delete_image(&self, arn: &str) -> Result<(), ApiError>;

    async fn create_container_recipe(
        &self,
        request: CreateContainerRecipeRequest,
    ) -> Result<Option<String>, ApiError>;

    async fn get_container_recipe(
        &self,
        arn: &str,
    ) -> Result<Option<ContainerRecipeDetails>, ApiError>;

    async fn delete_container_recipe(&self, arn: &str) -> Result<(), ApiError>;

    async fn tag_resource(&self, arn: &str, tags: HashMap<String, String>)
    -> Result<(), ApiError>;

    async fn untag_resource(&self, arn: &str, tag_keys: Vec<String>) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_detected_by_code() {
        assert!(ApiError::not_found("no such image").is_not_found());
        assert!(!ApiError::new("ThrottlingException", "slow down").is_not_found());
        assert!(
            !ApiError {
                code: None,
                message: "dispatch failure".to_string()
            }
            .is_not_found()
        );
    }

    #[test]
    fn display_includes_code() {
        let err = ApiError::new("InvalidParameterValueException", "bad version");
        assert_eq!(err.to_string(), "InvalidParameterValueException: bad version");
    }
}
