//! Image Builder API over the AWS SDK

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_imagebuilder::Client;
use aws_sdk_imagebuilder::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_imagebuilder::types;

use crate::api::{
    Ami, ApiError, ContainerOutput, ContainerRecipeDetails, CreateContainerRecipeRequest,
    CreateImageRequest, ImageBuilderApi, ImageDetails, ImageStatus, ImageTestsConfiguration,
    OutputResources, TargetRepository,
};

/// `ImageBuilderApi` backed by `aws_sdk_imagebuilder::Client`
pub struct SdkImageBuilder {
    client: Client,
}

impl SdkImageBuilder {
    /// Create a client from the default credential chain
    ///
    /// `region` overrides the region from the environment/profile.
    pub async fn new(region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = loader.load().await;

        Self {
            client: Client::new(&config),
        }
    }
}

fn api_error<E, R>(err: SdkError<E, R>) -> ApiError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let code = err.code().map(str::to_string);
    let message = match err.message() {
        Some(message) => message.to_string(),
        None => DisplayErrorContext(&err).to_string(),
    };
    ApiError { code, message }
}

fn build_error(err: impl std::fmt::Display) -> ApiError {
    ApiError {
        code: None,
        message: format!("Failed to build request: {}", err),
    }
}

fn non_empty(tags: HashMap<String, String>) -> Option<HashMap<String, String>> {
    if tags.is_empty() { None } else { Some(tags) }
}

#[async_trait]
impl ImageBuilderApi for SdkImageBuilder {
    async fn create_image(&self, request: CreateImageRequest) -> Result<Option<String>, ApiError> {
        let tests = request.image_tests_configuration.map(|c| {
            types::ImageTestsConfiguration::builder()
                .set_image_tests_enabled(c.image_tests_enabled)
                .set_timeout_minutes(c.timeout_minutes)
                .build()
        });

        let output = self
            .client
            .create_image()
            .client_token(request.client_token)
            .set_container_recipe_arn(request.container_recipe_arn)
            .set_distribution_configuration_arn(request.distribution_configuration_arn)
            .set_enhanced_image_metadata_enabled(request.enhanced_image_metadata_enabled)
            .set_image_recipe_arn(request.image_recipe_arn)
            .set_image_tests_configuration(tests)
            .infrastructure_configuration_arn(request.infrastructure_configuration_arn)
            .set_tags(non_empty(request.tags))
            .send()
            .await
            .map_err(api_error)?;

        Ok(output.image_build_version_arn().map(str::to_string))
    }

    async fn get_image(&self, arn: &str) -> Result<Option<ImageDetails>, ApiError> {
        let output = self
            .client
            .get_image()
            .image_build_version_arn(arn)
            .send()
            .await
            .map_err(api_error)?;

        Ok(output.image().map(image_details))
    }

    async fn delete_image(&self, arn: &str) -> Result<(), ApiError> {
        self.client
            .delete_image()
            .image_build_version_arn(arn)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn create_container_recipe(
        &self,
        request: CreateContainerRecipeRequest,
    ) -> Result<Option<String>, ApiError> {
        let components = request
            .components
            .into_iter()
            .map(|arn| {
                types::ComponentConfiguration::builder()
                    .component_arn(arn)
                    .build()
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(build_error)?;

        let target_repository = types::TargetContainerRepository::builder()
            .repository_name(request.target_repository.repository_name)
            .service(types::ContainerRepositoryService::from(
                request.target_repository.service.as_str(),
            ))
            .build()
            .map_err(build_error)?;

        let output = self
            .client
            .create_container_recipe()
            .client_token(request.client_token)
            .set_components(Some(components))
            .container_type(types::ContainerType::from(request.container_type.as_str()))
            .set_description(request.description)
            .set_dockerfile_template_data(request.dockerfile_template_data)
            .set_dockerfile_template_uri(request.dockerfile_template_uri)
            .set_image_os_version_override(request.image_os_version_override)
            .set_kms_key_id(request.kms_key_id)
            .name(request.name)
            .parent_image(request.parent_image)
            .set_platform_override(request.platform_override.as_deref().map(types::Platform::from))
            .semantic_version(request.semantic_version)
            .set_tags(non_empty(request.tags))
            .target_repository(target_repository)
            .set_working_directory(request.working_directory)
            .send()
            .await
            .map_err(api_error)?;

        Ok(output.container_recipe_arn().map(str::to_string))
    }

    async fn get_container_recipe(
        &self,
        arn: &str,
    ) -> Result<Option<ContainerRecipeDetails>, ApiError> {
        let output = self
            .client
            .get_container_recipe()
            .container_recipe_arn(arn)
            .send()
            .await
            .map_err(api_error)?;

        Ok(output.container_recipe().map(container_recipe_details))
    }

    async fn delete_container_recipe(&self, arn: &str) -> Result<(), ApiError> {
        self.client
            .delete_container_recipe()
            .container_recipe_arn(arn)
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn tag_resource(
        &self,
        arn: &str,
        tags: HashMap<String, String>,
    ) -> Result<(), ApiError> {
        self.client
            .tag_resource()
            .resource_arn(arn)
            .set_tags(Some(tags))
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, tag_keys: Vec<String>) -> Result<(), ApiError> {
        self.client
            .untag_resource()
            .resource_arn(arn)
            .set_tag_keys(Some(tag_keys))
            .send()
            .await
            .map_err(api_error)?;
        Ok(())
    }
}

// =============================================================================
// SDK type conversion
// =============================================================================

fn owned(s: Option<&str>) -> Option<String> {
    s.map(str::to_string)
}

fn image_details(image: &types::Image) -> ImageDetails {
    ImageDetails {
        arn: owned(image.arn()),
        container_recipe_arn: owned(image.container_recipe().and_then(|r| r.arn())),
        date_created: owned(image.date_created()),
        distribution_configuration_arn: owned(
            image.distribution_configuration().and_then(|d| d.arn()),
        ),
        enhanced_image_metadata_enabled: image.enhanced_image_metadata_enabled(),
        image_recipe_arn: owned(image.image_recipe().and_then(|r| r.arn())),
        image_tests_configuration: image.image_tests_configuration().map(|c| {
            ImageTestsConfiguration {
                image_tests_enabled: c.image_tests_enabled(),
                timeout_minutes: c.timeout_minutes(),
            }
        }),
        infrastructure_configuration_arn: owned(
            image.infrastructure_configuration().and_then(|i| i.arn()),
        ),
        name: owned(image.name()),
        os_version: owned(image.os_version()),
        output_resources: image.output_resources().map(output_resources),
        platform: image.platform().map(|p| p.as_str().to_string()),
        state: image.state().and_then(|s| {
            s.status().map(|status| ImageStatus {
                status: status.as_str().to_string(),
                reason: owned(s.reason()),
            })
        }),
        tags: image.tags().cloned().unwrap_or_default(),
        version: owned(image.version()),
    }
}

fn output_resources(resources: &types::OutputResources) -> OutputResources {
    OutputResources {
        amis: resources
            .amis()
            .iter()
            .map(|ami| Ami {
                account_id: owned(ami.account_id()),
                description: owned(ami.description()),
                image: owned(ami.image()),
                name: owned(ami.name()),
                region: owned(ami.region()),
            })
            .collect(),
        containers: resources
            .containers()
            .iter()
            .map(|container| ContainerOutput {
                image_uris: container.image_uris().to_vec(),
                region: owned(container.region()),
            })
            .collect(),
    }
}

fn container_recipe_details(recipe: &types::ContainerRecipe) -> ContainerRecipeDetails {
    ContainerRecipeDetails {
        arn: owned(recipe.arn()),
        components: recipe
            .components()
            .iter()
            .map(|c| c.component_arn().to_string())
            .collect(),
        container_type: recipe.container_type().map(|t| t.as_str().to_string()),
        date_created: owned(recipe.date_created()),
        description: owned(recipe.description()),
        dockerfile_template_data: owned(recipe.dockerfile_template_data()),
        encrypted: recipe.encrypted(),
        kms_key_id: owned(recipe.kms_key_id()),
        name: owned(recipe.name()),
        owner: owned(recipe.owner()),
        parent_image: owned(recipe.parent_image()),
        platform: recipe.platform().map(|p| p.as_str().to_string()),
        tags: recipe.tags().cloned().unwrap_or_default(),
        target_repository: recipe.target_repository().map(|t| TargetRepository {
            repository_name: t.repository_name().to_string(),
            service: t.service().as_str().to_string(),
        }),
        version: owned(recipe.version()),
        working_directory: owned(recipe.working_directory()),
    }
}
