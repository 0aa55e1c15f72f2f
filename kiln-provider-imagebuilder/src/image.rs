//! `imagebuilder.image`: expand/flatten and CRUD over CreateImage/GetImage/DeleteImage

use std::collections::HashMap;

use kiln_core::provider::{ProviderError, ProviderResult};
use kiln_core::resource::{Resource, ResourceId, State, Value};
use kiln_core::tags::IgnoreTagsConfig;
use kiln_core::wait::WaitConfig;

use crate::api::{Ami, ContainerOutput, CreateImageRequest, ImageDetails, ImageTestsConfiguration, OutputResources};
use crate::provider::{ImageBuilderProvider, api_failure, required_string};
use crate::tags::{create_tags, flatten_tags};
use crate::utils::{
    client_token, first_block, get_bool, get_int, get_string, set_bool, set_string, single_block,
};
use crate::waiter::{DEFAULT_CREATE_TIMEOUT, image_status_available};

/// Build a CreateImage request from configured attributes
pub(crate) fn expand(resource: &Resource) -> ProviderResult<CreateImageRequest> {
    let attrs = &resource.attributes;

    Ok(CreateImageRequest {
        client_token: client_token(),
        container_recipe_arn: get_string(attrs, "container_recipe_arn"),
        distribution_configuration_arn: get_string(attrs, "distribution_configuration_arn"),
        enhanced_image_metadata_enabled: get_bool(attrs, "enhanced_image_metadata_enabled"),
        image_recipe_arn: get_string(attrs, "image_recipe_arn"),
        image_tests_configuration: first_block(attrs, "image_tests_configuration")
            .map(expand_image_tests_configuration),
        infrastructure_configuration_arn: required_string(
            resource,
            "infrastructure_configuration_arn",
        )?,
        tags: create_tags(attrs.get("tags")),
    })
}

fn expand_image_tests_configuration(block: &HashMap<String, Value>) -> ImageTestsConfiguration {
    ImageTestsConfiguration {
        image_tests_enabled: get_bool(block, "image_tests_enabled"),
        timeout_minutes: get_int(block, "timeout_minutes").and_then(|n| i32::try_from(n).ok()),
    }
}

/// Convert a GetImage result into state attributes
pub(crate) fn flatten(image: &ImageDetails, ignore: &IgnoreTagsConfig) -> HashMap<String, Value> {
    let mut attrs = HashMap::new();

    set_string(&mut attrs, "arn", image.arn.clone());
    set_string(&mut attrs, "container_recipe_arn", image.container_recipe_arn.clone());
    set_string(&mut attrs, "date_created", image.date_created.clone());
    set_string(
        &mut attrs,
        "distribution_configuration_arn",
        image.distribution_configuration_arn.clone(),
    );
    set_bool(
        &mut attrs,
        "enhanced_image_metadata_enabled",
        image.enhanced_image_metadata_enabled,
    );
    set_string(&mut attrs, "image_recipe_arn", image.image_recipe_arn.clone());
    if let Some(tests) = &image.image_tests_configuration {
        attrs.insert(
            "image_tests_configuration".to_string(),
            flatten_image_tests_configuration(tests),
        );
    }
    set_string(
        &mut attrs,
        "infrastructure_configuration_arn",
        image.infrastructure_configuration_arn.clone(),
    );
    set_string(&mut attrs, "name", image.name.clone());
    set_string(&mut attrs, "os_version", image.os_version.clone());
    if let Some(outputs) = &image.output_resources {
        attrs.insert("output_resources".to_string(), flatten_output_resources(outputs));
    }
    set_string(&mut attrs, "platform", image.platform.clone());
    attrs.insert("tags".to_string(), flatten_tags(&image.tags, ignore));
    set_string(&mut attrs, "version", image.version.clone());

    attrs
}

fn flatten_image_tests_configuration(tests: &ImageTestsConfiguration) -> Value {
    let mut fields = HashMap::new();
    set_bool(&mut fields, "image_tests_enabled", tests.image_tests_enabled);
    if let Some(minutes) = tests.timeout_minutes {
        fields.insert("timeout_minutes".to_string(), Value::Int(i64::from(minutes)));
    }
    single_block(fields)
}

fn flatten_output_resources(outputs: &OutputResources) -> Value {
    let mut fields = HashMap::new();
    if !outputs.amis.is_empty() {
        fields.insert(
            "amis".to_string(),
            Value::List(outputs.amis.iter().map(flatten_ami).collect()),
        );
    }
    if !outputs.containers.is_empty() {
        fields.insert(
            "containers".to_string(),
            Value::List(outputs.containers.iter().map(flatten_container).collect()),
        );
    }
    single_block(fields)
}

fn flatten_ami(ami: &Ami) -> Value {
    let mut fields = HashMap::new();
    set_string(&mut fields, "account_id", ami.account_id.clone());
    set_string(&mut fields, "description", ami.description.clone());
    set_string(&mut fields, "image", ami.image.clone());
    set_string(&mut fields, "name", ami.name.clone());
    set_string(&mut fields, "region", ami.region.clone());
    Value::Map(fields)
}

fn flatten_container(container: &ContainerOutput) -> Value {
    let mut fields = HashMap::new();
    fields.insert(
        "image_uris".to_string(),
        Value::List(
            container
                .image_uris
                .iter()
                .map(|uri| Value::String(uri.clone()))
                .collect(),
        ),
    );
    set_string(&mut fields, "region", container.region.clone());
    Value::Map(fields)
}

impl ImageBuilderProvider {
    /// Start an image build and wait until the image is AVAILABLE
    pub(crate) async fn create_image(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let request = expand(resource)?;

        let arn = self
            .api()
            .create_image(request)
            .await
            .map_err(|e| api_failure("Failed to create image", id, e))?
            .ok_or_else(|| {
                ProviderError::new("Failed to create image: empty response").for_resource(id.clone())
            })?;
        log::info!("{}: building image {}", id, arn);

        let timeout = resource.timeouts.create.unwrap_or(DEFAULT_CREATE_TIMEOUT);
        let config = WaitConfig::new(timeout, self.poll_interval());
        if let Err(e) = image_status_available(self.api(), &arn, config).await {
            log::warn!("{}: image {} did not become available, tainting it", id, arn);
            return Err(ProviderError::new(format!(
                "Failed waiting for image {} to become available: {}",
                arn, e
            ))
            .for_resource(id.clone())
            .with_identifier(arn.as_str())
            .with_cause(e));
        }

        self.read_image(id, &arn, true)
            .await
            .map_err(|e| e.with_identifier(arn.as_str()))
    }

    /// Read an image by build version ARN
    ///
    /// A missing image is reported as not found, except right after create
    /// (`new_resource`), where it is an error.
    pub(crate) async fn read_image(
        &self,
        id: &ResourceId,
        arn: &str,
        new_resource: bool,
    ) -> ProviderResult<State> {
        let image = match self.api().get_image(arn).await {
            Ok(image) => image,
            Err(e) if e.is_not_found() && !new_resource => {
                log::warn!("{}: image {} not found, removing from state", id, arn);
                return Ok(State::not_found(id.clone()));
            }
            Err(e) => return Err(api_failure(&format!("Failed to get image {}", arn), id, e)),
        };

        let image = image.ok_or_else(|| {
            ProviderError::new(format!("Failed to get image {}: empty response", arn))
                .for_resource(id.clone())
        })?;

        let attributes = flatten(&image, self.ignore_tags());
        Ok(State::existing(id.clone(), attributes).with_identifier(arn))
    }
}
