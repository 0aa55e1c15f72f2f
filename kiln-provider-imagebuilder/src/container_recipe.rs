//! `imagebuilder.container_recipe`: expand/flatten and CRUD over
//! CreateContainerRecipe/GetContainerRecipe/DeleteContainerRecipe

use std::collections::HashMap;

use kiln_core::provider::{ProviderError, ProviderResult};
use kiln_core::resource::{Resource, ResourceId, State, Value};
use kiln_core::tags::IgnoreTagsConfig;

use crate::api::{ContainerRecipeDetails, CreateContainerRecipeRequest, TargetRepository};
use crate::provider::{ImageBuilderProvider, api_failure, required_string};
use crate::tags::{create_tags, flatten_tags};
use crate::utils::{block_items, client_token, first_block, get_string, set_bool, set_string, single_block};

/// Build a CreateContainerRecipe request from configured attributes
pub(crate) fn expand(resource: &Resource) -> ProviderResult<CreateContainerRecipeRequest> {
    let attrs = &resource.attributes;

    let components: Vec<String> = block_items(attrs, "component")
        .into_iter()
        .filter_map(|block| get_string(block, "component_arn"))
        .collect();
    if components.is_empty() {
        return Err(
            ProviderError::new("At least one component is required").for_resource(resource.id.clone())
        );
    }

    let target_repository = first_block(attrs, "target_repository")
        .map(expand_target_repository)
        .ok_or_else(|| {
            ProviderError::new("Required attribute 'target_repository' is missing")
                .for_resource(resource.id.clone())
        })?;

    Ok(CreateContainerRecipeRequest {
        client_token: client_token(),
        components,
        container_type: required_string(resource, "container_type")?,
        description: get_string(attrs, "description"),
        dockerfile_template_data: get_string(attrs, "dockerfile_template_data"),
        dockerfile_template_uri: get_string(attrs, "dockerfile_template_uri"),
        image_os_version_override: get_string(attrs, "image_os_version_override"),
        kms_key_id: get_string(attrs, "kms_key_id"),
        name: required_string(resource, "name")?,
        parent_image: required_string(resource, "parent_image")?,
        platform_override: get_string(attrs, "platform_override"),
        semantic_version: required_string(resource, "semantic_version")?,
        tags: create_tags(attrs.get("tags")),
        target_repository,
        working_directory: get_string(attrs, "working_directory"),
    })
}

fn expand_target_repository(block: &HashMap<String, Value>) -> TargetRepository {
    TargetRepository {
        repository_name: get_string(block, "repository_name").unwrap_or_default(),
        service: get_string(block, "service").unwrap_or_default(),
    }
}

/// Convert a GetContainerRecipe result into state attributes
///
/// The URI, OS version override and platform override are inputs only and
/// never come back from the service.
pub(crate) fn flatten(
    recipe: &ContainerRecipeDetails,
    ignore: &IgnoreTagsConfig,
) -> HashMap<String, Value> {
    let mut attrs = HashMap::new();

    set_string(&mut attrs, "arn", recipe.arn.clone());
    attrs.insert(
        "component".to_string(),
        Value::List(
            recipe
                .components
                .iter()
                .map(|arn| {
                    Value::Map(HashMap::from([(
                        "component_arn".to_string(),
                        Value::String(arn.clone()),
                    )]))
                })
                .collect(),
        ),
    );
    set_string(&mut attrs, "container_type", recipe.container_type.clone());
    set_string(&mut attrs, "date_created", recipe.date_created.clone());
    set_string(&mut attrs, "description", recipe.description.clone());
    set_string(
        &mut attrs,
        "dockerfile_template_data",
        recipe.dockerfile_template_data.clone(),
    );
    set_bool(&mut attrs, "encrypted", recipe.encrypted);
    set_string(&mut attrs, "kms_key_id", recipe.kms_key_id.clone());
    set_string(&mut attrs, "name", recipe.name.clone());
    set_string(&mut attrs, "owner", recipe.owner.clone());
    set_string(&mut attrs, "parent_image", recipe.parent_image.clone());
    set_string(&mut attrs, "platform", recipe.platform.clone());
    set_string(&mut attrs, "semantic_version", recipe.version.clone());
    attrs.insert("tags".to_string(), flatten_tags(&recipe.tags, ignore));
    if let Some(repo) = &recipe.target_repository {
        attrs.insert(
            "target_repository".to_string(),
            single_block(HashMap::from([
                (
                    "repository_name".to_string(),
                    Value::String(repo.repository_name.clone()),
                ),
                ("service".to_string(), Value::String(repo.service.clone())),
            ])),
        );
    }
    set_string(&mut attrs, "working_directory", recipe.working_directory.clone());

    attrs
}

impl ImageBuilderProvider {
    pub(crate) async fn create_container_recipe(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let request = expand(resource)?;

        let arn = self
            .api()
            .create_container_recipe(request)
            .await
            .map_err(|e| api_failure("Failed to create container recipe", id, e))?
            .ok_or_else(|| {
                ProviderError::new("Failed to create container recipe: empty response")
                    .for_resource(id.clone())
            })?;
        log::info!("{}: created container recipe {}", id, arn);

        self.read_container_recipe(id, &arn, true)
            .await
            .map_err(|e| e.with_identifier(arn.as_str()))
    }

    /// Read a container recipe by ARN
    ///
    /// A missing recipe is reported as not found, except right after create
    /// (`new_resource`), where it is an error.
    pub(crate) async fn read_container_recipe(
        &self,
        id: &ResourceId,
        arn: &str,
        new_resource: bool,
    ) -> ProviderResult<State> {
        let recipe = match self.api().get_container_recipe(arn).await {
            Ok(recipe) => recipe,
            Err(e) if e.is_not_found() && !new_resource => {
                log::warn!("{}: container recipe {} not found, removing from state", id, arn);
                return Ok(State::not_found(id.clone()));
            }
            Err(e) => {
                return Err(api_failure(
                    &format!("Failed to get container recipe {}", arn),
                    id,
                    e,
                ));
            }
        };

        let recipe = recipe.ok_or_else(|| {
            ProviderError::new(format!("Failed to get container recipe {}: empty response", arn))
                .for_resource(id.clone())
        })?;

        let attributes = flatten(&recipe, self.ignore_tags());
        Ok(State::existing(id.clone(), attributes).with_identifier(arn))
    }
}
