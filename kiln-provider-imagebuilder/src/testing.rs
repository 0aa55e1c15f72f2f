//! In-memory Image Builder used by the provider tests

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{
    ApiError, ContainerOutput, ContainerRecipeDetails, CreateContainerRecipeRequest,
    CreateImageRequest, ImageBuilderApi, ImageDetails, ImageStatus, ImageTestsConfiguration,
    OutputResources,
};

const ACCOUNT: &str = "123456789012";
const REGION: &str = "us-east-1";

#[derive(Default)]
struct Inner {
    images: HashMap<String, ImageDetails>,
    recipes: HashMap<String, ContainerRecipeDetails>,
    /// Statuses reported by successive GetImage calls, per ARN
    status_queue: HashMap<String, VecDeque<String>>,
    /// Statuses a newly created image goes through; empty means AVAILABLE at once
    create_statuses: Vec<String>,
    next_get_error: Option<ApiError>,
    empty_create_response: bool,
    image_requests: Vec<CreateImageRequest>,
    recipe_requests: Vec<CreateContainerRecipeRequest>,
    calls: Vec<String>,
    counter: usize,
}

#[derive(Default)]
pub struct FakeImageBuilder {
    inner: Mutex<Inner>,
}

impl FakeImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an image, returning its ARN
    pub fn insert_image(&self, mut image: ImageDetails) -> String {
        let mut inner = self.inner.lock().unwrap();
        inner.counter += 1;
        let arn = image.arn.clone().unwrap_or_else(|| {
            format!(
                "arn:aws:imagebuilder:{}:{}:image/inserted-{}/1.0.0/1",
                REGION, ACCOUNT, inner.counter
            )
        });
        image.arn = Some(arn.clone());
        inner.images.insert(arn.clone(), image);
        arn
    }

    /// Store a container recipe, returning its ARN
    pub fn insert_recipe(&self, mut recipe: ContainerRecipeDetails) -> String {
        let mut inner = self.inner.lock().unwrap();
        inner.counter += 1;
        let arn = recipe.arn.clone().unwrap_or_else(|| {
            format!(
                "arn:aws:imagebuilder:{}:{}:container-recipe/inserted-{}/1.0.0",
                REGION, ACCOUNT, inner.counter
            )
        });
        recipe.arn = Some(arn.clone());
        inner.recipes.insert(arn.clone(), recipe);
        arn
    }

    pub fn queue_statuses(&self, arn: &str, statuses: &[&str]) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .status_queue
            .entry(arn.to_string())
            .or_default()
            .extend(statuses.iter().map(|s| s.to_string()));
    }

    pub fn set_reason(&self, arn: &str, reason: &str) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(state) = inner
            .images
            .get_mut(arn)
            .and_then(|image| image.state.as_mut())
        {
            state.reason = Some(reason.to_string());
        }
    }

    pub fn set_create_statuses(&self, statuses: &[&str]) {
        self.inner.lock().unwrap().create_statuses =
            statuses.iter().map(|s| s.to_string()).collect();
    }

    pub fn fail_next_get(&self, error: ApiError) {
        self.inner.lock().unwrap().next_get_error = Some(error);
    }

    pub fn respond_empty_to_create(&self) {
        self.inner.lock().unwrap().empty_create_response = true;
    }

    pub fn image(&self, arn: &str) -> Option<ImageDetails> {
        self.inner.lock().unwrap().images.get(arn).cloned()
    }

    pub fn recipe(&self, arn: &str) -> Option<ContainerRecipeDetails> {
        self.inner.lock().unwrap().recipes.get(arn).cloned()
    }

    pub fn image_requests(&self) -> Vec<CreateImageRequest> {
        self.inner.lock().unwrap().image_requests.clone()
    }

    pub fn recipe_requests(&self) -> Vec<CreateContainerRecipeRequest> {
        self.inner.lock().unwrap().recipe_requests.clone()
    }

    /// Operation names in call order (e.g., "GetImage", "UntagResource env")
    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    fn tags_mut<'a>(
        inner: &'a mut Inner,
        arn: &str,
    ) -> Result<&'a mut HashMap<String, String>, ApiError> {
        if let Some(image) = inner.images.get_mut(arn) {
            return Ok(&mut image.tags);
        }
        if let Some(recipe) = inner.recipes.get_mut(arn) {
            return Ok(&mut recipe.tags);
        }
        Err(ApiError::not_found(format!("{} not found", arn)))
    }
}

#[async_trait]
impl ImageBuilderApi for FakeImageBuilder {
    async fn create_image(&self, request: CreateImageRequest) -> Result<Option<String>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("CreateImage".to_string());
        inner.image_requests.push(request.clone());
        if inner.empty_create_response {
            return Ok(None);
        }

        inner.counter += 1;
        let name = format!("image-{}", inner.counter);
        let arn = format!(
            "arn:aws:imagebuilder:{}:{}:image/{}/1.0.0/1",
            REGION, ACCOUNT, name
        );

        let mut statuses: VecDeque<String> = inner.create_statuses.iter().cloned().collect();
        let initial = statuses
            .pop_front()
            .unwrap_or_else(|| "AVAILABLE".to_string());
        inner.status_queue.insert(arn.clone(), statuses);

        let output_resources = if request.container_recipe_arn.is_some() {
            OutputResources {
                amis: vec![],
                containers: vec![ContainerOutput {
                    image_uris: vec![format!(
                        "{}.dkr.ecr.{}.amazonaws.com/app:1.0.0-1",
                        ACCOUNT, REGION
                    )],
                    region: Some(REGION.to_string()),
                }],
            }
        } else {
            OutputResources {
                amis: vec![crate::api::Ami {
                    account_id: Some(ACCOUNT.to_string()),
                    description: None,
                    image: Some("ami-0123456789abcdef0".to_string()),
                    name: Some(name.clone()),
                    region: Some(REGION.to_string()),
                }],
                containers: vec![],
            }
        };

        let tests = request.image_tests_configuration.clone().unwrap_or_default();
        let image = ImageDetails {
            arn: Some(arn.clone()),
            container_recipe_arn: request.container_recipe_arn,
            date_created: Some("2024-01-01T00:00:00.000Z".to_string()),
            distribution_configuration_arn: request.distribution_configuration_arn,
            enhanced_image_metadata_enabled: Some(
                request.enhanced_image_metadata_enabled.unwrap_or(true),
            ),
            image_recipe_arn: request.image_recipe_arn,
            image_tests_configuration: Some(ImageTestsConfiguration {
                image_tests_enabled: Some(tests.image_tests_enabled.unwrap_or(true)),
                timeout_minutes: Some(tests.timeout_minutes.unwrap_or(720)),
            }),
            infrastructure_configuration_arn: Some(request.infrastructure_configuration_arn),
            name: Some(name),
            os_version: Some("Amazon Linux 2".to_string()),
            output_resources: Some(output_resources),
            platform: Some("Linux".to_string()),
            state: Some(ImageStatus {
                status: initial,
                reason: None,
            }),
            tags: request.tags,
            version: Some("1.0.0/1".to_string()),
        };
        inner.images.insert(arn.clone(), image);

        Ok(Some(arn))
    }

    async fn get_image(&self, arn: &str) -> Result<Option<ImageDetails>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("GetImage".to_string());
        if let Some(err) = inner.next_get_error.take() {
            return Err(err);
        }

        let next = inner
            .status_queue
            .get_mut(arn)
            .and_then(|queue| queue.pop_front());
        let image = inner
            .images
            .get_mut(arn)
            .ok_or_else(|| ApiError::not_found(format!("Image {} not found", arn)))?;
        if let Some(status) = next {
            let reason = image.state.as_ref().and_then(|s| s.reason.clone());
            image.state = Some(ImageStatus { status, reason });
        }
        Ok(Some(image.clone()))
    }

    async fn delete_image(&self, arn: &str) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("DeleteImage".to_string());
        inner
            .images
            .remove(arn)
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found(format!("Image {} not found", arn)))
    }

    async fn create_container_recipe(
        &self,
        request: CreateContainerRecipeRequest,
    ) -> Result<Option<String>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("CreateContainerRecipe".to_string());
        inner.recipe_requests.push(request.clone());
        if inner.empty_create_response {
            return Ok(None);
        }

        let arn = format!(
            "arn:aws:imagebuilder:{}:{}:container-recipe/{}/{}",
            REGION, ACCOUNT, request.name, request.semantic_version
        );
        if inner.recipes.contains_key(&arn) {
            return Err(ApiError::new(
                "ResourceAlreadyExistsException",
                format!("{} already exists", arn),
            ));
        }

        // The service stores the template fetched from the URI
        let template = request.dockerfile_template_data.or_else(|| {
            request
                .dockerfile_template_uri
                .as_ref()
                .map(|uri| format!("# fetched from {}", uri))
        });

        let recipe = ContainerRecipeDetails {
            arn: Some(arn.clone()),
            components: request.components,
            container_type: Some(request.container_type),
            date_created: Some("2024-01-01T00:00:00.000Z".to_string()),
            description: request.description,
            dockerfile_template_data: template,
            encrypted: Some(true),
            kms_key_id: request.kms_key_id,
            name: Some(request.name),
            owner: Some(ACCOUNT.to_string()),
            parent_image: Some(request.parent_image),
            platform: Some(
                request
                    .platform_override
                    .unwrap_or_else(|| "Linux".to_string()),
            ),
            tags: request.tags,
            target_repository: Some(request.target_repository),
            version: Some(request.semantic_version),
            working_directory: request.working_directory,
        };
        inner.recipes.insert(arn.clone(), recipe);

        Ok(Some(arn))
    }

    async fn get_container_recipe(
        &self,
        arn: &str,
    ) -> Result<Option<ContainerRecipeDetails>, ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("GetContainerRecipe".to_string());
        if let Some(err) = inner.next_get_error.take() {
            return Err(err);
        }
        inner
            .recipes
            .get(arn)
            .cloned()
            .map(Some)
            .ok_or_else(|| ApiError::not_found(format!("Container recipe {} not found", arn)))
    }

    async fn delete_container_recipe(&self, arn: &str) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("DeleteContainerRecipe".to_string());
        inner
            .recipes
            .remove(arn)
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found(format!("Container recipe {} not found", arn)))
    }

    async fn tag_resource(
        &self,
        arn: &str,
        tags: HashMap<String, String>,
    ) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        let mut keys: Vec<&String> = tags.keys().collect();
        keys.sort();
        let call = format!(
            "TagResource {}",
            keys.iter().map(|k| k.as_str()).collect::<Vec<_>>().join(",")
        );
        inner.calls.push(call);
        Self::tags_mut(&mut inner, arn)?.extend(tags);
        Ok(())
    }

    async fn untag_resource(&self, arn: &str, tag_keys: Vec<String>) -> Result<(), ApiError> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .calls
            .push(format!("UntagResource {}", tag_keys.join(",")));
        let tags = Self::tags_mut(&mut inner, arn)?;
        for key in &tag_keys {
            tags.remove(key);
        }
        Ok(())
    }
}
