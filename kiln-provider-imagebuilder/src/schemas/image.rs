//! Image resource schema definition
//!
//! An image is built once by CreateImage; apart from tags nothing about it
//! can change without building a new one.

use kiln_core::resource::Value;
use kiln_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

use super::imagebuilder_arn;

pub const RESOURCE_TYPE: &str = "imagebuilder.image";

/// Default for `image_tests_configuration.timeout_minutes`
pub const DEFAULT_TEST_TIMEOUT_MINUTES: i64 = 720;

fn image_tests_configuration() -> AttributeType {
    AttributeType::single_block(vec![
        AttributeSchema::new("image_tests_enabled", AttributeType::Bool)
            .force_new()
            .with_default(Value::Bool(true))
            .with_description("Whether image tests run after the build. Default: true"),
        AttributeSchema::new("timeout_minutes", types::int_between(60, 1440))
            .force_new()
            .with_default(Value::Int(DEFAULT_TEST_TIMEOUT_MINUTES))
            .with_description("Minutes before image tests time out (60-1440). Default: 720"),
    ])
}

fn output_resources() -> AttributeType {
    let string = |name: &str| AttributeSchema::new(name, AttributeType::String).computed();
    AttributeType::block(vec![
        AttributeSchema::new(
            "amis",
            AttributeType::block(vec![
                string("account_id"),
                string("description"),
                string("image"),
                string("name"),
                string("region"),
            ]),
        )
        .computed(),
        AttributeSchema::new(
            "containers",
            AttributeType::block(vec![
                AttributeSchema::new(
                    "image_uris",
                    AttributeType::List(Box::new(AttributeType::String)),
                )
                .computed(),
                string("region"),
            ]),
        )
        .computed(),
    ])
}

/// Returns the schema for an Image Builder image
pub fn schema() -> ResourceSchema {
    ResourceSchema::new(RESOURCE_TYPE)
        .with_description("An EC2 Image Builder image built from an image or container recipe")
        .with_timeouts(&["create"])
        .attribute(
            AttributeSchema::new("container_recipe_arn", imagebuilder_arn("container-recipe", true))
                .force_new()
                .with_description("ARN of the container recipe to build"),
        )
        .attribute(
            AttributeSchema::new(
                "distribution_configuration_arn",
                imagebuilder_arn("distribution-configuration", false),
            )
            .force_new()
            .with_description("ARN of the distribution configuration"),
        )
        .attribute(
            AttributeSchema::new("enhanced_image_metadata_enabled", AttributeType::Bool)
                .force_new()
                .with_default(Value::Bool(true))
                .with_description("Collect additional information about the image. Default: true"),
        )
        .attribute(
            AttributeSchema::new("image_recipe_arn", imagebuilder_arn("image-recipe", true))
                .force_new()
                .with_description("ARN of the image recipe to build"),
        )
        .attribute(
            AttributeSchema::new("image_tests_configuration", image_tests_configuration())
                .optional_computed()
                .force_new()
                .with_description("Image test settings"),
        )
        .attribute(
            AttributeSchema::new(
                "infrastructure_configuration_arn",
                imagebuilder_arn("infrastructure-configuration", false),
            )
            .required()
            .force_new()
            .with_description("ARN of the infrastructure configuration"),
        )
        .attribute(
            AttributeSchema::new("tags", types::tags())
                .with_default(Value::Map(Default::default()))
                .with_description("Tags for the image. Example: { \"env\": \"prod\" }"),
        )
        .exactly_one_of(&["container_recipe_arn", "image_recipe_arn"])
        // ========== Read-only ==========
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(AttributeSchema::new("date_created", AttributeType::String).computed())
        .attribute(AttributeSchema::new("name", AttributeType::String).computed())
        .attribute(AttributeSchema::new("os_version", AttributeType::String).computed())
        .attribute(
            AttributeSchema::new("output_resources", output_resources())
                .computed()
                .with_description("AMIs and container images produced by the build"),
        )
        .attribute(AttributeSchema::new("platform", AttributeType::String).computed())
        .attribute(AttributeSchema::new("version", AttributeType::String).computed())
}
