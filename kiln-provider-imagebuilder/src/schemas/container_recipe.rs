//! Container recipe resource schema definition

use kiln_core::resource::Value;
use kiln_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};

pub const RESOURCE_TYPE: &str = "imagebuilder.container_recipe";

fn component() -> AttributeType {
    AttributeType::block(vec![
        AttributeSchema::new("component_arn", types::arn())
            .required()
            .with_description("ARN of a build or test component"),
    ])
    .with_min_items(1)
}

fn target_repository() -> AttributeType {
    AttributeType::single_block(vec![
        AttributeSchema::new("repository_name", types::string_len_between(1, 1024))
            .required()
            .with_description("Name of the container repository"),
        AttributeSchema::new("service", AttributeType::Enum(vec!["ECR".to_string()]))
            .required()
            .with_description("Service hosting the repository. Values: ECR"),
    ])
    .with_min_items(1)
}

/// Returns the schema for an Image Builder container recipe
///
/// Container recipes are immutable; every attribute except `tags` forces a
/// new recipe.
pub fn schema() -> ResourceSchema {
    ResourceSchema::new(RESOURCE_TYPE)
        .with_description("An EC2 Image Builder recipe for Docker container images")
        .attribute(
            AttributeSchema::new("component", component())
                .required()
                .force_new()
                .with_description("Components applied in order"),
        )
        .attribute(
            AttributeSchema::new("container_type", AttributeType::Enum(vec!["DOCKER".to_string()]))
                .required()
                .force_new()
                .with_description("Type of container to create. Values: DOCKER"),
        )
        .attribute(
            AttributeSchema::new("description", types::string_len_between(1, 1024))
                .force_new()
                .with_description("Description of the recipe"),
        )
        .attribute(
            AttributeSchema::new("dockerfile_template_data", types::string_len_between(1, 16000))
                .optional_computed()
                .force_new()
                .with_description("Dockerfile template used to build the image"),
        )
        .attribute(
            AttributeSchema::new("dockerfile_template_uri", AttributeType::String)
                .force_new()
                .with_description("S3 URI of the Dockerfile template"),
        )
        .exactly_one_of(&["dockerfile_template_data", "dockerfile_template_uri"])
        .attribute(
            AttributeSchema::new("image_os_version_override", types::string_len_between(1, 1024))
                .force_new()
                .with_description("OS version of the parent image, when Image Builder cannot detect it"),
        )
        .attribute(
            AttributeSchema::new("kms_key_id", types::arn())
                .force_new()
                .with_description("KMS key used to encrypt the recipe"),
        )
        .attribute(
            AttributeSchema::new("name", types::string_len_between(1, 126))
                .required()
                .force_new(),
        )
        .attribute(
            AttributeSchema::new("parent_image", types::string_len_between(1, 126))
                .required()
                .force_new()
                .with_description("Base image for the container"),
        )
        .attribute(
            AttributeSchema::new(
                "platform_override",
                AttributeType::Enum(vec!["Windows".to_string(), "Linux".to_string()]),
            )
            .force_new()
            .with_description("OS platform of the parent image. Values: Windows, Linux"),
        )
        .attribute(
            AttributeSchema::new("semantic_version", types::string_len_between(1, 128))
                .required()
                .force_new()
                .with_description("Version of the recipe, <major>.<minor>.<patch>"),
        )
        .attribute(
            AttributeSchema::new("tags", types::tags())
                .with_default(Value::Map(Default::default()))
                .with_description("Tags for the recipe. Example: { \"env\": \"prod\" }"),
        )
        .attribute(
            AttributeSchema::new("target_repository", target_repository())
                .required()
                .force_new()
                .with_description("Repository the built image is pushed to"),
        )
        .attribute(
            AttributeSchema::new("working_directory", types::string_len_between(1, 1024))
                .force_new()
                .with_description("Working directory used during build and test"),
        )
        // ========== Read-only ==========
        .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
        .attribute(AttributeSchema::new("date_created", AttributeType::String).computed())
        .attribute(AttributeSchema::new("encrypted", AttributeType::Bool).computed())
        .attribute(AttributeSchema::new("owner", AttributeType::String).computed())
        .attribute(AttributeSchema::new("platform", AttributeType::String).computed())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_core::schema::TypeError;
    use std::collections::HashMap;

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    fn block(fields: Vec<(&str, &str)>) -> Value {
        Value::Map(
            fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), s(v)))
                .collect(),
        )
    }

    fn valid_attributes() -> HashMap<String, Value> {
        HashMap::from([
            (
                "component".to_string(),
                Value::List(vec![block(vec![(
                    "component_arn",
                    "arn:aws:imagebuilder:us-east-1:aws:component/update-linux/1.0.2",
                )])]),
            ),
            ("container_type".to_string(), s("DOCKER")),
            ("dockerfile_template_data".to_string(), s("FROM {{{ imagebuilder:parentImage }}}")),
            ("name".to_string(), s("app")),
            ("parent_image".to_string(), s("amazonlinux:latest")),
            ("semantic_version".to_string(), s("1.0.0")),
            (
                "target_repository".to_string(),
                Value::List(vec![block(vec![
                    ("repository_name", "app"),
                    ("service", "ECR"),
                ])]),
            ),
        ])
    }

    #[test]
    fn valid_recipe() {
        assert!(schema().validate(&valid_attributes()).is_ok());
    }

    #[test]
    fn requires_a_component() {
        let mut attrs = valid_attributes();
        attrs.insert("component".to_string(), Value::List(vec![]));
        let errors = schema().validate(&attrs).unwrap_err();
        assert!(matches!(&errors[0], TypeError::AttributeError { name, .. } if name == "component"));
    }

    #[test]
    fn rejects_unknown_container_type() {
        let mut attrs = valid_attributes();
        attrs.insert("container_type".to_string(), s("PODMAN"));
        assert!(schema().validate(&attrs).is_err());
    }

    #[test]
    fn dockerfile_source_is_exclusive() {
        let mut attrs = valid_attributes();
        attrs.insert(
            "dockerfile_template_uri".to_string(),
            s("s3://bucket/Dockerfile"),
        );
        let errors = schema().validate(&attrs).unwrap_err();
        assert!(matches!(&errors[0], TypeError::ExactlyOneOf { found: 2, .. }));
    }

    #[test]
    fn target_repository_is_single_and_required() {
        let mut attrs = valid_attributes();
        let repo = block(vec![("repository_name", "app"), ("service", "ECR")]);
        attrs.insert(
            "target_repository".to_string(),
            Value::List(vec![repo.clone(), repo]),
        );
        assert!(schema().validate(&attrs).is_err());

        attrs.remove("target_repository");
        let errors = schema().validate(&attrs).unwrap_err();
        assert!(
            matches!(&errors[0], TypeError::MissingRequired { name } if name == "target_repository")
        );
    }

    #[test]
    fn rejects_bad_platform_override() {
        let mut attrs = valid_attributes();
        attrs.insert("platform_override".to_string(), s("macOS"));
        assert!(schema().validate(&attrs).is_err());
        attrs.insert("platform_override".to_string(), s("Linux"));
        assert!(schema().validate(&attrs).is_ok());
    }

    #[test]
    fn description_forces_replacement() {
        assert!(schema().is_force_new("description"));
        assert!(!schema().is_force_new("tags"));
    }
}
