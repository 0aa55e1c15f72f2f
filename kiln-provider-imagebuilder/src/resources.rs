//! Resource type definitions (implementing the ResourceType trait)

use kiln_core::provider::ResourceType;
use kiln_core::schema::ResourceSchema;

use crate::schemas::{container_recipe, image};

macro_rules! define_resource_type {
    ($name:ident, $module:ident) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $module::RESOURCE_TYPE
            }
            fn schema(&self) -> ResourceSchema {
                $module::schema()
            }
        }
    };
}

define_resource_type!(ImageType, image);
define_resource_type!(ContainerRecipeType, container_recipe);

/// Returns all resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![Box::new(ImageType), Box::new(ContainerRecipeType)]
}
