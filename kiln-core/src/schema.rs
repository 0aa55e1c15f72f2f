//! Schema - Define type schemas for resources
//!
//! Providers define schemas for each resource type, enabling validation
//! before any API call is made and telling the differ which attributes
//! force replacement.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::resource::{Timeouts, Value};

/// Validation function attached to a custom type
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Attribute type
#[derive(Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (base type plus validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: Validator,
    },
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Nested configuration block, represented as a list of maps
    Block {
        attributes: Vec<AttributeSchema>,
        min_items: usize,
        max_items: Option<usize>,
    },
}

impl AttributeType {
    /// Nested block with the given attributes and no item limits
    pub fn block(attributes: Vec<AttributeSchema>) -> Self {
        AttributeType::Block {
            attributes,
            min_items: 0,
            max_items: None,
        }
    }

    /// Nested block that may appear at most once
    pub fn single_block(attributes: Vec<AttributeSchema>) -> Self {
        AttributeType::Block {
            attributes,
            min_items: 0,
            max_items: Some(1),
        }
    }

    /// Set the minimum item count of a block (no-op for other types)
    pub fn with_min_items(self, min: usize) -> Self {
        match self {
            AttributeType::Block {
                attributes,
                max_items,
                ..
            } => AttributeType::Block {
                attributes,
                min_items: min,
                max_items,
            },
            other => other,
        }
    }

    /// Whether a reference (resolved to a string at apply time) fits this type
    fn accepts_ref(&self) -> bool {
        match self {
            AttributeType::String | AttributeType::Enum(_) => true,
            AttributeType::Custom { base, .. } => base.accepts_ref(),
            _ => false,
        }
    }

    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        if matches!(value, Value::ResourceRef(_, _)) && self.accepts_ref() {
            return Ok(());
        }

        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { base, validate, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|message| TypeError::ValidationFailed { message })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (
                AttributeType::Block {
                    attributes,
                    min_items,
                    max_items,
                },
                Value::List(items),
            ) => {
                if items.len() < *min_items {
                    return Err(TypeError::TooFewItems {
                        min: *min_items,
                        got: items.len(),
                    });
                }
                if let Some(max) = max_items
                    && items.len() > *max
                {
                    return Err(TypeError::TooManyItems {
                        max: *max,
                        got: items.len(),
                    });
                }
                let schemas: Vec<&AttributeSchema> = attributes.iter().collect();
                for (index, item) in items.iter().enumerate() {
                    let Value::Map(fields) = item else {
                        return Err(TypeError::BlockItemError {
                            index,
                            errors: vec![TypeError::TypeMismatch {
                                expected: "Block".to_string(),
                                got: item.type_name(),
                            }],
                        });
                    };
                    let errors = validate_attributes(&schemas, fields);
                    if !errors.is_empty() {
                        return Err(TypeError::BlockItemError { index, errors });
                    }
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Block { .. } => "Block".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

impl fmt::Debug for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeType::Block {
                attributes,
                min_items,
                max_items,
            } => f
                .debug_struct("Block")
                .field("attributes", attributes)
                .field("min_items", min_items)
                .field("max_items", max_items)
                .finish(),
            other => write!(f, "{}", other.type_name()),
        }
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed and cannot be set")]
    ComputedAttribute { name: String },

    #[error("Timeout '{operation}' is not supported by this resource type")]
    UnsupportedTimeout { operation: String },

    #[error("Exactly one of {} must be set, found {found}", names.join(", "))]
    ExactlyOneOf { names: Vec<String>, found: usize },

    #[error("Attribute '{name}': {inner}")]
    AttributeError { name: String, inner: Box<TypeError> },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },

    #[error("Expected at least {min} block(s), got {got}")]
    TooFewItems { min: usize, got: usize },

    #[error("Expected at most {max} block(s), got {got}")]
    TooManyItems { max: usize, got: usize },

    #[error("Block at index {index}: {}", errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    BlockItemError { index: usize, errors: Vec<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
            Value::ResourceRef(binding, attr) => format!("ResourceRef({}.{})", binding, attr),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Value may be set by the provider
    pub computed: bool,
    /// Value may be set by the user (false only for computed-only attributes)
    pub optional: bool,
    /// Changing the value requires replacing the resource
    pub force_new: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            optional: true,
            force_new: false,
            default: None,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.optional = false;
        self
    }

    /// Read-only attribute reported by the provider
    pub fn computed(mut self) -> Self {
        self.computed = true;
        self.optional = false;
        self
    }

    /// Attribute the user may set, or the provider fills in when absent
    pub fn optional_computed(mut self) -> Self {
        self.computed = true;
        self.optional = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// True if users may not set this attribute
    pub fn is_computed_only(&self) -> bool {
        self.computed && !self.optional && !self.required
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
    /// Groups of attributes of which exactly one must be set
    pub exactly_one_of: Vec<Vec<String>>,
    /// Operations whose timeout can be configured (e.g., "create")
    pub timeouts: Vec<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
            exactly_one_of: Vec::new(),
            timeouts: Vec::new(),
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn exactly_one_of(mut self, names: &[&str]) -> Self {
        self.exactly_one_of
            .push(names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn with_timeouts(mut self, operations: &[&str]) -> Self {
        self.timeouts = operations.iter().map(|o| o.to_string()).collect();
        self
    }

    /// Reject timeouts for operations this resource type does not wait on
    pub fn validate_timeouts(&self, timeouts: &Timeouts) -> Result<(), Vec<TypeError>> {
        let errors: Vec<TypeError> = [
            ("create", timeouts.create),
            ("update", timeouts.update),
            ("delete", timeouts.delete),
        ]
        .into_iter()
        .filter(|(operation, value)| value.is_some() && !self.timeouts.iter().any(|t| t == operation))
        .map(|(operation, _)| TypeError::UnsupportedTimeout {
            operation: operation.to_string(),
        })
        .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Whether changing `name` requires replacement
    pub fn is_force_new(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.force_new)
    }

    /// Validate resource attributes
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let schemas: Vec<&AttributeSchema> = self.attributes.values().collect();
        let mut errors = validate_attributes(&schemas, attributes);

        for group in &self.exactly_one_of {
            let found = group
                .iter()
                .filter(|name| attributes.contains_key(name.as_str()))
                .count();
            if found != 1 {
                errors.push(TypeError::ExactlyOneOf {
                    names: group.clone(),
                    found,
                });
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Fill in defaults for unset attributes, including inside configured blocks
    pub fn apply_defaults(&self, attributes: &mut HashMap<String, Value>) {
        let schemas: Vec<&AttributeSchema> = self.attributes.values().collect();
        apply_defaults(&schemas, attributes);
    }
}

fn validate_attributes(
    schemas: &[&AttributeSchema],
    attributes: &HashMap<String, Value>,
) -> Vec<TypeError> {
    let mut errors = Vec::new();

    for schema in schemas {
        if schema.required
            && !attributes.contains_key(&schema.name)
            && schema.default.is_none()
        {
            errors.push(TypeError::MissingRequired {
                name: schema.name.clone(),
            });
        }
    }

    let mut names: Vec<&String> = attributes.keys().collect();
    names.sort();
    for name in names {
        let value = &attributes[name];
        match schemas.iter().find(|s| &s.name == name) {
            None => errors.push(TypeError::UnknownAttribute { name: name.clone() }),
            Some(schema) if schema.is_computed_only() => {
                errors.push(TypeError::ComputedAttribute { name: name.clone() })
            }
            Some(schema) => {
                if let Err(e) = schema.attr_type.validate(value) {
                    errors.push(TypeError::AttributeError {
                        name: name.clone(),
                        inner: Box::new(e),
                    });
                }
            }
        }
    }

    errors
}

fn apply_defaults(schemas: &[&AttributeSchema], attributes: &mut HashMap<String, Value>) {
    for schema in schemas {
        if let Some(default) = &schema.default
            && !attributes.contains_key(&schema.name)
        {
            attributes.insert(schema.name.clone(), default.clone());
        }

        if let AttributeType::Block {
            attributes: nested, ..
        } = &schema.attr_type
            && let Some(Value::List(items)) = attributes.get_mut(&schema.name)
        {
            let nested: Vec<&AttributeSchema> = nested.iter().collect();
            for item in items.iter_mut() {
                if let Value::Map(fields) = item {
                    apply_defaults(&nested, fields);
                }
            }
        }
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;
    use regex::Regex;

    /// Generic ARN format
    const ARN_PATTERN: &str = r"^arn:[\w-]+:[a-zA-Z0-9\-]+:[a-z0-9\-]*:(\d{12}|aws)?:.+$";

    /// String whose length (in characters) lies within `min..=max`
    pub fn string_len_between(min: usize, max: usize) -> AttributeType {
        AttributeType::Custom {
            name: "String".to_string(),
            base: Box::new(AttributeType::String),
            validate: Arc::new(move |value| match value {
                Value::String(s) => {
                    let len = s.chars().count();
                    if (min..=max).contains(&len) {
                        Ok(())
                    } else {
                        Err(format!(
                            "expected length between {} and {}, got {}",
                            min, max, len
                        ))
                    }
                }
                _ => Ok(()),
            }),
        }
    }

    /// Integer within `min..=max`
    pub fn int_between(min: i64, max: i64) -> AttributeType {
        AttributeType::Custom {
            name: "Int".to_string(),
            base: Box::new(AttributeType::Int),
            validate: Arc::new(move |value| match value {
                Value::Int(n) if (min..=max).contains(n) => Ok(()),
                Value::Int(n) => Err(format!(
                    "expected value between {} and {}, got {}",
                    min, max, n
                )),
                _ => Err("Expected integer".to_string()),
            }),
        }
    }

    /// String matching a regular expression
    pub fn string_match(pattern: &str, message: &str) -> AttributeType {
        let regex = Regex::new(pattern).map_err(|e| e.to_string());
        let message = message.to_string();
        AttributeType::Custom {
            name: "String".to_string(),
            base: Box::new(AttributeType::String),
            validate: Arc::new(move |value| match (value, &regex) {
                (Value::String(s), Ok(re)) if re.is_match(s) => Ok(()),
                (Value::String(s), Ok(_)) => Err(format!("{} (got '{}')", message, s)),
                (Value::String(_), Err(e)) => Err(format!("invalid pattern: {}", e)),
                _ => Ok(()),
            }),
        }
    }

    /// Any well-formed ARN
    pub fn arn() -> AttributeType {
        match string_match(ARN_PATTERN, "value must be a valid ARN") {
            AttributeType::Custom { base, validate, .. } => AttributeType::Custom {
                name: "Arn".to_string(),
                base,
                validate,
            },
            other => other,
        }
    }

    /// Tags map of string keys to string values
    pub fn tags() -> AttributeType {
        AttributeType::Map(Box::new(AttributeType::String))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Value {
        Value::String(v.to_string())
    }

    #[test]
    fn validate_string_type() {
        let t = AttributeType::String;
        assert!(t.validate(&s("hello")).is_ok());
        assert!(t.validate(&Value::Int(42)).is_err());
    }

    #[test]
    fn validate_enum_type() {
        let t = AttributeType::Enum(vec!["DOCKER".to_string()]);
        assert!(t.validate(&s("DOCKER")).is_ok());
        assert!(t.validate(&s("docker")).is_err());
    }

    #[test]
    fn refs_accepted_for_strings_only() {
        let r = Value::ResourceRef("recipe".to_string(), "arn".to_string());
        assert!(types::arn().validate(&r).is_ok());
        assert!(AttributeType::Bool.validate(&r).is_err());
    }

    #[test]
    fn string_length_bounds() {
        let t = types::string_len_between(1, 5);
        assert!(t.validate(&s("abc")).is_ok());
        assert!(t.validate(&s("")).is_err());
        assert!(t.validate(&s("abcdef")).is_err());
        assert!(t.validate(&Value::Int(1)).is_err());
    }

    #[test]
    fn int_bounds() {
        let t = types::int_between(60, 1440);
        assert!(t.validate(&Value::Int(60)).is_ok());
        assert!(t.validate(&Value::Int(1440)).is_ok());
        assert!(t.validate(&Value::Int(59)).is_err());
        assert!(t.validate(&Value::Int(1441)).is_err());
    }

    #[test]
    fn arn_format() {
        let t = types::arn();
        assert!(
            t.validate(&s("arn:aws:kms:us-east-1:123456789012:key/abcd"))
                .is_ok()
        );
        assert!(
            t.validate(&s("arn:aws:imagebuilder:us-west-2:aws:component/x/1.0.0"))
                .is_ok()
        );
        assert!(t.validate(&s("not-an-arn")).is_err());
    }

    #[test]
    fn block_item_limits() {
        let t = AttributeType::single_block(vec![
            AttributeSchema::new("enabled", AttributeType::Bool),
        ]);
        let item = Value::Map(HashMap::from([("enabled".to_string(), Value::Bool(true))]));
        assert!(t.validate(&Value::List(vec![item.clone()])).is_ok());
        assert!(matches!(
            t.validate(&Value::List(vec![item.clone(), item])),
            Err(TypeError::TooManyItems { max: 1, got: 2 })
        ));

        let t = AttributeType::block(vec![
            AttributeSchema::new("arn", AttributeType::String).required(),
        ])
        .with_min_items(1);
        assert!(matches!(
            t.validate(&Value::List(vec![])),
            Err(TypeError::TooFewItems { min: 1, got: 0 })
        ));
    }

    #[test]
    fn block_item_fields_are_validated() {
        let t = AttributeType::block(vec![
            AttributeSchema::new("arn", types::arn()).required(),
        ]);
        let item = Value::Map(HashMap::from([("other".to_string(), s("x"))]));
        match t.validate(&Value::List(vec![item])) {
            Err(TypeError::BlockItemError { index, errors }) => {
                assert_eq!(index, 0);
                assert_eq!(errors.len(), 2);
            }
            other => panic!("Expected BlockItemError, got {:?}", other),
        }
    }

    #[test]
    fn computed_attributes_cannot_be_set() {
        let schema = ResourceSchema::new("resource")
            .attribute(AttributeSchema::new("arn", AttributeType::String).computed())
            .attribute(
                AttributeSchema::new("template", AttributeType::String).optional_computed(),
            );

        let attrs = HashMap::from([("template".to_string(), s("FROM x"))]);
        assert!(schema.validate(&attrs).is_ok());

        let attrs = HashMap::from([("arn".to_string(), s("arn:aws:x"))]);
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(matches!(errors[0], TypeError::ComputedAttribute { .. }));
    }

    #[test]
    fn unknown_attribute_rejected() {
        let schema = ResourceSchema::new("resource")
            .attribute(AttributeSchema::new("name", AttributeType::String));
        let attrs = HashMap::from([("nmae".to_string(), s("x"))]);
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(matches!(&errors[0], TypeError::UnknownAttribute { name } if name == "nmae"));
    }

    #[test]
    fn missing_required_attribute() {
        let schema = ResourceSchema::new("resource")
            .attribute(AttributeSchema::new("name", AttributeType::String).required());

        let result = schema.validate(&HashMap::new());
        assert!(result.is_err());
    }

    #[test]
    fn exactly_one_of_group() {
        let schema = ResourceSchema::new("resource")
            .attribute(AttributeSchema::new("data", AttributeType::String))
            .attribute(AttributeSchema::new("uri", AttributeType::String))
            .exactly_one_of(&["data", "uri"]);

        assert!(
            schema
                .validate(&HashMap::from([("data".to_string(), s("x"))]))
                .is_ok()
        );

        let errors = schema.validate(&HashMap::new()).unwrap_err();
        assert!(matches!(errors[0], TypeError::ExactlyOneOf { found: 0, .. }));

        let both = HashMap::from([("data".to_string(), s("x")), ("uri".to_string(), s("y"))]);
        let errors = schema.validate(&both).unwrap_err();
        assert!(matches!(errors[0], TypeError::ExactlyOneOf { found: 2, .. }));
    }

    #[test]
    fn only_declared_timeouts_are_accepted() {
        use std::time::Duration;

        let schema = ResourceSchema::new("resource").with_timeouts(&["create"]);
        let create = Timeouts {
            create: Some(Duration::from_secs(600)),
            ..Default::default()
        };
        assert!(schema.validate_timeouts(&create).is_ok());
        assert!(schema.validate_timeouts(&Timeouts::default()).is_ok());

        let delete = Timeouts {
            delete: Some(Duration::from_secs(600)),
            ..create
        };
        let errors = schema.validate_timeouts(&delete).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], TypeError::UnsupportedTimeout { operation } if operation == "delete"));
    }

    #[test]
    fn defaults_fill_top_level_and_blocks() {
        let schema = ResourceSchema::new("resource")
            .attribute(
                AttributeSchema::new("enabled", AttributeType::Bool)
                    .with_default(Value::Bool(true)),
            )
            .attribute(AttributeSchema::new(
                "tests",
                AttributeType::single_block(vec![
                    AttributeSchema::new("timeout", AttributeType::Int)
                        .with_default(Value::Int(720)),
                ]),
            ));

        let mut attrs = HashMap::from([(
            "tests".to_string(),
            Value::List(vec![Value::Map(HashMap::new())]),
        )]);
        schema.apply_defaults(&mut attrs);

        assert_eq!(attrs.get("enabled"), Some(&Value::Bool(true)));
        let Some(Value::List(items)) = attrs.get("tests") else {
            panic!("Expected block list");
        };
        let Value::Map(fields) = &items[0] else {
            panic!("Expected block map");
        };
        assert_eq!(fields.get("timeout"), Some(&Value::Int(720)));
    }

    #[test]
    fn force_new_lookup() {
        let schema = ResourceSchema::new("resource")
            .attribute(AttributeSchema::new("name", AttributeType::String).force_new())
            .attribute(AttributeSchema::new("tags", types::tags()));
        assert!(schema.is_force_new("name"));
        assert!(!schema.is_force_new("tags"));
        assert!(!schema.is_force_new("missing"));
    }
}
