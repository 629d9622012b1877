//! Schema types for provider configuration, resources, and data sources.
//!
//! A schema is a tree of [`Block`]s: attributes at each level plus named
//! [`ListBlock`]s of repeated child blocks. Every resource in this crate fits
//! that shape (the template's `components` is the only list block).

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The type of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    /// A string value.
    String,
    /// A 64-bit integer.
    Int64,
    /// A boolean value.
    Bool,
}

impl AttributeType {
    /// Name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int64 => "int64",
            Self::Bool => "bool",
        }
    }

    /// Whether a non-null JSON value has this type.
    ///
    /// Integral floats such as `2.0` are accepted as `int64`; see
    /// [`Schema::normalize`].
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::Int64 => value.is_i64() || integral_float(value).is_some(),
        }
    }

    fn normalize(self, value: &mut Value) {
        if self == Self::Int64 {
            if let Some(i) = integral_float(value) {
                *value = Value::from(i);
            }
        }
    }
}

fn integral_float(value: &Value) -> Option<i64> {
    let f = value.as_f64().filter(|_| value.is_f64())?;
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

/// Who supplies an attribute's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presence {
    /// The configuration must set it.
    Required,
    /// The configuration may set it.
    Optional,
    /// The provider sets it; configuration cannot.
    Computed,
}

/// Describes a single attribute in a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribute {
    /// The type of the attribute.
    #[serde(rename = "type")]
    pub attr_type: AttributeType,
    /// Who supplies the value.
    pub presence: Presence,
    /// Hidden in logs and plan output.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub sensitive: bool,
    /// Human-readable description of the attribute.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Closed set of accepted string values, if constrained.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<String>,
}

impl Attribute {
    /// Create an attribute of the given type and presence.
    pub fn new(attr_type: AttributeType, presence: Presence) -> Self {
        Self {
            attr_type,
            presence,
            sensitive: false,
            description: None,
            one_of: Vec::new(),
        }
    }

    /// Create a required string attribute.
    pub fn required_string() -> Self {
        Self::new(AttributeType::String, Presence::Required)
    }

    /// Create an optional string attribute.
    pub fn optional_string() -> Self {
        Self::new(AttributeType::String, Presence::Optional)
    }

    /// Create a computed string attribute.
    pub fn computed_string() -> Self {
        Self::new(AttributeType::String, Presence::Computed)
    }

    /// Create an optional int64 attribute.
    pub fn optional_int64() -> Self {
        Self::new(AttributeType::Int64, Presence::Optional)
    }

    /// Create an optional bool attribute.
    pub fn optional_bool() -> Self {
        Self::new(AttributeType::Bool, Presence::Optional)
    }

    /// Set the description for this attribute.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Restrict a string attribute to a closed set of values.
    ///
    /// The accepted values are appended to the description.
    pub fn with_one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.one_of = values.into_iter().map(Into::into).collect();
        let suffix = format!("One of: ({}).", self.one_of.join(", "));
        self.description = Some(match self.description.take() {
            Some(desc) => format!("{} {}", desc, suffix),
            None => suffix,
        });
        self
    }

    /// Mark this attribute as sensitive.
    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    /// Whether configuration may set this attribute.
    pub fn is_configurable(&self) -> bool {
        self.presence != Presence::Computed
    }

    /// Whether `value` is allowed by the `one_of` constraint, if any.
    pub fn allows(&self, value: &str) -> bool {
        self.one_of.is_empty() || self.one_of.iter().any(|allowed| allowed == value)
    }
}

/// A group of attributes: a schema root or one item of a list block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Block {
    /// The attributes within this block.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Attribute>,
    /// Repeated child blocks.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub blocks: BTreeMap<String, ListBlock>,
    /// Human-readable description of the block.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Block {
    /// Create a new empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute to this block.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Set the description for this block.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn normalize(&self, value: &mut Value) {
        let Value::Object(obj) = value else {
            return;
        };
        for (name, attr) in &self.attributes {
            if let Some(v) = obj.get_mut(name) {
                attr.attr_type.normalize(v);
            }
        }
        for (name, list) in &self.blocks {
            if let Some(Value::Array(items)) = obj.get_mut(name) {
                for item in items {
                    list.item.normalize(item);
                }
            }
        }
    }
}

/// An ordered list of child blocks sharing one item schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListBlock {
    /// Schema of each item.
    #[serde(flatten)]
    pub item: Block,
    /// The list must be present (an empty list still counts).
    #[serde(default)]
    pub required: bool,
    /// Minimum number of items.
    #[serde(default)]
    pub min_items: usize,
    /// Maximum number of items, if bounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

impl ListBlock {
    /// Create an optional, unbounded list of `item`.
    pub fn new(item: Block) -> Self {
        Self {
            item,
            required: false,
            min_items: 0,
            max_items: None,
        }
    }

    /// Require the list to be present.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the minimum number of items.
    pub fn with_min_items(mut self, min: usize) -> Self {
        self.min_items = min;
        self
    }

    /// Set the maximum number of items.
    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }
}

/// Schema for the provider configuration, a resource, or a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Schema {
    /// The root block containing all attributes and list blocks.
    #[serde(flatten)]
    pub block: Block,
}

impl Schema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute to the schema.
    pub fn with_attribute(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.block.attributes.insert(name.into(), attr);
        self
    }

    /// Add a list block to the schema.
    pub fn with_block(mut self, name: impl Into<String>, block: ListBlock) -> Self {
        self.block.blocks.insert(name.into(), block);
        self
    }

    /// Set the description of the schema root.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.block.description = Some(description.into());
        self
    }

    /// Rewrite integral floats held by `int64` attributes as integers.
    ///
    /// Applied before decoding or comparing documents, so `2.0` and `2` are
    /// the same value. Anything else is left untouched.
    pub fn normalize(&self, value: &mut Value) {
        self.block.normalize(value);
    }

    /// Names a configuration may set, attributes first, each group sorted.
    pub fn configurable_names(&self) -> impl Iterator<Item = &str> {
        self.block
            .attributes
            .iter()
            .filter(|(_, attr)| attr.is_configurable())
            .map(|(name, _)| name.as_str())
            .chain(self.block.blocks.keys().map(String::as_str))
    }
}

/// Schemas served by a provider, keyed by type name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProviderSchema {
    /// Schema for provider configuration.
    #[serde(default)]
    pub provider: Schema,
    /// Schemas for each resource type.
    #[serde(default)]
    pub resources: BTreeMap<String, Schema>,
    /// Schemas for each data source type.
    #[serde(default)]
    pub data_sources: BTreeMap<String, Schema>,
}

impl ProviderSchema {
    /// Create a new empty provider schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider configuration schema.
    pub fn with_provider_config(mut self, schema: Schema) -> Self {
        self.provider = schema;
        self
    }

    /// Add a resource schema.
    pub fn with_resource(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.resources.insert(name.into(), schema);
        self
    }

    /// Add a data source schema.
    pub fn with_data_source(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.data_sources.insert(name.into(), schema);
        self
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// Blocks the operation.
    Error,
    /// Reported, but the operation proceeds.
    Warning,
}

/// A problem found in a configuration or state document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Dotted path of the offending attribute, e.g. `components.0.status`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    fn new(severity: DiagnosticSeverity, summary: impl Into<String>) -> Self {
        Self {
            severity,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Error, summary)
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self::new(DiagnosticSeverity::Warning, summary)
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the attribute path for this diagnostic.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary)?;
        if let Some(detail) = &self.detail {
            write!(f, ": {}", detail)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int64_accepts_integral_numbers_only() {
        assert!(AttributeType::Int64.accepts(&json!(3)));
        assert!(AttributeType::Int64.accepts(&json!(-3)));
        assert!(AttributeType::Int64.accepts(&json!(2.0)));
        assert!(!AttributeType::Int64.accepts(&json!(2.5)));
        assert!(!AttributeType::Int64.accepts(&json!("3")));
        assert!(AttributeType::Bool.accepts(&json!(false)));
        assert!(!AttributeType::String.accepts(&json!(1)));
    }

    #[test]
    fn test_normalize_rewrites_integral_floats() {
        let schema = Schema::new()
            .with_attribute("order", Attribute::optional_int64())
            .with_attribute("name", Attribute::required_string())
            .with_block(
                "items",
                ListBlock::new(Block::new().with_attribute("order", Attribute::optional_int64())),
            );

        let mut doc = json!({
            "order": 2.0,
            "name": "API",
            "items": [{"order": 3.0}, {"order": 4}],
            "other": 5.0
        });
        schema.normalize(&mut doc);

        assert_eq!(
            doc,
            json!({"order": 2, "name": "API", "items": [{"order": 3}, {"order": 4}], "other": 5.0})
        );
        assert!(doc["order"].is_i64());

        let mut fractional = json!({"order": 2.5});
        schema.normalize(&mut fractional);
        assert_eq!(fractional, json!({"order": 2.5}));
    }

    #[test]
    fn test_one_of_extends_description() {
        let attr = Attribute::required_string()
            .with_description("Type of the template.")
            .with_one_of(["MAINTENANCE", "INCIDENT"]);

        assert_eq!(attr.one_of, vec!["MAINTENANCE", "INCIDENT"]);
        assert_eq!(
            attr.description.as_deref(),
            Some("Type of the template. One of: (MAINTENANCE, INCIDENT).")
        );
        assert!(attr.allows("INCIDENT"));
        assert!(!attr.allows("incident"));
        assert!(Attribute::optional_string().allows("anything"));
    }

    #[test]
    fn test_configurable_names_skip_computed() {
        let schema = Schema::new()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("notify", Attribute::optional_bool())
            .with_attribute("id", Attribute::computed_string())
            .with_block(
                "components",
                ListBlock::new(Block::new().with_attribute("id", Attribute::required_string()))
                    .required(),
            );

        let names: Vec<_> = schema.configurable_names().collect();
        assert_eq!(names, vec!["name", "notify", "components"]);
        assert!(schema.block.blocks["components"].required);
        assert_eq!(schema.block.blocks["components"].max_items, None);
    }

    #[test]
    fn test_attribute_serialization() {
        let attr = Attribute::optional_string().sensitive();
        assert_eq!(
            serde_json::to_value(&attr).unwrap(),
            json!({"type": "string", "presence": "optional", "sensitive": true})
        );

        let attr = Attribute::computed_string();
        assert_eq!(
            serde_json::to_value(&attr).unwrap(),
            json!({"type": "string", "presence": "computed"})
        );
    }

    #[test]
    fn test_diagnostic_display() {
        let err = Diagnostic::error("Invalid value for attribute 'status'")
            .with_detail("got \"BOGUS\"")
            .with_attribute("status");

        assert!(err.is_error());
        assert_eq!(
            err.to_string(),
            "Invalid value for attribute 'status': got \"BOGUS\""
        );
        assert_eq!(err.attribute.as_deref(), Some("status"));

        let warning = Diagnostic::warning("heads up");
        assert!(!warning.is_error());
        assert_eq!(warning.to_string(), "heads up");
    }
}
