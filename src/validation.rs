//! Schema validation of JSON documents.
//!
//! Runs before any remote call: the provider rejects a configuration or
//! state document with diagnostics instead of sending it to the API.
//!
//! # Example
//!
//! ```
//! use instatus_provider::schema::{Attribute, Schema};
//! use instatus_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::new().with_attribute(
//!     "status",
//!     Attribute::required_string().with_one_of(["OPERATIONAL", "MAJOROUTAGE"]),
//! );
//!
//! assert!(validate(&schema, &json!({"status": "OPERATIONAL"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"status": "BOGUS"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("status".to_string()));
//! ```

use serde_json::Value;

use crate::config::UNKNOWN_VALUE;
use crate::schema::{Attribute, Block, Diagnostic, ListBlock, Presence, Schema};

/// Validate a JSON document against a schema.
///
/// An empty result means the document is valid. Rules:
///
/// - Required attributes must be present and non-null
/// - Computed attributes are skipped (the provider sets these)
/// - Attribute values must have the declared type
/// - Constrained strings must be one of the allowed values, unless unknown
/// - List blocks must be lists, present when required, within item limits
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut walker = Walker::default();
    walker.block(&schema.block, value, "");
    walker.diagnostics
}

/// Like [`validate`], as a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Check if a JSON document is valid against a schema.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

#[derive(Default)]
struct Walker {
    diagnostics: Vec<Diagnostic>,
}

impl Walker {
    fn error(&mut self, path: &str, summary: String, detail: String) {
        let mut diagnostic = Diagnostic::error(summary).with_detail(detail);
        if !path.is_empty() {
            diagnostic = diagnostic.with_attribute(path);
        }
        self.diagnostics.push(diagnostic);
    }

    fn block(&mut self, block: &Block, value: &Value, path: &str) {
        let obj = match value {
            Value::Object(map) => map,
            Value::Null => return,
            other => {
                self.error(
                    path,
                    "Expected object".to_string(),
                    format!("Got {}", type_name(other)),
                );
                return;
            },
        };

        for (name, attr) in &block.attributes {
            self.attribute(attr, obj.get(name), &join(path, name));
        }
        for (name, list) in &block.blocks {
            self.list_block(list, obj.get(name), &join(path, name));
        }
    }

    fn attribute(&mut self, attr: &Attribute, value: Option<&Value>, path: &str) {
        let value = match (attr.presence, value) {
            (Presence::Computed, _) => return,
            (Presence::Required, None | Some(Value::Null)) => {
                self.error(
                    path,
                    format!("Missing required attribute '{}'", path),
                    "This attribute is required and must be provided".to_string(),
                );
                return;
            },
            (_, None | Some(Value::Null)) => return,
            (_, Some(value)) => value,
        };

        if !attr.attr_type.accepts(value) {
            self.error(
                path,
                format!("Invalid type for attribute '{}'", path),
                format!(
                    "Expected {}, got {}",
                    attr.attr_type.name(),
                    type_name(value)
                ),
            );
            return;
        }

        if let Some(s) = value.as_str() {
            if s != UNKNOWN_VALUE && !attr.allows(s) {
                self.error(
                    path,
                    format!("Invalid value for attribute '{}'", path),
                    format!(
                        "Value must be one of: ({}), got \"{}\"",
                        attr.one_of.join(", "),
                        s
                    ),
                );
            }
        }
    }

    fn list_block(&mut self, list: &ListBlock, value: Option<&Value>, path: &str) {
        let items = match value {
            None | Some(Value::Null) => {
                if list.required || list.min_items > 0 {
                    self.error(
                        path,
                        format!("Missing required block '{}'", path),
                        "This block is required and must be provided".to_string(),
                    );
                }
                return;
            },
            Some(Value::Array(items)) => items,
            Some(other) => {
                self.error(
                    path,
                    format!("Expected list for block '{}'", path),
                    format!("Got {}", type_name(other)),
                );
                return;
            },
        };

        if items.len() < list.min_items {
            self.error(
                path,
                format!("Too few items in block '{}'", path),
                format!("Requires at least {}, got {}", list.min_items, items.len()),
            );
        }
        if let Some(max) = list.max_items.filter(|max| items.len() > *max) {
            self.error(
                path,
                format!("Too many items in block '{}'", path),
                format!("Allows at most {}, got {}", max, items.len()),
            );
        }

        for (i, item) in items.iter().enumerate() {
            self.block(&list.item, item, &format!("{}.{}", path, i));
        }
    }
}

fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn components_schema() -> Schema {
        Schema::new().with_block(
            "components",
            ListBlock::new(
                Block::new()
                    .with_attribute("id", Attribute::required_string())
                    .with_attribute(
                        "status",
                        Attribute::required_string().with_one_of(["OPERATIONAL", "MAJOROUTAGE"]),
                    ),
            )
            .required(),
        )
    }

    #[test]
    fn test_required_attribute() {
        let schema = Schema::new().with_attribute("name", Attribute::required_string());

        assert!(is_valid(&schema, &json!({"name": "API"})));

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("name"));
        assert!(diagnostics[0].summary.starts_with("Missing required attribute"));

        assert_eq!(validate(&schema, &json!({"name": null})).len(), 1);

        let diagnostics = validate(&schema, &json!({"name": 123}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].detail.as_deref(),
            Some("Expected string, got number")
        );
    }

    #[test]
    fn test_optional_attributes() {
        let schema = Schema::new()
            .with_attribute("order", Attribute::optional_int64())
            .with_attribute("notify", Attribute::optional_bool());

        assert!(is_valid(&schema, &json!({"order": 2, "notify": true})));
        assert!(is_valid(&schema, &json!({})));
        assert!(is_valid(&schema, &json!({"order": null})));
        assert_eq!(validate(&schema, &json!({"order": 2.5})).len(), 1);
        assert_eq!(validate(&schema, &json!({"notify": "yes"})).len(), 1);
    }

    #[test]
    fn test_computed_attribute_is_not_checked() {
        let schema = Schema::new().with_attribute("id", Attribute::computed_string());

        assert!(is_valid(&schema, &json!({})));
        assert!(is_valid(&schema, &json!({"id": 123})));
    }

    #[test]
    fn test_one_of_allows_unknown_placeholder() {
        let schema = Schema::new().with_attribute(
            "type",
            Attribute::required_string().with_one_of(["MAINTENANCE", "INCIDENT"]),
        );

        assert!(is_valid(&schema, &json!({"type": "INCIDENT"})));
        assert!(is_valid(&schema, &json!({"type": UNKNOWN_VALUE})));

        let diagnostics = validate(&schema, &json!({"type": "incident"}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0]
            .detail
            .as_deref()
            .is_some_and(|d| d.contains("MAINTENANCE, INCIDENT")));
    }

    #[test]
    fn test_component_list_block() {
        let schema = components_schema();

        assert!(is_valid(&schema, &json!({"components": []})));
        assert!(is_valid(
            &schema,
            &json!({"components": [
                {"id": "c1", "status": "OPERATIONAL"},
                {"id": "c1", "status": "MAJOROUTAGE"}
            ]})
        ));

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("Missing required block"));

        let diagnostics = validate(
            &schema,
            &json!({"components": [{"id": "c1", "status": "BOGUS"}]}),
        );
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("components.0.status")
        );

        let diagnostics = validate(&schema, &json!({"components": {"id": "c1"}}));
        assert!(diagnostics[0].summary.contains("Expected list"));

        let diagnostics = validate(&schema, &json!({"components": ["c1"]}));
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("components.0"));
    }

    #[test]
    fn test_item_limits() {
        let schema = Schema::new().with_block(
            "components",
            ListBlock::new(Block::new())
                .with_min_items(1)
                .with_max_items(2),
        );

        assert!(validate(&schema, &json!({"components": []}))[0]
            .summary
            .starts_with("Too few items"));
        assert!(validate(&schema, &json!({"components": [{}, {}, {}]}))[0]
            .summary
            .starts_with("Too many items"));
        assert!(is_valid(&schema, &json!({"components": [{}]})));
    }

    #[test]
    fn test_validate_result() {
        let schema = Schema::new().with_attribute("name", Attribute::required_string());
        assert!(validate_result(&schema, &json!({"name": "x"})).is_ok());
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);
    }
}
