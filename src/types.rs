//! Convenience types shared by the host boundary and the resources.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Presence of an optional attribute in a state document.
///
/// State documents distinguish a key that was never written (`Absent`) from a
/// key written as JSON `null` (`Null`). Both translate to "not set" on the
/// remote side, but only `Absent` is omitted when the document is serialized
/// back to the host.
///
/// Struct fields of this type should carry
/// `#[serde(default, skip_serializing_if = "Field::is_absent")]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    /// The attribute is not present in the document.
    Absent,
    /// The attribute is present and explicitly null.
    Null,
    /// The attribute holds a value.
    Value(T),
}

impl<T> Field<T> {
    /// Returns `true` if the attribute is not present.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns `true` if the attribute is present and null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if the attribute holds a value.
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// Borrow the value, treating absent and null alike.
    pub fn as_option(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Absent | Self::Null => None,
        }
    }

    /// Convert into the nullable remote representation.
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            Self::Absent | Self::Null => None,
        }
    }

    /// Overwrite with a value fetched from the API.
    ///
    /// A fetched value always wins. A missing one clears a set attribute to
    /// `Null`; an attribute that was already unset keeps its form.
    pub fn overwrite(&mut self, fetched: Option<T>) {
        match fetched {
            Some(v) => *self = Self::Value(v),
            None if self.is_value() => *self = Self::Null,
            None => {},
        }
    }
}

impl<T: Clone> Field<T> {
    /// Clone the value out, treating absent and null alike.
    pub fn cloned(&self) -> Option<T> {
        self.as_option().cloned()
    }
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> From<Option<T>> for Field<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Value(v),
            None => Self::Null,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => v.serialize(serializer),
            Self::Absent | Self::Null => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // A missing key never reaches here; `#[serde(default)]` yields `Absent`.
        Ok(Option::<T>::deserialize(deserializer)?.into())
    }
}

/// A change to a single attribute during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The path to the attribute that changed.
    pub path: String,
    /// The value before the change (None if creating).
    pub before: Option<serde_json::Value>,
    /// The value after the change (None if removing).
    pub after: Option<serde_json::Value>,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(
        path: impl Into<String>,
        before: Option<serde_json::Value>,
        after: Option<serde_json::Value>,
    ) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// Create a change for a new attribute.
    pub fn added(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// Create a change for a removed attribute.
    pub fn removed(path: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// Create a change for a modified attribute.
    pub fn modified(
        path: impl Into<String>,
        before: serde_json::Value,
        after: serde_json::Value,
    ) -> Self {
        Self::new(path, Some(before), Some(after))
    }
}

/// The result of a plan operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The planned state after the operation.
    pub planned_state: serde_json::Value,
    /// The list of attribute changes.
    pub changes: Vec<AttributeChange>,
    /// Whether the resource requires replacement.
    pub requires_replace: bool,
}

impl PlanResult {
    /// Create a plan result with no changes.
    pub fn no_change(state: serde_json::Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// Create a plan result with changes.
    pub fn with_changes(
        planned_state: serde_json::Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }
}

/// An imported resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: serde_json::Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: serde_json::Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// Resource and data source names served by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// List of resource type names.
    pub resources: Vec<String>,
    /// List of data source type names.
    pub data_sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Doc {
        #[serde(default, skip_serializing_if = "Field::is_absent")]
        notify: Field<bool>,
    }

    #[test]
    fn test_field_deserializes_three_states() {
        let absent: Doc = serde_json::from_value(json!({})).unwrap();
        assert_eq!(absent.notify, Field::Absent);

        let null: Doc = serde_json::from_value(json!({"notify": null})).unwrap();
        assert_eq!(null.notify, Field::Null);

        let value: Doc = serde_json::from_value(json!({"notify": true})).unwrap();
        assert_eq!(value.notify, Field::Value(true));
    }

    #[test]
    fn test_field_overwrite_from_fetched_value() {
        let mut notify = Field::Value(true);
        notify.overwrite(Some(false));
        assert_eq!(notify, Field::Value(false));
        notify.overwrite(None);
        assert_eq!(notify, Field::Null);

        let mut absent: Field<bool> = Field::Absent;
        absent.overwrite(None);
        assert_eq!(absent, Field::Absent);
        absent.overwrite(Some(true));
        assert_eq!(absent, Field::Value(true));
    }

    #[test]
    fn test_field_serialization_skips_only_absent() {
        let absent = Doc {
            notify: Field::Absent,
        };
        assert_eq!(serde_json::to_value(&absent).unwrap(), json!({}));

        let null = Doc {
            notify: Field::Null,
        };
        assert_eq!(serde_json::to_value(&null).unwrap(), json!({"notify": null}));
    }

    #[test]
    fn test_field_option_conversions() {
        assert_eq!(Field::from(Some(3)), Field::Value(3));
        assert_eq!(Field::<i64>::from(None), Field::Null);
        assert_eq!(Field::Value("a").into_option(), Some("a"));
        assert_eq!(Field::<&str>::Null.into_option(), None);
        assert_eq!(Field::<&str>::Absent.as_option(), None);
    }

    #[test]
    fn test_attribute_change_constructors() {
        let added = AttributeChange::added("name", json!("test"));
        assert!(added.before.is_none());
        assert_eq!(added.after, Some(json!("test")));

        let removed = AttributeChange::removed("notify", json!(true));
        assert_eq!(removed.before, Some(json!(true)));
        assert!(removed.after.is_none());

        let modified = AttributeChange::modified("status", json!("MONITORING"), json!("RESOLVED"));
        assert_eq!(modified.before, Some(json!("MONITORING")));
        assert_eq!(modified.after, Some(json!("RESOLVED")));
    }

    #[test]
    fn test_imported_resource() {
        let imported = ImportedResource::new("instatus_template", json!({"id": "tpl-1"}));
        assert_eq!(imported.resource_type, "instatus_template");
        assert_eq!(imported.state["id"], "tpl-1");
    }
}
