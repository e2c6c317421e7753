use crate::model::{deserialize_present, generate_id, now, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named attribute declared on exactly one node (its definition site).
/// Descendants of the owner see the definition unless they shadow the name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub id: Id,
    pub owner_node_id: Id,
    pub name: String,
    pub description: Option<String>,
    /// Regular expression every recorded value must match, if set
    pub validation_pattern: Option<String>,
    /// Values are ids of other nodes
    pub is_reference: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AttributeDefinition {
    pub fn new(
        owner_node_id: Id,
        name: String,
        description: Option<String>,
        validation_pattern: Option<String>,
        is_reference: bool,
    ) -> Self {
        let created_at = now();
        Self {
            id: generate_id(),
            owner_node_id,
            name,
            description,
            validation_pattern,
            is_reference,
            created_at,
            updated_at: created_at,
        }
    }
}

/// Attribute declaration input
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewAttributeDefinition {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "format_data")]
    pub validation_pattern: Option<String>,
    #[serde(default)]
    pub is_reference: Option<bool>,
    /// Allow shadowing an attribute inherited from an ancestor
    #[serde(default)]
    pub overrides: bool,
    /// Optional first value, recorded together with the definition
    #[serde(default)]
    pub value: Option<String>,
}

/// Partial definition update; `null` clears description or pattern
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AttributeDefinitionUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(
        default,
        alias = "format_data",
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub validation_pattern: Option<Option<String>>,
    #[serde(default)]
    pub is_reference: Option<bool>,
}

/// One version of a value recorded against a (node, attribute) pair.
/// Rows are only ever appended; the highest version is the current value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValue {
    pub id: Id,
    pub node_id: Id,
    pub attribute_id: Id,
    pub value: String,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

/// Value to append; id, version and timestamp are assigned by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAttributeValue {
    pub node_id: Id,
    pub attribute_id: Id,
    pub value: String,
}

impl NewAttributeValue {
    pub fn new(node_id: Id, attribute_id: Id, value: String) -> Self {
        Self {
            node_id,
            attribute_id,
            value,
        }
    }

    pub fn into_version(self, version: i64) -> AttributeValue {
        AttributeValue {
            id: generate_id(),
            node_id: self.node_id,
            attribute_id: self.attribute_id,
            value: self.value,
            version,
            created_at: now(),
        }
    }
}

/// An entry of a node's resolved attribute view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedAttribute {
    pub definition: AttributeDefinition,
    pub value: Option<String>,
    pub source_node_id: Id,
    pub is_inherited: bool,
}

impl ResolvedAttribute {
    pub fn name(&self) -> &str {
        &self.definition.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_definition_accepts_format_data() {
        let json = r#"{"name": "Voltage", "format_data": "^[0-9]+$", "value": "220"}"#;
        let def: NewAttributeDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(def.validation_pattern.as_deref(), Some("^[0-9]+$"));
        assert_eq!(def.value.as_deref(), Some("220"));
        assert!(!def.overrides);
        assert_eq!(def.is_reference, None);
    }

    #[test]
    fn test_definition_update_distinguishes_clear_from_absent() {
        let update: AttributeDefinitionUpdate =
            serde_json::from_str(r#"{"format_data": null}"#).unwrap();
        assert_eq!(update.validation_pattern, Some(None));
        assert_eq!(update.description, None);
    }

    #[test]
    fn test_into_version_keeps_pair() {
        let value = NewAttributeValue::new("n".into(), "a".into(), "220".into()).into_version(3);
        assert_eq!(value.version, 3);
        assert_eq!(value.node_id, "n");
        assert_eq!(value.attribute_id, "a");
    }
}
