use crate::model::{deserialize_present, generate_id, now, Id};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A hierarchical entity (asset or participant).
/// Nodes without a parent are roots; the parent relation forms a forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: Id,
    pub name: String,
    pub parent_id: Option<Id>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    pub fn new(name: String, parent_id: Option<Id>) -> Self {
        let created_at = now();
        Self {
            id: generate_id(),
            name,
            parent_id,
            created_at,
            updated_at: created_at,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn touch(&mut self) {
        self.updated_at = now();
    }
}

/// Node creation input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    pub name: String,
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<Id>,
}

/// A value to record against one of the node's own attributes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeValueInput {
    #[serde(alias = "attributeId")]
    pub attribute_id: Id,
    pub value: String,
}

/// Partial node update.
///
/// `parent_id` distinguishes "absent" (keep the current parent) from an
/// explicit `null` (detach and make the node a root).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(
        default,
        alias = "parentId",
        deserialize_with = "deserialize_present",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent_id: Option<Option<Id>>,
    #[serde(default)]
    pub attributes: Vec<AttributeValueInput>,
}

impl NodeUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.parent_id.is_none() && self.attributes.is_empty()
    }
}
