use crate::model::{AttributeDefinition, AttributeValue, Id, NewAttributeValue, Node};
use anyhow::Result;

/// Adjacency access to the node forest. Walks over the hierarchy are done by
/// the logic layer with repeated point lookups.
#[async_trait::async_trait]
pub trait NodeStore: Send + Sync {
    async fn get_node(&self, id: &Id) -> Result<Option<Node>>;
    /// Direct children ordered by name
    async fn list_children(&self, parent_id: &Id) -> Result<Vec<Node>>;
    /// Parentless nodes ordered by name
    async fn list_roots(&self) -> Result<Vec<Node>>;
    async fn has_children(&self, id: &Id) -> Result<bool>;
    async fn insert_node(&self, node: Node) -> Result<()>;
    /// Write the node row and append the given values in one transaction
    async fn update_node(
        &self,
        node: Node,
        values: Vec<NewAttributeValue>,
    ) -> Result<Vec<AttributeValue>>;
    /// Delete the node together with its definitions and every value recorded
    /// against the node or those definitions
    async fn delete_node(&self, id: &Id) -> Result<bool>;
}

#[async_trait::async_trait]
pub trait AttributeStore: Send + Sync {
    async fn get_definition(&self, id: &Id) -> Result<Option<AttributeDefinition>>;
    /// Definitions owned by the node, ordered by name
    async fn list_definitions(&self, owner_node_id: &Id) -> Result<Vec<AttributeDefinition>>;
    /// Insert a definition, appending its first value in the same transaction
    async fn insert_definition(
        &self,
        definition: AttributeDefinition,
        initial_value: Option<NewAttributeValue>,
    ) -> Result<Option<AttributeValue>>;
    async fn update_definition(&self, definition: AttributeDefinition) -> Result<()>;
    /// Delete a definition and all of its values
    async fn delete_definition(&self, id: &Id) -> Result<bool>;
}

/// Append-only value log
#[async_trait::async_trait]
pub trait ValueStore: Send + Sync {
    /// Append the next version for the (node, attribute) pair
    async fn append_value(&self, value: NewAttributeValue) -> Result<AttributeValue>;
    async fn latest_value(&self, node_id: &Id, attribute_id: &Id)
        -> Result<Option<AttributeValue>>;
    /// All versions, newest first
    async fn list_values(&self, node_id: &Id, attribute_id: &Id) -> Result<Vec<AttributeValue>>;
}

pub trait Store: NodeStore + AttributeStore + ValueStore + Send + Sync {}

impl<T: NodeStore + AttributeStore + ValueStore + Send + Sync> Store for T {}
