use anyhow::{anyhow, Result};
use itertools::Itertools;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::AssetError;
use crate::model::{AttributeDefinition, AttributeValue, Id, NewAttributeValue, Node};
use crate::store::traits::{AttributeStore, NodeStore, ValueStore};

#[derive(Debug, Default)]
struct MemoryState {
    nodes: HashMap<Id, Node>,
    definitions: HashMap<Id, AttributeDefinition>,
    /// Versions per (node_id, attribute_id), oldest first
    values: HashMap<(Id, Id), Vec<AttributeValue>>,
}

impl MemoryState {
    fn append(&mut self, value: NewAttributeValue) -> AttributeValue {
        let versions = self
            .values
            .entry((value.node_id.clone(), value.attribute_id.clone()))
            .or_default();
        let next = versions.last().map(|v| v.version + 1).unwrap_or(1);
        let stored = value.into_version(next);
        versions.push(stored.clone());
        stored
    }

    fn ensure_value_target(&self, value: &NewAttributeValue) -> Result<()> {
        if !self.nodes.contains_key(&value.node_id) {
            return Err(anyhow!("Unknown node for value: {}", value.node_id));
        }
        if !self.definitions.contains_key(&value.attribute_id) {
            return Err(anyhow!("Unknown attribute for value: {}", value.attribute_id));
        }
        Ok(())
    }

    /// True when `node_id` is `start` or one of its ancestors
    fn is_self_or_ancestor(&self, node_id: &Id, start: &Id) -> bool {
        let mut current = Some(start);
        // Bounded so a corrupt loop cannot spin forever
        for _ in 0..=self.nodes.len() {
            match current {
                Some(id) if id == node_id => return true,
                Some(id) => current = self.nodes.get(id).and_then(|n| n.parent_id.as_ref()),
                None => return false,
            }
        }
        false
    }
}

/// Store backed by process memory.
///
/// Every write takes the single write lock for its whole duration, which gives
/// multi-row operations the same all-or-nothing visibility a database
/// transaction does. Parent moves and deletes re-check the hierarchy under
/// that lock, so racing writers cannot close a loop or orphan a child.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite a node's parent link without any checks, for tests that need
    /// a corrupt hierarchy
    #[cfg(test)]
    pub(crate) fn force_parent(&self, id: &Id, parent_id: Option<Id>) {
        if let Some(node) = self.state.write().nodes.get_mut(id) {
            node.parent_id = parent_id;
        }
    }
}

fn by_name(nodes: impl Iterator<Item = Node>) -> Vec<Node> {
    nodes
        .sorted_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)))
        .collect()
}

#[async_trait::async_trait]
impl NodeStore for MemoryStore {
    async fn get_node(&self, id: &Id) -> Result<Option<Node>> {
        Ok(self.state.read().nodes.get(id).cloned())
    }

    async fn list_children(&self, parent_id: &Id) -> Result<Vec<Node>> {
        let state = self.state.read();
        Ok(by_name(
            state
                .nodes
                .values()
                .filter(|n| n.parent_id.as_ref() == Some(parent_id))
                .cloned(),
        ))
    }

    async fn list_roots(&self) -> Result<Vec<Node>> {
        let state = self.state.read();
        Ok(by_name(state.nodes.values().filter(|n| n.is_root()).cloned()))
    }

    async fn has_children(&self, id: &Id) -> Result<bool> {
        let state = self.state.read();
        Ok(state
            .nodes
            .values()
            .any(|n| n.parent_id.as_ref() == Some(id)))
    }

    async fn insert_node(&self, node: Node) -> Result<()> {
        let mut state = self.state.write();
        if state.nodes.contains_key(&node.id) {
            return Err(anyhow!("Node already exists: {}", node.id));
        }
        if let Some(parent_id) = &node.parent_id {
            if !state.nodes.contains_key(parent_id) {
                return Err(anyhow!("Parent node does not exist: {}", parent_id));
            }
        }
        state.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    async fn update_node(
        &self,
        node: Node,
        values: Vec<NewAttributeValue>,
    ) -> Result<Vec<AttributeValue>> {
        let mut state = self.state.write();
        if !state.nodes.contains_key(&node.id) {
            return Err(anyhow!("Node does not exist: {}", node.id));
        }
        if let Some(parent_id) = &node.parent_id {
            if !state.nodes.contains_key(parent_id) {
                return Err(anyhow!("Parent node does not exist: {}", parent_id));
            }
            if state.is_self_or_ancestor(&node.id, parent_id) {
                return Err(AssetError::CircularReference {
                    node_id: node.id.clone(),
                    parent_id: parent_id.clone(),
                }
                .into());
            }
        }
        // Check everything before touching anything
        for value in &values {
            state.ensure_value_target(value)?;
        }

        state.nodes.insert(node.id.clone(), node);
        Ok(values.into_iter().map(|v| state.append(v)).collect())
    }

    async fn delete_node(&self, id: &Id) -> Result<bool> {
        let mut state = self.state.write();
        if state.nodes.values().any(|n| n.parent_id.as_ref() == Some(id)) {
            return Err(AssetError::HasChildren(id.clone()).into());
        }
        if state.nodes.remove(id).is_none() {
            return Ok(false);
        }

        let owned: Vec<Id> = state
            .definitions
            .values()
            .filter(|d| &d.owner_node_id == id)
            .map(|d| d.id.clone())
            .collect();
        for def_id in &owned {
            state.definitions.remove(def_id);
        }
        state
            .values
            .retain(|(node_id, attribute_id), _| node_id != id && !owned.contains(attribute_id));

        Ok(true)
    }
}

#[async_trait::async_trait]
impl AttributeStore for MemoryStore {
    async fn get_definition(&self, id: &Id) -> Result<Option<AttributeDefinition>> {
        Ok(self.state.read().definitions.get(id).cloned())
    }

    async fn list_definitions(&self, owner_node_id: &Id) -> Result<Vec<AttributeDefinition>> {
        let state = self.state.read();
        Ok(state
            .definitions
            .values()
            .filter(|d| &d.owner_node_id == owner_node_id)
            .cloned()
            .sorted_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)))
            .collect())
    }

    async fn insert_definition(
        &self,
        definition: AttributeDefinition,
        initial_value: Option<NewAttributeValue>,
    ) -> Result<Option<AttributeValue>> {
        let mut state = self.state.write();
        if !state.nodes.contains_key(&definition.owner_node_id) {
            return Err(anyhow!(
                "Owner node does not exist: {}",
                definition.owner_node_id
            ));
        }
        if state.definitions.contains_key(&definition.id) {
            return Err(anyhow!("Attribute already exists: {}", definition.id));
        }
        if let Some(value) = &initial_value {
            if value.attribute_id != definition.id {
                return Err(anyhow!("Initial value targets a different attribute"));
            }
        }

        state.definitions.insert(definition.id.clone(), definition);
        Ok(initial_value.map(|v| state.append(v)))
    }

    async fn update_definition(&self, definition: AttributeDefinition) -> Result<()> {
        let mut state = self.state.write();
        match state.definitions.get_mut(&definition.id) {
            Some(existing) => {
                *existing = definition;
                Ok(())
            }
            None => Err(anyhow!("Attribute does not exist: {}", definition.id)),
        }
    }

    async fn delete_definition(&self, id: &Id) -> Result<bool> {
        let mut state = self.state.write();
        if state.definitions.remove(id).is_none() {
            return Ok(false);
        }
        state.values.retain(|(_, attribute_id), _| attribute_id != id);
        Ok(true)
    }
}

#[async_trait::async_trait]
impl ValueStore for MemoryStore {
    async fn append_value(&self, value: NewAttributeValue) -> Result<AttributeValue> {
        let mut state = self.state.write();
        state.ensure_value_target(&value)?;
        Ok(state.append(value))
    }

    async fn latest_value(
        &self,
        node_id: &Id,
        attribute_id: &Id,
    ) -> Result<Option<AttributeValue>> {
        let state = self.state.read();
        Ok(state
            .values
            .get(&(node_id.clone(), attribute_id.clone()))
            .and_then(|versions| versions.last().cloned()))
    }

    async fn list_values(&self, node_id: &Id, attribute_id: &Id) -> Result<Vec<AttributeValue>> {
        let state = self.state.read();
        Ok(state
            .values
            .get(&(node_id.clone(), attribute_id.clone()))
            .map(|versions| versions.iter().rev().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn node(store: &MemoryStore, name: &str, parent: Option<&Node>) -> Node {
        let node = Node::new(name.to_string(), parent.map(|p| p.id.clone()));
        store.insert_node(node.clone()).await.unwrap();
        node
    }

    #[tokio::test]
    async fn test_children_and_roots_are_ordered_by_name() {
        let store = MemoryStore::new();
        let line_b = node(&store, "Line B", None).await;
        let line_a = node(&store, "Line A", None).await;
        node(&store, "Station 2", Some(&line_a)).await;
        node(&store, "Station 1", Some(&line_a)).await;

        let roots: Vec<String> = store.list_roots().await.unwrap().into_iter().map(|n| n.name).collect();
        assert_eq!(roots, vec!["Line A", "Line B"]);

        let children: Vec<String> = store
            .list_children(&line_a.id)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(children, vec!["Station 1", "Station 2"]);
        assert!(store.has_children(&line_a.id).await.unwrap());
        assert!(!store.has_children(&line_b.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_rejects_unknown_parent() {
        let store = MemoryStore::new();
        let orphan = Node::new("Orphan".to_string(), Some("missing".to_string()));
        assert!(store.insert_node(orphan).await.is_err());
    }

    #[tokio::test]
    async fn test_versions_increment_per_pair() {
        let store = MemoryStore::new();
        let line = node(&store, "Line", None).await;
        let def = AttributeDefinition::new(line.id.clone(), "Voltage".into(), None, None, false);
        store.insert_definition(def.clone(), None).await.unwrap();

        let first = store
            .append_value(NewAttributeValue::new(line.id.clone(), def.id.clone(), "220".into()))
            .await
            .unwrap();
        let second = store
            .append_value(NewAttributeValue::new(line.id.clone(), def.id.clone(), "230".into()))
            .await
            .unwrap();
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);

        let latest = store.latest_value(&line.id, &def.id).await.unwrap().unwrap();
        assert_eq!(latest.value, "230");

        let history: Vec<i64> = store
            .list_values(&line.id, &def.id)
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.version)
            .collect();
        assert_eq!(history, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_update_node_is_all_or_nothing() {
        let store = MemoryStore::new();
        let line = node(&store, "Line", None).await;
        let mut renamed = line.clone();
        renamed.name = "Line 1".to_string();

        let bad = vec![NewAttributeValue::new(line.id.clone(), "missing".into(), "x".into())];
        assert!(store.update_node(renamed, bad).await.is_err());

        let stored = store.get_node(&line.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Line");
    }

    #[tokio::test]
    async fn test_delete_node_cascades_definitions_and_values() {
        let store = MemoryStore::new();
        let line = node(&store, "Line", None).await;
        let def = AttributeDefinition::new(line.id.clone(), "Voltage".into(), None, None, false);
        store
            .insert_definition(
                def.clone(),
                Some(NewAttributeValue::new(line.id.clone(), def.id.clone(), "220".into())),
            )
            .await
            .unwrap();

        assert!(store.delete_node(&line.id).await.unwrap());
        assert!(store.get_definition(&def.id).await.unwrap().is_none());
        assert!(store.list_values(&line.id, &def.id).await.unwrap().is_empty());
        assert!(!store.delete_node(&line.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_node_refuses_parent() {
        let store = MemoryStore::new();
        let line = node(&store, "Line", None).await;
        node(&store, "Station", Some(&line)).await;

        let err = AssetError::from(store.delete_node(&line.id).await.unwrap_err());
        assert!(matches!(err, AssetError::HasChildren(ref id) if id == &line.id));
        assert!(store.get_node(&line.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_node_rechecks_parent_chain_under_lock() {
        let store = MemoryStore::new();
        let line_a = node(&store, "Line A", None).await;
        let line_b = node(&store, "Line B", None).await;

        // Two moves validated against the same snapshot: A under B, B under A
        let mut a_under_b = line_a.clone();
        a_under_b.parent_id = Some(line_b.id.clone());
        let mut b_under_a = line_b.clone();
        b_under_a.parent_id = Some(line_a.id.clone());

        store.update_node(b_under_a, vec![]).await.unwrap();
        let err = AssetError::from(store.update_node(a_under_b, vec![]).await.unwrap_err());
        assert!(matches!(err, AssetError::CircularReference { .. }));

        let a = store.get_node(&line_a.id).await.unwrap().unwrap();
        assert!(a.is_root());
    }
}
