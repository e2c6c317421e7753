use log::{debug, info};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{AssetError, Result};
use crate::logic::{Attributes, CycleGuard};
use crate::model::{normalize_name, AttributeValue, Id, NewNode, Node, NodeUpdate};
use crate::store::traits::Store;

/// Upper bound on hierarchy depth, counted in nodes from a root to a leaf.
/// Writes that would exceed it are rejected; a walk that exceeds it is
/// treated as a corrupt parent chain.
pub const MAX_HIERARCHY_DEPTH: usize = 256;

/// Node lifecycle and hierarchy walks
pub struct Hierarchy;

impl Hierarchy {
    pub async fn create_node<S: Store>(store: &S, input: NewNode) -> Result<Node> {
        let name = normalize_name(&input.name)
            .ok_or_else(|| AssetError::Validation("node name must not be empty".to_string()))?;

        if let Some(parent_id) = &input.parent_id {
            let parent_depth = Self::get_ancestor_chain(store, parent_id).await?.len();
            Self::ensure_depth(parent_id, parent_depth + 1)?;
        }

        let node = Node::new(name, input.parent_id);
        store.insert_node(node.clone()).await?;
        info!(
            "Created node '{}' ({}) under {:?}",
            node.name, node.id, node.parent_id
        );
        Ok(node)
    }

    pub async fn get_node<S: Store>(store: &S, id: &Id) -> Result<Node> {
        store
            .get_node(id)
            .await?
            .ok_or_else(|| AssetError::node_not_found(id))
    }

    pub async fn get_children<S: Store>(store: &S, id: &Id) -> Result<Vec<Node>> {
        Self::get_node(store, id).await?;
        Ok(store.list_children(id).await?)
    }

    pub async fn get_roots<S: Store>(store: &S) -> Result<Vec<Node>> {
        Ok(store.list_roots().await?)
    }

    /// The chain `[root, ..., parent, node]`.
    ///
    /// Fails with `Integrity` when the parent links revisit a node, run past
    /// `MAX_HIERARCHY_DEPTH`, or point at a node that no longer exists.
    pub async fn get_ancestor_chain<S: Store>(store: &S, id: &Id) -> Result<Vec<Node>> {
        let mut current = Self::get_node(store, id).await?;
        let mut visited: HashSet<Id> = HashSet::new();
        let mut chain = Vec::new();

        loop {
            visited.insert(current.id.clone());
            let parent_id = current.parent_id.clone();
            chain.push(current);

            let Some(parent_id) = parent_id else {
                break;
            };
            if visited.contains(&parent_id) {
                return Err(AssetError::Integrity(format!(
                    "parent cycle through node '{}' while walking ancestors of '{}'",
                    parent_id, id
                )));
            }
            if chain.len() >= MAX_HIERARCHY_DEPTH {
                return Err(AssetError::Integrity(format!(
                    "ancestor chain of '{}' exceeds {} levels",
                    id, MAX_HIERARCHY_DEPTH
                )));
            }

            current = store.get_node(&parent_id).await?.ok_or_else(|| {
                AssetError::Integrity(format!("dangling parent link to '{}'", parent_id))
            })?;
        }

        chain.reverse();
        Ok(chain)
    }

    /// All descendants, breadth first, children of each level ordered by name
    pub async fn get_descendants<S: Store>(store: &S, id: &Id) -> Result<Vec<Node>> {
        Self::get_node(store, id).await?;

        let mut visited: HashSet<Id> = HashSet::from([id.clone()]);
        let mut queue: VecDeque<(Id, usize)> = VecDeque::from([(id.clone(), 0)]);
        let mut descendants = Vec::new();

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= MAX_HIERARCHY_DEPTH {
                return Err(AssetError::Integrity(format!(
                    "descendants of '{}' exceed {} levels",
                    id, MAX_HIERARCHY_DEPTH
                )));
            }
            for child in store.list_children(&current).await? {
                if !visited.insert(child.id.clone()) {
                    return Err(AssetError::Integrity(format!(
                        "node '{}' reached twice while walking descendants of '{}'",
                        child.id, id
                    )));
                }
                queue.push_back((child.id.clone(), depth + 1));
                descendants.push(child);
            }
        }

        Ok(descendants)
    }

    /// Number of levels in the subtree rooted at `id`, counting the node itself
    pub async fn subtree_height<S: Store>(store: &S, id: &Id) -> Result<usize> {
        let descendants = Self::get_descendants(store, id).await?;

        // Breadth-first order puts every parent before its children
        let mut depth_of: HashMap<&Id, usize> = HashMap::from([(id, 1)]);
        let mut height = 1;
        for node in &descendants {
            let depth = node
                .parent_id
                .as_ref()
                .and_then(|parent| depth_of.get(parent))
                .map_or(1, |d| d + 1);
            height = height.max(depth);
            depth_of.insert(&node.id, depth);
        }
        Ok(height)
    }

    fn ensure_depth(parent_id: &Id, depth: usize) -> Result<()> {
        if depth > MAX_HIERARCHY_DEPTH {
            return Err(AssetError::Validation(format!(
                "placing nodes under '{}' would make the hierarchy {} levels deep, the limit is {}",
                parent_id, depth, MAX_HIERARCHY_DEPTH
            )));
        }
        Ok(())
    }

    /// Move a node under a new parent, or make it a root with `None`
    pub async fn reparent<S: Store>(
        store: &S,
        id: &Id,
        new_parent_id: Option<Id>,
    ) -> Result<Node> {
        let update = NodeUpdate {
            parent_id: Some(new_parent_id),
            ..NodeUpdate::default()
        };
        let (node, _) = Self::update_node(store, id, update).await?;
        Ok(node)
    }

    pub async fn rename_node<S: Store>(store: &S, id: &Id, name: &str) -> Result<Node> {
        let update = NodeUpdate {
            name: Some(name.to_string()),
            ..NodeUpdate::default()
        };
        let (node, _) = Self::update_node(store, id, update).await?;
        Ok(node)
    }

    /// Apply a rename, a reparent and value records as one write.
    /// Everything is checked before the store is touched.
    pub async fn update_node<S: Store>(
        store: &S,
        id: &Id,
        update: NodeUpdate,
    ) -> Result<(Node, Vec<AttributeValue>)> {
        let mut node = Self::get_node(store, id).await?;

        if let Some(name) = &update.name {
            node.name = normalize_name(name)
                .ok_or_else(|| AssetError::Validation("node name must not be empty".to_string()))?;
        }

        if let Some(new_parent) = update.parent_id {
            if let Some(parent_id) = &new_parent {
                if CycleGuard::would_create_cycle(store, id, parent_id).await? {
                    return Err(AssetError::CircularReference {
                        node_id: id.clone(),
                        parent_id: parent_id.clone(),
                    });
                }
                if new_parent != node.parent_id {
                    let parent_depth = Self::get_ancestor_chain(store, parent_id).await?.len();
                    let height = Self::subtree_height(store, id).await?;
                    Self::ensure_depth(parent_id, parent_depth + height)?;
                }
            }
            if new_parent != node.parent_id {
                info!(
                    "Moving node '{}' from {:?} to {:?}",
                    id, node.parent_id, new_parent
                );
            }
            node.parent_id = new_parent;
        }

        let mut values = Vec::with_capacity(update.attributes.len());
        for input in update.attributes {
            values.push(
                Attributes::prepare_value(store, &node, &input.attribute_id, input.value).await?,
            );
        }

        node.touch();
        let appended = store.update_node(node.clone(), values).await?;
        debug!(
            "Updated node '{}' with {} new attribute value(s)",
            id,
            appended.len()
        );
        Ok((node, appended))
    }

    /// Delete a leaf node with its attribute definitions and values
    pub async fn delete_node<S: Store>(store: &S, id: &Id) -> Result<()> {
        Self::get_node(store, id).await?;

        if store.has_children(id).await? {
            return Err(AssetError::HasChildren(id.clone()));
        }

        if !store.delete_node(id).await? {
            return Err(AssetError::node_not_found(id));
        }
        info!("Deleted node '{}'", id);
        Ok(())
    }
}
