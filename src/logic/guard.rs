use crate::error::Result;
use crate::logic::Hierarchy;
use crate::model::Id;
use crate::store::traits::Store;

/// Keeps the parent relation acyclic
pub struct CycleGuard;

impl CycleGuard {
    /// True when placing `node_id` under `proposed_parent_id` would close a
    /// loop: the parent is the node itself or one of its descendants.
    pub async fn would_create_cycle<S: Store>(
        store: &S,
        node_id: &Id,
        proposed_parent_id: &Id,
    ) -> Result<bool> {
        if node_id == proposed_parent_id {
            return Ok(true);
        }

        let chain = Hierarchy::get_ancestor_chain(store, proposed_parent_id).await?;
        Ok(chain.iter().any(|ancestor| &ancestor.id == node_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AssetError;
    use crate::model::NewNode;
    use crate::store::MemoryStore;

    async fn create(store: &MemoryStore, name: &str, parent_id: Option<Id>) -> Id {
        Hierarchy::create_node(
            store,
            NewNode {
                name: name.to_string(),
                parent_id,
            },
        )
        .await
        .unwrap()
        .id
    }

    #[tokio::test]
    async fn test_cycle_detection() {
        let store = MemoryStore::new();
        let line = create(&store, "Line", None).await;
        let station = create(&store, "Station1", Some(line.clone())).await;
        let robot = create(&store, "Robot", Some(station.clone())).await;
        let other = create(&store, "Other", None).await;

        assert!(CycleGuard::would_create_cycle(&store, &line, &line).await.unwrap());
        assert!(CycleGuard::would_create_cycle(&store, &line, &station).await.unwrap());
        assert!(CycleGuard::would_create_cycle(&store, &line, &robot).await.unwrap());
        assert!(!CycleGuard::would_create_cycle(&store, &robot, &other).await.unwrap());
        // moving up the tree is always fine
        assert!(!CycleGuard::would_create_cycle(&store, &robot, &line).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_parent_is_not_found() {
        let store = MemoryStore::new();
        let line = create(&store, "Line", None).await;
        let result = CycleGuard::would_create_cycle(&store, &line, &"ghost".to_string()).await;
        assert!(matches!(result, Err(AssetError::NotFound { .. })));
    }
}
