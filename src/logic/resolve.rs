use log::debug;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::logic::Hierarchy;
use crate::model::{AttributeDefinition, Id, ResolvedAttribute};
use crate::store::traits::Store;

/// Builds the attribute view a node sees through its ancestors
pub struct Resolver;

impl Resolver {
    /// Merge the definitions of every level of the ancestor chain, root first.
    /// A closer level replaces a farther one with the same name, so the node's
    /// own declaration (or its nearest ancestor's) wins. Result is sorted by
    /// name.
    pub async fn resolve<S: Store>(store: &S, node_id: &Id) -> Result<Vec<ResolvedAttribute>> {
        let chain = Hierarchy::get_ancestor_chain(store, node_id).await?;
        let mut by_name: BTreeMap<String, ResolvedAttribute> = BTreeMap::new();

        for level in &chain {
            for definition in store.list_definitions(&level.id).await? {
                let resolved = Self::with_current_value(store, definition, node_id).await?;
                by_name.insert(resolved.definition.name.clone(), resolved);
            }
        }

        debug!(
            "Resolved {} attribute(s) for node '{}' over {} level(s)",
            by_name.len(),
            node_id,
            chain.len()
        );
        Ok(by_name.into_values().collect())
    }

    /// Only the entries the node inherits from ancestors
    pub async fn resolve_inherited<S: Store>(
        store: &S,
        node_id: &Id,
    ) -> Result<Vec<ResolvedAttribute>> {
        let mut view = Self::resolve(store, node_id).await?;
        view.retain(|attribute| attribute.is_inherited);
        Ok(view)
    }

    /// The node's own definitions with their current values, sorted by name
    pub async fn resolve_own<S: Store>(store: &S, node_id: &Id) -> Result<Vec<ResolvedAttribute>> {
        Hierarchy::get_node(store, node_id).await?;

        let mut own = Vec::new();
        for definition in store.list_definitions(node_id).await? {
            own.push(Self::with_current_value(store, definition, node_id).await?);
        }
        Ok(own)
    }

    async fn with_current_value<S: Store>(
        store: &S,
        definition: AttributeDefinition,
        viewer_id: &Id,
    ) -> Result<ResolvedAttribute> {
        let source = definition.owner_node_id.clone();
        let value = store
            .latest_value(&source, &definition.id)
            .await?
            .map(|v| v.value);

        Ok(ResolvedAttribute {
            is_inherited: &source != viewer_id,
            source_node_id: source,
            definition,
            value,
        })
    }
}
