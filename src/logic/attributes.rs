use log::{debug, info};

use crate::error::{AssetError, Result};
use crate::logic::{Hierarchy, Resolver, ValueValidator};
use crate::model::{
    normalize_name, now, AttributeDefinition, AttributeDefinitionUpdate, AttributeValue, Id,
    NewAttributeDefinition, NewAttributeValue, Node,
};
use crate::store::traits::Store;

/// Attribute definitions and their append-only values
pub struct Attributes;

impl Attributes {
    /// Declare an attribute on `owner_id`, optionally with a first value.
    ///
    /// A plain declaration may not reuse any name visible on the owner. With
    /// `overrides` set, an inherited name may be shadowed; fields left out are
    /// carried over from the shadowed definition. Either way the name may not
    /// already be declared below the owner, which would turn that declaration
    /// into an override nobody asked for.
    pub async fn define_attribute<S: Store>(
        store: &S,
        owner_id: &Id,
        input: NewAttributeDefinition,
    ) -> Result<(AttributeDefinition, Option<AttributeValue>)> {
        Hierarchy::get_node(store, owner_id).await?;
        let name = normalize_name(&input.name)
            .ok_or_else(|| AssetError::Validation("attribute name must not be empty".to_string()))?;

        let view = Resolver::resolve(store, owner_id).await?;
        let shadowed = match view.into_iter().find(|a| a.definition.name == name) {
            Some(existing) if existing.is_inherited && input.overrides => Some(existing.definition),
            Some(_) => {
                return Err(AssetError::DuplicateName {
                    node_id: owner_id.clone(),
                    name,
                })
            }
            None => None,
        };
        Self::ensure_not_declared_below(store, owner_id, &name).await?;

        let definition = match &shadowed {
            Some(base) => AttributeDefinition::new(
                owner_id.clone(),
                name,
                input.description.or_else(|| base.description.clone()),
                input
                    .validation_pattern
                    .or_else(|| base.validation_pattern.clone()),
                input.is_reference.unwrap_or(base.is_reference),
            ),
            None => AttributeDefinition::new(
                owner_id.clone(),
                name,
                input.description,
                input.validation_pattern,
                input.is_reference.unwrap_or(false),
            ),
        };
        // Surface a malformed pattern in the log as soon as it is stored
        ValueValidator::compile_pattern(&definition);

        let initial = match input.value {
            Some(value) => {
                ValueValidator::check(store, &definition, &value).await?;
                Some(NewAttributeValue::new(
                    owner_id.clone(),
                    definition.id.clone(),
                    value,
                ))
            }
            None => None,
        };

        let value = store
            .insert_definition(definition.clone(), initial)
            .await?;
        match &shadowed {
            Some(base) => info!(
                "Node '{}' overrides attribute '{}' inherited from '{}'",
                owner_id, definition.name, base.owner_node_id
            ),
            None => info!(
                "Defined attribute '{}' ({}) on node '{}'",
                definition.name, definition.id, owner_id
            ),
        }
        Ok((definition, value))
    }

    async fn ensure_not_declared_below<S: Store>(store: &S, node_id: &Id, name: &str) -> Result<()> {
        for descendant in Hierarchy::get_descendants(store, node_id).await? {
            let own = store.list_definitions(&descendant.id).await?;
            if own.iter().any(|d| d.name == name) {
                return Err(AssetError::DuplicateName {
                    node_id: descendant.id,
                    name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    pub async fn get_definition<S: Store>(store: &S, id: &Id) -> Result<AttributeDefinition> {
        store
            .get_definition(id)
            .await?
            .ok_or_else(|| AssetError::attribute_not_found(id))
    }

    /// Definitions declared directly on the node, ordered by name
    pub async fn own_definitions<S: Store>(
        store: &S,
        node_id: &Id,
    ) -> Result<Vec<AttributeDefinition>> {
        Hierarchy::get_node(store, node_id).await?;
        Ok(store.list_definitions(node_id).await?)
    }

    /// Change a definition in place. Descendants pick the change up on their
    /// next resolve; nothing is copied to them.
    pub async fn update_definition<S: Store>(
        store: &S,
        id: &Id,
        update: AttributeDefinitionUpdate,
    ) -> Result<AttributeDefinition> {
        let mut definition = Self::get_definition(store, id).await?;

        if let Some(name) = &update.name {
            let name = normalize_name(name).ok_or_else(|| {
                AssetError::Validation("attribute name must not be empty".to_string())
            })?;
            if name != definition.name {
                let view = Resolver::resolve(store, &definition.owner_node_id).await?;
                if view
                    .iter()
                    .any(|a| a.definition.name == name && a.definition.id != definition.id)
                {
                    return Err(AssetError::DuplicateName {
                        node_id: definition.owner_node_id.clone(),
                        name,
                    });
                }
                Self::ensure_not_declared_below(store, &definition.owner_node_id, &name).await?;
                definition.name = name;
            }
        }
        if let Some(description) = update.description {
            definition.description = description;
        }
        if let Some(pattern) = update.validation_pattern {
            definition.validation_pattern = pattern;
            ValueValidator::compile_pattern(&definition);
        }
        if let Some(is_reference) = update.is_reference {
            definition.is_reference = is_reference;
        }

        definition.updated_at = now();
        store.update_definition(definition.clone()).await?;
        info!("Updated attribute '{}' ({})", definition.name, definition.id);
        Ok(definition)
    }

    /// Remove a definition and every value recorded for it
    pub async fn delete_definition<S: Store>(store: &S, id: &Id) -> Result<()> {
        let definition = Self::get_definition(store, id).await?;
        if !store.delete_definition(id).await? {
            return Err(AssetError::attribute_not_found(id));
        }
        info!(
            "Deleted attribute '{}' ({}) from node '{}'",
            definition.name, definition.id, definition.owner_node_id
        );
        Ok(())
    }

    /// Validate and append a new version of the node's value for an attribute
    /// it declares
    pub async fn record_value<S: Store>(
        store: &S,
        node_id: &Id,
        attribute_id: &Id,
        raw: String,
    ) -> Result<AttributeValue> {
        let node = Hierarchy::get_node(store, node_id).await?;
        let value = Self::prepare_value(store, &node, attribute_id, raw).await?;
        let stored = store.append_value(value).await?;
        debug!(
            "Recorded version {} of attribute '{}' on node '{}'",
            stored.version, attribute_id, node_id
        );
        Ok(stored)
    }

    /// Check a value for one of `node`'s own attributes without writing it.
    /// Values live at the definition site: an attribute inherited from an
    /// ancestor is not found here until the node overrides it.
    pub(crate) async fn prepare_value<S: Store>(
        store: &S,
        node: &Node,
        attribute_id: &Id,
        raw: String,
    ) -> Result<NewAttributeValue> {
        let definition = Self::get_definition(store, attribute_id).await?;
        if definition.owner_node_id != node.id {
            return Err(AssetError::NotFound {
                entity: "attribute on this node",
                id: attribute_id.clone(),
            });
        }

        ValueValidator::check(store, &definition, &raw).await?;
        Ok(NewAttributeValue::new(
            node.id.clone(),
            definition.id,
            raw,
        ))
    }

    pub async fn current_value<S: Store>(
        store: &S,
        node_id: &Id,
        attribute_id: &Id,
    ) -> Result<Option<String>> {
        Self::get_definition(store, attribute_id).await?;
        Ok(store
            .latest_value(node_id, attribute_id)
            .await?
            .map(|v| v.value))
    }

    /// Every recorded version, newest first
    pub async fn history<S: Store>(
        store: &S,
        node_id: &Id,
        attribute_id: &Id,
    ) -> Result<Vec<AttributeValue>> {
        Hierarchy::get_node(store, node_id).await?;
        Self::get_definition(store, attribute_id).await?;
        Ok(store.list_values(node_id, attribute_id).await?)
    }
}
