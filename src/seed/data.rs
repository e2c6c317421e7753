use anyhow::Result;
use log::info;

use crate::logic::{Attributes, Hierarchy};
use crate::model::{Id, NewAttributeDefinition, NewNode, Node};
use crate::store::traits::Store;

/// Helper function to create a node under an optional parent
async fn create_node<S: Store>(store: &S, name: &str, parent: Option<&Node>) -> Result<Node> {
    Ok(Hierarchy::create_node(
        store,
        NewNode {
            name: name.to_string(),
            parent_id: parent.map(|p| p.id.clone()),
        },
    )
    .await?)
}

/// Helper function to declare a validated attribute with a first value
async fn define<S: Store>(
    store: &S,
    owner: &Node,
    name: &str,
    description: &str,
    pattern: Option<&str>,
    value: &str,
    overrides: bool,
) -> Result<Id> {
    let (definition, _) = Attributes::define_attribute(
        store,
        &owner.id,
        NewAttributeDefinition {
            name: name.to_string(),
            description: Some(description.to_string()),
            validation_pattern: pattern.map(str::to_string),
            is_reference: None,
            overrides,
            value: Some(value.to_string()),
        },
    )
    .await?;
    Ok(definition.id)
}

/// Load a small production line: one line with two stations, the second of
/// which overrides the line voltage.
pub async fn load_seed_data<S: Store>(store: &S) -> Result<()> {
    if !Hierarchy::get_roots(store).await?.is_empty() {
        info!("Hierarchy already populated, skipping seed data");
        return Ok(());
    }

    let line = create_node(store, "Line", None).await?;
    define(store, &line, "Voltage", "Supply voltage in volts", Some("^[0-9]+$"), "220", false).await?;
    define(store, &line, "Location", "Hall and bay", None, "Hall A / Bay 3", false).await?;

    let station1 = create_node(store, "Station1", Some(&line)).await?;
    define(store, &station1, "CycleTime", "Target cycle time in seconds", Some("^[0-9]+$"), "45", false).await?;

    let station2 = create_node(store, "Station2", Some(&line)).await?;
    define(store, &station2, "Voltage", "Supply voltage in volts", None, "110", true).await?;

    create_node(store, "Robot", Some(&station1)).await?;

    info!("Seed hierarchy loaded under root '{}'", line.id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::Resolver;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_seed_data_loads_once() {
        let store = MemoryStore::new();
        load_seed_data(&store).await.unwrap();
        load_seed_data(&store).await.unwrap();

        let roots = Hierarchy::get_roots(&store).await.unwrap();
        assert_eq!(roots.len(), 1);

        let stations = Hierarchy::get_children(&store, &roots[0].id).await.unwrap();
        let station2 = stations.iter().find(|n| n.name == "Station2").unwrap();
        let view = Resolver::resolve(&store, &station2.id).await.unwrap();
        let voltage = view.iter().find(|a| a.name() == "Voltage").unwrap();
        assert_eq!(voltage.value.as_deref(), Some("110"));
        assert!(!voltage.is_inherited);
    }
}
