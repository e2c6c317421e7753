use anyhow::{anyhow, Context, Result};
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    PgPool, Postgres, Row, Transaction,
};

use crate::error::AssetError;
use crate::model::{AttributeDefinition, AttributeValue, Id, NewAttributeValue, Node};
use crate::store::traits::{AttributeStore, NodeStore, ValueStore};

const NODE_COLUMNS: &str = "id, name, parent_id, created_at, updated_at";
const DEFINITION_COLUMNS: &str =
    "id, owner_node_id, name, description, validation_pattern, is_reference, created_at, updated_at";
const VALUE_COLUMNS: &str = "id, node_id, attribute_id, value, version, created_at";

/// SQLSTATE raised when a delete would leave a dangling foreign key
const FOREIGN_KEY_VIOLATION: &str = "23503";

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store with the given database URL
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to create PostgreSQL connection pool")?;

        Ok(Self { pool })
    }

    /// Run the embedded database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .context("Failed to start transaction")
    }
}

fn node_from_row(row: &PgRow) -> Result<Node> {
    Ok(Node {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        parent_id: row.try_get("parent_id")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn definition_from_row(row: &PgRow) -> Result<AttributeDefinition> {
    Ok(AttributeDefinition {
        id: row.try_get("id")?,
        owner_node_id: row.try_get("owner_node_id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        validation_pattern: row.try_get("validation_pattern")?,
        is_reference: row.try_get("is_reference")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn value_from_row(row: &PgRow) -> Result<AttributeValue> {
    Ok(AttributeValue {
        id: row.try_get("id")?,
        node_id: row.try_get("node_id")?,
        attribute_id: row.try_get("attribute_id")?,
        value: row.try_get("value")?,
        version: row.try_get("version")?,
        created_at: row.try_get("created_at")?,
    })
}

/// Append the next version of a value inside an open transaction.
/// The unique (node_id, attribute_id, version) constraint rejects a
/// concurrent writer that computed the same version.
async fn append_in_tx(
    tx: &mut Transaction<'_, Postgres>,
    value: NewAttributeValue,
) -> Result<AttributeValue> {
    let next: i64 = sqlx::query_scalar(
        "SELECT COALESCE(MAX(version), 0) + 1 FROM attribute_values WHERE node_id = $1 AND attribute_id = $2",
    )
    .bind(&value.node_id)
    .bind(&value.attribute_id)
    .fetch_one(&mut **tx)
    .await
    .context("Failed to compute next value version")?;

    let stored = value.into_version(next);
    sqlx::query(
        r#"
        INSERT INTO attribute_values (id, node_id, attribute_id, value, version, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(&stored.id)
    .bind(&stored.node_id)
    .bind(&stored.attribute_id)
    .bind(&stored.value)
    .bind(stored.version)
    .bind(stored.created_at)
    .execute(&mut **tx)
    .await
    .context("Failed to insert attribute value")?;

    Ok(stored)
}

#[async_trait::async_trait]
impl NodeStore for PostgresStore {
    async fn get_node(&self, id: &Id) -> Result<Option<Node>> {
        let row = sqlx::query(&format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch node")?;

        row.as_ref().map(node_from_row).transpose()
    }

    async fn list_children(&self, parent_id: &Id) -> Result<Vec<Node>> {
        let rows = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE parent_id = $1 ORDER BY name, id"
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list child nodes")?;

        rows.iter().map(node_from_row).collect()
    }

    async fn list_roots(&self) -> Result<Vec<Node>> {
        let rows = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE parent_id IS NULL ORDER BY name, id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list root nodes")?;

        rows.iter().map(node_from_row).collect()
    }

    async fn has_children(&self, id: &Id) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM nodes WHERE parent_id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .context("Failed to check for child nodes")?;

        Ok(exists)
    }

    async fn insert_node(&self, node: Node) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO nodes (id, name, parent_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&node.id)
        .bind(&node.name)
        .bind(&node.parent_id)
        .bind(node.created_at)
        .bind(node.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert node")?;

        Ok(())
    }

    async fn update_node(
        &self,
        node: Node,
        values: Vec<NewAttributeValue>,
    ) -> Result<Vec<AttributeValue>> {
        let mut tx = self.begin().await?;

        let result = sqlx::query(
            "UPDATE nodes SET name = $2, parent_id = $3, updated_at = $4 WHERE id = $1",
        )
        .bind(&node.id)
        .bind(&node.name)
        .bind(&node.parent_id)
        .bind(node.updated_at)
        .execute(&mut *tx)
        .await
        .context("Failed to update node")?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("Node does not exist: {}", node.id));
        }

        let mut appended = Vec::with_capacity(values.len());
        for value in values {
            appended.push(append_in_tx(&mut tx, value).await?);
        }

        tx.commit().await.context("Failed to commit node update")?;
        Ok(appended)
    }

    async fn delete_node(&self, id: &Id) -> Result<bool> {
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM attribute_values
            WHERE node_id = $1
               OR attribute_id IN (SELECT id FROM attribute_definitions WHERE owner_node_id = $1)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .context("Failed to delete node values")?;

        sqlx::query("DELETE FROM attribute_definitions WHERE owner_node_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete node attributes")?;

        // A child inserted after the caller's check trips the parent foreign key
        let result = match sqlx::query("DELETE FROM nodes WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
        {
            Ok(result) => result,
            Err(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some(FOREIGN_KEY_VIOLATION) =>
            {
                return Err(AssetError::HasChildren(id.clone()).into());
            }
            Err(err) => return Err(err).context("Failed to delete node"),
        };

        tx.commit().await.context("Failed to commit node delete")?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl AttributeStore for PostgresStore {
    async fn get_definition(&self, id: &Id) -> Result<Option<AttributeDefinition>> {
        let row = sqlx::query(&format!(
            "SELECT {DEFINITION_COLUMNS} FROM attribute_definitions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch attribute")?;

        row.as_ref().map(definition_from_row).transpose()
    }

    async fn list_definitions(&self, owner_node_id: &Id) -> Result<Vec<AttributeDefinition>> {
        let rows = sqlx::query(&format!(
            "SELECT {DEFINITION_COLUMNS} FROM attribute_definitions WHERE owner_node_id = $1 ORDER BY name, id"
        ))
        .bind(owner_node_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list attributes")?;

        rows.iter().map(definition_from_row).collect()
    }

    async fn insert_definition(
        &self,
        definition: AttributeDefinition,
        initial_value: Option<NewAttributeValue>,
    ) -> Result<Option<AttributeValue>> {
        let mut tx = self.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO attribute_definitions
                (id, owner_node_id, name, description, validation_pattern, is_reference, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&definition.id)
        .bind(&definition.owner_node_id)
        .bind(&definition.name)
        .bind(&definition.description)
        .bind(&definition.validation_pattern)
        .bind(definition.is_reference)
        .bind(definition.created_at)
        .bind(definition.updated_at)
        .execute(&mut *tx)
        .await
        .context("Failed to insert attribute")?;

        let appended = match initial_value {
            Some(value) => Some(append_in_tx(&mut tx, value).await?),
            None => None,
        };

        tx.commit().await.context("Failed to commit attribute insert")?;
        Ok(appended)
    }

    async fn update_definition(&self, definition: AttributeDefinition) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE attribute_definitions
            SET name = $2, description = $3, validation_pattern = $4, is_reference = $5, updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(&definition.id)
        .bind(&definition.name)
        .bind(&definition.description)
        .bind(&definition.validation_pattern)
        .bind(definition.is_reference)
        .bind(definition.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to update attribute")?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("Attribute does not exist: {}", definition.id));
        }
        Ok(())
    }

    async fn delete_definition(&self, id: &Id) -> Result<bool> {
        let mut tx = self.begin().await?;

        sqlx::query("DELETE FROM attribute_values WHERE attribute_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete attribute values")?;

        let result = sqlx::query("DELETE FROM attribute_definitions WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete attribute")?;

        tx.commit().await.context("Failed to commit attribute delete")?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl ValueStore for PostgresStore {
    async fn append_value(&self, value: NewAttributeValue) -> Result<AttributeValue> {
        let mut tx = self.begin().await?;
        let stored = append_in_tx(&mut tx, value).await?;
        tx.commit().await.context("Failed to commit attribute value")?;
        Ok(stored)
    }

    async fn latest_value(
        &self,
        node_id: &Id,
        attribute_id: &Id,
    ) -> Result<Option<AttributeValue>> {
        let row = sqlx::query(&format!(
            "SELECT {VALUE_COLUMNS} FROM attribute_values WHERE node_id = $1 AND attribute_id = $2 ORDER BY version DESC LIMIT 1"
        ))
        .bind(node_id)
        .bind(attribute_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch current attribute value")?;

        row.as_ref().map(value_from_row).transpose()
    }

    async fn list_values(&self, node_id: &Id, attribute_id: &Id) -> Result<Vec<AttributeValue>> {
        let rows = sqlx::query(&format!(
            "SELECT {VALUE_COLUMNS} FROM attribute_values WHERE node_id = $1 AND attribute_id = $2 ORDER BY version DESC"
        ))
        .bind(node_id)
        .bind(attribute_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list attribute values")?;

        rows.iter().map(value_from_row).collect()
    }
}
