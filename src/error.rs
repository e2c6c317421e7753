use crate::model::Id;

pub type Result<T> = std::result::Result<T, AssetError>;

/// Failures of hierarchy and attribute operations
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: Id },

    #[error("attribute '{name}' is already visible on node '{node_id}'")]
    DuplicateName { node_id: Id, name: String },

    #[error("{0}")]
    Validation(String),

    #[error("node '{node_id}' cannot be placed under '{parent_id}': the parent is the node itself or one of its descendants")]
    CircularReference { node_id: Id, parent_id: Id },

    #[error("node '{0}' still has children")]
    HasChildren(Id),

    /// The stored hierarchy is corrupt (a parent cycle or a dangling link)
    #[error("hierarchy integrity violation: {0}")]
    Integrity(String),

    #[error(transparent)]
    Storage(anyhow::Error),
}

/// Stores report through `anyhow`; a domain error a store raised itself
/// (for example a constraint it enforces under its own lock) comes back out
/// as that error, everything else is a storage failure.
impl From<anyhow::Error> for AssetError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<AssetError>() {
            Ok(domain) => domain,
            Err(err) => Self::Storage(err),
        }
    }
}

impl AssetError {
    pub fn node_not_found(id: &str) -> Self {
        Self::NotFound {
            entity: "node",
            id: id.to_string(),
        }
    }

    pub fn attribute_not_found(id: &str) -> Self {
        Self::NotFound {
            entity: "attribute",
            id: id.to_string(),
        }
    }

    /// Stable machine readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::DuplicateName { .. } => "duplicate_name",
            Self::Validation(_) => "validation_failed",
            Self::CircularReference { .. } => "circular_reference",
            Self::HasChildren(_) => "has_children",
            Self::Integrity(_) => "integrity_error",
            Self::Storage(_) => "storage_error",
        }
    }

    /// Whether the failure is the server's fault rather than the caller's
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Integrity(_) | Self::Storage(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_and_codes() {
        let err = AssetError::node_not_found("n1");
        assert_eq!(err.to_string(), "node 'n1' not found");
        assert_eq!(err.code(), "not_found");
        assert!(!err.is_internal());

        let err = AssetError::HasChildren("line".into());
        assert_eq!(err.code(), "has_children");

        let err: AssetError = anyhow::anyhow!("connection reset").into();
        assert_eq!(err.to_string(), "connection reset");
        assert!(err.is_internal());
        assert!(AssetError::Integrity("loop".into()).is_internal());
    }

    #[test]
    fn test_domain_error_survives_storage_layer() {
        let raised = anyhow::Error::new(AssetError::HasChildren("line".into()));
        let err: AssetError = raised.into();
        assert!(matches!(err, AssetError::HasChildren(ref id) if id == "line"));

        let wrapped: anyhow::Error = anyhow::anyhow!("disk full").context("Failed to insert node");
        assert!(matches!(AssetError::from(wrapped), AssetError::Storage(_)));
    }
}
