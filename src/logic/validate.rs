use log::warn;
use regex::Regex;

use crate::error::{AssetError, Result};
use crate::model::AttributeDefinition;
use crate::store::traits::Store;

/// Checks a raw value against its attribute definition
pub struct ValueValidator;

impl ValueValidator {
    /// Compile a stored pattern. A malformed pattern yields `None` and is
    /// logged; values for that attribute are then accepted unconstrained.
    pub fn compile_pattern(definition: &AttributeDefinition) -> Option<Regex> {
        let pattern = definition.validation_pattern.as_deref()?;
        if pattern.is_empty() {
            return None;
        }
        match Regex::new(pattern) {
            Ok(regex) => Some(regex),
            Err(e) => {
                warn!(
                    "Ignoring invalid pattern '{}' on attribute '{}' ({}): {}",
                    pattern, definition.name, definition.id, e
                );
                None
            }
        }
    }

    pub fn check_pattern(definition: &AttributeDefinition, value: &str) -> Result<()> {
        match Self::compile_pattern(definition) {
            Some(regex) if !regex.is_match(value) => Err(AssetError::Validation(format!(
                "value '{}' for attribute '{}' does not match pattern '{}'",
                value,
                definition.name,
                regex.as_str()
            ))),
            _ => Ok(()),
        }
    }

    /// Pattern check plus, for reference attributes, that the value names an
    /// existing node
    pub async fn check<S: Store>(
        store: &S,
        definition: &AttributeDefinition,
        value: &str,
    ) -> Result<()> {
        Self::check_pattern(definition, value)?;

        if definition.is_reference && store.get_node(&value.to_string()).await?.is_none() {
            return Err(AssetError::Validation(format!(
                "attribute '{}' references node '{}', which does not exist",
                definition.name, value
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;
    use crate::store::{MemoryStore, NodeStore};

    fn definition(pattern: Option<&str>, is_reference: bool) -> AttributeDefinition {
        AttributeDefinition::new(
            "owner".to_string(),
            "Voltage".to_string(),
            None,
            pattern.map(str::to_string),
            is_reference,
        )
    }

    #[test]
    fn test_pattern_match_and_mismatch() {
        let def = definition(Some("^[0-9]+$"), false);
        assert!(ValueValidator::check_pattern(&def, "220").is_ok());
        assert!(matches!(
            ValueValidator::check_pattern(&def, "220V"),
            Err(AssetError::Validation(_))
        ));
    }

    #[test]
    fn test_unanchored_pattern_searches() {
        let def = definition(Some("[0-9]"), false);
        assert!(ValueValidator::check_pattern(&def, "V220").is_ok());
        assert!(ValueValidator::check_pattern(&def, "high").is_err());
    }

    #[test]
    fn test_invalid_or_missing_pattern_is_permissive() {
        assert!(ValueValidator::check_pattern(&definition(Some("([0-9"), false), "anything").is_ok());
        assert!(ValueValidator::check_pattern(&definition(None, false), "anything").is_ok());
        assert!(ValueValidator::check_pattern(&definition(Some(""), false), "anything").is_ok());
    }

    #[tokio::test]
    async fn test_reference_values_must_name_a_node() {
        let store = MemoryStore::new();
        let target = Node::new("Supplier".to_string(), None);
        store.insert_node(target.clone()).await.unwrap();

        let def = definition(None, true);
        assert!(ValueValidator::check(&store, &def, &target.id).await.is_ok());
        assert!(matches!(
            ValueValidator::check(&store, &def, "ghost").await,
            Err(AssetError::Validation(_))
        ));
    }
}
