use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use uuid::Uuid;

pub type Id = String;

pub fn generate_id() -> Id {
    Uuid::new_v4().to_string()
}

/// Current UTC time, used for all audit timestamps
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Trim a user supplied name, returning `None` when nothing is left
pub fn normalize_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Deserializer for tri-state patch fields: a present key (even `null`)
/// becomes `Some(..)`, an absent key stays `None` through `#[serde(default)]`.
pub(crate) fn deserialize_present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique_uuids() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert!(Uuid::parse_str(&a).is_ok());
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Line "), Some("Line".to_string()));
        assert_eq!(normalize_name("   "), None);
        assert_eq!(normalize_name(""), None);
    }
}
