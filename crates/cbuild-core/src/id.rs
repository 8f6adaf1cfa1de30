//! Logical identifiers for template resources.

use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Path component that is dropped entirely when deriving an id.
const HIDDEN_COMPONENT: &str = "Default";

/// Path component that is hashed but left out of the readable part.
const HIDDEN_FROM_HUMAN: &str = "Resource";

/// Logical ids are limited to 255 alphanumeric characters.
const MAX_LOGICAL_ID_LEN: usize = 255;

const HASH_LEN: usize = 8;

/// A logical resource id inside a template.
///
/// Ids are derived from the construct path of a resource (for example
/// `["Build", "Role"]`): the readable part is the alphanumeric content of
/// the path and, for nested paths, an 8 digit md5 suffix of the full path
/// keeps ids unique and stable across evaluations.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[display("{_0}")]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    /// Derive a logical id from a construct path.
    pub fn from_path(path: &[&str]) -> Result<Self> {
        let components: Vec<&str> = path
            .iter()
            .copied()
            .filter(|c| *c != HIDDEN_COMPONENT)
            .collect();

        if components.is_empty() {
            return Err(Error::InvalidInput(
                "logical id path has no components".to_string(),
            ));
        }

        let human: String = components
            .iter()
            .filter(|c| **c != HIDDEN_FROM_HUMAN)
            .flat_map(|c| c.chars().filter(char::is_ascii_alphanumeric))
            .collect();

        if components.len() == 1 {
            return Self::new(human);
        }

        let digest = md5::compute(components.join("/"));
        let hash = format!("{:x}", digest)[..HASH_LEN].to_uppercase();

        let max_human = MAX_LOGICAL_ID_LEN - HASH_LEN;
        let human: String = human.chars().take(max_human).collect();

        Self::new(format!("{}{}", human, hash))
    }

    /// Wrap an already formed id, validating its shape.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() || id.len() > MAX_LOGICAL_ID_LEN {
            return Err(Error::InvalidInput(format!(
                "logical id must be 1-{} characters: '{}'",
                MAX_LOGICAL_ID_LEN, id
            )));
        }
        if !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Error::InvalidInput(format!(
                "logical id must be alphanumeric: '{}'",
                id
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for LogicalId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_component_has_no_hash() {
        let id = LogicalId::from_path(&["Sources"]).unwrap();
        assert_eq!(id.as_str(), "Sources");
    }

    #[test]
    fn test_nested_path_gets_hash_suffix() {
        let id = LogicalId::from_path(&["Build", "Role"]).unwrap();
        assert!(id.as_str().starts_with("BuildRole"));
        assert_eq!(id.as_str().len(), "BuildRole".len() + 8);
        assert!(
            id.as_str()["BuildRole".len()..]
                .chars()
                .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase())
        );
    }

    #[test]
    fn test_resource_component_is_hidden_from_readable_part() {
        let id = LogicalId::from_path(&["Artifacts", "Resource"]).unwrap();
        assert!(id.as_str().starts_with("Artifacts"));
        assert!(!id.as_str().contains("Resource"));
        assert_eq!(id.as_str().len(), "Artifacts".len() + 8);
    }

    #[test]
    fn test_default_component_is_dropped() {
        let a = LogicalId::from_path(&["Build", "Default"]).unwrap();
        let b = LogicalId::from_path(&["Build"]).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_ids_are_deterministic_and_distinct() {
        let a1 = LogicalId::from_path(&["Build", "Role"]).unwrap();
        let a2 = LogicalId::from_path(&["Build", "Role"]).unwrap();
        let b = LogicalId::from_path(&["Deploy", "Role"]).unwrap();
        assert_eq!(a1, a2);
        assert_ne!(a1, b);
    }

    #[test]
    fn test_non_alphanumeric_characters_are_stripped() {
        let id = LogicalId::from_path(&["my-bucket_1"]).unwrap();
        assert_eq!(id.as_str(), "mybucket1");
    }

    #[test]
    fn test_rejects_empty_paths() {
        assert!(LogicalId::from_path(&[]).is_err());
        assert!(LogicalId::from_path(&["Default"]).is_err());
        assert!(LogicalId::from_path(&["---"]).is_err());
    }

    #[test]
    fn test_new_rejects_punctuation() {
        assert!(matches!(
            LogicalId::new("Build-Role"),
            Err(Error::InvalidInput(_))
        ));
    }
}
