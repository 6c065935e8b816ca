//! Logical identifiers.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Error, Result};

/// A stable name for a declared or generated resource.
///
/// Declared resources keep the identifier their author chose. Generated
/// sub-resources (roles, log groups, pipeline actions) get an identifier
/// derived from their path, so re-synthesizing the same input yields
/// byte-identical identifiers.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[display("{_0}")]
#[serde(try_from = "String", into = "String")]
pub struct LogicalId(String);

impl LogicalId {
    /// Validate a declared identifier: ASCII letter first, then letters, digits, `-` or `_`.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        let mut chars = id.chars();
        let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
        let valid_rest = chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid_start || !valid_rest || id.len() > 255 {
            return Err(Error::validation(
                format!("logical id '{}'", id),
                "must start with a letter and contain only letters, digits, '-' or '_'",
            ));
        }
        Ok(Self(id))
    }

    /// Derive an identifier from a resource path.
    ///
    /// The result is the PascalCase concatenation of each part's alphanumeric
    /// characters followed by the first 8 hex digits of SHA-256 over the parts
    /// joined with `/`.
    pub fn derive(parts: &[&str]) -> Self {
        let mut readable = String::new();
        for part in parts {
            let mut upper_next = true;
            for c in part.chars() {
                if c.is_ascii_alphanumeric() {
                    if upper_next {
                        readable.push(c.to_ascii_uppercase());
                    } else {
                        readable.push(c);
                    }
                    upper_next = false;
                } else {
                    upper_next = true;
                }
            }
        }

        let digest = Sha256::digest(parts.join("/").as_bytes());
        let suffix = hex::encode_upper(&digest[..4]);
        Self(format!("{}{}", readable, suffix))
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

impl TryFrom<String> for LogicalId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::new(s)
    }
}

impl From<LogicalId> for String {
    fn from(id: LogicalId) -> Self {
        id.0
    }
}

impl std::str::FromStr for LogicalId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_deterministic() {
        let a = LogicalId::derive(&["FrontendPipeline", "Build", "CodeBuild"]);
        let b = LogicalId::derive(&["FrontendPipeline", "Build", "CodeBuild"]);
        assert_eq!(a, b);
        assert!(a.as_str().starts_with("FrontendPipelineBuildCodeBuild"));
        assert_eq!(a.as_str().len(), "FrontendPipelineBuildCodeBuild".len() + 8);
    }

    #[test]
    fn test_derive_distinguishes_paths() {
        // Same readable prefix, different path boundaries.
        let a = LogicalId::derive(&["Ab", "c"]);
        let b = LogicalId::derive(&["A", "bc"]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_derive_pascal_cases_separators() {
        let id = LogicalId::derive(&["github_source", "role"]);
        assert!(id.as_str().starts_with("GithubSourceRole"));
    }

    #[test]
    fn test_new_rejects_invalid() {
        assert!(LogicalId::new("WebBucket").is_ok());
        assert!(LogicalId::new("web-bucket_2").is_ok());
        assert!(LogicalId::new("").is_err());
        assert!(LogicalId::new("9lives").is_err());
        assert!(LogicalId::new("has space").is_err());
    }
}
