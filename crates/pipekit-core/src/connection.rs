//! Source-control connections.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Environment, Error, LogicalId, Result};

/// Source-control provider behind a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GitProvider {
    #[default]
    Github,
    Gitlab,
    Bitbucket,
}

impl std::fmt::Display for GitProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitProvider::Github => write!(f, "github"),
            GitProvider::Gitlab => write!(f, "gitlab"),
            GitProvider::Bitbucket => write!(f, "bitbucket"),
        }
    }
}

impl std::str::FromStr for GitProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(GitProvider::Github),
            "gitlab" => Ok(GitProvider::Gitlab),
            "bitbucket" => Ok(GitProvider::Bitbucket),
            _ => Err(format!("Unknown git provider: {}", s)),
        }
    }
}

/// A declared link to an external source-control system.
///
/// The declaration carries no identifier of the live connection; that is
/// injected through deployment configuration and resolved at assembly time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: LogicalId,
    pub provider: GitProvider,
}

impl Connection {
    pub fn new(id: LogicalId, provider: GitProvider) -> Self {
        Self { id, provider }
    }

    /// Bind the declaration to a configured connection id.
    pub fn resolve(&self, connection_id: &str, env: &Environment) -> Result<ResolvedConnection> {
        let parsed = Uuid::parse_str(connection_id).map_err(|e| {
            Error::validation(
                format!("connection '{}'", self.id),
                format!("configured connection id '{}' is not a UUID: {}", connection_id, e),
            )
        })?;
        let connection_id = parsed.hyphenated().to_string();
        Ok(ResolvedConnection {
            id: self.id.clone(),
            provider: self.provider,
            connection_arn: env.connection_arn(&connection_id),
            connection_id,
        })
    }
}

/// A connection with its configured id and templated ARN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedConnection {
    pub id: LogicalId,
    pub provider: GitProvider,
    pub connection_id: String,
    pub connection_arn: String,
}
