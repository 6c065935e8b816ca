//! Deployment configuration: target environment and connection ids.

use crate::{ConfigError, ConfigResult};
use pipekit_core::Environment;
use pipekit_core::environment::DEFAULT_PARTITION;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

const CONNECTION_PREFIX: &str = "PIPEKIT_CONNECTION_";

/// Everything the assembler needs from outside the declarative input.
///
/// Built once at the process boundary and passed to the assembler by value.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub environment: Environment,
    /// Normalized connection name → connection id.
    connections: BTreeMap<String, String>,
}

impl DeploymentConfig {
    pub fn new(environment: Environment) -> Self {
        Self {
            environment,
            connections: BTreeMap::new(),
        }
    }

    /// Register a connection id under a name (case-insensitive, `_` and `-` equivalent).
    pub fn add_connection(&mut self, name: &str, connection_id: &str) -> ConfigResult<()> {
        let connection_id = Uuid::parse_str(connection_id.trim()).map_err(|e| {
            ConfigError::invalid(
                format!("connection '{}'", name),
                format!("'{}' is not a UUID: {}", connection_id, e),
            )
        })?;
        self.connections
            .insert(normalize_name(name), connection_id.hyphenated().to_string());
        Ok(())
    }

    pub fn with_connection(mut self, name: &str, connection_id: &str) -> ConfigResult<Self> {
        self.add_connection(name, connection_id)?;
        Ok(self)
    }

    /// Look up the configured id for a declared connection.
    pub fn connection_id(&self, name: &str) -> Option<&str> {
        self.connections
            .get(&normalize_name(name))
            .map(String::as_str)
    }

    /// Load from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_vars(std::env::vars())
    }

    /// Load from a set of environment variables.
    ///
    /// Region: `PIPEKIT_REGION`, `AWS_REGION`, `AWS_DEFAULT_REGION`, `CDK_DEFAULT_REGION`.
    /// Account: `PIPEKIT_ACCOUNT`, `CDK_DEFAULT_ACCOUNT`.
    /// Partition: `PIPEKIT_PARTITION` (default `aws`).
    /// Connections: `PIPEKIT_CONNECTION_<NAME>=<id>`.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> ConfigResult<Self> {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let first = |names: &[&str]| {
            names
                .iter()
                .filter_map(|n| vars.get(*n))
                .find(|v| !v.trim().is_empty())
                .cloned()
        };

        let region = first(&[
            "PIPEKIT_REGION",
            "AWS_REGION",
            "AWS_DEFAULT_REGION",
            "CDK_DEFAULT_REGION",
        ])
        .ok_or_else(|| ConfigError::MissingField("region (PIPEKIT_REGION)".to_string()))?;
        let account = first(&["PIPEKIT_ACCOUNT", "CDK_DEFAULT_ACCOUNT"])
            .ok_or_else(|| ConfigError::MissingField("account (PIPEKIT_ACCOUNT)".to_string()))?;
        let partition =
            first(&["PIPEKIT_PARTITION"]).unwrap_or_else(|| DEFAULT_PARTITION.to_string());

        let environment = Environment::with_partition(partition, region, account)?;
        let mut config = Self::new(environment);

        let mut connections: Vec<(&String, &String)> = vars
            .iter()
            .filter(|(k, _)| k.starts_with(CONNECTION_PREFIX))
            .collect();
        connections.sort();
        for (key, value) in connections {
            let name = &key[CONNECTION_PREFIX.len()..];
            if name.is_empty() {
                return Err(ConfigError::invalid(key.as_str(), "connection name is empty"));
            }
            config.add_connection(name, value)?;
        }

        Ok(config)
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTION_ID: &str = "0eb84fa4-1c3f-4b0b-8434-a3f94184c621";

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_vars_with_fallbacks() {
        let config = DeploymentConfig::from_vars(vars(&[
            ("AWS_REGION", "eu-central-1"),
            ("CDK_DEFAULT_ACCOUNT", "123456789012"),
            ("PIPEKIT_CONNECTION_GIT_HUB", CONNECTION_ID),
        ]))
        .unwrap();

        assert_eq!(config.environment.region(), "eu-central-1");
        assert_eq!(config.environment.account(), "123456789012");
        assert_eq!(config.environment.partition(), "aws");
        assert_eq!(config.connection_id("Git-Hub"), Some(CONNECTION_ID));
        assert_eq!(config.connection_id("git_hub"), Some(CONNECTION_ID));
    }

    #[test]
    fn test_explicit_region_wins() {
        let config = DeploymentConfig::from_vars(vars(&[
            ("PIPEKIT_REGION", "us-east-1"),
            ("AWS_REGION", "eu-central-1"),
            ("PIPEKIT_ACCOUNT", "123456789012"),
        ]))
        .unwrap();
        assert_eq!(config.environment.region(), "us-east-1");
    }

    #[test]
    fn test_missing_account() {
        let err = DeploymentConfig::from_vars(vars(&[("PIPEKIT_REGION", "us-east-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn test_invalid_connection_id() {
        let err = DeploymentConfig::from_vars(vars(&[
            ("PIPEKIT_REGION", "us-east-1"),
            ("PIPEKIT_ACCOUNT", "123456789012"),
            ("PIPEKIT_CONNECTION_GITHUB", "not-a-uuid"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_invalid_account_is_rejected() {
        let err = DeploymentConfig::from_vars(vars(&[
            ("PIPEKIT_REGION", "us-east-1"),
            ("PIPEKIT_ACCOUNT", "42"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Model(_)));
    }
}
