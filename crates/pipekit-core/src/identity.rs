//! Identity roles, permission statements and capability classes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{Error, LogicalId, Result, error::Errors};

/// Concrete action tokens emitted in permission statements.
pub mod actions {
    pub const GET_OBJECT: &str = "get-object";
    pub const PUT_OBJECT: &str = "put-object";
    pub const DELETE_OBJECT: &str = "delete-object";
    pub const LIST_BUCKET: &str = "list-bucket";
    pub const GET_BUCKET_LOCATION: &str = "get-bucket-location";

    pub const START_BUILD: &str = "start-build";
    pub const BATCH_GET_BUILDS: &str = "batch-get-builds";

    pub const USE_CONNECTION: &str = "use-connection";

    pub const CREATE_LOG_GROUP: &str = "create-log-group";
    pub const CREATE_LOG_STREAM: &str = "create-log-stream";
    pub const PUT_LOG_EVENTS: &str = "put-log-events";
    pub const DESCRIBE_LOG_GROUPS: &str = "describe-log-groups";

    pub const INVOKE_FUNCTION: &str = "invoke-function";
    pub const GET_FUNCTION: &str = "get-function";
    pub const GET_FUNCTION_CONFIGURATION: &str = "get-function-configuration";
    pub const UPDATE_FUNCTION_CODE: &str = "update-function-code";
    pub const UPDATE_FUNCTION_CONFIGURATION: &str = "update-function-configuration";
}

/// Actions that may be granted on an unconstrained (`*`) resource.
pub const WILDCARD_ALLOWED_ACTIONS: &[&str] =
    &[actions::CREATE_LOG_GROUP, actions::DESCRIBE_LOG_GROUPS];

/// Resource pattern matching everything.
pub const ANY_RESOURCE: &str = "*";

pub const CODEBUILD_SERVICE: &str = "codebuild.amazonaws.com";
pub const CODEPIPELINE_SERVICE: &str = "codepipeline.amazonaws.com";
pub const LAMBDA_SERVICE: &str = "lambda.amazonaws.com";

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    #[default]
    Allow,
    Deny,
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::Allow => write!(f, "allow"),
            Effect::Deny => write!(f, "deny"),
        }
    }
}

impl std::str::FromStr for Effect {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "allow" => Ok(Effect::Allow),
            "deny" => Ok(Effect::Deny),
            _ => Err(format!("unknown effect: {}", s)),
        }
    }
}

/// Who a resource policy statement applies to.
///
/// Written as `*` (anyone), `service:<name>` or `account:<id>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Principal {
    Anonymous,
    Service(String),
    Account(String),
}

impl Principal {
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Principal::Anonymous)
    }
}

impl std::fmt::Display for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Principal::Anonymous => write!(f, "*"),
            Principal::Service(name) => write!(f, "service:{}", name),
            Principal::Account(id) => write!(f, "account:{}", id),
        }
    }
}

impl std::str::FromStr for Principal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == "*" {
            return Ok(Principal::Anonymous);
        }
        match s.split_once(':') {
            Some(("service", name)) if !name.is_empty() => Ok(Principal::Service(name.to_string())),
            Some(("account", id)) if !id.is_empty() => Ok(Principal::Account(id.to_string())),
            _ => Err(format!("unknown principal: {}", s)),
        }
    }
}

impl TryFrom<String> for Principal {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Principal> for String {
    fn from(p: Principal) -> Self {
        p.to_string()
    }
}

/// A single access statement attached to an identity role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub effect: Effect,
    /// Sorted, de-duplicated action tokens.
    pub actions: BTreeSet<String>,
    /// ARN or ARN pattern the actions apply to.
    pub resource: String,
}

impl Permission {
    pub fn allow<I, S>(actions: I, resource: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            effect: Effect::Allow,
            actions: actions.into_iter().map(Into::into).collect(),
            resource: resource.into(),
        }
    }

    pub fn is_unconstrained(&self) -> bool {
        self.resource == ANY_RESOURCE
    }

    /// Check the statement in isolation; `owner` names the role for error messages.
    pub fn check(&self, owner: &str) -> Result<()> {
        if self.actions.is_empty() {
            return Err(Error::validation(owner, "permission statement has no actions"));
        }
        if self.resource.trim().is_empty() {
            return Err(Error::validation(
                owner,
                "permission statement has an empty resource",
            ));
        }
        if self.is_unconstrained() {
            let disallowed: Vec<&str> = self
                .actions
                .iter()
                .map(String::as_str)
                .filter(|a| !WILDCARD_ALLOWED_ACTIONS.contains(a))
                .collect();
            if !disallowed.is_empty() {
                return Err(Error::validation(
                    owner,
                    format!(
                        "actions [{}] may not be granted on unconstrained resource '*'",
                        disallowed.join(", ")
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// A role some service assumes, with its ordered permission statements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRole {
    pub id: LogicalId,
    /// Service principal allowed to assume the role.
    pub trusted_service: String,
    pub statements: Vec<Permission>,
}

impl IdentityRole {
    pub fn new(id: LogicalId, trusted_service: impl Into<String>) -> Self {
        Self {
            id,
            trusted_service: trusted_service.into(),
            statements: Vec::new(),
        }
    }

    /// Generated role for a resource, e.g. a build project's service role.
    pub fn for_resource(owner: &LogicalId, suffix: &str, trusted_service: &str) -> Self {
        Self::new(
            LogicalId::derive(&[owner.as_str(), suffix]),
            trusted_service,
        )
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<Error>> {
        let mut errors = Errors::new();
        let owner = format!("role '{}'", self.id);
        if self.trusted_service.trim().is_empty() {
            errors.push(Error::validation(&owner, "trusted service is empty"));
        }
        for statement in &self.statements {
            errors.take(statement.check(&owner));
        }
        errors.finish()
    }
}

/// Abstract access level mapped to concrete actions during synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Capability {
    Read,
    ReadWrite,
    List,
    Invoke,
    Deploy,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Read => write!(f, "read"),
            Capability::ReadWrite => write!(f, "read-write"),
            Capability::List => write!(f, "list"),
            Capability::Invoke => write!(f, "invoke"),
            Capability::Deploy => write!(f, "deploy"),
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "read" => Ok(Capability::Read),
            "read-write" => Ok(Capability::ReadWrite),
            "list" => Ok(Capability::List),
            "invoke" => Ok(Capability::Invoke),
            "deploy" => Ok(Capability::Deploy),
            _ => Err(Error::UnsupportedCapability {
                capability: s.to_string(),
                target: "any resource".to_string(),
            }),
        }
    }
}

impl TryFrom<String> for Capability {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Capability> for String {
    fn from(c: Capability) -> Self {
        c.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_only_for_allow_listed_actions() {
        let ok = Permission::allow([actions::CREATE_LOG_GROUP], ANY_RESOURCE);
        assert!(ok.check("role").is_ok());

        let bad = Permission::allow([actions::CREATE_LOG_GROUP, actions::PUT_OBJECT], ANY_RESOURCE);
        let err = bad.check("role").unwrap_err();
        assert!(err.to_string().contains("put-object"));
    }

    #[test]
    fn test_empty_statement_rejected() {
        let p = Permission::allow(Vec::<String>::new(), "arn:aws:s3:::b");
        assert!(p.check("role").is_err());
    }

    #[test]
    fn test_principal_parsing() {
        assert_eq!("*".parse::<Principal>().unwrap(), Principal::Anonymous);
        assert_eq!(
            "service:codebuild.amazonaws.com".parse::<Principal>().unwrap(),
            Principal::Service("codebuild.amazonaws.com".to_string())
        );
        assert!("nobody".parse::<Principal>().is_err());
    }

    #[test]
    fn test_unknown_capability() {
        let err = "admin".parse::<Capability>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedCapability { .. }));
        assert_eq!("read-write".parse::<Capability>().unwrap(), Capability::ReadWrite);
    }

    #[test]
    fn test_role_validation_reports_every_statement() {
        let mut role = IdentityRole::new(LogicalId::new("Role").unwrap(), CODEBUILD_SERVICE);
        role.statements.push(Permission::allow([actions::PUT_OBJECT], ANY_RESOURCE));
        role.statements.push(Permission::allow([actions::GET_OBJECT], ""));
        assert_eq!(role.validate().unwrap_err().len(), 2);
    }
}
