//! Build project descriptors.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::identity::{CODEBUILD_SERVICE, IdentityRole};
use crate::trigger::TriggerSpec;
use crate::{Error, LogicalId, error::Errors};

static ENV_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

static REPOSITORY_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+/[A-Za-z0-9_.-]+$").unwrap());

/// Retention periods accepted by the log service.
pub const LOG_RETENTION_DAYS: &[u32] = &[
    1, 3, 5, 7, 14, 30, 60, 90, 120, 150, 180, 365, 400, 545, 731, 1096, 1827, 2192, 2557, 2922,
    3288, 3653,
];

pub const DEFAULT_BUILD_SPEC: &str = "buildspec.yaml";
pub const DEFAULT_BUILD_IMAGE: &str = "aws/codebuild/amazonlinux-x86_64-standard:5.0";

/// Where a build project gets its source from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BuildSource {
    /// Cloned directly from a repository through a connection.
    Repository {
        connection: LogicalId,
        /// `owner/name`.
        repository: String,
        branch: String,
        clone_depth: Option<u32>,
    },
    /// Handed in as an input artifact by a pipeline action.
    Pipeline,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComputeSize {
    #[default]
    Small,
    Medium,
    Large,
    XLarge,
}

impl ComputeSize {
    pub fn compute_type(&self) -> &'static str {
        match self {
            ComputeSize::Small => "BUILD_GENERAL1_SMALL",
            ComputeSize::Medium => "BUILD_GENERAL1_MEDIUM",
            ComputeSize::Large => "BUILD_GENERAL1_LARGE",
            ComputeSize::XLarge => "BUILD_GENERAL1_XLARGE",
        }
    }
}

impl std::str::FromStr for ComputeSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "small" => Ok(ComputeSize::Small),
            "medium" => Ok(ComputeSize::Medium),
            "large" => Ok(ComputeSize::Large),
            "x-large" => Ok(ComputeSize::XLarge),
            _ => Err(format!("unknown compute size: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeProfile {
    pub size: ComputeSize,
    pub image: String,
    pub privileged: bool,
}

impl Default for ComputeProfile {
    fn default() -> Self {
        Self {
            size: ComputeSize::Small,
            image: DEFAULT_BUILD_IMAGE.to_string(),
            privileged: false,
        }
    }
}

/// A plaintext environment variable binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    /// May reference other resources with `${...}`; resolved at assembly.
    pub value: String,
}

impl EnvironmentVariable {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Check names and uniqueness of a list of environment variables.
pub fn check_environment(owner: &str, vars: &[EnvironmentVariable]) -> Vec<Error> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    for var in vars {
        if !ENV_NAME_REGEX.is_match(&var.name) {
            errors.push(Error::validation(
                owner,
                format!("invalid environment variable name '{}'", var.name),
            ));
        } else if !seen.insert(var.name.as_str()) {
            errors.push(Error::validation(
                owner,
                format!("duplicate environment variable '{}'", var.name),
            ));
        }
    }
    errors
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LoggingSink {
    CloudWatch {
        /// Defaults to `/aws/codebuild/<project>`.
        group_name: Option<String>,
        retention_days: Option<u32>,
    },
    Disabled,
}

impl Default for LoggingSink {
    fn default() -> Self {
        LoggingSink::CloudWatch {
            group_name: None,
            retention_days: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResource {
    pub id: LogicalId,
    /// Explicit project name; the logical id is used when absent.
    pub project_name: Option<String>,
    pub description: Option<String>,
    pub source: BuildSource,
    /// Path of the build specification file inside the source.
    pub build_spec: String,
    pub compute: ComputeProfile,
    pub timeout_minutes: u32,
    pub queued_timeout_minutes: u32,
    pub retry_limit: u32,
    pub environment: Vec<EnvironmentVariable>,
    pub logging: LoggingSink,
    pub service_role: IdentityRole,
    pub trigger: Option<TriggerSpec>,
}

impl BuildResource {
    /// A build with default limits, compute and a generated service role.
    pub fn new(id: LogicalId, source: BuildSource) -> Self {
        let service_role = IdentityRole::for_resource(&id, "ServiceRole", CODEBUILD_SERVICE);
        Self {
            id,
            project_name: None,
            description: None,
            source,
            build_spec: DEFAULT_BUILD_SPEC.to_string(),
            compute: ComputeProfile::default(),
            timeout_minutes: 60,
            queued_timeout_minutes: 480,
            retry_limit: 0,
            environment: Vec::new(),
            logging: LoggingSink::default(),
            service_role,
            trigger: None,
        }
    }

    pub fn project_name(&self) -> String {
        self.project_name
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Log group name when logging is enabled.
    pub fn log_group_name(&self) -> Option<String> {
        match &self.logging {
            LoggingSink::CloudWatch { group_name, .. } => Some(
                group_name
                    .clone()
                    .unwrap_or_else(|| format!("/aws/codebuild/{}", self.project_name())),
            ),
            LoggingSink::Disabled => None,
        }
    }

    /// Validate everything except the trigger, which the trigger configurator owns.
    pub fn validate(&self) -> Result<(), Vec<Error>> {
        let mut errors = Errors::new();
        let owner = format!("build '{}'", self.id);

        if let Some(name) = &self.project_name {
            let valid = (2..=255).contains(&name.len())
                && name.chars().next().is_some_and(|c| c.is_ascii_alphanumeric())
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
            if !valid {
                errors.push(Error::validation(
                    &owner,
                    format!("invalid project name '{}'", name),
                ));
            }
        }

        if let BuildSource::Repository {
            repository,
            branch,
            clone_depth,
            ..
        } = &self.source
        {
            if !REPOSITORY_REGEX.is_match(repository) {
                errors.push(Error::validation(
                    &owner,
                    format!("repository '{}' must have the form owner/name", repository),
                ));
            }
            if branch.trim().is_empty() {
                errors.push(Error::validation(&owner, "source branch is empty"));
            }
            if *clone_depth == Some(0) {
                errors.push(Error::validation(&owner, "clone depth must be positive"));
            }
        }

        if self.build_spec.trim().is_empty() {
            errors.push(Error::validation(&owner, "build spec reference is empty"));
        }
        if self.compute.image.trim().is_empty() {
            errors.push(Error::validation(&owner, "build image is empty"));
        }
        if !(5..=2160).contains(&self.timeout_minutes) {
            errors.push(Error::validation(
                &owner,
                format!(
                    "timeout {} minutes is outside 5-2160",
                    self.timeout_minutes
                ),
            ));
        }
        if !(5..=480).contains(&self.queued_timeout_minutes) {
            errors.push(Error::validation(
                &owner,
                format!(
                    "queued timeout {} minutes is outside 5-480",
                    self.queued_timeout_minutes
                ),
            ));
        }
        if self.retry_limit > 10 {
            errors.push(Error::validation(
                &owner,
                format!("retry limit {} exceeds 10", self.retry_limit),
            ));
        }

        errors.extend(check_environment(&owner, &self.environment));

        if let LoggingSink::CloudWatch {
            group_name,
            retention_days,
        } = &self.logging
        {
            if group_name.as_deref().is_some_and(|g| g.trim().is_empty()) {
                errors.push(Error::validation(&owner, "log group name is empty"));
            }
            if let Some(days) = retention_days {
                if !LOG_RETENTION_DAYS.contains(days) {
                    errors.push(Error::validation(
                        &owner,
                        format!("unsupported log retention of {} days", days),
                    ));
                }
            }
        }

        if self.service_role.trusted_service != CODEBUILD_SERVICE {
            errors.push(Error::validation(
                &owner,
                format!(
                    "service role must trust '{}', not '{}'",
                    CODEBUILD_SERVICE, self.service_role.trusted_service
                ),
            ));
        }
        if let Err(role_errors) = self.service_role.validate() {
            errors.extend(role_errors);
        }

        errors.finish()
    }
}
