//! Deployment environment and ARN templating.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::{Error, Result};

static REGION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-\d+$").unwrap());

static ACCOUNT_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{12}$").unwrap());

pub const DEFAULT_PARTITION: &str = "aws";

/// Target partition, region and account.
///
/// Supplied by the caller and validated here; resource logic never embeds
/// these values as literals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    partition: String,
    region: String,
    account: String,
}

impl Environment {
    pub fn new(region: impl Into<String>, account: impl Into<String>) -> Result<Self> {
        Self::with_partition(DEFAULT_PARTITION, region, account)
    }

    pub fn with_partition(
        partition: impl Into<String>,
        region: impl Into<String>,
        account: impl Into<String>,
    ) -> Result<Self> {
        let partition = partition.into();
        let region = region.into();
        let account = account.into();

        if partition.is_empty() || !partition.chars().all(|c| c.is_ascii_lowercase() || c == '-')
        {
            return Err(Error::validation(
                "environment",
                format!("invalid partition '{}'", partition),
            ));
        }
        if !REGION_REGEX.is_match(&region) {
            return Err(Error::validation(
                "environment",
                format!("invalid region '{}'", region),
            ));
        }
        if !ACCOUNT_REGEX.is_match(&account) {
            return Err(Error::validation(
                "environment",
                format!("account '{}' must be 12 digits", account),
            ));
        }

        Ok(Self {
            partition,
            region,
            account,
        })
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn bucket_arn(&self, bucket_name: &str) -> String {
        format!("arn:{}:s3:::{}", self.partition, bucket_name)
    }

    pub fn project_arn(&self, project_name: &str) -> String {
        self.regional_arn("codebuild", &format!("project/{}", project_name))
    }

    pub fn connection_arn(&self, connection_id: &str) -> String {
        self.regional_arn("codeconnections", &format!("connection/{}", connection_id))
    }

    pub fn log_group_arn(&self, group_name: &str) -> String {
        self.regional_arn("logs", &format!("log-group:{}", group_name))
    }

    pub fn function_arn(&self, function_name: &str) -> String {
        self.regional_arn("lambda", &format!("function:{}", function_name))
    }

    pub fn pipeline_arn(&self, pipeline_name: &str) -> String {
        self.regional_arn("codepipeline", pipeline_name)
    }

    fn regional_arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:{}:{}:{}:{}:{}",
            self.partition, service, self.region, self.account, resource
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arns() {
        let env = Environment::new("eu-central-1", "123456789012").unwrap();
        assert_eq!(env.bucket_arn("site"), "arn:aws:s3:::site");
        assert_eq!(
            env.connection_arn("0eb84fa4-1c3f-4b0b-8434-a3f94184c621"),
            "arn:aws:codeconnections:eu-central-1:123456789012:connection/0eb84fa4-1c3f-4b0b-8434-a3f94184c621"
        );
        assert_eq!(
            env.log_group_arn("/aws/codebuild/web"),
            "arn:aws:logs:eu-central-1:123456789012:log-group:/aws/codebuild/web"
        );
        assert_eq!(
            env.project_arn("WebBuild"),
            "arn:aws:codebuild:eu-central-1:123456789012:project/WebBuild"
        );
    }

    #[test]
    fn test_rejects_bad_region_and_account() {
        assert!(Environment::new("central", "123456789012").is_err());
        assert!(Environment::new("eu-central-1", "12345").is_err());
        assert!(Environment::new("us-gov-west-1", "123456789012").is_ok());
    }
}
