//! Storage (bucket) descriptors.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::identity::{Effect, Principal, actions};
use crate::{Error, LogicalId, error::Errors};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    #[default]
    Private,
    PublicRead,
    Website,
}

impl Visibility {
    pub fn is_public(&self) -> bool {
        !matches!(self, Visibility::Private)
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Visibility::Private => write!(f, "private"),
            Visibility::PublicRead => write!(f, "public-read"),
            Visibility::Website => write!(f, "website"),
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Visibility::Private),
            "public-read" => Ok(Visibility::PublicRead),
            "website" => Ok(Visibility::Website),
            _ => Err(format!("unknown visibility: {}", s)),
        }
    }
}

/// What happens to the bucket when the stack is torn down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalPolicy {
    #[default]
    Retain,
    Destroy,
}

impl std::str::FromStr for RemovalPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "retain" => Ok(RemovalPolicy::Retain),
            "destroy" => Ok(RemovalPolicy::Destroy),
            _ => Err(format!("unknown removal policy: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRule {
    pub id: String,
    pub expiration_days: Option<u32>,
    pub abort_incomplete_upload_after_days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteDocuments {
    pub index_document: Option<String>,
    pub error_document: Option<String>,
}

/// Which part of a bucket a policy or permission statement covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyScope {
    /// The bucket itself (`<arn>`).
    Bucket,
    /// Every object in the bucket (`<arn>/*`).
    Objects,
}

impl PolicyScope {
    pub fn pattern(&self, bucket_arn: &str) -> String {
        match self {
            PolicyScope::Bucket => bucket_arn.to_string(),
            PolicyScope::Objects => format!("{}/*", bucket_arn),
        }
    }
}

impl std::str::FromStr for PolicyScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bucket" => Ok(PolicyScope::Bucket),
            "objects" => Ok(PolicyScope::Objects),
            _ => Err(format!("unknown policy scope: {}", s)),
        }
    }
}

/// A resource policy statement attached to the bucket itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketPolicyStatement {
    pub sid: String,
    pub effect: Effect,
    pub principal: Principal,
    pub actions: BTreeSet<String>,
    pub scope: PolicyScope,
}

impl BucketPolicyStatement {
    /// Anonymous read of every object, as required by public buckets.
    pub fn public_read(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            effect: Effect::Allow,
            principal: Principal::Anonymous,
            actions: BTreeSet::from([actions::GET_OBJECT.to_string()]),
            scope: PolicyScope::Objects,
        }
    }

    fn grants_anonymous_read(&self) -> bool {
        self.effect == Effect::Allow
            && self.principal.is_anonymous()
            && self.scope == PolicyScope::Objects
            && self.actions.contains(actions::GET_OBJECT)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageResource {
    pub id: LogicalId,
    /// Explicit physical name; derived from the logical id when absent.
    pub bucket_name: Option<String>,
    pub visibility: Visibility,
    pub encrypted: bool,
    pub versioned: bool,
    pub lifecycle_rules: Vec<LifecycleRule>,
    pub website: Option<WebsiteDocuments>,
    pub policy: Vec<BucketPolicyStatement>,
    pub removal_policy: RemovalPolicy,
    pub auto_delete_objects: bool,
}

impl StorageResource {
    /// An encrypted, unversioned private bucket with no rules.
    pub fn private(id: LogicalId) -> Self {
        Self {
            id,
            bucket_name: None,
            visibility: Visibility::Private,
            encrypted: true,
            versioned: false,
            lifecycle_rules: Vec::new(),
            website: None,
            policy: Vec::new(),
            removal_policy: RemovalPolicy::Retain,
            auto_delete_objects: false,
        }
    }

    /// A website bucket with the anonymous read statement it requires.
    pub fn website(id: LogicalId, index: &str, error: Option<&str>) -> Self {
        Self {
            visibility: Visibility::Website,
            website: Some(WebsiteDocuments {
                index_document: Some(index.to_string()),
                error_document: error.map(str::to_string),
            }),
            policy: vec![BucketPolicyStatement::public_read("PublicReadGetObject")],
            ..Self::private(id)
        }
    }

    /// Validate and return the descriptor, or every problem found.
    pub fn validated(self) -> Result<Self, Vec<Error>> {
        self.validate().map(|_| self)
    }

    pub fn validate(&self) -> Result<(), Vec<Error>> {
        let mut errors = Errors::new();
        let owner = format!("storage '{}'", self.id);

        if let Some(name) = &self.bucket_name {
            if let Err(message) = check_bucket_name(name) {
                errors.push(Error::validation(&owner, message));
            }
        }

        match (&self.visibility, &self.website) {
            (Visibility::Website, None) => {
                errors.push(Error::validation(
                    &owner,
                    "website visibility requires an index document",
                ));
            }
            (Visibility::Website, Some(docs)) => {
                if docs.index_document.as_deref().is_none_or(str::is_empty) {
                    errors.push(Error::validation(
                        &owner,
                        "website visibility requires an index document",
                    ));
                }
            }
            (_, Some(_)) => {
                errors.push(Error::validation(
                    &owner,
                    format!(
                        "website documents are only valid with website visibility, not {}",
                        self.visibility
                    ),
                ));
            }
            _ => {}
        }

        let mut sids = HashSet::new();
        for statement in &self.policy {
            if statement.sid.is_empty() {
                errors.push(Error::validation(&owner, "policy statement without sid"));
            } else if !sids.insert(statement.sid.as_str()) {
                errors.push(Error::validation(
                    &owner,
                    format!("duplicate policy statement sid '{}'", statement.sid),
                ));
            }
            if statement.actions.is_empty() {
                errors.push(Error::validation(
                    &owner,
                    format!("policy statement '{}' has no actions", statement.sid),
                ));
            }
            if statement.principal.is_anonymous() {
                if !self.visibility.is_public() {
                    errors.push(Error::validation(
                        &owner,
                        format!(
                            "private bucket may not grant anonymous access (statement '{}')",
                            statement.sid
                        ),
                    ));
                } else if statement.effect == Effect::Allow
                    && statement.actions.iter().any(|a| a != actions::GET_OBJECT)
                {
                    errors.push(Error::validation(
                        &owner,
                        format!(
                            "anonymous principals may only be granted get-object (statement '{}')",
                            statement.sid
                        ),
                    ));
                }
            }
        }

        if self.visibility.is_public() && !self.policy.iter().any(|s| s.grants_anonymous_read()) {
            errors.push(Error::validation(
                &owner,
                format!(
                    "{} visibility requires an explicit policy statement granting anonymous get-object on objects",
                    self.visibility
                ),
            ));
        }

        let mut rule_ids = HashSet::new();
        for rule in &self.lifecycle_rules {
            if rule.id.is_empty() {
                errors.push(Error::validation(&owner, "lifecycle rule without id"));
            } else if !rule_ids.insert(rule.id.as_str()) {
                errors.push(Error::validation(
                    &owner,
                    format!("duplicate lifecycle rule '{}'", rule.id),
                ));
            }
            match (rule.expiration_days, rule.abort_incomplete_upload_after_days) {
                (None, None) => errors.push(Error::validation(
                    &owner,
                    format!("lifecycle rule '{}' has no action", rule.id),
                )),
                (Some(0), _) | (_, Some(0)) => errors.push(Error::validation(
                    &owner,
                    format!("lifecycle rule '{}' day counts must be positive", rule.id),
                )),
                _ => {}
            }
        }

        if self.auto_delete_objects && self.removal_policy != RemovalPolicy::Destroy {
            errors.push(Error::validation(
                &owner,
                "auto_delete_objects requires removal policy 'destroy'",
            ));
        }

        errors.finish()
    }

    /// Physical bucket name: the explicit one, or a lower-case name with a
    /// stable hash suffix derived from the logical id.
    pub fn bucket_name(&self) -> String {
        if let Some(name) = &self.bucket_name {
            return name.clone();
        }
        let mut base: String = self
            .id
            .as_str()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect();
        base.truncate(54);
        let derived = LogicalId::derive(&[self.id.as_str(), "Bucket"]);
        let suffix = &derived.as_str()[derived.as_str().len() - 8..];
        format!("{}-{}", base.trim_end_matches('-'), suffix.to_ascii_lowercase())
    }
}

fn check_bucket_name(name: &str) -> Result<(), String> {
    if !(3..=63).contains(&name.len()) {
        return Err(format!("bucket name '{}' must be 3-63 characters", name));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err(format!(
            "bucket name '{}' may only contain lowercase letters, digits, '-' and '.'",
            name
        ));
    }
    let edges_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !edges_ok(name.chars().next()) || !edges_ok(name.chars().last()) {
        return Err(format!(
            "bucket name '{}' must start and end with a letter or digit",
            name
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    #[test]
    fn test_website_bucket_is_valid() {
        let bucket = StorageResource::website(id("Site"), "index.html", Some("index.html"));
        assert!(bucket.validate().is_ok());
    }

    #[test]
    fn test_validated_returns_descriptor_or_every_error() {
        let site = StorageResource::website(id("Site"), "index.html", None)
            .validated()
            .unwrap();
        assert_eq!(site.id, id("Site"));

        let mut leaky = StorageResource::private(id("Leaky"));
        leaky.bucket_name = Some("Not_A_Bucket".to_string());
        leaky.policy.push(BucketPolicyStatement::public_read("Leak"));
        assert_eq!(leaky.validated().unwrap_err().len(), 2);
    }

    #[test]
    fn test_website_without_index_fails() {
        let mut bucket = StorageResource::website(id("Site"), "index.html", None);
        bucket.website = Some(WebsiteDocuments {
            index_document: None,
            error_document: Some("error.html".to_string()),
        });
        let errors = bucket.validate().unwrap_err();
        assert!(errors[0].to_string().contains("index document"));
    }

    #[test]
    fn test_private_bucket_rejects_anonymous_principal() {
        let mut bucket = StorageResource::private(id("Artifacts"));
        bucket.policy.push(BucketPolicyStatement::public_read("Leak"));
        let errors = bucket.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("anonymous"));
    }

    #[test]
    fn test_public_read_requires_policy_statement() {
        let bucket = StorageResource {
            visibility: Visibility::PublicRead,
            ..StorageResource::private(id("Public"))
        };
        assert!(bucket.validate().is_err());

        let bucket = StorageResource {
            visibility: Visibility::PublicRead,
            policy: vec![BucketPolicyStatement::public_read("Read")],
            ..StorageResource::private(id("Public"))
        };
        assert!(bucket.validate().is_ok());
    }

    #[test]
    fn test_anonymous_write_rejected() {
        let mut statement = BucketPolicyStatement::public_read("Read");
        statement.actions.insert(actions::PUT_OBJECT.to_string());
        let bucket = StorageResource {
            visibility: Visibility::PublicRead,
            policy: vec![statement],
            ..StorageResource::private(id("Public"))
        };
        let errors = bucket.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("only be granted get-object")));
    }

    #[test]
    fn test_website_documents_require_website_visibility() {
        let bucket = StorageResource {
            website: Some(WebsiteDocuments {
                index_document: Some("index.html".to_string()),
                error_document: None,
            }),
            ..StorageResource::private(id("Site"))
        };
        assert!(bucket.validate().is_err());
    }

    #[test]
    fn test_lifecycle_rules_validated() {
        let bucket = StorageResource {
            lifecycle_rules: vec![
                LifecycleRule {
                    id: "DeleteOld".to_string(),
                    expiration_days: Some(1),
                    abort_incomplete_upload_after_days: Some(2),
                },
                LifecycleRule {
                    id: "DeleteOld".to_string(),
                    expiration_days: None,
                    abort_incomplete_upload_after_days: None,
                },
            ],
            ..StorageResource::private(id("Artifacts"))
        };
        let errors = bucket.validate().unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_auto_delete_requires_destroy() {
        let bucket = StorageResource {
            auto_delete_objects: true,
            ..StorageResource::private(id("Artifacts"))
        };
        assert!(bucket.validate().is_err());
    }

    #[test]
    fn test_derived_bucket_name_is_stable_and_valid() {
        let bucket = StorageResource::private(id("PipelineArtifacts"));
        let name = bucket.bucket_name();
        assert_eq!(name, bucket.bucket_name());
        assert!(name.starts_with("pipelineartifacts-"));
        assert!(check_bucket_name(&name).is_ok());
    }

    #[test]
    fn test_explicit_bucket_name_checked() {
        let bucket = StorageResource {
            bucket_name: Some("Bad_Name".to_string()),
            ..StorageResource::private(id("Artifacts"))
        };
        assert!(bucket.validate().is_err());
    }
}
