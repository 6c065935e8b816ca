//! Source-event trigger specifications.

use serde::{Deserialize, Serialize};

/// Source-control event that may start a build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventKind {
    #[default]
    Push,
    PullRequestCreated,
    PullRequestUpdated,
    PullRequestMerged,
    PullRequestReopened,
}

impl EventKind {
    /// Pattern used in the EVENT filter.
    pub fn filter_pattern(&self) -> &'static str {
        match self {
            EventKind::Push => "PUSH",
            EventKind::PullRequestCreated => "PULL_REQUEST_CREATED",
            EventKind::PullRequestUpdated => "PULL_REQUEST_UPDATED",
            EventKind::PullRequestMerged => "PULL_REQUEST_MERGED",
            EventKind::PullRequestReopened => "PULL_REQUEST_REOPENED",
        }
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "push" => Ok(EventKind::Push),
            "pull-request-created" => Ok(EventKind::PullRequestCreated),
            "pull-request-updated" => Ok(EventKind::PullRequestUpdated),
            "pull-request-merged" => Ok(EventKind::PullRequestMerged),
            "pull-request-reopened" => Ok(EventKind::PullRequestReopened),
            _ => Err(format!("unknown event kind: {}", s)),
        }
    }
}

/// Which refs a trigger fires for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum RefPattern {
    /// A single branch, matched exactly.
    Exact(String),
    /// A regular expression over branch names.
    Regex(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub event: EventKind,
    pub ref_pattern: Option<RefPattern>,
    pub webhook: bool,
}

impl TriggerSpec {
    /// Webhook push trigger for one branch.
    pub fn push_to(branch: impl Into<String>) -> Self {
        Self {
            event: EventKind::Push,
            ref_pattern: Some(RefPattern::Exact(branch.into())),
            webhook: true,
        }
    }
}
