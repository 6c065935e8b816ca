//! Webhook trigger configuration for build projects.

use pipekit_core::build::{BuildResource, BuildSource};
use pipekit_core::trigger::{EventKind, RefPattern, TriggerSpec};
use pipekit_core::{Error, Result};
use regex::Regex;
use serde::Serialize;

const HEAD_REF_PREFIX: &str = "refs/heads/";
const REGEX_METACHARACTERS: &[char] = &[
    '.', '^', '$', '*', '+', '?', '(', ')', '[', ']', '{', '}', '|', '\\',
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilterType {
    Event,
    HeadRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookFilter {
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    pub pattern: String,
}

/// Filters that must all match for the group to fire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FilterGroup(Vec<WebhookFilter>);

impl FilterGroup {
    pub fn filters(&self) -> &[WebhookFilter] {
        &self.0
    }

    /// Whether an event on `git_ref` (e.g. `refs/heads/develop`) fires this group.
    pub fn matches(&self, event: EventKind, git_ref: &str) -> bool {
        self.0.iter().all(|filter| match filter.filter_type {
            FilterType::Event => filter
                .pattern
                .split(',')
                .any(|p| p.trim() == event.filter_pattern()),
            FilterType::HeadRef => Regex::new(&filter.pattern)
                .map(|re| re.is_match(git_ref))
                .unwrap_or(false),
        })
    }
}

/// Rendered trigger for one build project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerConfig {
    pub webhook: bool,
    pub build_type: String,
    pub filter_groups: Vec<FilterGroup>,
}

impl TriggerConfig {
    fn disabled() -> Self {
        Self {
            webhook: false,
            build_type: "BUILD".to_string(),
            filter_groups: Vec::new(),
        }
    }
}

/// Configure the trigger of a build, if it declares one.
pub fn configure_build(build: &BuildResource) -> Result<Option<TriggerConfig>> {
    build
        .trigger
        .as_ref()
        .map(|spec| configure(&format!("build '{}'", build.id), spec, &build.source))
        .transpose()
}

/// Validate a trigger against the build's source and render its filter groups.
pub fn configure(resource: &str, spec: &TriggerSpec, source: &BuildSource) -> Result<TriggerConfig> {
    let head_ref = spec
        .ref_pattern
        .as_ref()
        .map(|pattern| head_ref_pattern(resource, pattern, source))
        .transpose()?;

    if !spec.webhook {
        return Ok(TriggerConfig::disabled());
    }

    if matches!(source, BuildSource::Pipeline) {
        return Err(Error::invalid_trigger(
            resource,
            "webhook triggers need a repository source",
        ));
    }

    let head_ref = head_ref.ok_or_else(|| {
        Error::invalid_trigger(resource, "webhook trigger has no branch or regex filter")
    })?;

    Ok(TriggerConfig {
        webhook: true,
        build_type: "BUILD".to_string(),
        filter_groups: vec![FilterGroup(vec![
            WebhookFilter {
                filter_type: FilterType::Event,
                pattern: spec.event.filter_pattern().to_string(),
            },
            WebhookFilter {
                filter_type: FilterType::HeadRef,
                pattern: head_ref,
            },
        ])],
    })
}

/// Anchored HEAD_REF pattern for a ref pattern.
///
/// Exact branches may not contain unescaped regex metacharacters and must
/// name the branch the build source checks out.
fn head_ref_pattern(resource: &str, pattern: &RefPattern, source: &BuildSource) -> Result<String> {
    let anchored = match pattern {
        RefPattern::Exact(branch) => {
            let branch = branch.strip_prefix(HEAD_REF_PREFIX).unwrap_or(branch);
            let unescaped = unescape_branch(resource, branch)?;

            if let BuildSource::Repository {
                branch: source_branch,
                ..
            } = source
            {
                if &unescaped != source_branch {
                    return Err(Error::invalid_trigger(
                        resource,
                        format!(
                            "trigger branch '{}' differs from source branch '{}'",
                            unescaped, source_branch
                        ),
                    ));
                }
            }
            format!("^{}{}$", HEAD_REF_PREFIX, regex::escape(&unescaped))
        }
        RefPattern::Regex(expr) => {
            if expr.trim().is_empty() {
                return Err(Error::invalid_trigger(resource, "branch regex is empty"));
            }
            let expr = expr.trim_start_matches('^').trim_end_matches('$');
            let expr = expr.strip_prefix(HEAD_REF_PREFIX).unwrap_or(expr);
            format!("^{}(?:{})$", HEAD_REF_PREFIX, expr)
        }
    };

    Regex::new(&anchored).map_err(|e| {
        Error::invalid_trigger(resource, format!("invalid branch pattern '{}': {}", anchored, e))
    })?;
    Ok(anchored)
}

/// The literal branch name, with `\` allowed only in front of a metacharacter.
fn unescape_branch(resource: &str, branch: &str) -> Result<String> {
    if branch.trim().is_empty() {
        return Err(Error::invalid_trigger(resource, "trigger branch is empty"));
    }
    if branch.chars().any(char::is_whitespace) {
        return Err(Error::invalid_trigger(
            resource,
            format!("trigger branch '{}' contains whitespace", branch),
        ));
    }

    let mut unescaped = String::with_capacity(branch.len());
    let mut chars = branch.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(escaped) if REGEX_METACHARACTERS.contains(&escaped) => {
                    unescaped.push(escaped);
                }
                Some(escaped) => {
                    return Err(Error::invalid_trigger(
                        resource,
                        format!(
                            "trigger branch '{}' escapes '{}', which is not a metacharacter",
                            branch, escaped
                        ),
                    ));
                }
                None => {
                    return Err(Error::invalid_trigger(
                        resource,
                        format!("trigger branch '{}' ends with a bare escape", branch),
                    ));
                }
            }
        } else if REGEX_METACHARACTERS.contains(&c) {
            return Err(Error::invalid_trigger(
                resource,
                format!(
                    "trigger branch '{}' contains unescaped '{}'; use a regex pattern instead",
                    branch, c
                ),
            ));
        } else {
            unescaped.push(c);
        }
    }
    Ok(unescaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipekit_core::LogicalId;

    fn repo_source(branch: &str) -> BuildSource {
        BuildSource::Repository {
            connection: LogicalId::new("GitHub").unwrap(),
            repository: "acme/web".to_string(),
            branch: branch.to_string(),
            clone_depth: None,
        }
    }

    #[test]
    fn test_push_to_develop() {
        let config = configure(
            "build 'Web'",
            &TriggerSpec::push_to("develop"),
            &repo_source("develop"),
        )
        .unwrap();

        assert!(config.webhook);
        assert_eq!(config.build_type, "BUILD");
        assert_eq!(config.filter_groups.len(), 1);

        let group = &config.filter_groups[0];
        assert_eq!(
            group.filters(),
            [
                WebhookFilter {
                    filter_type: FilterType::Event,
                    pattern: "PUSH".to_string(),
                },
                WebhookFilter {
                    filter_type: FilterType::HeadRef,
                    pattern: "^refs/heads/develop$".to_string(),
                },
            ]
        );

        assert!(group.matches(EventKind::Push, "refs/heads/develop"));
        assert!(!group.matches(EventKind::Push, "refs/heads/develop-v2"));
        assert!(!group.matches(EventKind::Push, "refs/heads/feature/develop"));
        assert!(!group.matches(EventKind::PullRequestCreated, "refs/heads/develop"));
    }

    #[test]
    fn test_full_ref_is_accepted() {
        let spec = TriggerSpec::push_to("refs/heads/develop");
        let config = configure("build 'Web'", &spec, &repo_source("develop")).unwrap();
        assert_eq!(
            config.filter_groups[0].filters()[1].pattern,
            "^refs/heads/develop$"
        );
    }

    #[test]
    fn test_exact_branch_rejects_metacharacters() {
        let spec = TriggerSpec::push_to("release-*");
        let err = configure("build 'Web'", &spec, &repo_source("release-*")).unwrap_err();
        assert!(matches!(err, Error::InvalidTrigger { .. }));

        let escaped = TriggerSpec::push_to("release-1\\.2");
        let config = configure("build 'Web'", &escaped, &repo_source("release-1.2")).unwrap();
        let group = &config.filter_groups[0];
        assert!(group.matches(EventKind::Push, "refs/heads/release-1.2"));
        assert!(!group.matches(EventKind::Push, "refs/heads/release-1x2"));
    }

    #[test]
    fn test_escape_only_before_metacharacter() {
        let err = configure(
            "build 'Web'",
            &TriggerSpec::push_to("\\d"),
            &repo_source("d"),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidTrigger { .. }));
        assert!(err.to_string().contains("not a metacharacter"));
    }

    #[test]
    fn test_exact_branch_is_literal() {
        let spec = TriggerSpec::push_to("feature/a\\+b");
        let config = configure("build 'Web'", &spec, &repo_source("feature/a+b")).unwrap();
        let group = &config.filter_groups[0];
        assert!(group.matches(EventKind::Push, "refs/heads/feature/a+b"));
        assert!(!group.matches(EventKind::Push, "refs/heads/feature/aab"));
        assert!(!group.matches(EventKind::Push, "refs/heads/feature/a"));
    }

    #[test]
    fn test_branch_must_match_source() {
        let err = configure(
            "build 'Web'",
            &TriggerSpec::push_to("main"),
            &repo_source("develop"),
        )
        .unwrap_err();
        assert!(err.to_string().contains("differs from source branch"));
    }

    #[test]
    fn test_regex_alternation_is_anchored() {
        let spec = TriggerSpec {
            event: EventKind::Push,
            ref_pattern: Some(RefPattern::Regex("main|release/.*".to_string())),
            webhook: true,
        };
        let config = configure("build 'Web'", &spec, &repo_source("main")).unwrap();
        let group = &config.filter_groups[0];
        assert_eq!(group.filters()[1].pattern, "^refs/heads/(?:main|release/.*)$");
        assert!(group.matches(EventKind::Push, "refs/heads/release/1.0"));
        assert!(!group.matches(EventKind::Push, "refs/heads/mainline"));
    }

    #[test]
    fn test_invalid_regex() {
        let spec = TriggerSpec {
            event: EventKind::Push,
            ref_pattern: Some(RefPattern::Regex("release/(".to_string())),
            webhook: true,
        };
        let err = configure("build 'Web'", &spec, &repo_source("main")).unwrap_err();
        assert!(matches!(err, Error::InvalidTrigger { .. }));
    }

    #[test]
    fn test_disabled_webhook_has_no_filters() {
        let mut spec = TriggerSpec::push_to("develop");
        spec.webhook = false;
        let config = configure("build 'Web'", &spec, &BuildSource::Pipeline).unwrap();
        assert!(!config.webhook);
        assert!(config.filter_groups.is_empty());
    }

    #[test]
    fn test_webhook_needs_repository_source() {
        let err = configure(
            "build 'Web'",
            &TriggerSpec::push_to("develop"),
            &BuildSource::Pipeline,
        )
        .unwrap_err();
        assert!(err.to_string().contains("repository source"));
    }

    #[test]
    fn test_webhook_needs_ref_pattern() {
        let spec = TriggerSpec {
            event: EventKind::Push,
            ref_pattern: None,
            webhook: true,
        };
        assert!(configure("build 'Web'", &spec, &repo_source("develop")).is_err());
    }
}
