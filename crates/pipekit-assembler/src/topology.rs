//! Pipeline topology: stage structure, artifact flow and action wiring.

use pipekit_core::build::BuildSource;
use pipekit_core::definition::AccessNeed;
use pipekit_core::identity::Capability;
use pipekit_core::pipeline::{Action, ActionKind, PipelineResource, Stage};
use pipekit_core::storage::Visibility;
use pipekit_core::{Definition, Error, LogicalId, Result, error::Errors};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;
use tracing::debug;

use crate::graph::{ActionNode, ArtifactNode, PipelineNode, StageNode};
use crate::permissions::PermissionSynthesizer;
use crate::registry::{RegisteredResource, ResourceKind, ResourceRegistry};

static NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9.@_-]{1,100}$").unwrap());

static ARTIFACT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,100}$").unwrap());

const MIN_STAGES: usize = 2;

/// Validates a pipeline against the declared resources and renders its stages.
pub struct TopologyBuilder<'a> {
    definition: &'a Definition,
    registry: &'a ResourceRegistry,
}

impl<'a> TopologyBuilder<'a> {
    pub fn new(definition: &'a Definition, registry: &'a ResourceRegistry) -> Self {
        Self {
            definition,
            registry,
        }
    }

    /// Check the whole pipeline, collecting every problem, and register the
    /// access the pipeline role and its build projects need.
    pub fn build(
        &self,
        pipeline: &PipelineResource,
        synthesizer: &mut PermissionSynthesizer<'_>,
    ) -> std::result::Result<PipelineNode, Vec<Error>> {
        let mut errors = Errors::new();
        let owner = format!("pipeline '{}'", pipeline.id);

        let store = errors.take(self.artifact_store(pipeline)).flatten();
        self.check_structure(&owner, &pipeline.stages, &mut errors);
        let artifacts = self.trace_artifacts(&owner, &pipeline.stages, &mut errors);

        if let Some(store) = store {
            errors.take(synthesizer.grant(&AccessNeed::new(
                &pipeline.id,
                &store.id,
                Capability::ReadWrite,
            )));
        }

        let mut stages = Vec::with_capacity(pipeline.stages.len());
        for stage in &pipeline.stages {
            let mut actions = Vec::with_capacity(stage.actions.len());
            for action in &stage.actions {
                let Some(target) = errors.take(self.action_target(stage, action)).flatten() else {
                    continue;
                };

                let capability = match action.kind {
                    ActionKind::Source { .. } | ActionKind::Build { .. } => Capability::Invoke,
                    ActionKind::Deploy { .. } => Capability::Deploy,
                };
                errors.take(synthesizer.grant(&AccessNeed::new(
                    &pipeline.id,
                    &target.id,
                    capability,
                )));
                if let (ActionKind::Build { project }, Some(store)) = (&action.kind, store) {
                    errors.take(synthesizer.grant(&AccessNeed::new(
                        project,
                        &store.id,
                        Capability::ReadWrite,
                    )));
                }

                actions.push(ActionNode {
                    logical_id: LogicalId::derive(&[
                        pipeline.id.as_str(),
                        stage.name.as_str(),
                        action.name.as_str(),
                    ]),
                    name: action.name.clone(),
                    category: action.kind.category().to_string(),
                    provider: provider(&action.kind).to_string(),
                    resource_arn: target.arn.clone(),
                    configuration: configuration(&action.kind, target),
                    inputs: action.inputs.clone(),
                    outputs: action.outputs.clone(),
                    run_order: 1,
                });
            }
            stages.push(StageNode {
                name: stage.name.clone(),
                actions,
            });
        }

        errors.finish()?;

        debug!(
            pipeline = %pipeline.id,
            stages = stages.len(),
            artifacts = artifacts.len(),
            "Pipeline topology validated"
        );

        Ok(PipelineNode {
            logical_id: pipeline.id.clone(),
            pipeline_name: pipeline.pipeline_name(),
            arn: self
                .registry
                .get(&pipeline.id)
                .map(|r| r.arn.clone())
                .unwrap_or_default(),
            role: pipeline.role.id.clone(),
            artifact_bucket: store.map(|s| s.name.clone()).unwrap_or_default(),
            stages,
            artifacts,
        })
    }

    /// The artifact store must be a declared, private storage resource.
    fn artifact_store(&self, pipeline: &PipelineResource) -> Result<Option<&'a RegisteredResource>> {
        let owner = format!("pipeline '{}'", pipeline.id);
        let id = &pipeline.artifact_store;

        let Some(store) = self.registry.get(id) else {
            if self.registry.is_broken(id) {
                return Ok(None);
            }
            return Err(Error::UnknownResource {
                consumer: pipeline.id.to_string(),
                resource: id.to_string(),
            });
        };
        if store.kind != ResourceKind::Storage {
            return Err(Error::validation(
                owner,
                format!("artifact store '{}' is a {}, not storage", id, store.kind),
            ));
        }

        let private = self
            .definition
            .storage
            .iter()
            .find(|s| &s.id == id)
            .is_some_and(|s| s.visibility == Visibility::Private);
        if !private {
            return Err(Error::validation(
                owner,
                format!("artifact store '{}' must be private", id),
            ));
        }
        Ok(Some(store))
    }

    fn check_structure(&self, owner: &str, stages: &[Stage], errors: &mut Errors) {
        if stages.len() < MIN_STAGES {
            errors.push(Error::validation(
                owner,
                format!(
                    "needs at least {} stages, found {}",
                    MIN_STAGES,
                    stages.len()
                ),
            ));
        }

        let mut stage_names = BTreeSet::new();
        for (index, stage) in stages.iter().enumerate() {
            if !NAME_REGEX.is_match(&stage.name) {
                errors.push(Error::validation(
                    owner,
                    format!("invalid stage name '{}'", stage.name),
                ));
            }
            if !stage_names.insert(stage.name.as_str()) {
                errors.push(Error::validation(
                    owner,
                    format!("stage '{}' is declared more than once", stage.name),
                ));
            }
            if stage.actions.is_empty() {
                errors.push(Error::validation(
                    owner,
                    format!("stage '{}' has no actions", stage.name),
                ));
            }

            let mut action_names = BTreeSet::new();
            for action in &stage.actions {
                let path = format!("{}/{}", stage.name, action.name);
                if !NAME_REGEX.is_match(&action.name) {
                    errors.push(Error::validation(
                        owner,
                        format!("invalid action name '{}'", path),
                    ));
                }
                if !action_names.insert(action.name.as_str()) {
                    errors.push(Error::validation(
                        owner,
                        format!("action '{}' is declared more than once", path),
                    ));
                }

                let is_source = matches!(action.kind, ActionKind::Source { .. });
                if index == 0 && !is_source {
                    errors.push(Error::validation(
                        owner,
                        format!("first stage may only hold source actions, found '{}'", path),
                    ));
                }
                if index > 0 && is_source {
                    errors.push(Error::validation(
                        owner,
                        format!("source action '{}' must be in the first stage", path),
                    ));
                }

                for message in action_io_problems(action) {
                    errors.push(Error::validation(owner, format!("action '{}' {}", path, message)));
                }
            }
        }
    }

    /// Follow artifacts through the stages in order.
    ///
    /// An input must come from a strictly earlier stage; every name has one producer.
    fn trace_artifacts(&self, owner: &str, stages: &[Stage], errors: &mut Errors) -> Vec<ArtifactNode> {
        let mut artifacts: Vec<ArtifactNode> = Vec::new();
        // name -> (index into artifacts, producing stage)
        let mut produced: BTreeMap<&str, (usize, usize)> = BTreeMap::new();

        for (stage_index, stage) in stages.iter().enumerate() {
            for action in &stage.actions {
                let path = format!("{}/{}", stage.name, action.name);

                for input in &action.inputs {
                    match produced.get(input.as_str()) {
                        Some(&(artifact, producer_stage)) if producer_stage < stage_index => {
                            artifacts[artifact].consumed_by.push(path.clone());
                        }
                        _ => errors.push(Error::DanglingArtifact {
                            stage: stage.name.clone(),
                            action: action.name.clone(),
                            artifact: input.clone(),
                        }),
                    }
                }

                for output in &action.outputs {
                    if !ARTIFACT_REGEX.is_match(output) {
                        errors.push(Error::validation(
                            owner,
                            format!("invalid artifact name '{}' in action '{}'", output, path),
                        ));
                    }
                    if let Some(&(artifact, _)) = produced.get(output.as_str()) {
                        errors.push(Error::DuplicateArtifact {
                            artifact: output.clone(),
                            first: artifacts[artifact].produced_by.clone(),
                            second: path.clone(),
                        });
                        continue;
                    }
                    produced.insert(output.as_str(), (artifacts.len(), stage_index));
                    artifacts.push(ArtifactNode {
                        name: output.clone(),
                        produced_by: path.clone(),
                        consumed_by: Vec::new(),
                    });
                }
            }
        }
        artifacts
    }

    /// Resolve the resource an action drives and check it fits the action.
    ///
    /// `Ok(None)` means the resource was declared but could not be resolved;
    /// that failure is reported elsewhere.
    fn action_target(&self, stage: &Stage, action: &Action) -> Result<Option<&'a RegisteredResource>> {
        let path = format!("{}/{}", stage.name, action.name);
        let id = action.kind.resource();
        let expected = match action.kind {
            ActionKind::Source { .. } => ResourceKind::Connection,
            ActionKind::Build { .. } => ResourceKind::Build,
            ActionKind::Deploy { .. } => ResourceKind::Function,
        };

        let Some(target) = self.registry.get(id) else {
            if self.registry.is_broken(id) {
                return Ok(None);
            }
            return Err(Error::UnknownResource {
                consumer: path,
                resource: id.to_string(),
            });
        };
        if target.kind != expected {
            return Err(Error::validation(
                format!("action '{}'", path),
                format!("'{}' is a {}, expected a {}", id, target.kind, expected),
            ));
        }

        match &action.kind {
            ActionKind::Build { project } => {
                let pipeline_sourced = self
                    .definition
                    .builds
                    .iter()
                    .find(|b| &b.id == project)
                    .is_some_and(|b| matches!(b.source, BuildSource::Pipeline));
                if !pipeline_sourced {
                    return Err(Error::validation(
                        format!("action '{}'", path),
                        format!("build '{}' must take its source from the pipeline", project),
                    ));
                }
            }
            ActionKind::Source {
                repository, branch, ..
            } => {
                if !repository.contains('/') {
                    return Err(Error::validation(
                        format!("action '{}'", path),
                        format!("repository '{}' must have the form owner/name", repository),
                    ));
                }
                if branch.trim().is_empty() {
                    return Err(Error::validation(
                        format!("action '{}'", path),
                        "source branch is empty",
                    ));
                }
            }
            ActionKind::Deploy { .. } => {}
        }
        Ok(Some(target))
    }
}

fn action_io_problems(action: &Action) -> Vec<&'static str> {
    let mut problems = Vec::new();
    match action.kind {
        ActionKind::Source { .. } => {
            if !action.inputs.is_empty() {
                problems.push("is a source action and cannot consume artifacts");
            }
            if action.outputs.len() != 1 {
                problems.push("is a source action and must produce exactly one artifact");
            }
        }
        ActionKind::Build { .. } => {
            if action.inputs.is_empty() {
                problems.push("is a build action and needs an input artifact");
            }
            if action.outputs.len() > 1 {
                problems.push("may produce at most one artifact");
            }
        }
        ActionKind::Deploy { .. } => {
            if action.outputs.len() > 1 {
                problems.push("may produce at most one artifact");
            }
        }
    }
    problems
}

fn provider(kind: &ActionKind) -> &'static str {
    match kind {
        ActionKind::Source { .. } => "CodeStarSourceConnection",
        ActionKind::Build { .. } => "CodeBuild",
        ActionKind::Deploy { .. } => "Lambda",
    }
}

fn configuration(kind: &ActionKind, target: &RegisteredResource) -> BTreeMap<String, String> {
    let mut config = BTreeMap::new();
    match kind {
        ActionKind::Source {
            repository,
            branch,
            output_format,
            ..
        } => {
            config.insert("ConnectionArn".to_string(), target.arn.clone());
            config.insert("FullRepositoryId".to_string(), repository.clone());
            config.insert("BranchName".to_string(), branch.clone());
            config.insert(
                "OutputArtifactFormat".to_string(),
                output_format.as_config_value().to_string(),
            );
        }
        ActionKind::Build { .. } => {
            config.insert("ProjectName".to_string(), target.name.clone());
        }
        ActionKind::Deploy { .. } => {
            config.insert("FunctionName".to_string(), target.name.clone());
        }
    }
    config
}
