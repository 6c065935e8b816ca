//! Stack definition parsing.

use crate::{ConfigError, ConfigResult};
use kdl::{KdlDocument, KdlNode};
use pipekit_core::build::{
    BuildResource, BuildSource, ComputeProfile, DEFAULT_BUILD_IMAGE, EnvironmentVariable,
    LoggingSink,
};
use pipekit_core::connection::Connection;
use pipekit_core::definition::AccessNeed;
use pipekit_core::function::{CodeLocation, FunctionResource};
use pipekit_core::identity::{Capability, Permission};
use pipekit_core::pipeline::{Action, ActionKind, PipelineResource, Stage};
use pipekit_core::storage::{
    BucketPolicyStatement, LifecycleRule, PolicyScope, StorageResource, WebsiteDocuments,
};
use pipekit_core::trigger::{RefPattern, TriggerSpec};
use pipekit_core::{Definition, LogicalId};
use std::path::Path;
use std::str::FromStr;

/// Parse a stack definition from KDL text.
///
/// Parsing is structural only; semantic validation happens during assembly so
/// that every problem can be reported at once.
pub fn parse_definition(kdl: &str) -> ConfigResult<Definition> {
    let doc: KdlDocument = kdl.parse()?;
    let mut definition = Definition::default();

    for node in doc.nodes() {
        match node.name().value() {
            "stack" => {
                definition.name = get_first_string_arg(node)
                    .ok_or_else(|| ConfigError::MissingField("stack name".to_string()))?;
            }
            "connection" => definition.connections.push(parse_connection(node)?),
            "storage" => definition.storage.push(parse_storage(node)?),
            "build" => definition.builds.push(parse_build(node)?),
            "function" => definition.functions.push(parse_function(node)?),
            "grant" => definition.grants.push(parse_grant(node)?),
            "pipeline" => {
                if definition.pipeline.is_some() {
                    return Err(ConfigError::invalid(
                        "pipeline",
                        "a stack declares at most one pipeline",
                    ));
                }
                definition.pipeline = Some(parse_pipeline(node)?);
            }
            other => return Err(unknown_node(other, "stack")),
        }
    }

    if definition.name.is_empty() {
        return Err(ConfigError::MissingField("stack name".to_string()));
    }

    Ok(definition)
}

/// Parse a stack definition from its JSON representation.
pub fn parse_definition_json(json: &str) -> ConfigResult<Definition> {
    Ok(serde_json::from_str(json)?)
}

/// Read a definition file; `.json` files are JSON, anything else is KDL.
pub fn load_definition(path: impl AsRef<Path>) -> ConfigResult<Definition> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => parse_definition_json(&content),
        _ => parse_definition(&content),
    }
}

fn parse_connection(node: &KdlNode) -> ConfigResult<Connection> {
    let id = get_id_arg(node, "connection")?;
    let provider = parse_prop(node, "provider")?.unwrap_or_default();
    Ok(Connection::new(id, provider))
}

fn parse_storage(node: &KdlNode) -> ConfigResult<StorageResource> {
    let mut storage = StorageResource::private(get_id_arg(node, "storage")?);

    storage.bucket_name = get_string_prop(node, "bucket-name");
    if let Some(visibility) = parse_prop(node, "visibility")? {
        storage.visibility = visibility;
    }
    if let Some(encrypted) = get_bool_prop(node, "encrypted") {
        storage.encrypted = encrypted;
    }
    if let Some(versioned) = get_bool_prop(node, "versioned") {
        storage.versioned = versioned;
    }
    if let Some(removal) = parse_prop(node, "removal")? {
        storage.removal_policy = removal;
    }
    if let Some(auto_delete) = get_bool_prop(node, "auto-delete-objects") {
        storage.auto_delete_objects = auto_delete;
    }

    for child in children(node) {
        match child.name().value() {
            "website" => {
                storage.website = Some(WebsiteDocuments {
                    index_document: get_string_prop(child, "index"),
                    error_document: get_string_prop(child, "error"),
                });
            }
            "policy" => storage.policy.push(parse_bucket_policy(child)?),
            "lifecycle" => {
                let id = get_first_string_arg(child)
                    .ok_or_else(|| ConfigError::MissingField("lifecycle rule id".to_string()))?;
                storage.lifecycle_rules.push(LifecycleRule {
                    id,
                    expiration_days: get_u32_prop(child, "expiration-days")?,
                    abort_incomplete_upload_after_days: get_u32_prop(
                        child,
                        "abort-incomplete-upload-days",
                    )?,
                });
            }
            other => return Err(unknown_node(other, "storage")),
        }
    }

    Ok(storage)
}

/// `policy "<sid>" "<action>"... principal="*" scope="objects" effect="allow"`
fn parse_bucket_policy(node: &KdlNode) -> ConfigResult<BucketPolicyStatement> {
    let mut args = get_all_string_args(node).into_iter();
    let sid = args
        .next()
        .ok_or_else(|| ConfigError::MissingField("policy sid".to_string()))?;
    let principal = parse_prop(node, "principal")?
        .ok_or_else(|| ConfigError::MissingField(format!("principal for policy '{}'", sid)))?;

    Ok(BucketPolicyStatement {
        principal,
        effect: parse_prop(node, "effect")?.unwrap_or_default(),
        scope: parse_prop(node, "scope")?.unwrap_or(PolicyScope::Objects),
        actions: args.collect(),
        sid,
    })
}

/// `statement "<action>"... resource="<pattern>" effect="allow"`
fn parse_statement(node: &KdlNode) -> ConfigResult<Permission> {
    let resource = get_string_prop(node, "resource")
        .ok_or_else(|| ConfigError::MissingField("statement resource".to_string()))?;
    let mut permission = Permission::allow(get_all_string_args(node), resource);
    if let Some(effect) = parse_prop(node, "effect")? {
        permission.effect = effect;
    }
    Ok(permission)
}

fn parse_build(node: &KdlNode) -> ConfigResult<BuildResource> {
    let id = get_id_arg(node, "build")?;

    let source = children(node)
        .iter()
        .find(|c| c.name().value() == "source")
        .map(parse_build_source)
        .transpose()?
        .ok_or_else(|| ConfigError::MissingField(format!("source for build '{}'", id)))?;

    let mut build = BuildResource::new(id, source);
    build.project_name = get_string_prop(node, "project-name");
    build.description = get_string_prop(node, "description");

    for child in children(node) {
        match child.name().value() {
            "source" => {}
            "buildspec" => {
                build.build_spec = get_first_string_arg(child)
                    .ok_or_else(|| ConfigError::MissingField("buildspec path".to_string()))?;
            }
            "compute" => {
                build.compute = ComputeProfile {
                    size: parse_prop(child, "size")?.unwrap_or_default(),
                    image: get_string_prop(child, "image")
                        .unwrap_or_else(|| DEFAULT_BUILD_IMAGE.to_string()),
                    privileged: get_bool_prop(child, "privileged").unwrap_or(false),
                };
            }
            "timeout" => build.timeout_minutes = get_u32_arg(child)?,
            "queued-timeout" => build.queued_timeout_minutes = get_u32_arg(child)?,
            "retry-limit" => build.retry_limit = get_u32_arg(child)?,
            "env" => build.environment.push(parse_env_var(child)?),
            "logging" => {
                build.logging = if get_bool_prop(child, "disabled").unwrap_or(false) {
                    LoggingSink::Disabled
                } else {
                    LoggingSink::CloudWatch {
                        group_name: get_string_prop(child, "group"),
                        retention_days: get_u32_prop(child, "retention-days")?,
                    }
                };
            }
            "trigger" => build.trigger = Some(parse_trigger(child)?),
            "statement" => build.service_role.statements.push(parse_statement(child)?),
            other => return Err(unknown_node(other, "build")),
        }
    }

    Ok(build)
}

fn parse_build_source(node: &KdlNode) -> ConfigResult<BuildSource> {
    let kind = get_first_string_arg(node).unwrap_or_default();
    match kind.as_str() {
        "repository" => Ok(BuildSource::Repository {
            connection: get_id_prop(node, "connection")?,
            repository: get_required_string_prop(node, "repository")?,
            branch: get_required_string_prop(node, "branch")?,
            clone_depth: get_u32_prop(node, "clone-depth")?,
        }),
        "pipeline" => Ok(BuildSource::Pipeline),
        _ => Err(ConfigError::invalid(
            "source type",
            format!("unknown source type: '{}'", kind),
        )),
    }
}

fn parse_trigger(node: &KdlNode) -> ConfigResult<TriggerSpec> {
    let ref_pattern = match (
        get_string_prop(node, "branch"),
        get_string_prop(node, "regex"),
    ) {
        (Some(_), Some(_)) => {
            return Err(ConfigError::invalid(
                "trigger",
                "set either branch or regex, not both",
            ));
        }
        (Some(branch), None) => Some(RefPattern::Exact(branch)),
        (None, Some(regex)) => Some(RefPattern::Regex(regex)),
        (None, None) => None,
    };

    Ok(TriggerSpec {
        event: parse_prop(node, "event")?.unwrap_or_default(),
        ref_pattern,
        webhook: get_bool_prop(node, "webhook").unwrap_or(true),
    })
}

fn parse_env_var(node: &KdlNode) -> ConfigResult<EnvironmentVariable> {
    let args = get_all_string_args(node);
    match args.as_slice() {
        [name, value] => Ok(EnvironmentVariable::new(name, value)),
        _ => Err(ConfigError::invalid(
            "env",
            "expected a name and a value: env \"NAME\" \"value\"",
        )),
    }
}

fn parse_function(node: &KdlNode) -> ConfigResult<FunctionResource> {
    let id = get_id_arg(node, "function")?;

    let code = children(node)
        .iter()
        .find(|c| c.name().value() == "code")
        .map(|c| -> ConfigResult<CodeLocation> {
            Ok(CodeLocation {
                bucket: get_id_prop(c, "bucket")?,
                key: get_required_string_prop(c, "key")?,
            })
        })
        .transpose()?
        .ok_or_else(|| ConfigError::MissingField(format!("code for function '{}'", id)))?;

    let mut function = FunctionResource::new(
        id,
        get_required_string_prop(node, "runtime")?,
        get_required_string_prop(node, "handler")?,
        code,
    );
    function.function_name = get_string_prop(node, "function-name");
    if let Some(memory) = get_u32_prop(node, "memory")? {
        function.memory_mb = memory;
    }
    if let Some(timeout) = get_u32_prop(node, "timeout")? {
        function.timeout_seconds = timeout;
    }

    for child in children(node) {
        match child.name().value() {
            "code" => {}
            "env" => function.environment.push(parse_env_var(child)?),
            "statement" => function
                .execution_role
                .statements
                .push(parse_statement(child)?),
            other => return Err(unknown_node(other, "function")),
        }
    }

    Ok(function)
}

/// `grant "<consumer>" on="<resource>" capability="read-write"`
fn parse_grant(node: &KdlNode) -> ConfigResult<AccessNeed> {
    let consumer = get_id_arg(node, "grant consumer")?;
    let resource = get_id_prop(node, "on")?;
    let capability = Capability::from_str(&get_required_string_prop(node, "capability")?)?;
    Ok(AccessNeed {
        consumer,
        resource,
        capability,
    })
}

fn parse_pipeline(node: &KdlNode) -> ConfigResult<PipelineResource> {
    let id = get_id_arg(node, "pipeline")?;
    let artifact_store = get_id_prop(node, "artifact-store")?;

    let mut stages = Vec::new();
    let mut statements = Vec::new();
    for child in children(node) {
        match child.name().value() {
            "stage" => stages.push(parse_stage(child)?),
            "statement" => statements.push(parse_statement(child)?),
            other => return Err(unknown_node(other, "pipeline")),
        }
    }

    let mut pipeline = PipelineResource::new(id, artifact_store, stages);
    pipeline.pipeline_name = get_string_prop(node, "pipeline-name");
    pipeline.role.statements = statements;
    Ok(pipeline)
}

fn parse_stage(node: &KdlNode) -> ConfigResult<Stage> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("stage name".to_string()))?;

    let mut actions = Vec::new();
    for child in children(node) {
        match child.name().value() {
            "action" => actions.push(parse_action(child)?),
            other => return Err(unknown_node(other, &format!("stage '{}'", name))),
        }
    }

    Ok(Stage { name, actions })
}

fn parse_action(node: &KdlNode) -> ConfigResult<Action> {
    let name = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField("action name".to_string()))?;

    let kind_name = get_string_prop(node, "kind")
        .ok_or_else(|| ConfigError::MissingField(format!("kind for action '{}'", name)))?;
    let kind = match kind_name.as_str() {
        "source" => ActionKind::Source {
            connection: get_id_prop(node, "connection")?,
            repository: get_required_string_prop(node, "repository")?,
            branch: get_required_string_prop(node, "branch")?,
            output_format: parse_prop(node, "format")?.unwrap_or_default(),
        },
        "build" => ActionKind::Build {
            project: get_id_prop(node, "project")?,
        },
        "deploy" => ActionKind::Deploy {
            target: get_id_prop(node, "target")?,
        },
        _ => {
            return Err(ConfigError::invalid(
                "action kind",
                format!("unknown action kind: '{}'", kind_name),
            ));
        }
    };

    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for child in children(node) {
        match child.name().value() {
            "input" => inputs.extend(get_all_string_args(child)),
            "output" => outputs.extend(get_all_string_args(child)),
            other => return Err(unknown_node(other, &format!("action '{}'", name))),
        }
    }

    Ok(Action {
        name,
        kind,
        inputs,
        outputs,
    })
}

// Helper functions for extracting values from KDL nodes

fn unknown_node(node: &str, context: &str) -> ConfigError {
    ConfigError::UnknownNode {
        node: node.to_string(),
        context: context.to_string(),
    }
}

fn children(node: &KdlNode) -> &[KdlNode] {
    node.children().map(|c| c.nodes()).unwrap_or(&[])
}

fn get_first_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

fn get_all_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

fn get_string_prop(node: &KdlNode, name: &str) -> Option<String> {
    node.get(name)
        .and_then(|v| v.as_string())
        .map(|s| s.to_string())
}

fn get_required_string_prop(node: &KdlNode, name: &str) -> ConfigResult<String> {
    get_string_prop(node, name).ok_or_else(|| {
        ConfigError::MissingField(format!("{} on '{}'", name, node.name().value()))
    })
}

fn get_bool_prop(node: &KdlNode, name: &str) -> Option<bool> {
    node.get(name).and_then(|v| v.as_bool())
}

fn get_u32_prop(node: &KdlNode, name: &str) -> ConfigResult<Option<u32>> {
    node.get(name)
        .map(|v| {
            v.as_integer()
                .and_then(|i| u32::try_from(i).ok())
                .ok_or_else(|| ConfigError::invalid(name, "expected a non-negative integer"))
        })
        .transpose()
}

fn get_u32_arg(node: &KdlNode) -> ConfigResult<u32> {
    let field = node.name().value();
    node.entries()
        .iter()
        .find(|e| e.name().is_none())
        .ok_or_else(|| ConfigError::MissingField(field.to_string()))?
        .value()
        .as_integer()
        .and_then(|i| u32::try_from(i).ok())
        .ok_or_else(|| ConfigError::invalid(field, "expected a non-negative integer"))
}

fn get_id_arg(node: &KdlNode, what: &str) -> ConfigResult<LogicalId> {
    let id = get_first_string_arg(node)
        .ok_or_else(|| ConfigError::MissingField(format!("{} id", what)))?;
    Ok(LogicalId::new(id)?)
}

fn get_id_prop(node: &KdlNode, name: &str) -> ConfigResult<LogicalId> {
    Ok(LogicalId::new(get_required_string_prop(node, name)?)?)
}

fn parse_prop<T>(node: &KdlNode, name: &str) -> ConfigResult<Option<T>>
where
    T: FromStr<Err = String>,
{
    get_string_prop(node, name)
        .map(|s| s.parse::<T>().map_err(|e| ConfigError::invalid(name, e)))
        .transpose()
}
