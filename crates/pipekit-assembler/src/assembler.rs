//! Orchestrates assembly: construction, permissions, triggers, topology.

use pipekit_config::{DeploymentConfig, VariableContext};
use pipekit_core::build::{BuildResource, BuildSource, EnvironmentVariable, LoggingSink};
use pipekit_core::definition::AccessNeed;
use pipekit_core::function::FunctionResource;
use pipekit_core::identity::{CODEPIPELINE_SERVICE, Capability, IdentityRole, Permission};
use pipekit_core::{Definition, Error, error::Errors};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::graph::{
    BucketPolicyNode, BuildNode, FunctionNode, LogGroupNode, ResourceGraph, RoleNode, StorageNode,
};
use crate::permissions::PermissionSynthesizer;
use crate::registry::{ResourceRegistry, log_group_id};
use crate::topology::TopologyBuilder;
use crate::trigger::{TriggerConfig, configure_build};

/// Every error found while assembling a definition.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize)]
#[error("{}", render_report(.errors))]
pub struct AssemblyReport {
    pub errors: Vec<Error>,
}

fn render_report(errors: &[Error]) -> String {
    let mut out = format!("assembly failed with {} error(s):", errors.len());
    for error in errors {
        out.push_str("\n  - ");
        out.push_str(&error.to_string());
    }
    out
}

/// Assembles definitions for one deployment environment.
pub struct Assembler {
    config: DeploymentConfig,
}

impl Assembler {
    pub fn new(config: DeploymentConfig) -> Self {
        Self { config }
    }

    /// Assemble a definition into a resource graph.
    ///
    /// Pure and deterministic: the same definition and configuration always
    /// produce the same graph, or the same errors in the same order.
    pub fn assemble(&self, definition: &Definition) -> Result<ResourceGraph, AssemblyReport> {
        info!(stack = %definition.name, "Assembling stack");
        let mut errors = Errors::new();

        // Resource construction
        if definition.name.trim().is_empty() {
            errors.push(Error::validation("stack", "name is empty"));
        }
        validate_resources(definition, &mut errors);

        let (registry, registry_errors) = ResourceRegistry::build(definition, &self.config);
        errors.extend(registry_errors);
        let variables = registry.variables(&self.config);

        let build_env: Vec<_> = definition
            .builds
            .iter()
            .map(|b| {
                let owner = format!("build '{}'", b.id);
                resolve_environment(&owner, &b.environment, &variables, &mut errors)
            })
            .collect();
        let function_env: Vec<_> = definition
            .functions
            .iter()
            .map(|f| {
                let owner = format!("function '{}'", f.id);
                resolve_environment(&owner, &f.environment, &variables, &mut errors)
            })
            .collect();

        // Permission synthesis
        let mut synthesizer = PermissionSynthesizer::new(&registry);
        for build in &definition.builds {
            seed_role(&mut synthesizer, &build.service_role, &variables, &mut errors);
            for need in implicit_build_needs(build) {
                errors.take(synthesizer.grant(&need));
            }
        }
        for function in &definition.functions {
            seed_role(&mut synthesizer, &function.execution_role, &variables, &mut errors);
            for need in implicit_function_needs(function) {
                errors.take(synthesizer.grant(&need));
            }
        }
        if let Some(pipeline) = &definition.pipeline {
            seed_role(&mut synthesizer, &pipeline.role, &variables, &mut errors);
        }
        for grant in &definition.grants {
            errors.take(synthesizer.grant(grant));
        }

        // Trigger configuration
        let triggers: Vec<Option<TriggerConfig>> = definition
            .builds
            .iter()
            .map(|b| errors.take(configure_build(b)).flatten())
            .collect();

        // Pipeline topology
        let pipeline = definition.pipeline.as_ref().and_then(|pipeline| {
            match TopologyBuilder::new(definition, &registry).build(pipeline, &mut synthesizer) {
                Ok(node) => Some(node),
                Err(topology_errors) => {
                    errors.extend(topology_errors);
                    None
                }
            }
        });

        let mut statements = synthesizer.finish();
        for (role, permissions) in &statements {
            let owner = format!("role '{}'", role);
            for permission in permissions {
                errors.take(permission.check(&owner));
            }
        }

        if !errors.is_empty() {
            let errors = errors.into_vec();
            warn!(stack = %definition.name, count = errors.len(), "Assembly failed");
            return Err(AssemblyReport { errors });
        }

        let env = &self.config.environment;
        let mut roles = Vec::new();
        let mut take_role = |role: &IdentityRole| {
            roles.push(RoleNode {
                logical_id: role.id.clone(),
                trusted_service: role.trusted_service.clone(),
                statements: statements.remove(&role.id).unwrap_or_default(),
            });
        };
        for build in &definition.builds {
            take_role(&build.service_role);
        }
        for function in &definition.functions {
            take_role(&function.execution_role);
        }
        if let Some(pipeline) = &definition.pipeline {
            take_role(&pipeline.role);
        }

        let storage = definition
            .storage
            .iter()
            .map(|s| {
                let bucket_name = s.bucket_name();
                let arn = env.bucket_arn(&bucket_name);
                StorageNode {
                    logical_id: s.id.clone(),
                    website_url: s.website.as_ref().map(|_| {
                        format!("http://{}.s3-website-{}.amazonaws.com", bucket_name, env.region())
                    }),
                    policy: s
                        .policy
                        .iter()
                        .map(|statement| BucketPolicyNode {
                            sid: statement.sid.clone(),
                            effect: statement.effect,
                            principal: statement.principal.clone(),
                            actions: statement.actions.iter().cloned().collect(),
                            resource: statement.scope.pattern(&arn),
                        })
                        .collect(),
                    bucket_name,
                    arn,
                    resource: s.clone(),
                }
            })
            .collect();

        let build_log_groups = definition.builds.iter().filter_map(|b| {
            let name = b.log_group_name()?;
            let retention_days = match &b.logging {
                LoggingSink::CloudWatch { retention_days, .. } => *retention_days,
                LoggingSink::Disabled => None,
            };
            Some(LogGroupNode {
                logical_id: log_group_id(&b.id),
                arn: env.log_group_arn(&name),
                name,
                retention_days,
                owner: b.id.clone(),
            })
        });
        let function_log_groups = definition.functions.iter().map(|f| {
            let name = f.log_group_name();
            LogGroupNode {
                logical_id: log_group_id(&f.id),
                arn: env.log_group_arn(&name),
                name,
                retention_days: None,
                owner: f.id.clone(),
            }
        });
        let log_groups = build_log_groups.chain(function_log_groups).collect();

        let builds = definition
            .builds
            .iter()
            .zip(build_env)
            .zip(triggers)
            .map(|((b, environment), trigger)| {
                let project_name = b.project_name();
                let (source_version, source_connection) = match &b.source {
                    BuildSource::Repository {
                        connection, branch, ..
                    } => (
                        Some(format!("refs/heads/{}", branch)),
                        registry.get(connection).map(|c| c.arn.clone()),
                    ),
                    BuildSource::Pipeline => (None, None),
                };
                BuildNode {
                    logical_id: b.id.clone(),
                    arn: env.project_arn(&project_name),
                    project_name,
                    compute_type: b.compute.size.compute_type().to_string(),
                    source_version,
                    source_connection,
                    environment,
                    role: b.service_role.id.clone(),
                    log_group: b.log_group_name().map(|_| log_group_id(&b.id)),
                    trigger,
                    resource: b.clone(),
                }
            })
            .collect();

        let functions = definition
            .functions
            .iter()
            .zip(function_env)
            .map(|(f, environment)| {
                let function_name = f.function_name();
                FunctionNode {
                    logical_id: f.id.clone(),
                    arn: env.function_arn(&function_name),
                    function_name,
                    code_bucket: registry
                        .get(&f.code.bucket)
                        .map(|b| b.name.clone())
                        .unwrap_or_default(),
                    environment,
                    role: f.execution_role.id.clone(),
                    resource: f.clone(),
                }
            })
            .collect();

        let graph = ResourceGraph {
            stack: definition.name.clone(),
            environment: env.clone(),
            storage,
            connections: registry.connections().to_vec(),
            log_groups,
            roles,
            builds,
            functions,
            pipeline,
        };

        info!(
            stack = %graph.stack,
            roles = graph.roles.len(),
            builds = graph.builds.len(),
            pipeline = graph.pipeline.is_some(),
            "Stack assembled"
        );
        Ok(graph)
    }
}

fn validate_resources(definition: &Definition, errors: &mut Errors) {
    for storage in &definition.storage {
        if let Err(e) = storage.validate() {
            errors.extend(e);
        }
    }
    for build in &definition.builds {
        if let Err(e) = build.validate() {
            errors.extend(e);
        }
    }
    for function in &definition.functions {
        if let Err(e) = function.validate() {
            errors.extend(e);
        }
    }
    if let Some(pipeline) = &definition.pipeline {
        if pipeline.role.trusted_service != CODEPIPELINE_SERVICE {
            errors.push(Error::validation(
                format!("pipeline '{}'", pipeline.id),
                format!("role must trust '{}'", CODEPIPELINE_SERVICE),
            ));
        }
        if let Err(e) = pipeline.role.validate() {
            errors.extend(e);
        }
    }
}

/// Access every build needs regardless of explicit grants.
fn implicit_build_needs(build: &BuildResource) -> Vec<AccessNeed> {
    let mut needs = Vec::new();
    if let BuildSource::Repository { connection, .. } = &build.source {
        needs.push(AccessNeed::new(&build.id, connection, Capability::Invoke));
    }
    if build.log_group_name().is_some() {
        needs.push(AccessNeed::new(
            &build.id,
            &log_group_id(&build.id),
            Capability::ReadWrite,
        ));
    }
    needs
}

fn implicit_function_needs(function: &FunctionResource) -> Vec<AccessNeed> {
    vec![
        AccessNeed::new(&function.id, &function.code.bucket, Capability::Read),
        AccessNeed::new(
            &function.id,
            &log_group_id(&function.id),
            Capability::ReadWrite,
        ),
    ]
}

fn seed_role(
    synthesizer: &mut PermissionSynthesizer<'_>,
    role: &IdentityRole,
    variables: &VariableContext,
    errors: &mut Errors,
) {
    let owner = format!("role '{}'", role.id);
    let statements: Vec<Permission> = role
        .statements
        .iter()
        .filter_map(|statement| match variables.interpolate(&statement.resource) {
            Ok(resource) => Some(Permission {
                resource,
                ..statement.clone()
            }),
            Err(names) => {
                errors.push(unresolved(&owner, "statement resource", &names));
                None
            }
        })
        .collect();
    debug!(role = %role.id, declared = statements.len(), "Seeding role");
    synthesizer.declare(&role.id);
    synthesizer.seed(&role.id, statements);
}

fn resolve_environment(
    owner: &str,
    vars: &[EnvironmentVariable],
    variables: &VariableContext,
    errors: &mut Errors,
) -> Vec<EnvironmentVariable> {
    vars.iter()
        .map(|var| match variables.interpolate(&var.value) {
            Ok(value) => EnvironmentVariable::new(&var.name, value),
            Err(names) => {
                errors.push(unresolved(
                    owner,
                    &format!("environment variable '{}'", var.name),
                    &names,
                ));
                var.clone()
            }
        })
        .collect()
}

fn unresolved(owner: &str, what: &str, names: &[String]) -> Error {
    let names: Vec<String> = names.iter().map(|n| format!("${{{}}}", n)).collect();
    Error::validation(
        owner,
        format!("unresolved variable(s) {} in {}", names.join(", "), what),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipekit_config::parse_definition;
    use pipekit_core::identity::{Effect, Principal, actions};
    use pipekit_core::storage::StorageResource;
    use pipekit_core::trigger::EventKind;
    use pipekit_core::{Environment, LogicalId};
    use std::collections::BTreeMap;

    const CONNECTION_ID: &str = "0f5e7a3c-4b2d-4c1e-9a8f-123456789abc";

    const FRONTEND: &str = r#"
        stack "im-frontend"

        connection "GitHub" provider="github"

        storage "WebHosting" visibility="website" bucket-name="im-frontend-site" {
            website index="index.html" error="index.html"
            policy "PublicReadGetObject" "get-object" principal="*" scope="objects"
        }

        storage "PipelineArtifacts" bucket-name="im-frontend-artifacts" versioned=#true {
            lifecycle "DeleteOldArtifacts" expiration-days=1 abort-incomplete-upload-days=2
        }

        build "FrontendBuild" {
            source "pipeline"
            timeout 20
            env "S3_BUCKET" "${storage.WebHosting.name}"
        }

        grant "FrontendBuild" on="WebHosting" capability="read-write"

        pipeline "FrontendPipeline" artifact-store="PipelineArtifacts" {
            stage "Source" {
                action "GitHub_Source" kind="source" connection="GitHub" repository="acme/im-frontend" branch="develop" {
                    output "SourceOutput"
                }
            }
            stage "Build" {
                action "CodeBuild" kind="build" project="FrontendBuild" {
                    input "SourceOutput"
                }
            }
        }
    "#;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    fn assembler() -> Assembler {
        let env = Environment::new("us-east-1", "123456789012").unwrap();
        let config = DeploymentConfig::new(env)
            .with_connection("GitHub", CONNECTION_ID)
            .unwrap();
        Assembler::new(config)
    }

    fn role_statements(graph: &ResourceGraph) -> BTreeMap<String, Vec<Permission>> {
        graph
            .roles()
            .iter()
            .map(|r| (r.logical_id.to_string(), r.statements.clone()))
            .collect()
    }

    fn actions_of(permission: &Permission) -> Vec<&str> {
        permission.actions.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_frontend_stack() {
        let definition = parse_definition(FRONTEND).unwrap();
        let graph = assembler().assemble(&definition).unwrap();

        let site = graph.bucket(&id("WebHosting")).unwrap();
        assert_eq!(site.arn, "arn:aws:s3:::im-frontend-site");
        assert_eq!(site.policy.len(), 1);
        assert_eq!(site.policy[0].principal, Principal::Anonymous);
        assert_eq!(site.policy[0].actions, ["get-object"]);
        assert_eq!(site.policy[0].resource, "arn:aws:s3:::im-frontend-site/*");

        let build = graph.build(&id("FrontendBuild")).unwrap();
        assert_eq!(build.environment[0].value, "im-frontend-site");
        assert_eq!(build.resource.timeout_minutes, 20);

        let statements = graph.permissions_of(&id("FrontendBuild")).unwrap();
        let site_objects = statements
            .iter()
            .find(|p| p.resource == "arn:aws:s3:::im-frontend-site/*")
            .unwrap();
        assert_eq!(
            actions_of(site_objects),
            ["delete-object", "get-object", "put-object"]
        );
        let site_bucket = statements
            .iter()
            .find(|p| p.resource == "arn:aws:s3:::im-frontend-site")
            .unwrap();
        assert_eq!(actions_of(site_bucket), ["get-bucket-location", "list-bucket"]);

        let log_group = "arn:aws:logs:us-east-1:123456789012:log-group:/aws/codebuild/FrontendBuild";
        for resource in [log_group.to_string(), format!("{}:*", log_group)] {
            let logs = statements.iter().find(|p| p.resource == resource).unwrap();
            assert_eq!(
                actions_of(logs),
                ["create-log-group", "create-log-stream", "put-log-events"]
            );
        }

        let pipeline = graph.pipeline().unwrap();
        assert_eq!(pipeline.artifact_bucket, "im-frontend-artifacts");
        let pipeline_statements = graph.permissions_of(&id("FrontendPipeline")).unwrap();
        assert!(pipeline_statements.iter().any(|p| {
            p.resource.ends_with(CONNECTION_ID) && p.actions.contains(actions::USE_CONNECTION)
        }));
        assert!(pipeline_statements.iter().any(|p| {
            p.resource.ends_with(":project/FrontendBuild")
                && p.actions.contains(actions::START_BUILD)
        }));
    }

    #[test]
    fn test_assembly_is_deterministic() {
        let definition = parse_definition(FRONTEND).unwrap();
        let first = assembler().assemble(&definition).unwrap();
        let second = assembler().assemble(&definition).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_repeated_grant_changes_nothing() {
        let definition = parse_definition(FRONTEND).unwrap();
        let mut doubled = definition.clone();
        doubled.grants.push(doubled.grants[0].clone());

        let once = assembler().assemble(&definition).unwrap();
        let twice = assembler().assemble(&doubled).unwrap();
        assert_eq!(role_statements(&once), role_statements(&twice));
    }

    #[test]
    fn test_private_buckets_have_no_anonymous_statements() {
        let definition = parse_definition(FRONTEND).unwrap();
        let graph = assembler().assemble(&definition).unwrap();
        let artifacts = graph.bucket(&id("PipelineArtifacts")).unwrap();
        assert!(artifacts.policy.iter().all(|p| !p.principal.is_anonymous()));
        assert!(artifacts.website_url.is_none());
    }

    #[test]
    fn test_anonymous_statement_on_private_bucket_fails() {
        let mut definition = parse_definition(FRONTEND).unwrap();
        let public = StorageResource::website(id("Leaky"), "index.html", None);
        let mut leaky = StorageResource::private(id("Leaky"));
        leaky.policy = public.policy;
        definition.storage.push(leaky);

        let report = assembler().assemble(&definition).unwrap_err();
        assert!(
            report
                .errors
                .iter()
                .any(|e| matches!(e, Error::Validation { resource, .. } if resource.contains("Leaky")))
        );
    }

    #[test]
    fn test_dangling_artifact_reported() {
        let kdl = FRONTEND.replace(r#"input "SourceOutput""#, r#"input "Missing""#);
        let definition = parse_definition(&kdl).unwrap();
        let report = assembler().assemble(&definition).unwrap_err();
        assert_eq!(
            report.errors,
            vec![Error::DanglingArtifact {
                stage: "Build".to_string(),
                action: "CodeBuild".to_string(),
                artifact: "Missing".to_string(),
            }]
        );
    }

    #[test]
    fn test_duplicate_artifact_reported() {
        let kdl = FRONTEND.replace(
            r#"input "SourceOutput""#,
            "input \"SourceOutput\"\n                    output \"SourceOutput\"",
        );
        let definition = parse_definition(&kdl).unwrap();
        let report = assembler().assemble(&definition).unwrap_err();
        assert_eq!(
            report.errors,
            vec![Error::DuplicateArtifact {
                artifact: "SourceOutput".to_string(),
                first: "Source/GitHub_Source".to_string(),
                second: "Build/CodeBuild".to_string(),
            }]
        );
    }

    #[test]
    fn test_errors_are_aggregated() {
        let kdl = FRONTEND
            .replace(r#"on="WebHosting""#, r#"on="Nowhere""#)
            .replace(r#"input "SourceOutput""#, r#"input "Missing""#);
        let definition = parse_definition(&kdl).unwrap();
        let report = assembler().assemble(&definition).unwrap_err();
        assert_eq!(report.errors.len(), 2);
        assert!(matches!(report.errors[0], Error::UnknownResource { .. }));
        assert!(matches!(report.errors[1], Error::DanglingArtifact { .. }));
        let rendered = report.to_string();
        assert!(rendered.starts_with("assembly failed with 2 error(s):"));
        assert_eq!(rendered.lines().count(), 3);
    }

    #[test]
    fn test_unresolved_variable() {
        let kdl = FRONTEND.replace("${storage.WebHosting.name}", "${storage.Missing.name}");
        let definition = parse_definition(&kdl).unwrap();
        let report = assembler().assemble(&definition).unwrap_err();
        assert!(report.errors[0].to_string().contains("${storage.Missing.name}"));
    }

    #[test]
    fn test_missing_connection_id() {
        let definition = parse_definition(FRONTEND).unwrap();
        let env = Environment::new("us-east-1", "123456789012").unwrap();
        let report = Assembler::new(DeploymentConfig::new(env))
            .assemble(&definition)
            .unwrap_err();
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].to_string().contains("PIPEKIT_CONNECTION_GITHUB"));
    }

    #[test]
    fn test_webhook_build_without_pipeline() {
        let kdl = r#"
            stack "im-frontend-develop"
            connection "GitHub"
            storage "Site" visibility="website" {
                website index="index.html"
                policy "PublicReadGetObject" "get-object" principal="*" scope="objects"
            }
            build "DevelopBuild" {
                source "repository" connection="GitHub" repository="acme/im-frontend" branch="develop"
                trigger event="push" branch="develop"
                env "S3_BUCKET" "${storage.Site.name}"
            }
            grant "DevelopBuild" on="Site" capability="read-write"
        "#;
        let definition = parse_definition(kdl).unwrap();
        let graph = assembler().assemble(&definition).unwrap();
        assert!(graph.pipeline().is_none());

        let build = graph.build(&id("DevelopBuild")).unwrap();
        assert_eq!(build.source_version.as_deref(), Some("refs/heads/develop"));
        let trigger = build.trigger.as_ref().unwrap();
        assert!(trigger.webhook);
        assert!(trigger.filter_groups[0].matches(EventKind::Push, "refs/heads/develop"));
        assert!(!trigger.filter_groups[0].matches(EventKind::Push, "refs/heads/develop-v2"));

        let statements = graph.permissions_of(&id("DevelopBuild")).unwrap();
        assert!(statements.iter().all(|p| p.effect == Effect::Allow));
        assert!(statements.iter().any(|p| p.actions.contains(actions::USE_CONNECTION)));
    }

    #[test]
    fn test_invalid_trigger_reported() {
        let kdl = r#"
            stack "bad-trigger"
            connection "GitHub"
            build "DevelopBuild" {
                source "repository" connection="GitHub" repository="acme/web" branch="develop"
                trigger event="push" branch="main"
            }
        "#;
        let definition = parse_definition(kdl).unwrap();
        let report = assembler().assemble(&definition).unwrap_err();
        assert!(matches!(report.errors[0], Error::InvalidTrigger { .. }));
    }

    #[test]
    fn test_lambda_deploy_pipeline() {
        let kdl = r#"
            stack "api"
            connection "GitHub"
            storage "Artifacts"
            storage "Packages"
            build "ApiBuild" {
                source "pipeline"
            }
            function "Api" runtime="java17" handler="com.example.Handler::handleRequest" {
                code bucket="Packages" key="initial.jar"
            }
            pipeline "ApiPipeline" artifact-store="Artifacts" {
                stage "Source" {
                    action "Checkout" kind="source" connection="GitHub" repository="acme/api" branch="main" {
                        output "Source"
                    }
                }
                stage "Build" {
                    action "Package" kind="build" project="ApiBuild" {
                        input "Source"
                        output "Jar"
                    }
                }
                stage "Deploy" {
                    action "Update" kind="deploy" target="Api" {
                        input "Jar"
                    }
                }
            }
        "#;
        let definition = parse_definition(kdl).unwrap();
        let graph = assembler().assemble(&definition).unwrap();

        let pipeline = graph.pipeline().unwrap();
        assert_eq!(pipeline.stages.len(), 3);
        assert_eq!(
            pipeline.stages[2].actions[0].configuration["FunctionName"],
            "Api"
        );

        let function_statements = graph.permissions_of(&id("Api")).unwrap();
        assert_eq!(function_statements.len(), 3);
        let package = function_statements
            .iter()
            .find(|p| p.resource.starts_with("arn:aws:s3:::"))
            .unwrap();
        assert_eq!(actions_of(package), ["get-object"]);

        let log_group = "arn:aws:logs:us-east-1:123456789012:log-group:/aws/lambda/Api";
        for resource in [log_group.to_string(), format!("{}:*", log_group)] {
            let logs = function_statements
                .iter()
                .find(|p| p.resource == resource)
                .unwrap();
            assert_eq!(
                actions_of(logs),
                ["create-log-group", "create-log-stream", "put-log-events"]
            );
        }
        assert!(
            graph
                .log_groups()
                .iter()
                .any(|g| g.name == "/aws/lambda/Api" && g.owner == id("Api"))
        );

        let pipeline_statements = graph.permissions_of(&id("ApiPipeline")).unwrap();
        let deploy = pipeline_statements
            .iter()
            .find(|p| p.resource.ends_with(":function:Api"))
            .unwrap();
        assert!(deploy.actions.contains(actions::UPDATE_FUNCTION_CODE));

        let build_statements = graph.permissions_of(&id("ApiBuild")).unwrap();
        assert!(
            build_statements
                .iter()
                .any(|p| p.resource.ends_with("/*") && p.actions.contains(actions::PUT_OBJECT))
        );
    }

    #[test]
    fn test_demo_definitions_assemble() {
        for kdl in [
            include_str!("../../../demos/frontend.kdl"),
            include_str!("../../../demos/webhook-build.kdl"),
            include_str!("../../../demos/lambda-deploy.kdl"),
        ] {
            let definition = parse_definition(kdl).unwrap();
            let result = assembler().assemble(&definition);
            assert!(result.is_ok(), "{}: {:?}", definition.name, result.err());
        }
    }
}
