//! Registry of every addressable resource in a definition.

use pipekit_config::{DeploymentConfig, VariableContext, VariableContextBuilder};
use pipekit_core::connection::ResolvedConnection;
use pipekit_core::{Definition, Error, LogicalId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    Storage,
    Connection,
    Build,
    LogGroup,
    Function,
    Pipeline,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Storage => write!(f, "storage"),
            ResourceKind::Connection => write!(f, "connection"),
            ResourceKind::Build => write!(f, "build"),
            ResourceKind::LogGroup => write!(f, "log group"),
            ResourceKind::Function => write!(f, "function"),
            ResourceKind::Pipeline => write!(f, "pipeline"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredResource {
    pub id: LogicalId,
    pub kind: ResourceKind,
    /// Physical name (bucket name, project name, connection id, ...).
    pub name: String,
    pub arn: String,
}

/// Logical id → name/ARN lookup, plus which role acts for which resource.
#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: BTreeMap<LogicalId, RegisteredResource>,
    /// Physical name → the resource that claimed it first.
    names: BTreeMap<(ResourceKind, String), LogicalId>,
    /// Owner resource → the role it runs as.
    owned_roles: BTreeMap<LogicalId, LogicalId>,
    role_ids: BTreeSet<LogicalId>,
    /// Declared but unresolvable; their errors were already reported.
    broken: BTreeSet<LogicalId>,
    connections: Vec<ResolvedConnection>,
}

impl ResourceRegistry {
    /// Register everything the definition declares.
    ///
    /// Returns the registry together with duplicate-id and connection
    /// resolution errors.
    pub fn build(definition: &Definition, config: &DeploymentConfig) -> (Self, Vec<Error>) {
        let env = &config.environment;
        let mut registry = Self::default();
        let mut errors = Vec::new();

        for storage in &definition.storage {
            let name = storage.bucket_name();
            registry.register(
                RegisteredResource {
                    id: storage.id.clone(),
                    kind: ResourceKind::Storage,
                    arn: env.bucket_arn(&name),
                    name,
                },
                &mut errors,
            );
        }

        for connection in &definition.connections {
            let resolved = match config.connection_id(connection.id.as_str()) {
                Some(connection_id) => connection.resolve(connection_id, env),
                None => Err(Error::validation(
                    format!("connection '{}'", connection.id),
                    format!(
                        "no connection id configured (set PIPEKIT_CONNECTION_{})",
                        connection.id.as_str().to_uppercase().replace('-', "_")
                    ),
                )),
            };
            match resolved {
                Ok(resolved) => {
                    registry.register(
                        RegisteredResource {
                            id: resolved.id.clone(),
                            kind: ResourceKind::Connection,
                            name: resolved.connection_id.clone(),
                            arn: resolved.connection_arn.clone(),
                        },
                        &mut errors,
                    );
                    registry.connections.push(resolved);
                }
                Err(e) => {
                    errors.push(e);
                    registry.broken.insert(connection.id.clone());
                }
            }
        }

        for build in &definition.builds {
            let name = build.project_name();
            registry.register(
                RegisteredResource {
                    id: build.id.clone(),
                    kind: ResourceKind::Build,
                    arn: env.project_arn(&name),
                    name,
                },
                &mut errors,
            );
            registry.own_role(&build.id, &build.service_role.id);

            if let Some(group) = build.log_group_name() {
                registry.register(
                    RegisteredResource {
                        id: log_group_id(&build.id),
                        kind: ResourceKind::LogGroup,
                        arn: env.log_group_arn(&group),
                        name: group,
                    },
                    &mut errors,
                );
            }
        }

        for function in &definition.functions {
            let name = function.function_name();
            registry.register(
                RegisteredResource {
                    id: function.id.clone(),
                    kind: ResourceKind::Function,
                    arn: env.function_arn(&name),
                    name,
                },
                &mut errors,
            );
            registry.own_role(&function.id, &function.execution_role.id);

            let group = function.log_group_name();
            registry.register(
                RegisteredResource {
                    id: log_group_id(&function.id),
                    kind: ResourceKind::LogGroup,
                    arn: env.log_group_arn(&group),
                    name: group,
                },
                &mut errors,
            );
        }

        if let Some(pipeline) = &definition.pipeline {
            let name = pipeline.pipeline_name();
            registry.register(
                RegisteredResource {
                    id: pipeline.id.clone(),
                    kind: ResourceKind::Pipeline,
                    arn: env.pipeline_arn(&name),
                    name,
                },
                &mut errors,
            );
            registry.own_role(&pipeline.id, &pipeline.role.id);
        }

        (registry, errors)
    }

    fn register(&mut self, resource: RegisteredResource, errors: &mut Vec<Error>) {
        if self.resources.contains_key(&resource.id) {
            errors.push(Error::validation(
                format!("logical id '{}'", resource.id),
                "declared more than once",
            ));
            return;
        }

        // Several logical connections may point at the same external link.
        if resource.kind != ResourceKind::Connection {
            let key = (resource.kind, resource.name.clone());
            if let Some(first) = self.names.get(&key) {
                errors.push(Error::validation(
                    format!("{} '{}'", resource.kind, resource.id),
                    format!(
                        "{} name '{}' is already used by '{}'",
                        resource.kind, resource.name, first
                    ),
                ));
                self.broken.insert(resource.id);
                return;
            }
            self.names.insert(key, resource.id.clone());
        }
        self.resources.insert(resource.id.clone(), resource);
    }

    fn own_role(&mut self, owner: &LogicalId, role: &LogicalId) {
        self.owned_roles.insert(owner.clone(), role.clone());
        self.role_ids.insert(role.clone());
    }

    pub fn get(&self, id: &LogicalId) -> Option<&RegisteredResource> {
        self.resources.get(id)
    }

    /// Declared, but dropped because it could not be resolved.
    pub fn is_broken(&self, id: &LogicalId) -> bool {
        self.broken.contains(id)
    }

    /// The role acting for `consumer`: itself if it is a role id, or the role
    /// owned by the resource it names.
    pub fn role_for(&self, consumer: &LogicalId) -> Option<&LogicalId> {
        self.role_ids
            .get(consumer)
            .or_else(|| self.owned_roles.get(consumer))
    }

    pub fn connections(&self) -> &[ResolvedConnection] {
        &self.connections
    }

    /// Interpolation context exposing every registered name and ARN.
    pub fn variables(&self, config: &DeploymentConfig) -> VariableContext {
        let mut builder = VariableContextBuilder::new().with_environment(&config.environment);
        for resource in self.resources.values() {
            let id = resource.id.to_string();
            builder = match resource.kind {
                ResourceKind::Storage => builder.with_storage(id, &resource.name, &resource.arn),
                ResourceKind::Build => builder.with_build(id, &resource.name, &resource.arn),
                ResourceKind::Function => {
                    builder.with_function(id, &resource.name, &resource.arn)
                }
                ResourceKind::Connection => builder.with_connection(id, &resource.arn),
                ResourceKind::LogGroup | ResourceKind::Pipeline => builder,
            };
        }
        builder.build()
    }
}

/// Logical id of the log group generated for a build or function.
pub fn log_group_id(owner: &LogicalId) -> LogicalId {
    LogicalId::derive(&[owner.as_str(), "LogGroup"])
}
