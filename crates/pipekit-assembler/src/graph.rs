//! The assembled, read-only resource graph.

use pipekit_core::build::{BuildResource, EnvironmentVariable};
use pipekit_core::connection::ResolvedConnection;
use pipekit_core::function::FunctionResource;
use pipekit_core::identity::{Effect, Permission, Principal};
use pipekit_core::storage::StorageResource;
use pipekit_core::{Environment, LogicalId};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::trigger::TriggerConfig;

/// Every resource of a stack with names, ARNs and permissions resolved.
///
/// Only produced by a successful assembly and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceGraph {
    pub(crate) stack: String,
    pub(crate) environment: Environment,
    pub(crate) storage: Vec<StorageNode>,
    pub(crate) connections: Vec<ResolvedConnection>,
    pub(crate) log_groups: Vec<LogGroupNode>,
    pub(crate) roles: Vec<RoleNode>,
    pub(crate) builds: Vec<BuildNode>,
    pub(crate) functions: Vec<FunctionNode>,
    pub(crate) pipeline: Option<PipelineNode>,
}

impl ResourceGraph {
    pub fn stack(&self) -> &str {
        &self.stack
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn storage(&self) -> &[StorageNode] {
        &self.storage
    }

    pub fn connections(&self) -> &[ResolvedConnection] {
        &self.connections
    }

    pub fn log_groups(&self) -> &[LogGroupNode] {
        &self.log_groups
    }

    pub fn roles(&self) -> &[RoleNode] {
        &self.roles
    }

    pub fn builds(&self) -> &[BuildNode] {
        &self.builds
    }

    pub fn functions(&self) -> &[FunctionNode] {
        &self.functions
    }

    pub fn pipeline(&self) -> Option<&PipelineNode> {
        self.pipeline.as_ref()
    }

    pub fn role(&self, id: &LogicalId) -> Option<&RoleNode> {
        self.roles.iter().find(|r| &r.logical_id == id)
    }

    pub fn bucket(&self, id: &LogicalId) -> Option<&StorageNode> {
        self.storage.iter().find(|s| &s.logical_id == id)
    }

    pub fn build(&self, id: &LogicalId) -> Option<&BuildNode> {
        self.builds.iter().find(|b| &b.logical_id == id)
    }

    pub fn function(&self, id: &LogicalId) -> Option<&FunctionNode> {
        self.functions.iter().find(|f| &f.logical_id == id)
    }

    /// Statements of the role acting for `owner` (a build, function or pipeline).
    pub fn permissions_of(&self, owner: &LogicalId) -> Option<&[Permission]> {
        let role = self
            .builds
            .iter()
            .find(|b| &b.logical_id == owner)
            .map(|b| &b.role)
            .or_else(|| {
                self.functions
                    .iter()
                    .find(|f| &f.logical_id == owner)
                    .map(|f| &f.role)
            })
            .or_else(|| {
                self.pipeline
                    .as_ref()
                    .filter(|p| &p.logical_id == owner)
                    .map(|p| &p.role)
            })?;
        self.role(role).map(|r| r.statements.as_slice())
    }
}

/// A bucket policy statement with its resource pattern resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketPolicyNode {
    pub sid: String,
    pub effect: Effect,
    pub principal: Principal,
    pub actions: Vec<String>,
    pub resource: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StorageNode {
    pub logical_id: LogicalId,
    pub bucket_name: String,
    pub arn: String,
    pub website_url: Option<String>,
    pub policy: Vec<BucketPolicyNode>,
    pub resource: StorageResource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogGroupNode {
    pub logical_id: LogicalId,
    pub name: String,
    pub arn: String,
    pub retention_days: Option<u32>,
    /// Build or function that writes to the group.
    pub owner: LogicalId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleNode {
    pub logical_id: LogicalId,
    pub trusted_service: String,
    pub statements: Vec<Permission>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildNode {
    pub logical_id: LogicalId,
    pub project_name: String,
    pub arn: String,
    pub compute_type: String,
    /// `refs/heads/<branch>` for repository sources.
    pub source_version: Option<String>,
    /// Connection ARN for repository sources.
    pub source_connection: Option<String>,
    /// Environment with `${...}` references resolved.
    pub environment: Vec<EnvironmentVariable>,
    pub role: LogicalId,
    pub log_group: Option<LogicalId>,
    pub trigger: Option<TriggerConfig>,
    pub resource: BuildResource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionNode {
    pub logical_id: LogicalId,
    pub function_name: String,
    pub arn: String,
    pub code_bucket: String,
    pub environment: Vec<EnvironmentVariable>,
    pub role: LogicalId,
    pub resource: FunctionResource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionNode {
    pub logical_id: LogicalId,
    pub name: String,
    pub category: String,
    pub provider: String,
    /// ARN of the resource the action drives.
    pub resource_arn: String,
    pub configuration: BTreeMap<String, String>,
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub run_order: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageNode {
    pub name: String,
    pub actions: Vec<ActionNode>,
}

/// Where an artifact comes from and who reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactNode {
    pub name: String,
    /// `stage/action` of the producer.
    pub produced_by: String,
    pub consumed_by: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineNode {
    pub logical_id: LogicalId,
    pub pipeline_name: String,
    pub arn: String,
    pub role: LogicalId,
    pub artifact_bucket: String,
    pub stages: Vec<StageNode>,
    pub artifacts: Vec<ArtifactNode>,
}
