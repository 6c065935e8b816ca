//! The declarative input handed to the assembler.

use serde::{Deserialize, Serialize};

use crate::LogicalId;
use crate::build::BuildResource;
use crate::connection::Connection;
use crate::function::FunctionResource;
use crate::identity::Capability;
use crate::pipeline::PipelineResource;
use crate::storage::StorageResource;

/// A declared access need: `consumer` must reach `resource` at `capability`.
///
/// The consumer is a role id, or the id of a resource that owns a role
/// (build, function or pipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessNeed {
    pub consumer: LogicalId,
    pub resource: LogicalId,
    pub capability: Capability,
}

impl AccessNeed {
    pub fn new(consumer: &LogicalId, resource: &LogicalId, capability: Capability) -> Self {
        Self {
            consumer: consumer.clone(),
            resource: resource.clone(),
            capability,
        }
    }
}

/// A complete declarative stack: resources, access needs and an optional pipeline.
///
/// Without a pipeline the definition describes build-only stacks whose
/// projects are started by webhooks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Definition {
    pub name: String,
    #[serde(default)]
    pub storage: Vec<StorageResource>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub builds: Vec<BuildResource>,
    #[serde(default)]
    pub functions: Vec<FunctionResource>,
    #[serde(default)]
    pub grants: Vec<AccessNeed>,
    #[serde(default)]
    pub pipeline: Option<PipelineResource>,
}

impl Definition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
