//! Pipeline stage and action definitions.

use serde::{Deserialize, Serialize};

use crate::LogicalId;
use crate::identity::{CODEPIPELINE_SERVICE, IdentityRole};

/// Format of the artifact a source action produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    CodeZip,
    FullClone,
}

impl OutputFormat {
    pub fn as_config_value(&self) -> &'static str {
        match self {
            OutputFormat::CodeZip => "CODE_ZIP",
            OutputFormat::FullClone => "CODEBUILD_CLONE_REF",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "code-zip" => Ok(OutputFormat::CodeZip),
            "full-clone" => Ok(OutputFormat::FullClone),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

/// What an action does, and the resource it drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActionKind {
    Source {
        connection: LogicalId,
        repository: String,
        branch: String,
        #[serde(default)]
        output_format: OutputFormat,
    },
    Build {
        project: LogicalId,
    },
    Deploy {
        target: LogicalId,
    },
}

impl ActionKind {
    /// The declared resource this action touches.
    pub fn resource(&self) -> &LogicalId {
        match self {
            ActionKind::Source { connection, .. } => connection,
            ActionKind::Build { project } => project,
            ActionKind::Deploy { target } => target,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            ActionKind::Source { .. } => "Source",
            ActionKind::Build { .. } => "Build",
            ActionKind::Deploy { .. } => "Deploy",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    pub name: String,
    pub kind: ActionKind,
    /// Artifact names consumed, in order.
    pub inputs: Vec<String>,
    /// Artifact names produced, in order.
    pub outputs: Vec<String>,
}

/// Stages run in declaration order; actions within a stage run in parallel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub name: String,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineResource {
    pub id: LogicalId,
    pub pipeline_name: Option<String>,
    /// Private storage resource used as the artifact blob store.
    pub artifact_store: LogicalId,
    pub stages: Vec<Stage>,
    pub role: IdentityRole,
}

impl PipelineResource {
    pub fn new(id: LogicalId, artifact_store: LogicalId, stages: Vec<Stage>) -> Self {
        let role = IdentityRole::for_resource(&id, "Role", CODEPIPELINE_SERVICE);
        Self {
            id,
            pipeline_name: None,
            artifact_store,
            stages,
            role,
        }
    }

    pub fn pipeline_name(&self) -> String {
        self.pipeline_name
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }
}
