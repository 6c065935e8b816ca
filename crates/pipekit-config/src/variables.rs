//! Variable interpolation for resource references.
//!
//! Supports variables like:
//! - `${env.region}` - Target region
//! - `${env.account}` - Target account
//! - `${env.partition}` - Target partition
//! - `${storage.<id>.name}` / `${storage.<id>.arn}` - Bucket name / ARN
//! - `${build.<id>.name}` / `${build.<id>.arn}` - Build project name / ARN
//! - `${function.<id>.name}` / `${function.<id>.arn}` - Function name / ARN
//! - `${connection.<id>.arn}` - Resolved connection ARN
//!
//! Unknown variables are an error rather than being passed through, so a
//! typo never reaches the synthesized graph.

use pipekit_core::Environment;
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Name and ARN of a resource that can be referenced.
#[derive(Debug, Clone, Default)]
pub struct ResourceVars {
    pub name: String,
    pub arn: String,
}

/// Variable context containing every resource reference available for interpolation.
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    pub partition: String,
    pub region: String,
    pub account: String,
    pub storage: HashMap<String, ResourceVars>,
    pub builds: HashMap<String, ResourceVars>,
    pub functions: HashMap<String, ResourceVars>,
    pub connections: HashMap<String, ResourceVars>,
}

// Regex for matching ${...} variables; ids may contain '-'
static VAR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_-]*){0,2})\}").unwrap()
});

impl VariableContext {
    /// Create a new empty variable context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a variable name to its value.
    pub fn resolve(&self, var_name: &str) -> Option<String> {
        let parts: Vec<&str> = var_name.split('.').collect();

        let lookup = |map: &HashMap<String, ResourceVars>, id: &str, field: &str| {
            map.get(id).and_then(|vars| match field {
                "name" => Some(vars.name.clone()),
                "arn" => Some(vars.arn.clone()),
                _ => None,
            })
        };

        match parts.as_slice() {
            ["env", "region"] => Some(self.region.clone()),
            ["env", "account"] => Some(self.account.clone()),
            ["env", "partition"] => Some(self.partition.clone()),

            ["storage", id, field] => lookup(&self.storage, id, field),
            ["build", id, field] => lookup(&self.builds, id, field),
            ["function", id, field] => lookup(&self.functions, id, field),
            ["connection", id, "arn"] => self.connections.get(*id).map(|v| v.arn.clone()),

            _ => None,
        }
    }

    /// Interpolate all variables in a string.
    ///
    /// Returns the names of every unresolved variable on failure.
    pub fn interpolate(&self, input: &str) -> Result<String, Vec<String>> {
        let mut unresolved = Vec::new();
        let output = VAR_REGEX
            .replace_all(input, |caps: &regex::Captures| {
                let var_name = &caps[1];
                self.resolve(var_name).unwrap_or_else(|| {
                    unresolved.push(var_name.to_string());
                    String::new()
                })
            })
            .to_string();

        if unresolved.is_empty() {
            Ok(output)
        } else {
            Err(unresolved)
        }
    }
}

/// Builder for creating VariableContext.
pub struct VariableContextBuilder {
    ctx: VariableContext,
}

impl VariableContextBuilder {
    pub fn new() -> Self {
        Self {
            ctx: VariableContext::new(),
        }
    }

    pub fn with_environment(mut self, env: &Environment) -> Self {
        self.ctx.partition = env.partition().to_string();
        self.ctx.region = env.region().to_string();
        self.ctx.account = env.account().to_string();
        self
    }

    pub fn with_storage(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        arn: impl Into<String>,
    ) -> Self {
        self.ctx.storage.insert(id.into(), vars(name, arn));
        self
    }

    pub fn with_build(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        arn: impl Into<String>,
    ) -> Self {
        self.ctx.builds.insert(id.into(), vars(name, arn));
        self
    }

    pub fn with_function(
        mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        arn: impl Into<String>,
    ) -> Self {
        self.ctx.functions.insert(id.into(), vars(name, arn));
        self
    }

    pub fn with_connection(mut self, id: impl Into<String>, arn: impl Into<String>) -> Self {
        self.ctx.connections.insert(id.into(), vars(String::new(), arn));
        self
    }

    pub fn build(self) -> VariableContext {
        self.ctx
    }
}

impl Default for VariableContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn vars(name: impl Into<String>, arn: impl Into<String>) -> ResourceVars {
    ResourceVars {
        name: name.into(),
        arn: arn.into(),
    }
}
