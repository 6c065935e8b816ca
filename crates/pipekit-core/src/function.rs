//! Function (deploy target) descriptors.

use serde::{Deserialize, Serialize};

use crate::build::{EnvironmentVariable, check_environment};
use crate::identity::{IdentityRole, LAMBDA_SERVICE};
use crate::{Error, LogicalId, error::Errors};

/// Object holding a function's deployment package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeLocation {
    /// Storage resource holding the package.
    pub bucket: LogicalId,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionResource {
    pub id: LogicalId,
    pub function_name: Option<String>,
    pub runtime: String,
    pub handler: String,
    pub memory_mb: u32,
    pub timeout_seconds: u32,
    pub code: CodeLocation,
    pub environment: Vec<EnvironmentVariable>,
    pub execution_role: IdentityRole,
}

impl FunctionResource {
    pub fn new(
        id: LogicalId,
        runtime: impl Into<String>,
        handler: impl Into<String>,
        code: CodeLocation,
    ) -> Self {
        let execution_role = IdentityRole::for_resource(&id, "ExecutionRole", LAMBDA_SERVICE);
        Self {
            id,
            function_name: None,
            runtime: runtime.into(),
            handler: handler.into(),
            memory_mb: 512,
            timeout_seconds: 30,
            code,
            environment: Vec::new(),
            execution_role,
        }
    }

    pub fn function_name(&self) -> String {
        self.function_name
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }

    /// Log group the function runtime writes to.
    pub fn log_group_name(&self) -> String {
        format!("/aws/lambda/{}", self.function_name())
    }

    pub fn validate(&self) -> Result<(), Vec<Error>> {
        let mut errors = Errors::new();
        let owner = format!("function '{}'", self.id);

        if self.runtime.trim().is_empty() {
            errors.push(Error::validation(&owner, "runtime is empty"));
        }
        if self.handler.trim().is_empty() {
            errors.push(Error::validation(&owner, "handler is empty"));
        }
        if !(128..=10240).contains(&self.memory_mb) {
            errors.push(Error::validation(
                &owner,
                format!("memory {} MB is outside 128-10240", self.memory_mb),
            ));
        }
        if !(1..=900).contains(&self.timeout_seconds) {
            errors.push(Error::validation(
                &owner,
                format!("timeout {} seconds is outside 1-900", self.timeout_seconds),
            ));
        }
        if self.code.key.trim().is_empty() {
            errors.push(Error::validation(&owner, "code key is empty"));
        }
        errors.extend(check_environment(&owner, &self.environment));

        if self.execution_role.trusted_service != LAMBDA_SERVICE {
            errors.push(Error::validation(
                &owner,
                format!("execution role must trust '{}'", LAMBDA_SERVICE),
            ));
        }
        if let Err(role_errors) = self.execution_role.validate() {
            errors.extend(role_errors);
        }

        errors.finish()
    }
}
