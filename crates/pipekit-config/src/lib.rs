//! Declarative input for PipeKit.
//!
//! This crate handles:
//! - Stack definitions in KDL or JSON
//! - Deployment configuration (region, account, connection ids)
//! - Variable interpolation for resource references

pub mod definition;
pub mod deployment;
pub mod error;
pub mod variables;

pub use definition::{load_definition, parse_definition, parse_definition_json};
pub use deployment::DeploymentConfig;
pub use error::{ConfigError, ConfigResult};
pub use variables::{VariableContext, VariableContextBuilder};
