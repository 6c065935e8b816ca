//! Core resource model for PipeKit pipeline assembly.
//!
//! This crate contains:
//! - Logical identifiers and deployment environment (ARN templating)
//! - Storage, connection, build and function descriptors
//! - Identity roles and permission statements
//! - Trigger specifications
//! - Pipeline stage/action definitions
//! - The declarative `Definition` consumed by the assembler
//! - The error taxonomy shared by every crate

pub mod build;
pub mod connection;
pub mod definition;
pub mod environment;
pub mod error;
pub mod function;
pub mod id;
pub mod identity;
pub mod pipeline;
pub mod storage;
pub mod trigger;

pub use definition::Definition;
pub use environment::Environment;
pub use error::{Error, Result};
pub use id::LogicalId;
