//! Pipeline assembly for PipeKit.
//!
//! Turns a declarative [`Definition`](pipekit_core::Definition) into a
//! validated, read-only [`ResourceGraph`]:
//! - resource registry (ARNs, names, role ownership)
//! - permission synthesis from declared and implied access needs
//! - webhook trigger configuration
//! - stage/action topology validation
//!
//! Every failure is collected into a single [`AssemblyReport`].

pub mod assembler;
pub mod graph;
pub mod permissions;
pub mod registry;
pub mod topology;
pub mod trigger;

pub use assembler::{Assembler, AssemblyReport};
pub use graph::ResourceGraph;
pub use permissions::PermissionSynthesizer;
pub use registry::ResourceRegistry;
pub use topology::TopologyBuilder;
pub use trigger::{FilterGroup, TriggerConfig};
