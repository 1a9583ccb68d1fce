//! Workflow domain types for wkf
//!
//! wkf drives business entities through process graphs whose nodes
//! combine incoming and outgoing transitions with AND/OR logic, in the
//! manner of process-modeling gateways.
//!
//! # Key Concepts
//!
//! - **Workflow**: an immutable graph of nodes and guarded transitions,
//!   bound to one target model. Built and validated by [`WorkflowBuilder`].
//! - **Node**: a process step with a join operator (how incoming
//!   transitions combine) and a split operator (how outgoing ones fire).
//! - **Transition**: an edge with an optional guard and a sequence used
//!   to order OR-splits.
//! - **Instance**: the runtime state of one entity in one workflow:
//!   active nodes, visit counters, join arrivals and history.
//! - **Importer**: anything that turns a textual description into a
//!   validated [`Workflow`].

#![deny(unsafe_code)]

mod definition;
mod errors;
mod importer;
mod instance;
mod transition;

pub use definition::*;
pub use errors::*;
pub use importer::*;
pub use instance::*;
pub use transition::*;
