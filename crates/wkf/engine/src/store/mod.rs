//! Persistence layer
//!
//! Workflows and instances are stored behind the [`WorkflowStore`] and
//! [`InstanceStore`] traits. [`MemoryStore`] is the bundled backend.

mod memory;
mod traits;

pub use memory::MemoryStore;
pub use traits::{InstanceStore, Persistence, StoreResult, WorkflowStore};
