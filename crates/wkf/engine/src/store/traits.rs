//! Storage trait definitions

use crate::error::StoreError;
use std::sync::Arc;
use wkf_types::{Instance, InstanceId, TargetRef, Workflow, WorkflowId};

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Combined storage trait
pub trait Persistence: WorkflowStore + InstanceStore + Send + Sync {}

/// Storage for workflow definitions. The write path is used by
/// definition tooling only; runs never modify a workflow.
pub trait WorkflowStore: Send + Sync {
    /// Create or replace a workflow
    fn save_workflow(&self, workflow: Arc<Workflow>) -> StoreResult<()>;

    /// Get a workflow by ID
    fn load_workflow(&self, id: &WorkflowId) -> StoreResult<Option<Arc<Workflow>>>;

    /// Workflows governing a target model, in ascending sequence order
    fn workflows_for_model(&self, model: &str) -> StoreResult<Vec<Arc<Workflow>>>;
}

/// Storage for instances
pub trait InstanceStore: Send + Sync {
    /// Get an instance by ID
    fn load_instance(&self, id: &InstanceId) -> StoreResult<Option<Instance>>;

    /// Find the instance of a workflow for a target entity
    fn find_instance(
        &self,
        workflow_id: &WorkflowId,
        target: &TargetRef,
    ) -> StoreResult<Option<Instance>>;

    /// Store a new instance, unless one already exists for the same
    /// (workflow, target) pair. Returns the stored instance either way.
    fn create_instance(&self, instance: Instance) -> StoreResult<Instance>;

    /// Write back an instance. Fails with `Conflict` if the stored
    /// version differs from `instance.version`, or if a never-stored
    /// instance (version 0) targets a (workflow, target) pair that
    /// already has an instance. Returns the new version.
    fn commit(&self, instance: &Instance) -> StoreResult<u64>;

    /// All instances of a workflow
    fn list_instances(&self, workflow_id: &WorkflowId) -> StoreResult<Vec<Instance>>;
}
