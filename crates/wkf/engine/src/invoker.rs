//! ActionInvoker: the seam between the engine and guard/action execution
//!
//! The engine never interprets guard expressions or action keys itself.
//! Every call carries its context explicitly through [`InvocationContext`].

use crate::error::InvokerError;
use wkf_types::{InstanceId, NodeId, TargetRef, WorkflowId};

/// Everything an invoker may know about the call site
#[derive(Clone, Copy, Debug)]
pub struct InvocationContext<'a> {
    pub workflow_id: &'a WorkflowId,
    /// Absent while deciding which workflow applies to an entity
    pub instance_id: Option<&'a InstanceId>,
    pub target: &'a TargetRef,
    /// The node being entered or split
    pub node: Option<&'a NodeId>,
    /// Caller identity passed to `run_as`
    pub actor: Option<&'a str>,
}

impl<'a> InvocationContext<'a> {
    pub fn new(workflow_id: &'a WorkflowId, target: &'a TargetRef) -> Self {
        Self {
            workflow_id,
            instance_id: None,
            target,
            node: None,
            actor: None,
        }
    }

    pub fn with_instance(mut self, instance_id: &'a InstanceId) -> Self {
        self.instance_id = Some(instance_id);
        self
    }

    pub fn at_node(mut self, node: &'a NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_actor(mut self, actor: Option<&'a str>) -> Self {
        self.actor = actor;
        self
    }
}

/// Result of an entry action. JSON objects are merged into the run context.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionOutcome {
    pub value: serde_json::Value,
}

impl ActionOutcome {
    pub fn new(value: serde_json::Value) -> Self {
        Self { value }
    }

    /// An outcome carrying nothing
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Executes guards and entry actions on behalf of the engine
pub trait ActionInvoker: Send + Sync {
    /// Evaluate a guard expression against the target entity
    fn evaluate_guard(
        &self,
        expression: &str,
        ctx: &InvocationContext<'_>,
    ) -> Result<bool, InvokerError>;

    /// Execute the entry action registered under `action_key`
    fn execute_action(
        &self,
        action_key: &str,
        ctx: &InvocationContext<'_>,
    ) -> Result<ActionOutcome, InvokerError>;

    /// Called once a run has been committed, with the merged context of
    /// its action outcomes. Never called for a run that was rolled back.
    fn apply_context(
        &self,
        _ctx: &InvocationContext<'_>,
        _context: &serde_json::Map<String, serde_json::Value>,
    ) {
    }
}
