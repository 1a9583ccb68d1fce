//! Engine error types

use wkf_types::{InstanceId, NodeId, TransitionId, WorkflowError, WorkflowId};

/// Errors raised while running an instance
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Entry action '{action}' failed at node '{node}': {source}")]
    ActionExecution {
        node: NodeId,
        action: String,
        source: InvokerError,
    },

    #[error("Guard '{expression}' on transition '{transition}' could not be evaluated: {source}")]
    GuardEvaluation {
        transition: TransitionId,
        expression: String,
        source: InvokerError,
    },

    #[error("Condition '{expression}' of workflow '{workflow}' could not be evaluated: {source}")]
    WorkflowCondition {
        workflow: WorkflowId,
        expression: String,
        source: InvokerError,
    },

    #[error("Instance '{0}' is being run by another caller")]
    ConcurrentInstanceAccess(InstanceId),

    #[error("Workflow not found: {0}")]
    WorkflowNotFound(WorkflowId),

    #[error("Instance not found: {0}")]
    InstanceNotFound(InstanceId),

    #[error("Workflow '{workflow}' governs '{expected}', not '{found}'")]
    TargetModelMismatch {
        workflow: WorkflowId,
        expected: String,
        found: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors reported by an [`ActionInvoker`](crate::ActionInvoker)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvokerError {
    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("Cannot evaluate expression: {0}")]
    InvalidExpression(String),

    #[error("Unknown action '{0}'")]
    UnknownAction(String),

    #[error("{0}")]
    Failed(String),
}

/// Errors raised by a persistence backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Stale write to instance '{id}': expected version {expected}, stored version is {found}")]
    Conflict {
        id: InstanceId,
        expected: u64,
        found: u64,
    },

    #[error("Instance not found: {0}")]
    NotFound(InstanceId),

    #[error("Backend error: {0}")]
    Backend(String),
}
