//! Error types for the graph and instance models

use crate::{NodeId, TransitionId, WorkflowId};

/// A malformed process graph. Raised only while a workflow is being
/// defined or imported, never by a running instance.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphIntegrityError {
    #[error("Workflow '{0}' has no start node")]
    NoStartNode(WorkflowId),

    #[error("Workflow '{workflow}' has {} start nodes: {nodes:?}", .nodes.len())]
    MultipleStartNodes {
        workflow: WorkflowId,
        nodes: Vec<NodeId>,
    },

    #[error("Transition '{transition}' references node '{node}' outside workflow '{workflow}'")]
    DanglingTransition {
        workflow: WorkflowId,
        transition: TransitionId,
        node: NodeId,
    },

    #[error("Duplicate node ID: {0}")]
    DuplicateNodeId(NodeId),

    #[error("Duplicate transition ID: {0}")]
    DuplicateTransitionId(TransitionId),

    #[error("Workflow '{0}' must allow at least one visit per node (max_node_counter = 0)")]
    InvalidMaxNodeCounter(WorkflowId),
}

/// Errors raised by graph queries and instance mutation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorkflowError {
    #[error("Node '{node}' reached {visits} visits, limit is {max}")]
    CycleLimitExceeded { node: NodeId, visits: u32, max: u32 },

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Instance belongs to workflow '{expected}', not '{found}'")]
    WorkflowMismatch {
        expected: WorkflowId,
        found: WorkflowId,
    },

    #[error(transparent)]
    Integrity(#[from] GraphIntegrityError),
}

/// Result type alias for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;
