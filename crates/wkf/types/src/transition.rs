//! Workflow transitions: guarded edges between nodes
//!
//! A transition connects a start node to a next node. It may carry a
//! guard expression, evaluated against the target entity when the
//! start node splits. A transition with no guard is always eligible.

use crate::NodeId;
use serde::{Deserialize, Serialize};

/// Unique identifier for a transition within its workflow
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransitionId(pub String);

impl TransitionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransitionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An edge in the workflow graph
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub id: TransitionId,
    /// Human-readable label for this transition
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Ordering among the outgoing transitions of one node (ascending)
    #[serde(default)]
    pub sequence: i32,
    /// Source node
    pub start_node: NodeId,
    /// Target node
    pub next_node: NodeId,
    /// Guard expression; `None` is always satisfied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
}

impl Transition {
    /// Create an unguarded transition
    pub fn new(
        id: impl Into<String>,
        start_node: impl Into<String>,
        next_node: impl Into<String>,
    ) -> Self {
        Self {
            id: TransitionId::new(id),
            name: String::new(),
            description: String::new(),
            sequence: 0,
            start_node: NodeId::new(start_node),
            next_node: NodeId::new(next_node),
            guard: None,
        }
    }

    /// Create a transition guarded by an expression
    pub fn conditional(
        id: impl Into<String>,
        start_node: impl Into<String>,
        next_node: impl Into<String>,
        guard: impl Into<String>,
    ) -> Self {
        Self::new(id, start_node, next_node).with_guard(guard)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_sequence(mut self, sequence: i32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_guard(mut self, guard: impl Into<String>) -> Self {
        self.guard = Some(guard.into());
        self
    }

    pub fn is_guarded(&self) -> bool {
        self.guard.is_some()
    }

    /// Display label, falling back to the id
    pub fn label(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }
}
