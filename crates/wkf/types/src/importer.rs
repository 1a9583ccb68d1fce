//! Importer: builds a validated Workflow from an external description

use crate::Workflow;

/// Turns a textual process description into a [`Workflow`].
///
/// Implementations must route construction through
/// [`WorkflowBuilder`](crate::WorkflowBuilder) so that graph integrity
/// is checked before a workflow ever reaches the engine.
pub trait Importer {
    type Error: std::error::Error;

    fn parse(&self, source: &str) -> Result<Workflow, Self::Error>;
}
