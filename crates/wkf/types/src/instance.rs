//! Workflow instances: the runtime state of one entity in one workflow
//!
//! An Instance tracks which nodes are active, how often each node has
//! been visited, which AND-join arrivals are outstanding, and the
//! history of every fired transition. Only the engine mutates it.

use crate::{NodeId, Transition, TransitionId, Workflow, WorkflowError, WorkflowId, WorkflowResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ── Instance Identifier ──────────────────────────────────────────────

/// Unique identifier for a workflow instance
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl InstanceId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Target Reference ─────────────────────────────────────────────────

/// The business entity an instance is driving: a model name and a record id
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    pub model: String,
    pub id: String,
}

impl TargetRef {
    pub fn new(model: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for TargetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.model, self.id)
    }
}

// ── Instance ─────────────────────────────────────────────────────────

/// A running instance of a workflow for one target entity
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Instance {
    /// Unique instance identifier
    pub id: InstanceId,
    /// The workflow this instance was created from
    pub workflow_id: WorkflowId,
    /// The entity being driven
    pub target: TargetRef,
    /// Current lifecycle state
    pub status: InstanceStatus,
    /// Why the instance failed (if it did)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureDetail>,
    /// Ordered record of fired transitions
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    /// Optimistic concurrency counter, bumped by the store on every commit
    #[serde(default)]
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    active_nodes: BTreeSet<NodeId>,
    visit_counters: BTreeMap<NodeId, u32>,
    #[serde(default)]
    join_arrivals: BTreeMap<NodeId, BTreeSet<TransitionId>>,
    #[serde(default)]
    pending_entry: BTreeSet<NodeId>,
}

impl Instance {
    /// Create an instance with the workflow's root node active (visit 1)
    pub fn new(workflow: &Workflow, target: TargetRef) -> Self {
        let now = Utc::now();
        let root = workflow.root_node().clone();
        Self {
            id: InstanceId::generate(),
            workflow_id: workflow.id().clone(),
            target,
            status: InstanceStatus::Pending,
            failure: None,
            history: Vec::new(),
            version: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
            active_nodes: BTreeSet::from([root.clone()]),
            visit_counters: BTreeMap::from([(root.clone(), 1)]),
            join_arrivals: BTreeMap::new(),
            pending_entry: BTreeSet::from([root]),
        }
    }

    // ── Node activation ──────────────────────────────────────────────

    /// Activate a node, counting the visit.
    ///
    /// Returns `Ok(false)` without touching the counter if the node is
    /// already active. Fails with `CycleLimitExceeded` if this visit
    /// would exceed the workflow's `max_node_counter`.
    pub fn activate(&mut self, workflow: &Workflow, node_id: &NodeId) -> WorkflowResult<bool> {
        self.check_workflow(workflow)?;
        workflow.require_node(node_id)?;

        if self.active_nodes.contains(node_id) {
            return Ok(false);
        }

        let visits = self.visits(node_id) + 1;
        let max = workflow.max_node_counter();
        if visits > max {
            return Err(WorkflowError::CycleLimitExceeded {
                node: node_id.clone(),
                visits,
                max,
            });
        }

        self.visit_counters.insert(node_id.clone(), visits);
        self.active_nodes.insert(node_id.clone());
        self.pending_entry.insert(node_id.clone());
        self.updated_at = Utc::now();
        Ok(true)
    }

    /// Remove a node from the active set. Returns whether it was active.
    pub fn deactivate(&mut self, node_id: &NodeId) -> bool {
        self.pending_entry.remove(node_id);
        let removed = self.active_nodes.remove(node_id);
        if removed {
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn is_active(&self, node_id: &NodeId) -> bool {
        self.active_nodes.contains(node_id)
    }

    /// Currently active nodes, ordered by id
    pub fn active_nodes(&self) -> &BTreeSet<NodeId> {
        &self.active_nodes
    }

    /// Number of times a node has been activated
    pub fn visits(&self, node_id: &NodeId) -> u32 {
        self.visit_counters.get(node_id).copied().unwrap_or(0)
    }

    pub fn visit_counters(&self) -> &BTreeMap<NodeId, u32> {
        &self.visit_counters
    }

    // ── Entry actions ────────────────────────────────────────────────

    /// Active nodes whose entry action has not run yet
    pub fn pending_entry(&self) -> &BTreeSet<NodeId> {
        &self.pending_entry
    }

    /// Mark a node's entry action as done
    pub fn mark_entered(&mut self, node_id: &NodeId) -> bool {
        self.pending_entry.remove(node_id)
    }

    // ── Join arrivals ────────────────────────────────────────────────

    /// Record that `transition` has reached the join at `node_id`.
    /// Returns the arrivals accumulated so far.
    pub fn record_arrival(
        &mut self,
        node_id: &NodeId,
        transition: &TransitionId,
    ) -> &BTreeSet<TransitionId> {
        let arrivals = self.join_arrivals.entry(node_id.clone()).or_default();
        arrivals.insert(transition.clone());
        arrivals
    }

    /// Arrivals waiting at a join node
    pub fn arrivals(&self, node_id: &NodeId) -> Option<&BTreeSet<TransitionId>> {
        self.join_arrivals.get(node_id)
    }

    /// Clear the arrivals of a join once it has fired
    pub fn clear_arrivals(&mut self, node_id: &NodeId) {
        self.join_arrivals.remove(node_id);
    }

    pub fn join_arrivals(&self) -> &BTreeMap<NodeId, BTreeSet<TransitionId>> {
        &self.join_arrivals
    }

    // ── History ──────────────────────────────────────────────────────

    /// Append a fired transition to the history
    pub fn record_firing(&mut self, transition: &Transition) {
        let now = Utc::now();
        self.history.push(HistoryEntry {
            sequence: self.history.len() as u64,
            transition: transition.id.clone(),
            from: transition.start_node.clone(),
            to: transition.next_node.clone(),
            at: now,
        });
        self.updated_at = now;
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    pub fn set_running(&mut self) {
        self.status = InstanceStatus::Running;
        self.updated_at = Utc::now();
    }

    pub fn set_waiting(&mut self) {
        self.status = InstanceStatus::Waiting;
        self.updated_at = Utc::now();
    }

    /// Mark the instance completed
    pub fn complete(&mut self) {
        let now = Utc::now();
        self.status = InstanceStatus::Completed;
        self.completed_at = Some(now);
        self.updated_at = now;
    }

    /// Mark the instance failed with a recorded cause
    pub fn fail(&mut self, failure: FailureDetail) {
        self.status = InstanceStatus::Failed;
        self.completed_at = Some(failure.at);
        self.updated_at = failure.at;
        self.failure = Some(failure);
    }

    /// Completed or failed; a terminal instance is never advanced again
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The active set is non-empty and holds END nodes only
    pub fn only_end_nodes_active(&self, workflow: &Workflow) -> bool {
        !self.active_nodes.is_empty() && self.active_nodes.iter().all(|n| workflow.is_end(n))
    }

    // ── Transactions ─────────────────────────────────────────────────

    /// Capture the mutable state for a later [`Instance::restore`]
    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            status: self.status,
            failure: self.failure.clone(),
            history_len: self.history.len(),
            version: self.version,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
            active_nodes: self.active_nodes.clone(),
            visit_counters: self.visit_counters.clone(),
            join_arrivals: self.join_arrivals.clone(),
            pending_entry: self.pending_entry.clone(),
        }
    }

    /// Roll back to a snapshot taken from this instance
    pub fn restore(&mut self, snapshot: InstanceSnapshot) {
        self.status = snapshot.status;
        self.failure = snapshot.failure;
        self.history.truncate(snapshot.history_len);
        self.version = snapshot.version;
        self.updated_at = snapshot.updated_at;
        self.completed_at = snapshot.completed_at;
        self.active_nodes = snapshot.active_nodes;
        self.visit_counters = snapshot.visit_counters;
        self.join_arrivals = snapshot.join_arrivals;
        self.pending_entry = snapshot.pending_entry;
    }

    fn check_workflow(&self, workflow: &Workflow) -> WorkflowResult<()> {
        if &self.workflow_id != workflow.id() {
            return Err(WorkflowError::WorkflowMismatch {
                expected: self.workflow_id.clone(),
                found: workflow.id().clone(),
            });
        }
        Ok(())
    }
}

/// Saved mutable state of an [`Instance`]. History is append-only within
/// a step, so only its length is kept.
#[derive(Clone, Debug)]
pub struct InstanceSnapshot {
    status: InstanceStatus,
    failure: Option<FailureDetail>,
    history_len: usize,
    version: u64,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    active_nodes: BTreeSet<NodeId>,
    visit_counters: BTreeMap<NodeId, u32>,
    join_arrivals: BTreeMap<NodeId, BTreeSet<TransitionId>>,
    pending_entry: BTreeSet<NodeId>,
}

// ── Instance Status ──────────────────────────────────────────────────

/// The lifecycle state of an instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum InstanceStatus {
    /// Created, never run
    #[default]
    Pending,
    /// A run is in progress
    Running,
    /// Quiescent: nothing can move until guard inputs change
    Waiting,
    /// Only END nodes are active
    Completed,
    /// A runtime error aborted the last step
    Failed,
}

impl InstanceStatus {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

// ── Failure ──────────────────────────────────────────────────────────

/// What made an instance fail
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    CycleLimitExceeded,
    ActionExecution,
    GuardEvaluation,
}

/// Recorded cause of a FAILED instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FailureDetail {
    pub kind: FailureKind,
    pub message: String,
    /// The offending node, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    /// The offending transition, for guard failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<TransitionId>,
    pub at: DateTime<Utc>,
}

impl FailureDetail {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            node: None,
            transition: None,
            at: Utc::now(),
        }
    }

    pub fn at_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn at_transition(mut self, transition: TransitionId) -> Self {
        self.transition = Some(transition);
        self
    }
}

// ── History ──────────────────────────────────────────────────────────

/// A fired transition in the instance history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Monotonically increasing sequence number
    pub sequence: u64,
    pub transition: TransitionId,
    pub from: NodeId,
    pub to: NodeId,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Node, WorkflowBuilder};

    fn make_loop_workflow(max: u32) -> Workflow {
        let mut wf = WorkflowBuilder::new("Loop", "res.partner")
            .with_id("loop")
            .with_max_node_counter(max);
        wf.add_node(Node::start("start")).unwrap();
        wf.add_node(Node::task("x", "X")).unwrap();
        wf.add_node(Node::end("end")).unwrap();
        wf.add_transition(Transition::new("t1", "start", "x")).unwrap();
        wf.add_transition(Transition::new("t2", "x", "x")).unwrap();
        wf.add_transition(Transition::new("t3", "x", "end")).unwrap();
        wf.build().unwrap()
    }

    fn make_instance(wf: &Workflow) -> Instance {
        Instance::new(wf, TargetRef::new("res.partner", "42"))
    }

    #[test]
    fn test_create_instance() {
        let wf = make_loop_workflow(1);
        let inst = make_instance(&wf);

        assert_eq!(inst.status, InstanceStatus::Pending);
        assert!(!inst.is_terminal());
        assert!(inst.is_active(&NodeId::new("start")));
        assert_eq!(inst.active_nodes().len(), 1);
        assert_eq!(inst.visits(&NodeId::new("start")), 1);
        assert!(inst.pending_entry().contains(&NodeId::new("start")));
        assert_eq!(inst.version, 0);
    }

    #[test]
    fn test_activate_counts_visits() {
        let wf = make_loop_workflow(2);
        let mut inst = make_instance(&wf);
        let x = NodeId::new("x");

        assert!(inst.activate(&wf, &x).unwrap());
        assert_eq!(inst.visits(&x), 1);

        inst.deactivate(&x);
        assert!(!inst.is_active(&x));
        assert!(inst.activate(&wf, &x).unwrap());
        assert_eq!(inst.visits(&x), 2);
    }

    #[test]
    fn test_activate_already_active_is_absorbed() {
        let wf = make_loop_workflow(1);
        let mut inst = make_instance(&wf);
        let x = NodeId::new("x");

        assert!(inst.activate(&wf, &x).unwrap());
        assert!(!inst.activate(&wf, &x).unwrap());
        assert_eq!(inst.visits(&x), 1);
    }

    #[test]
    fn test_cycle_limit_exceeded() {
        let wf = make_loop_workflow(1);
        let mut inst = make_instance(&wf);
        let x = NodeId::new("x");

        inst.activate(&wf, &x).unwrap();
        inst.deactivate(&x);
        let err = inst.activate(&wf, &x).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::CycleLimitExceeded {
                node: x.clone(),
                visits: 2,
                max: 1
            }
        );
        assert_eq!(inst.visits(&x), 1);
        assert!(!inst.is_active(&x));
    }

    #[test]
    fn test_activate_unknown_node() {
        let wf = make_loop_workflow(1);
        let mut inst = make_instance(&wf);
        let result = inst.activate(&wf, &NodeId::new("ghost"));
        assert!(matches!(result, Err(WorkflowError::NodeNotFound(_))));
        assert_eq!(inst.active_nodes().len(), 1);
    }

    #[test]
    fn test_activate_against_other_workflow() {
        let wf = make_loop_workflow(1);
        let other = {
            let mut b = WorkflowBuilder::new("Other", "res.partner").with_id("other");
            b.add_node(Node::start("start")).unwrap();
            b.build().unwrap()
        };
        let mut inst = make_instance(&wf);
        let result = inst.activate(&other, &NodeId::new("start"));
        assert!(matches!(result, Err(WorkflowError::WorkflowMismatch { .. })));
    }

    #[test]
    fn test_join_arrivals() {
        let wf = make_loop_workflow(1);
        let mut inst = make_instance(&wf);
        let end = NodeId::new("end");

        inst.record_arrival(&end, &TransitionId::new("a"));
        let arrivals = inst.record_arrival(&end, &TransitionId::new("b"));
        assert_eq!(arrivals.len(), 2);

        inst.clear_arrivals(&end);
        assert!(inst.arrivals(&end).is_none());
    }

    #[test]
    fn test_snapshot_restore() {
        let wf = make_loop_workflow(3);
        let mut inst = make_instance(&wf);
        let snapshot = inst.snapshot();

        let t1 = wf.transition(&TransitionId::new("t1")).unwrap().clone();
        inst.set_running();
        inst.deactivate(&NodeId::new("start"));
        inst.record_firing(&t1);
        inst.activate(&wf, &NodeId::new("x")).unwrap();
        inst.record_arrival(&NodeId::new("end"), &t1.id);
        inst.fail(FailureDetail::new(FailureKind::ActionExecution, "boom"));

        inst.restore(snapshot);
        assert_eq!(inst.status, InstanceStatus::Pending);
        assert!(inst.failure.is_none());
        assert!(inst.history.is_empty());
        assert!(inst.is_active(&NodeId::new("start")));
        assert!(!inst.is_active(&NodeId::new("x")));
        assert_eq!(inst.visits(&NodeId::new("x")), 0);
        assert!(inst.join_arrivals().is_empty());
        assert!(inst.completed_at.is_none());
    }

    #[test]
    fn test_history_sequence() {
        let wf = make_loop_workflow(1);
        let mut inst = make_instance(&wf);
        for t in wf.transitions() {
            inst.record_firing(t);
        }
        assert_eq!(inst.history.len(), 3);
        for (i, entry) in inst.history.iter().enumerate() {
            assert_eq!(entry.sequence, i as u64);
        }
    }

    #[test]
    fn test_lifecycle() {
        let wf = make_loop_workflow(1);
        let mut inst = make_instance(&wf);
        inst.set_running();
        assert_eq!(inst.status, InstanceStatus::Running);
        inst.set_waiting();
        assert!(!inst.is_terminal());
        inst.complete();
        assert!(inst.is_terminal());
        assert!(inst.completed_at.is_some());
    }

    #[test]
    fn test_failure_detail() {
        let wf = make_loop_workflow(1);
        let mut inst = make_instance(&wf);
        inst.fail(
            FailureDetail::new(FailureKind::CycleLimitExceeded, "too many visits")
                .at_node(NodeId::new("x")),
        );
        assert_eq!(inst.status, InstanceStatus::Failed);
        let failure = inst.failure.as_ref().unwrap();
        assert_eq!(failure.node, Some(NodeId::new("x")));
        assert_eq!(inst.completed_at, Some(failure.at));
    }

    #[test]
    fn test_only_end_nodes_active() {
        let wf = make_loop_workflow(1);
        let mut inst = make_instance(&wf);
        assert!(!inst.only_end_nodes_active(&wf));
        inst.deactivate(&NodeId::new("start"));
        assert!(!inst.only_end_nodes_active(&wf));
        inst.activate(&wf, &NodeId::new("end")).unwrap();
        assert!(inst.only_end_nodes_active(&wf));
    }

    #[test]
    fn test_status_terminal() {
        assert!(!InstanceStatus::Pending.is_terminal());
        assert!(!InstanceStatus::Running.is_terminal());
        assert!(!InstanceStatus::Waiting.is_terminal());
        assert!(InstanceStatus::Completed.is_terminal());
        assert!(InstanceStatus::Failed.is_terminal());
    }

    #[test]
    fn test_instance_serde() {
        let wf = make_loop_workflow(1);
        let inst = make_instance(&wf);
        let json = serde_json::to_string(&inst).unwrap();
        let back: Instance = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, inst.id);
        assert_eq!(back.active_nodes(), inst.active_nodes());
        assert_eq!(back.target, TargetRef::new("res.partner", "42"));
    }

    #[test]
    fn test_instance_id() {
        let id = InstanceId::generate();
        assert!(!id.0.is_empty());
        assert!(id.short().len() <= 8);
        assert_eq!(format!("{}", InstanceId::new("inst-1")), "inst-1");
        assert_eq!(format!("{}", TargetRef::new("sale.order", "7")), "sale.order/7");
    }
}
