//! Workflow definitions: the static process graph
//!
//! A Workflow is a directed graph where:
//! - Nodes are process steps with a join operator (how incoming
//!   transitions combine) and a split operator (how outgoing
//!   transitions are selected)
//! - Transitions are optionally guarded edges between two nodes
//!
//! The workflow owns its nodes and transitions as id-addressed maps.
//! All cross references are ids into those maps. Workflows are only
//! produced by [`WorkflowBuilder::build`], which validates the graph,
//! and are read-only afterwards.

use crate::{GraphIntegrityError, Transition, TransitionId, WorkflowError, WorkflowResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

// ── Identifiers ──────────────────────────────────────────────────────

/// Unique identifier for a workflow
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a node within its workflow
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ── Workflow ─────────────────────────────────────────────────────────

/// A validated, immutable process graph
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(into = "WorkflowBuilder", try_from = "WorkflowBuilder")]
pub struct Workflow {
    id: WorkflowId,
    name: String,
    description: String,
    target_model: String,
    root_node: NodeId,
    max_node_counter: u32,
    active: bool,
    sequence: i32,
    condition: Option<String>,
    nodes: BTreeMap<NodeId, Node>,
    transitions: BTreeMap<TransitionId, Transition>,
}

impl Workflow {
    pub fn id(&self) -> &WorkflowId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// The business entity type this process governs
    pub fn target_model(&self) -> &str {
        &self.target_model
    }

    /// The unique start node
    pub fn root_node(&self) -> &NodeId {
        &self.root_node
    }

    /// Upper bound on activations of any single node within one instance
    pub fn max_node_counter(&self) -> u32 {
        self.max_node_counter
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Ordering among workflows governing the same model (ascending)
    pub fn sequence(&self) -> i32 {
        self.sequence
    }

    /// Guard deciding whether this workflow applies to a given entity
    pub fn condition(&self) -> Option<&str> {
        self.condition.as_deref()
    }

    /// Get a node by ID
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Get a node by ID, failing if it is not part of this workflow
    pub fn require_node(&self, id: &NodeId) -> WorkflowResult<&Node> {
        self.nodes
            .get(id)
            .ok_or_else(|| WorkflowError::NodeNotFound(id.clone()))
    }

    /// Get a transition by ID
    pub fn transition(&self, id: &TransitionId) -> Option<&Transition> {
        self.transitions.get(id)
    }

    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// All nodes, ordered by id
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All transitions, ordered by id
    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    /// Outgoing transitions of a node in ascending sequence order
    pub fn outgoing(&self, node_id: &NodeId) -> Vec<&Transition> {
        self.nodes
            .get(node_id)
            .map(|n| self.resolve(&n.outgoing))
            .unwrap_or_default()
    }

    /// Incoming transitions of a node in ascending sequence order
    pub fn incoming(&self, node_id: &NodeId) -> Vec<&Transition> {
        self.nodes
            .get(node_id)
            .map(|n| self.resolve(&n.incoming))
            .unwrap_or_default()
    }

    pub fn is_start(&self, node_id: &NodeId) -> bool {
        self.nodes.get(node_id).is_some_and(Node::is_start)
    }

    pub fn is_end(&self, node_id: &NodeId) -> bool {
        self.nodes.get(node_id).is_some_and(Node::is_end)
    }

    /// Get the end nodes (marked as NodeType::End)
    pub fn end_nodes(&self) -> Vec<&Node> {
        self.nodes.values().filter(|n| n.is_end()).collect()
    }

    /// Nodes that cannot be reached from the root node
    pub fn unreachable_nodes(&self) -> Vec<&NodeId> {
        let reachable = self.reachable_from(&self.root_node);
        self.nodes
            .keys()
            .filter(|id| !reachable.contains(*id))
            .collect()
    }

    /// Total number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of transitions
    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    fn resolve(&self, ids: &[TransitionId]) -> Vec<&Transition> {
        ids.iter().filter_map(|id| self.transitions.get(id)).collect()
    }

    /// Find all nodes reachable from a given node
    fn reachable_from(&self, start: &NodeId) -> HashSet<NodeId> {
        let mut visited = HashSet::new();
        let mut queue = vec![start.clone()];

        while let Some(current) = queue.pop() {
            if visited.insert(current.clone()) {
                for transition in self.outgoing(&current) {
                    if !visited.contains(&transition.next_node) {
                        queue.push(transition.next_node.clone());
                    }
                }
            }
        }

        visited
    }
}

// ── Builder ──────────────────────────────────────────────────────────

fn default_max_node_counter() -> u32 {
    1
}

fn default_active() -> bool {
    true
}

/// Mutable draft of a workflow. Also the serialized form of [`Workflow`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowBuilder {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub target_model: String,
    #[serde(default = "default_max_node_counter")]
    pub max_node_counter: u32,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub sequence: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub transitions: Vec<Transition>,
}

impl WorkflowBuilder {
    /// Start a new workflow draft with a generated id
    pub fn new(name: impl Into<String>, target_model: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::generate(),
            name: name.into(),
            description: String::new(),
            target_model: target_model.into(),
            max_node_counter: default_max_node_counter(),
            active: true,
            sequence: 0,
            condition: None,
            nodes: Vec::new(),
            transitions: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = WorkflowId::new(id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_max_node_counter(mut self, max: u32) -> Self {
        self.max_node_counter = max;
        self
    }

    pub fn with_sequence(mut self, sequence: i32) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// Add a node to the draft
    pub fn add_node(&mut self, node: Node) -> Result<(), GraphIntegrityError> {
        if self.nodes.iter().any(|n| n.id == node.id) {
            return Err(GraphIntegrityError::DuplicateNodeId(node.id));
        }
        self.nodes.push(node);
        Ok(())
    }

    /// Add a transition to the draft. Both endpoints must already be present.
    pub fn add_transition(&mut self, transition: Transition) -> Result<(), GraphIntegrityError> {
        if self.transitions.iter().any(|t| t.id == transition.id) {
            return Err(GraphIntegrityError::DuplicateTransitionId(transition.id));
        }
        for endpoint in [&transition.start_node, &transition.next_node] {
            if !self.nodes.iter().any(|n| &n.id == endpoint) {
                return Err(GraphIntegrityError::DanglingTransition {
                    workflow: self.id.clone(),
                    transition: transition.id.clone(),
                    node: endpoint.clone(),
                });
            }
        }
        self.transitions.push(transition);
        Ok(())
    }

    /// Validate the draft and freeze it into a [`Workflow`]
    pub fn build(self) -> Result<Workflow, GraphIntegrityError> {
        if self.max_node_counter == 0 {
            return Err(GraphIntegrityError::InvalidMaxNodeCounter(self.id));
        }

        let mut nodes = BTreeMap::new();
        for mut node in self.nodes {
            node.workflow_id = self.id.clone();
            node.incoming.clear();
            node.outgoing.clear();
            if let Some(dup) = nodes.insert(node.id.clone(), node) {
                return Err(GraphIntegrityError::DuplicateNodeId(dup.id));
            }
        }

        let starts: Vec<NodeId> = nodes
            .values()
            .filter(|n| n.is_start())
            .map(|n| n.id.clone())
            .collect();
        let root_node = match starts.as_slice() {
            [] => return Err(GraphIntegrityError::NoStartNode(self.id)),
            [root] => root.clone(),
            _ => {
                return Err(GraphIntegrityError::MultipleStartNodes {
                    workflow: self.id,
                    nodes: starts,
                })
            }
        };

        let mut transitions = BTreeMap::new();
        for transition in self.transitions {
            for endpoint in [&transition.start_node, &transition.next_node] {
                if !nodes.contains_key(endpoint) {
                    return Err(GraphIntegrityError::DanglingTransition {
                        workflow: self.id.clone(),
                        transition: transition.id.clone(),
                        node: endpoint.clone(),
                    });
                }
            }
            if let Some(dup) = transitions.insert(transition.id.clone(), transition) {
                return Err(GraphIntegrityError::DuplicateTransitionId(dup.id));
            }
        }

        let mut ordered: Vec<&Transition> = transitions.values().collect();
        ordered.sort_by(|a, b| a.sequence.cmp(&b.sequence).then_with(|| a.id.cmp(&b.id)));
        for transition in ordered {
            if let Some(source) = nodes.get_mut(&transition.start_node) {
                source.outgoing.push(transition.id.clone());
            }
            if let Some(target) = nodes.get_mut(&transition.next_node) {
                target.incoming.push(transition.id.clone());
            }
        }

        let workflow = Workflow {
            id: self.id,
            name: self.name,
            description: self.description,
            target_model: self.target_model,
            root_node,
            max_node_counter: self.max_node_counter,
            active: self.active,
            sequence: self.sequence,
            condition: self.condition,
            nodes,
            transitions,
        };

        for node in workflow.end_nodes() {
            if !node.outgoing.is_empty() {
                tracing::warn!(
                    workflow_id = %workflow.id,
                    node = %node.id,
                    "End node has outgoing transitions; they will never fire"
                );
            }
        }
        let unreachable = workflow.unreachable_nodes();
        if !unreachable.is_empty() {
            tracing::warn!(
                workflow_id = %workflow.id,
                unreachable = ?unreachable,
                "Workflow contains nodes unreachable from the root"
            );
        }

        Ok(workflow)
    }
}

impl From<Workflow> for WorkflowBuilder {
    fn from(workflow: Workflow) -> Self {
        Self {
            id: workflow.id,
            name: workflow.name,
            description: workflow.description,
            target_model: workflow.target_model,
            max_node_counter: workflow.max_node_counter,
            active: workflow.active,
            sequence: workflow.sequence,
            condition: workflow.condition,
            nodes: workflow.nodes.into_values().collect(),
            transitions: workflow.transitions.into_values().collect(),
        }
    }
}

impl TryFrom<WorkflowBuilder> for Workflow {
    type Error = GraphIntegrityError;

    fn try_from(builder: WorkflowBuilder) -> Result<Self, Self::Error> {
        builder.build()
    }
}

// ── Node ─────────────────────────────────────────────────────────────

/// A step in the process graph
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier within this workflow
    pub id: NodeId,
    /// Human-readable name
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub node_type: NodeType,
    /// How incoming transitions combine to activate this node (join)
    #[serde(default)]
    pub start_logic_operator: LogicOperator,
    /// How outgoing transitions are selected to fire (split)
    #[serde(default)]
    pub end_logic_operator: LogicOperator,
    /// Entry action key, executed when the node is entered
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip)]
    workflow_id: WorkflowId,
    #[serde(skip)]
    incoming: Vec<TransitionId>,
    #[serde(skip)]
    outgoing: Vec<TransitionId>,
}

impl Node {
    pub fn new(id: impl Into<String>, name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            id: NodeId::new(id),
            name: name.into(),
            description: String::new(),
            node_type,
            start_logic_operator: LogicOperator::default(),
            end_logic_operator: LogicOperator::default(),
            action: None,
            workflow_id: WorkflowId::default(),
            incoming: Vec::new(),
            outgoing: Vec::new(),
        }
    }

    pub fn start(id: impl Into<String>) -> Self {
        Self::new(id, "Start", NodeType::Start)
    }

    pub fn end(id: impl Into<String>) -> Self {
        Self::new(id, "End", NodeType::End)
    }

    pub fn task(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, NodeType::Task)
    }

    pub fn gateway(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, NodeType::Gateway)
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    /// Set the join operator
    pub fn with_join(mut self, op: LogicOperator) -> Self {
        self.start_logic_operator = op;
        self
    }

    /// Set the split operator
    pub fn with_split(mut self, op: LogicOperator) -> Self {
        self.end_logic_operator = op;
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// The workflow that owns this node
    pub fn workflow_id(&self) -> &WorkflowId {
        &self.workflow_id
    }

    /// Incoming transition ids, ascending by sequence
    pub fn incoming(&self) -> &[TransitionId] {
        &self.incoming
    }

    /// Outgoing transition ids, ascending by sequence
    pub fn outgoing(&self) -> &[TransitionId] {
        &self.outgoing
    }

    pub fn is_start(&self) -> bool {
        self.node_type == NodeType::Start
    }

    pub fn is_end(&self) -> bool {
        self.node_type == NodeType::End
    }
}

// ── Node Type ────────────────────────────────────────────────────────

/// The type of a workflow node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeType {
    /// The entry point of the workflow
    Start,
    /// A unit of work, usually carrying an entry action
    Task,
    /// A routing point with no work of its own
    Gateway,
    /// A terminal node; it never fires outgoing transitions
    End,
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Task => write!(f, "task"),
            Self::Gateway => write!(f, "gateway"),
            Self::End => write!(f, "end"),
        }
    }
}

// ── Logic Operator ───────────────────────────────────────────────────

/// Join/split combination rule
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicOperator {
    /// Join: wait for every incoming transition. Split: fire every true guard.
    And,
    /// Join: any incoming transition suffices. Split: first true guard by sequence.
    #[default]
    Or,
}

impl std::fmt::Display for LogicOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::And => write!(f, "and"),
            Self::Or => write!(f, "or"),
        }
    }
}
