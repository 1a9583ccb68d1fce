//! Shared helpers for engine integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use wkf_engine::*;
use wkf_types::*;

/// Install a test subscriber honouring `RUST_LOG`; repeated calls are fine
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A [`ConditionInvoker`] that counts every call made through it
#[derive(Debug)]
pub struct CountingInvoker {
    pub inner: ConditionInvoker,
    calls: AtomicUsize,
}

impl CountingInvoker {
    pub fn new() -> Self {
        Self {
            inner: ConditionInvoker::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ActionInvoker for CountingInvoker {
    fn evaluate_guard(
        &self,
        expression: &str,
        ctx: &InvocationContext<'_>,
    ) -> Result<bool, InvokerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.evaluate_guard(expression, ctx)
    }

    fn execute_action(
        &self,
        action_key: &str,
        ctx: &InvocationContext<'_>,
    ) -> Result<ActionOutcome, InvokerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute_action(action_key, ctx)
    }

    fn apply_context(
        &self,
        ctx: &InvocationContext<'_>,
        context: &serde_json::Map<String, serde_json::Value>,
    ) {
        self.inner.apply_context(ctx, context);
    }
}

pub const MODEL: &str = "sale.order";

pub fn target(id: &str) -> TargetRef {
    TargetRef::new(MODEL, id)
}

pub fn engine_with(invoker: Arc<CountingInvoker>, config: EngineConfig) -> WorkflowEngine {
    init_tracing();
    WorkflowEngine::in_memory(invoker).with_config(config)
}

/// START --> END
pub fn scenario_a() -> Workflow {
    let mut wf = WorkflowBuilder::new("Scenario A", MODEL).with_id("scenario-a");
    wf.add_node(Node::start("start")).unwrap();
    wf.add_node(Node::end("end")).unwrap();
    wf.add_transition(Transition::new("t1", "start", "end"))
        .unwrap();
    wf.build().unwrap()
}

/// START (AND split) --> [A, B] --> END (AND join)
pub fn scenario_b() -> Workflow {
    let mut wf = WorkflowBuilder::new("Scenario B", MODEL).with_id("scenario-b");
    wf.add_node(Node::start("start").with_split(LogicOperator::And))
        .unwrap();
    wf.add_node(Node::task("a", "A")).unwrap();
    wf.add_node(Node::task("b", "B")).unwrap();
    wf.add_node(Node::end("end").with_join(LogicOperator::And))
        .unwrap();
    wf.add_transition(Transition::new("start_a", "start", "a"))
        .unwrap();
    wf.add_transition(Transition::new("start_b", "start", "b"))
        .unwrap();
    wf.add_transition(Transition::new("a_end", "a", "end")).unwrap();
    wf.add_transition(Transition::new("b_end", "b", "end")).unwrap();
    wf.build().unwrap()
}

/// START (OR split) --T1 [value > 0]--> X, --T2--> Y
pub fn scenario_c() -> Workflow {
    let mut wf = WorkflowBuilder::new("Scenario C", MODEL).with_id("scenario-c");
    wf.add_node(Node::start("start")).unwrap();
    wf.add_node(Node::end("x")).unwrap();
    wf.add_node(Node::end("y")).unwrap();
    wf.add_transition(Transition::conditional("t1", "start", "x", "value > 0").with_sequence(1))
        .unwrap();
    wf.add_transition(Transition::new("t2", "start", "y").with_sequence(2))
        .unwrap();
    wf.build().unwrap()
}

/// START --> X, X --> X (self loop), limited to `max` visits per node
pub fn self_loop(max: u32) -> Workflow {
    let mut wf = WorkflowBuilder::new("Self Loop", MODEL)
        .with_id("self-loop")
        .with_max_node_counter(max);
    wf.add_node(Node::start("start")).unwrap();
    wf.add_node(Node::task("x", "X")).unwrap();
    wf.add_transition(Transition::new("enter", "start", "x"))
        .unwrap();
    wf.add_transition(Transition::new("again", "x", "x")).unwrap();
    wf.build().unwrap()
}

pub fn node(id: &str) -> NodeId {
    NodeId::new(id)
}
