//! Property tests for join, split and cycle-limit rules

mod common;

use common::*;
use proptest::prelude::*;
use std::sync::Arc;
use wkf_engine::*;
use wkf_types::*;

/// START (OR split) with one guarded transition per branch, in sequence order
fn or_fan(branches: usize) -> Workflow {
    let mut wf = WorkflowBuilder::new("OR fan", MODEL).with_id("or-fan");
    wf.add_node(Node::start("start")).unwrap();
    for i in 0..branches {
        wf.add_node(Node::end(format!("end_{i}"))).unwrap();
        wf.add_transition(
            Transition::conditional(format!("t_{i}"), "start", format!("end_{i}"), format!("g_{i}"))
                .with_sequence(i as i32),
        )
        .unwrap();
    }
    wf.build().unwrap()
}

/// START (AND split) to `branches` tasks joined by an AND END
fn and_fan(branches: usize) -> Workflow {
    let mut wf = WorkflowBuilder::new("AND fan", MODEL).with_id("and-fan");
    wf.add_node(Node::start("start").with_split(LogicOperator::And))
        .unwrap();
    wf.add_node(Node::end("end").with_join(LogicOperator::And))
        .unwrap();
    for i in 0..branches {
        wf.add_node(Node::task(format!("task_{i}"), "Task")).unwrap();
        wf.add_transition(Transition::new(format!("in_{i}"), "start", format!("task_{i}")))
            .unwrap();
        wf.add_transition(Transition::conditional(
            format!("out_{i}"),
            format!("task_{i}"),
            "end",
            format!("done_{i}"),
        ))
        .unwrap();
    }
    wf.build().unwrap()
}

proptest! {
    #[test]
    fn or_split_fires_first_true_guard(guards in prop::collection::vec(any::<bool>(), 1..6)) {
        let invoker = Arc::new(CountingInvoker::new());
        let engine = engine_with(invoker.clone(), EngineConfig::default());
        let wf_id = engine.register_workflow(or_fan(guards.len())).unwrap();
        for (i, g) in guards.iter().enumerate() {
            invoker.inner.set_variable(&target("1"), format!("g_{i}"), g.to_string());
        }

        let inst = engine.run_for_entity(&wf_id, MODEL, "1").unwrap();

        match guards.iter().position(|g| *g) {
            Some(first) => {
                prop_assert_eq!(inst.status, InstanceStatus::Completed);
                prop_assert_eq!(inst.history.len(), 1);
                prop_assert_eq!(&inst.history[0].transition, &TransitionId::new(format!("t_{first}")));
                prop_assert_eq!(inst.active_nodes().len(), 1);
            }
            None => {
                prop_assert_eq!(inst.status, InstanceStatus::Waiting);
                prop_assert!(inst.history.is_empty());
                prop_assert!(inst.is_active(&node("start")));
            }
        }
    }

    #[test]
    fn and_join_waits_for_every_branch(done in prop::collection::vec(any::<bool>(), 1..6)) {
        let invoker = Arc::new(CountingInvoker::new());
        let engine = engine_with(invoker.clone(), EngineConfig::default());
        let wf_id = engine.register_workflow(and_fan(done.len())).unwrap();
        for (i, d) in done.iter().enumerate() {
            invoker.inner.set_variable(&target("1"), format!("done_{i}"), d.to_string());
        }

        let inst = engine.run_for_entity(&wf_id, MODEL, "1").unwrap();

        let arrived = done.iter().filter(|d| **d).count();
        if arrived == done.len() {
            prop_assert_eq!(inst.status, InstanceStatus::Completed);
            prop_assert!(inst.is_active(&node("end")));
        } else {
            prop_assert_eq!(inst.status, InstanceStatus::Waiting);
            prop_assert!(!inst.is_active(&node("end")));
            let recorded = inst.arrivals(&node("end")).map(|a| a.len()).unwrap_or(0);
            prop_assert_eq!(recorded, arrived);
            prop_assert_eq!(inst.active_nodes().len(), done.len() - arrived);
        }
        // Every branch was entered exactly once
        for i in 0..done.len() {
            prop_assert_eq!(inst.visits(&node(&format!("task_{i}"))), 1);
        }
    }

    #[test]
    fn self_loop_never_exceeds_limit(max in 1u32..6) {
        let invoker = Arc::new(CountingInvoker::new());
        let engine = engine_with(invoker, EngineConfig::default());
        let wf_id = engine.register_workflow(self_loop(max)).unwrap();

        let err = engine.run_for_entity(&wf_id, MODEL, "1").unwrap_err();
        let is_cycle_limit = matches!(
            err,
            EngineError::Workflow(WorkflowError::CycleLimitExceeded { visits, max: m, .. })
                if visits == max + 1 && m == max
        );
        prop_assert!(is_cycle_limit);

        let stored = engine.get_instance(&wf_id, "1").unwrap().unwrap();
        prop_assert_eq!(stored.status, InstanceStatus::Failed);
        for count in stored.visit_counters().values() {
            prop_assert!(*count <= max);
        }
    }
}
