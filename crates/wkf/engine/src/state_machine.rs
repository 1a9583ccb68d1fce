//! State machine: drives an instance to quiescence or completion
//!
//! One call to [`StateMachine::advance`] repeats passes over the
//! instance until nothing moves:
//!
//! 1. run entry actions of newly activated nodes
//! 2. stop as COMPLETED if only END nodes are active
//! 3. split every active non-END node and fire the chosen transitions
//! 4. join at each target and activate the ones whose join holds
//!
//! A pass that fires nothing leaves the instance WAITING. The state
//! machine works on the in-memory instance only: locking, snapshots
//! and persistence belong to the engine.

use crate::error::{EngineError, EngineResult};
use crate::evaluator::TransitionEvaluator;
use crate::invoker::{ActionInvoker, InvocationContext};
use serde::Serialize;
use std::collections::BTreeSet;
use wkf_types::*;

/// Per-run knobs taken from the engine configuration
#[derive(Clone, Copy, Debug)]
pub struct StepOptions {
    pub record_history: bool,
    pub max_passes: Option<u32>,
}

impl Default for StepOptions {
    fn default() -> Self {
        Self {
            record_history: true,
            max_passes: None,
        }
    }
}

/// Summary of one run
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunReport {
    /// Status the instance was left in
    pub status: InstanceStatus,
    /// Number of passes performed
    pub passes: u32,
    /// Nodes activated during the run, in activation order
    pub activated: Vec<NodeId>,
    /// Transitions fired during the run, in firing order
    pub fired: Vec<TransitionId>,
    /// Merged object results of the entry actions executed
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl RunReport {
    /// A report for a run that did nothing
    pub fn unchanged(instance: &Instance) -> Self {
        Self {
            status: instance.status,
            ..Self::default()
        }
    }
}

/// Applies the pass loop to an instance
#[derive(Clone, Debug, Default)]
pub struct StateMachine {
    evaluator: TransitionEvaluator,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            evaluator: TransitionEvaluator::new(),
        }
    }

    pub fn evaluator(&self) -> &TransitionEvaluator {
        &self.evaluator
    }

    /// Run passes until the instance is completed or waiting.
    ///
    /// On error the instance is left half-advanced; the caller must
    /// restore its snapshot.
    pub fn advance(
        &self,
        workflow: &Workflow,
        instance: &mut Instance,
        invoker: &dyn ActionInvoker,
        actor: Option<&str>,
        options: &StepOptions,
    ) -> EngineResult<RunReport> {
        let instance_id = instance.id.clone();
        let target = instance.target.clone();
        let ctx = InvocationContext::new(workflow.id(), &target)
            .with_instance(&instance_id)
            .with_actor(actor);

        let mut report = RunReport::default();
        loop {
            if let Some(max) = options.max_passes {
                if report.passes >= max {
                    tracing::warn!(
                        instance_id = %instance_id,
                        passes = report.passes,
                        "Pass limit reached, leaving instance waiting"
                    );
                    instance.set_waiting();
                    break;
                }
            }
            report.passes += 1;

            self.run_entry_actions(workflow, instance, invoker, &ctx, &mut report)?;

            if instance.only_end_nodes_active(workflow) {
                instance.complete();
                break;
            }

            let fired = self.split_active(workflow, instance, invoker, &ctx)?;
            if fired.is_empty() {
                instance.set_waiting();
                break;
            }

            self.fire(workflow, instance, &fired, options, &mut report)?;
        }

        report.status = instance.status;
        Ok(report)
    }

    // ── Pass phases ──────────────────────────────────────────────────

    fn run_entry_actions(
        &self,
        workflow: &Workflow,
        instance: &mut Instance,
        invoker: &dyn ActionInvoker,
        ctx: &InvocationContext<'_>,
        report: &mut RunReport,
    ) -> EngineResult<()> {
        let pending: Vec<NodeId> = instance.pending_entry().iter().cloned().collect();
        for node_id in pending {
            let node = workflow.require_node(&node_id)?;
            if let Some(action) = node.action.as_deref() {
                let outcome = invoker
                    .execute_action(action, &ctx.at_node(&node_id))
                    .map_err(|source| EngineError::ActionExecution {
                        node: node_id.clone(),
                        action: action.to_string(),
                        source,
                    })?;
                tracing::debug!(
                    instance_id = %instance.id,
                    node = %node_id,
                    action,
                    "Entry action executed"
                );
                merge_context(&mut report.context, outcome.value);
            }
            instance.mark_entered(&node_id);
        }
        Ok(())
    }

    fn split_active<'w>(
        &self,
        workflow: &'w Workflow,
        instance: &Instance,
        invoker: &dyn ActionInvoker,
        ctx: &InvocationContext<'_>,
    ) -> EngineResult<Vec<&'w Transition>> {
        let mut fired = Vec::new();
        for node_id in instance.active_nodes() {
            let node = workflow.require_node(node_id)?;
            if node.is_end() {
                continue;
            }
            let chosen = self
                .evaluator
                .split(workflow, node, invoker, &ctx.at_node(node_id))?;
            fired.extend(chosen);
        }
        Ok(fired)
    }

    fn fire(
        &self,
        workflow: &Workflow,
        instance: &mut Instance,
        fired: &[&Transition],
        options: &StepOptions,
        report: &mut RunReport,
    ) -> EngineResult<()> {
        for transition in fired {
            instance.deactivate(&transition.start_node);
            if options.record_history {
                instance.record_firing(transition);
            }
            tracing::debug!(
                instance_id = %instance.id,
                transition = %transition.id,
                from = %transition.start_node,
                to = %transition.next_node,
                "Transition fired"
            );
            report.fired.push(transition.id.clone());
        }

        for transition in fired {
            let target = workflow.require_node(&transition.next_node)?;
            let satisfied = match target.start_logic_operator {
                LogicOperator::And => {
                    let arrivals = instance.record_arrival(&target.id, &transition.id);
                    self.evaluator.join_satisfied(workflow, target, arrivals)
                }
                LogicOperator::Or => {
                    let arrivals = BTreeSet::from([transition.id.clone()]);
                    self.evaluator.join_satisfied(workflow, target, &arrivals)
                }
            };
            if !satisfied {
                continue;
            }
            if target.start_logic_operator == LogicOperator::And {
                instance.clear_arrivals(&target.id);
            }
            if instance.activate(workflow, &target.id)? {
                tracing::debug!(
                    instance_id = %instance.id,
                    node = %target.id,
                    visits = instance.visits(&target.id),
                    "Node activated"
                );
                report.activated.push(target.id.clone());
            }
        }
        Ok(())
    }
}

/// Deep-merge an action result into the run context. Non-object results
/// carry nothing to merge.
fn merge_context(into: &mut serde_json::Map<String, serde_json::Value>, value: serde_json::Value) {
    let serde_json::Value::Object(incoming) = value else {
        return;
    };
    for (key, value) in incoming {
        match (into.get_mut(&key), value) {
            (Some(serde_json::Value::Object(existing)), serde_json::Value::Object(nested)) => {
                merge_context(existing, serde_json::Value::Object(nested));
            }
            (_, value) => {
                into.insert(key, value);
            }
        }
    }
}
