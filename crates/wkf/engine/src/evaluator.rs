//! Transition evaluator: join and split rules
//!
//! The evaluator decides which outgoing transitions of a node fire and
//! whether a node's join is satisfied. It does NOT mutate the instance:
//! the state machine applies its decisions.

use crate::error::{EngineError, EngineResult};
use crate::invoker::{ActionInvoker, InvocationContext};
use std::collections::BTreeSet;
use wkf_types::{LogicOperator, Node, Transition, TransitionId, Workflow};

/// Applies AND/OR join and split rules
#[derive(Clone, Debug, Default)]
pub struct TransitionEvaluator;

impl TransitionEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Select the outgoing transitions of `node` that fire.
    ///
    /// AND fires every transition whose guard holds; OR fires the first
    /// such transition in sequence order. END nodes never split.
    pub fn split<'w>(
        &self,
        workflow: &'w Workflow,
        node: &Node,
        invoker: &dyn ActionInvoker,
        ctx: &InvocationContext<'_>,
    ) -> EngineResult<Vec<&'w Transition>> {
        if node.is_end() {
            return Ok(Vec::new());
        }

        let mut fired = Vec::new();
        for transition in workflow.outgoing(&node.id) {
            if self.guard_holds(transition, invoker, ctx)? {
                fired.push(transition);
                if node.end_logic_operator == LogicOperator::Or {
                    break;
                }
            }
        }
        Ok(fired)
    }

    /// Check whether `node`'s join is satisfied by the arrived transitions
    pub fn join_satisfied(
        &self,
        workflow: &Workflow,
        node: &Node,
        arrivals: &BTreeSet<TransitionId>,
    ) -> bool {
        match node.start_logic_operator {
            LogicOperator::Or => !arrivals.is_empty(),
            LogicOperator::And => workflow
                .incoming(&node.id)
                .iter()
                .all(|t| arrivals.contains(&t.id)),
        }
    }

    /// Evaluate a transition's guard. An unset guard always holds.
    pub fn guard_holds(
        &self,
        transition: &Transition,
        invoker: &dyn ActionInvoker,
        ctx: &InvocationContext<'_>,
    ) -> EngineResult<bool> {
        let Some(expression) = transition.guard.as_deref() else {
            return Ok(true);
        };
        invoker
            .evaluate_guard(expression, ctx)
            .map_err(|source| EngineError::GuardEvaluation {
                transition: transition.id.clone(),
                expression: expression.to_string(),
                source,
            })
    }
}
