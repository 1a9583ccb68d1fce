//! Workflow Engine: the main entry point of the runtime
//!
//! The engine:
//! 1. Registers workflows in the store
//! 2. Creates one instance per (workflow, entity) pair
//! 3. Runs instances to quiescence under a per-instance lease
//! 4. Commits each run as a single transaction, rolling back on error
//!
//! Guards and entry actions are never interpreted here. They go
//! through the configured [`ActionInvoker`].

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::invoker::{ActionInvoker, InvocationContext};
use crate::lease::InstanceLeases;
use crate::state_machine::{RunReport, StateMachine, StepOptions};
use crate::store::{MemoryStore, Persistence};
use std::sync::Arc;
use std::time::Duration;
use wkf_types::*;

/// Drives workflow instances; shareable across threads behind an `Arc`
pub struct WorkflowEngine {
    store: Arc<dyn Persistence>,
    invoker: Arc<dyn ActionInvoker>,
    config: EngineConfig,
    leases: InstanceLeases,
    state_machine: StateMachine,
}

impl WorkflowEngine {
    /// Create an engine over a store and an invoker with default configuration
    pub fn new(store: Arc<dyn Persistence>, invoker: Arc<dyn ActionInvoker>) -> Self {
        Self {
            store,
            invoker,
            config: EngineConfig::default(),
            leases: InstanceLeases::new(),
            state_machine: StateMachine::new(),
        }
    }

    /// Create an engine backed by a fresh [`MemoryStore`]
    pub fn in_memory(invoker: Arc<dyn ActionInvoker>) -> Self {
        Self::new(Arc::new(MemoryStore::new()), invoker)
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn Persistence> {
        &self.store
    }

    // ── Workflow Management ──────────────────────────────────────────

    /// Register (or replace) a workflow
    pub fn register_workflow(&self, workflow: Workflow) -> EngineResult<WorkflowId> {
        let id = workflow.id().clone();
        tracing::info!(
            workflow_id = %id,
            model = workflow.target_model(),
            nodes = workflow.node_count(),
            "Workflow registered"
        );
        self.store.save_workflow(Arc::new(workflow))?;
        Ok(id)
    }

    /// Get a registered workflow
    pub fn workflow(&self, id: &WorkflowId) -> EngineResult<Arc<Workflow>> {
        self.store
            .load_workflow(id)?
            .ok_or_else(|| EngineError::WorkflowNotFound(id.clone()))
    }

    /// Select the workflow that governs an entity: the first active
    /// workflow for its model, by sequence, whose condition holds.
    pub fn workflow_for(&self, target: &TargetRef) -> EngineResult<Option<Arc<Workflow>>> {
        for workflow in self.store.workflows_for_model(&target.model)? {
            if !workflow.is_active() {
                continue;
            }
            let Some(expression) = workflow.condition() else {
                return Ok(Some(workflow));
            };
            let ctx = InvocationContext::new(workflow.id(), target);
            let applies = self
                .invoker
                .evaluate_guard(expression, &ctx)
                .map_err(|source| EngineError::WorkflowCondition {
                    workflow: workflow.id().clone(),
                    expression: expression.to_string(),
                    source,
                })?;
            if applies {
                return Ok(Some(workflow));
            }
        }
        Ok(None)
    }

    // ── Instance Lifecycle ───────────────────────────────────────────

    /// Advance an instance as far as it can go.
    ///
    /// A completed or failed instance is returned unchanged. Any runtime
    /// error rolls the whole run back and leaves the instance FAILED.
    pub fn run(&self, instance: &mut Instance) -> EngineResult<RunReport> {
        self.execute(instance, None)
    }

    /// [`run`](Self::run) on behalf of a caller identity
    pub fn run_as(&self, instance: &mut Instance, actor: &str) -> EngineResult<RunReport> {
        self.execute(instance, Some(actor))
    }

    /// Run the instance of `workflow_id` for an entity, creating it first
    /// if the entity has not entered the workflow yet
    pub fn run_for_entity(
        &self,
        workflow_id: &WorkflowId,
        target_model: &str,
        target_id: &str,
    ) -> EngineResult<Instance> {
        let workflow = self.workflow(workflow_id)?;
        if workflow.target_model() != target_model {
            return Err(EngineError::TargetModelMismatch {
                workflow: workflow_id.clone(),
                expected: workflow.target_model().to_string(),
                found: target_model.to_string(),
            });
        }

        let mut instance =
            self.instance_for(&workflow, TargetRef::new(target_model, target_id))?;
        self.run(&mut instance)?;
        Ok(instance)
    }

    /// Select the governing workflow for an entity and run its instance.
    /// Returns `None` when no workflow applies.
    pub fn run_target(&self, target: &TargetRef) -> EngineResult<Option<Instance>> {
        let Some(workflow) = self.workflow_for(target)? else {
            tracing::debug!(target_ref = %target, "No workflow applies");
            return Ok(None);
        };
        let mut instance = self.instance_for(&workflow, target.clone())?;
        self.run(&mut instance)?;
        Ok(Some(instance))
    }

    /// The stored instance of a workflow for an entity, if any
    pub fn get_instance(
        &self,
        workflow_id: &WorkflowId,
        target_id: &str,
    ) -> EngineResult<Option<Instance>> {
        let workflow = self.workflow(workflow_id)?;
        let target = TargetRef::new(workflow.target_model(), target_id);
        Ok(self.store.find_instance(workflow_id, &target)?)
    }

    /// Load an instance by id
    pub fn load_instance(&self, id: &InstanceId) -> EngineResult<Instance> {
        self.store
            .load_instance(id)?
            .ok_or_else(|| EngineError::InstanceNotFound(id.clone()))
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn instance_for(&self, workflow: &Workflow, target: TargetRef) -> EngineResult<Instance> {
        if let Some(existing) = self.store.find_instance(workflow.id(), &target)? {
            return Ok(existing);
        }
        let instance = self
            .store
            .create_instance(Instance::new(workflow, target))?;
        tracing::info!(
            instance_id = %instance.id,
            workflow_id = %workflow.id(),
            target_ref = %instance.target,
            "Workflow instance created"
        );
        Ok(instance)
    }

    fn execute(&self, instance: &mut Instance, actor: Option<&str>) -> EngineResult<RunReport> {
        if instance.is_terminal() {
            tracing::debug!(instance_id = %instance.id, status = %instance.status, "Run skipped");
            return Ok(RunReport::unchanged(instance));
        }

        let workflow = self.workflow(&instance.workflow_id)?;
        let timeout = self.config.lock_timeout_ms.map(Duration::from_millis);
        let _lease = self
            .leases
            .acquire(&instance.id, self.config.lock_policy, timeout)?;

        // Pick up whatever was committed while we waited for the lease
        if let Some(stored) = self.store.load_instance(&instance.id)? {
            if stored.version > instance.version {
                *instance = stored;
            }
        }
        if instance.is_terminal() {
            return Ok(RunReport::unchanged(instance));
        }

        let snapshot = instance.snapshot();
        instance.set_running();
        let options = StepOptions {
            record_history: self.config.record_history,
            max_passes: self.config.max_passes,
        };

        let outcome =
            self.state_machine
                .advance(&workflow, instance, self.invoker.as_ref(), actor, &options);

        match outcome {
            Ok(report) => {
                match self.store.commit(instance) {
                    Ok(version) => instance.version = version,
                    Err(e) => {
                        tracing::warn!(instance_id = %instance.id, error = %e, "Commit failed, run discarded");
                        instance.restore(snapshot);
                        return Err(e.into());
                    }
                }
                if !report.context.is_empty() {
                    let ctx = InvocationContext::new(workflow.id(), &instance.target)
                        .with_instance(&instance.id)
                        .with_actor(actor);
                    self.invoker.apply_context(&ctx, &report.context);
                }
                tracing::info!(
                    instance_id = %instance.id,
                    workflow_id = %workflow.id(),
                    status = %report.status,
                    passes = report.passes,
                    fired = report.fired.len(),
                    "Run finished"
                );
                Ok(report)
            }
            Err(err) => {
                instance.restore(snapshot.clone());
                let Some(failure) = failure_detail(&workflow, &err) else {
                    return Err(err);
                };
                tracing::warn!(
                    instance_id = %instance.id,
                    workflow_id = %workflow.id(),
                    error = %err,
                    "Run rolled back, instance failed"
                );
                instance.fail(failure);
                match self.store.commit(instance) {
                    Ok(version) => instance.version = version,
                    Err(e) => {
                        instance.restore(snapshot);
                        return Err(e.into());
                    }
                }
                Err(err)
            }
        }
    }
}

/// Map a runtime error onto the failure recorded on the instance.
/// Errors that are not the instance's fault yield `None`.
fn failure_detail(workflow: &Workflow, err: &EngineError) -> Option<FailureDetail> {
    let message = err.to_string();
    match err {
        EngineError::Workflow(WorkflowError::CycleLimitExceeded { node, .. }) => Some(
            FailureDetail::new(FailureKind::CycleLimitExceeded, message).at_node(node.clone()),
        ),
        EngineError::ActionExecution { node, .. } => Some(
            FailureDetail::new(FailureKind::ActionExecution, message).at_node(node.clone()),
        ),
        EngineError::GuardEvaluation { transition, .. } => {
            let mut detail = FailureDetail::new(FailureKind::GuardEvaluation, message)
                .at_transition(transition.clone());
            if let Some(t) = workflow.transition(transition) {
                detail = detail.at_node(t.start_node.clone());
            }
            Some(detail)
        }
        _ => None,
    }
}
