//! In-memory storage implementation

use super::traits::*;
use crate::error::StoreError;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use wkf_types::{Instance, InstanceId, TargetRef, Workflow, WorkflowId};

/// In-memory storage for development and testing
#[derive(Debug, Default)]
pub struct MemoryStore {
    workflows: DashMap<WorkflowId, Arc<Workflow>>,
    instances: DashMap<InstanceId, Instance>,
    by_target: DashMap<(WorkflowId, TargetRef), InstanceId>,
}

impl MemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// First commit of an instance that was never stored. The
    /// (workflow, target) slot is claimed before the instance is
    /// inserted, in the same lock order as `create_instance`.
    fn insert_new(&self, instance: &Instance) -> StoreResult<u64> {
        let key = (instance.workflow_id.clone(), instance.target.clone());
        match self.by_target.entry(key) {
            Entry::Occupied(existing) => {
                let owner = existing.get().clone();
                let found = self.instances.get(&owner).map_or(0, |i| i.version);
                Err(StoreError::Conflict {
                    id: owner,
                    expected: 0,
                    found,
                })
            }
            Entry::Vacant(slot) => match self.instances.entry(instance.id.clone()) {
                Entry::Occupied(stored) => Err(StoreError::Conflict {
                    id: instance.id.clone(),
                    expected: 0,
                    found: stored.get().version,
                }),
                Entry::Vacant(fresh) => {
                    let mut next = instance.clone();
                    next.version = 1;
                    fresh.insert(next);
                    slot.insert(instance.id.clone());
                    Ok(1)
                }
            },
        }
    }
}

impl Persistence for MemoryStore {}

impl WorkflowStore for MemoryStore {
    fn save_workflow(&self, workflow: Arc<Workflow>) -> StoreResult<()> {
        self.workflows.insert(workflow.id().clone(), workflow);
        Ok(())
    }

    fn load_workflow(&self, id: &WorkflowId) -> StoreResult<Option<Arc<Workflow>>> {
        Ok(self.workflows.get(id).map(|w| Arc::clone(w.value())))
    }

    fn workflows_for_model(&self, model: &str) -> StoreResult<Vec<Arc<Workflow>>> {
        let mut found: Vec<Arc<Workflow>> = self
            .workflows
            .iter()
            .filter(|w| w.target_model() == model)
            .map(|w| Arc::clone(w.value()))
            .collect();
        found.sort_by(|a, b| {
            a.sequence()
                .cmp(&b.sequence())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(found)
    }
}

impl InstanceStore for MemoryStore {
    fn load_instance(&self, id: &InstanceId) -> StoreResult<Option<Instance>> {
        Ok(self.instances.get(id).map(|i| i.clone()))
    }

    fn find_instance(
        &self,
        workflow_id: &WorkflowId,
        target: &TargetRef,
    ) -> StoreResult<Option<Instance>> {
        let key = (workflow_id.clone(), target.clone());
        let Some(id) = self.by_target.get(&key).map(|id| id.clone()) else {
            return Ok(None);
        };
        self.load_instance(&id)
    }

    fn create_instance(&self, mut instance: Instance) -> StoreResult<Instance> {
        let key = (instance.workflow_id.clone(), instance.target.clone());
        match self.by_target.entry(key) {
            Entry::Occupied(existing) => self
                .instances
                .get(existing.get())
                .map(|i| i.clone())
                .ok_or_else(|| StoreError::NotFound(existing.get().clone())),
            Entry::Vacant(slot) => {
                instance.version = 1;
                slot.insert(instance.id.clone());
                self.instances.insert(instance.id.clone(), instance.clone());
                Ok(instance)
            }
        }
    }

    fn commit(&self, instance: &Instance) -> StoreResult<u64> {
        if instance.version == 0 {
            return self.insert_new(instance);
        }
        let Some(mut stored) = self.instances.get_mut(&instance.id) else {
            return Err(StoreError::NotFound(instance.id.clone()));
        };
        let found = stored.version;
        if found != instance.version {
            return Err(StoreError::Conflict {
                id: instance.id.clone(),
                expected: instance.version,
                found,
            });
        }
        let mut next = instance.clone();
        next.version = found + 1;
        *stored = next;
        Ok(found + 1)
    }

    fn list_instances(&self, workflow_id: &WorkflowId) -> StoreResult<Vec<Instance>> {
        Ok(self
            .instances
            .iter()
            .filter(|i| &i.workflow_id == workflow_id)
            .map(|i| i.value().clone())
            .collect())
    }
}
