//! Per-instance leases: at most one run per instance id at a time

use crate::config::LockPolicy;
use crate::error::{EngineError, EngineResult};
use parking_lot::{Condvar, Mutex};
use std::collections::HashSet;
use std::time::{Duration, Instant};
use wkf_types::InstanceId;

/// The set of instance ids currently being run
#[derive(Debug, Default)]
pub struct InstanceLeases {
    held: Mutex<HashSet<InstanceId>>,
    released: Condvar,
}

impl InstanceLeases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease for `id`, honouring the lock policy.
    ///
    /// With `Block` and a timeout, gives up with
    /// `ConcurrentInstanceAccess` once the timeout elapses.
    pub fn acquire(
        &self,
        id: &InstanceId,
        policy: LockPolicy,
        timeout: Option<Duration>,
    ) -> EngineResult<InstanceLease<'_>> {
        let mut held = self.held.lock();
        if held.contains(id) {
            match policy {
                LockPolicy::FailFast => {
                    return Err(EngineError::ConcurrentInstanceAccess(id.clone()));
                }
                LockPolicy::Block => {
                    tracing::debug!(instance_id = %id, "Waiting for instance lease");
                    let deadline = timeout.map(|t| Instant::now() + t);
                    while held.contains(id) {
                        match deadline {
                            Some(deadline) => {
                                if self.released.wait_until(&mut held, deadline).timed_out()
                                    && held.contains(id)
                                {
                                    return Err(EngineError::ConcurrentInstanceAccess(id.clone()));
                                }
                            }
                            None => self.released.wait(&mut held),
                        }
                    }
                }
            }
        }
        held.insert(id.clone());
        Ok(InstanceLease {
            leases: self,
            id: id.clone(),
        })
    }

    pub fn is_held(&self, id: &InstanceId) -> bool {
        self.held.lock().contains(id)
    }
}

/// A held lease; released on drop
#[derive(Debug)]
pub struct InstanceLease<'a> {
    leases: &'a InstanceLeases,
    id: InstanceId,
}

impl InstanceLease<'_> {
    pub fn instance_id(&self) -> &InstanceId {
        &self.id
    }
}

impl Drop for InstanceLease<'_> {
    fn drop(&mut self) {
        self.leases.held.lock().remove(&self.id);
        self.leases.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_acquire_and_release() {
        let leases = InstanceLeases::new();
        let id = InstanceId::new("inst-1");
        {
            let lease = leases.acquire(&id, LockPolicy::Block, None).unwrap();
            assert_eq!(lease.instance_id(), &id);
            assert!(leases.is_held(&id));
        }
        assert!(!leases.is_held(&id));
    }

    #[test]
    fn test_fail_fast_rejects_held_lease() {
        let leases = InstanceLeases::new();
        let id = InstanceId::new("inst-1");
        let _lease = leases.acquire(&id, LockPolicy::FailFast, None).unwrap();

        let result = leases.acquire(&id, LockPolicy::FailFast, None);
        assert!(matches!(
            result,
            Err(EngineError::ConcurrentInstanceAccess(_))
        ));

        // Other instances are unaffected
        assert!(leases
            .acquire(&InstanceId::new("inst-2"), LockPolicy::FailFast, None)
            .is_ok());
    }

    #[test]
    fn test_block_times_out() {
        let leases = InstanceLeases::new();
        let id = InstanceId::new("inst-1");
        let _lease = leases.acquire(&id, LockPolicy::Block, None).unwrap();

        let result = leases.acquire(&id, LockPolicy::Block, Some(Duration::from_millis(20)));
        assert!(matches!(
            result,
            Err(EngineError::ConcurrentInstanceAccess(_))
        ));
    }

    #[test]
    fn test_block_waits_for_release() {
        let leases = Arc::new(InstanceLeases::new());
        let id = InstanceId::new("inst-1");
        let lease = leases.acquire(&id, LockPolicy::Block, None).unwrap();

        let waiter = {
            let leases = Arc::clone(&leases);
            let id = id.clone();
            thread::spawn(move || {
                leases
                    .acquire(&id, LockPolicy::Block, Some(Duration::from_secs(5)))
                    .map(|_| ())
            })
        };

        thread::sleep(Duration::from_millis(20));
        drop(lease);
        assert!(waiter.join().unwrap().is_ok());
    }
}
