//! Workflow runtime for wkf
//!
//! The engine drives instances through AND/OR process graphs. A run
//! repeats passes over an instance until it reaches quiescence
//! (WAITING) or only END nodes remain active (COMPLETED). Each run is
//! a single transaction: a runtime error rolls it back and leaves the
//! instance FAILED.
//!
//! # Architecture
//!
//! The [`WorkflowEngine`] composes specialized components:
//!
//! - [`TransitionEvaluator`]: applies join and split rules
//! - [`StateMachine`]: runs the pass loop on an in-memory instance
//! - [`InstanceLeases`]: serializes concurrent runs of one instance
//! - [`Persistence`]: stores workflows and instances ([`MemoryStore`])
//! - [`ActionInvoker`]: evaluates guards and executes entry actions
//!   ([`ConditionInvoker`])
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use wkf_engine::{ConditionInvoker, WorkflowEngine};
//! use wkf_types::*;
//!
//! let invoker = Arc::new(ConditionInvoker::new());
//! let engine = WorkflowEngine::in_memory(invoker.clone());
//!
//! let mut wf = WorkflowBuilder::new("Order Approval", "sale.order").with_id("approval");
//! wf.add_node(Node::start("start")).unwrap();
//! wf.add_node(Node::end("approved")).unwrap();
//! wf.add_node(Node::end("rejected")).unwrap();
//! wf.add_transition(
//!     Transition::conditional("ok", "start", "approved", "amount <= 1000").with_sequence(1),
//! )
//! .unwrap();
//! wf.add_transition(Transition::new("too_large", "start", "rejected").with_sequence(2))
//!     .unwrap();
//! let wf_id = engine.register_workflow(wf.build().unwrap()).unwrap();
//!
//! invoker.set_variable(&TargetRef::new("sale.order", "42"), "amount", "250");
//! let instance = engine.run_for_entity(&wf_id, "sale.order", "42").unwrap();
//!
//! assert_eq!(instance.status, InstanceStatus::Completed);
//! assert!(instance.is_active(&NodeId::new("approved")));
//! ```

#![deny(unsafe_code)]

pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod invoker;
pub mod lease;
pub mod state_machine;
pub mod store;

// Re-export main types
pub use condition::ConditionInvoker;
pub use config::{EngineConfig, LockPolicy};
pub use engine::WorkflowEngine;
pub use error::{EngineError, EngineResult, InvokerError, StoreError};
pub use evaluator::TransitionEvaluator;
pub use invoker::{ActionInvoker, ActionOutcome, InvocationContext};
pub use lease::{InstanceLease, InstanceLeases};
pub use state_machine::{RunReport, StateMachine, StepOptions};
pub use store::{InstanceStore, MemoryStore, Persistence, StoreResult, WorkflowStore};
