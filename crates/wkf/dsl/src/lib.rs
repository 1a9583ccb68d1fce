//! Workflow DSL for wkf
//!
//! A small text notation for AND/OR process graphs. Sources compile
//! down to a validated [`wkf_types::Workflow`]; [`DslImporter`] exposes
//! the same pipeline through the [`wkf_types::Importer`] trait.
//!
//! # DSL Syntax
//!
//! ```text
//! WORKFLOW "Order Approval" {
//!     ID order_approval
//!     MODEL "sale.order"
//!     MAX_COUNTER 3            # visits allowed per node
//!     SEQUENCE 10              # order among workflows of one model
//!     CONDITION "amount > 0"   # does this workflow apply to the entity
//!
//!     NODE start TYPE start { SPLIT and }
//!     NODE credit TYPE task "Credit check" { ACTION "check_credit" }
//!     NODE stock TYPE task "Stock check" { ACTION "check_stock" }
//!     NODE done TYPE end { JOIN and }
//!
//!     TRANSITIONS {
//!         start -> credit
//!         start -> stock
//!         credit -> done WHEN "credit_ok" AS credit_ok
//!         stock -> done SEQUENCE 1 WHEN "in_stock"
//!     }
//! }
//! ```
//!
//! Node types are `start`, `task`, `gateway` and `end`; `JOIN` and
//! `SPLIT` take `and` or `or` (both default to `or`). A transition
//! without `AS` is named `<from>_to_<to>`.
//!
//! # Usage
//!
//! ```rust
//! use wkf_dsl::DslImporter;
//! use wkf_types::{Importer, NodeId};
//!
//! let dsl = r#"
//! WORKFLOW "Simple" {
//!     MODEL "sale.order"
//!     NODE start TYPE start
//!     NODE review TYPE task { ACTION "notify" }
//!     NODE end TYPE end
//!     TRANSITIONS {
//!         start -> review
//!         review -> end WHEN "approved"
//!     }
//! }
//! "#;
//!
//! let wf = DslImporter::new().parse(dsl).unwrap();
//! assert_eq!(wf.name(), "Simple");
//! assert_eq!(wf.node_count(), 3);
//! assert_eq!(wf.root_node(), &NodeId::new("start"));
//! ```

#![deny(unsafe_code)]

mod compiler;
mod errors;
mod lexer;
mod parser;
mod validator;

pub use compiler::{compile, compile_parsed, default_transition_id};
pub use errors::{DslError, DslResult};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{ParsedNode, ParsedTransition, ParsedWorkflow, Parser};
pub use validator::validate;

/// [`wkf_types::Importer`] backed by the workflow DSL
#[derive(Clone, Copy, Debug, Default)]
pub struct DslImporter;

impl DslImporter {
    pub fn new() -> Self {
        Self
    }
}

impl wkf_types::Importer for DslImporter {
    type Error = DslError;

    fn parse(&self, source: &str) -> Result<wkf_types::Workflow, Self::Error> {
        compile(source)
    }
}
