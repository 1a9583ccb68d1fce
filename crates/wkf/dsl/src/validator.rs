//! Validator: checks parsed workflows for semantic correctness
//!
//! Runs after parsing and before compilation, so that mistakes are
//! reported in DSL terms (with line numbers) rather than as graph
//! integrity errors. Graph invariants are still enforced again by
//! `WorkflowBuilder::build` during compilation.

use crate::errors::{DslError, DslResult};
use crate::parser::ParsedWorkflow;
use std::collections::HashSet;

pub(crate) const NODE_TYPES: [&str; 4] = ["start", "task", "gateway", "end"];
pub(crate) const OPERATORS: [&str; 2] = ["and", "or"];

/// Validate a parsed workflow for semantic correctness
pub fn validate(workflow: &ParsedWorkflow) -> DslResult<()> {
    validate_has_model(workflow)?;
    validate_has_nodes(workflow)?;
    validate_unique_node_ids(workflow)?;
    validate_node_types(workflow)?;
    validate_has_single_start(workflow)?;
    validate_operators(workflow)?;
    validate_counters(workflow)?;
    validate_transitions_reference_nodes(workflow)?;
    validate_unique_transition_ids(workflow)?;
    Ok(())
}

fn validate_has_model(workflow: &ParsedWorkflow) -> DslResult<()> {
    match workflow.model.as_deref() {
        Some(model) if !model.trim().is_empty() => Ok(()),
        _ => Err(DslError::MissingField("MODEL".into())),
    }
}

fn validate_has_nodes(workflow: &ParsedWorkflow) -> DslResult<()> {
    if workflow.nodes.is_empty() {
        return Err(DslError::ValidationError(
            "Workflow must have at least one node".into(),
        ));
    }
    Ok(())
}

fn validate_unique_node_ids(workflow: &ParsedWorkflow) -> DslResult<()> {
    let mut seen = HashSet::new();
    for node in &workflow.nodes {
        if !seen.insert(&node.id) {
            return Err(DslError::DuplicateNodeId(node.id.clone()));
        }
    }
    Ok(())
}

fn validate_node_types(workflow: &ParsedWorkflow) -> DslResult<()> {
    for node in &workflow.nodes {
        if !NODE_TYPES.contains(&node.node_type.as_str()) {
            return Err(DslError::UnknownNodeType(node.node_type.clone()));
        }
    }
    Ok(())
}

fn validate_has_single_start(workflow: &ParsedWorkflow) -> DslResult<()> {
    let starts: Vec<&str> = workflow
        .nodes
        .iter()
        .filter(|n| n.node_type == "start")
        .map(|n| n.id.as_str())
        .collect();

    match starts.len() {
        0 => Err(DslError::ValidationError(
            "Workflow must have a start node (NODE ... TYPE start)".into(),
        )),
        1 => Ok(()),
        _ => Err(DslError::ValidationError(format!(
            "Workflow must have exactly one start node, found: {}",
            starts.join(", ")
        ))),
    }
}

fn validate_operators(workflow: &ParsedWorkflow) -> DslResult<()> {
    for node in &workflow.nodes {
        for op in [&node.join, &node.split].into_iter().flatten() {
            if !OPERATORS.contains(&op.as_str()) {
                return Err(DslError::UnknownOperator(op.clone()));
            }
        }
    }
    Ok(())
}

fn validate_counters(workflow: &ParsedWorkflow) -> DslResult<()> {
    if let Some(max) = workflow.max_counter {
        if max < 1 || max > i64::from(u32::MAX) {
            return Err(DslError::InvalidValue {
                field: "MAX_COUNTER".into(),
                message: format!("{} is outside 1..={}", max, u32::MAX),
            });
        }
    }

    let sequences = std::iter::once(("SEQUENCE", workflow.sequence)).chain(
        workflow
            .transitions
            .iter()
            .map(|t| ("transition SEQUENCE", t.sequence)),
    );
    for (field, value) in sequences {
        if let Some(seq) = value {
            if i32::try_from(seq).is_err() {
                return Err(DslError::InvalidValue {
                    field: field.into(),
                    message: format!("{} does not fit in a 32-bit sequence", seq),
                });
            }
        }
    }
    Ok(())
}

fn validate_transitions_reference_nodes(workflow: &ParsedWorkflow) -> DslResult<()> {
    let node_ids: HashSet<&str> = workflow.nodes.iter().map(|n| n.id.as_str()).collect();

    for t in &workflow.transitions {
        for (role, id) in [("source", &t.from), ("target", &t.to)] {
            if !node_ids.contains(id.as_str()) {
                return Err(DslError::ValidationError(format!(
                    "Transition on line {} references non-existent {} node: '{}'",
                    t.line, role, id
                )));
            }
        }
    }
    Ok(())
}

fn validate_unique_transition_ids(workflow: &ParsedWorkflow) -> DslResult<()> {
    let mut seen = HashSet::new();
    for id in workflow.transitions.iter().filter_map(|t| t.id.as_ref()) {
        if !seen.insert(id) {
            return Err(DslError::ValidationError(format!(
                "Duplicate transition ID: '{}'",
                id
            )));
        }
    }
    Ok(())
}
