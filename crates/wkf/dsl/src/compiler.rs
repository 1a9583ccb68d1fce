//! Compiler: converts parsed DSL into a [`Workflow`]
//!
//! Every graph goes through [`WorkflowBuilder`], so a compiled
//! workflow satisfies the same integrity checks as a hand-built one.

use crate::errors::{DslError, DslResult};
use crate::parser::{ParsedNode, ParsedTransition, ParsedWorkflow, Parser};
use crate::validator;
use wkf_types::*;

/// Compile a DSL string directly into a Workflow
pub fn compile(input: &str) -> DslResult<Workflow> {
    let parsed = Parser::parse(input)?;
    validator::validate(&parsed)?;
    compile_parsed(parsed)
}

/// Compile an already validated workflow
pub fn compile_parsed(parsed: ParsedWorkflow) -> DslResult<Workflow> {
    let model = parsed
        .model
        .as_deref()
        .ok_or_else(|| DslError::MissingField("MODEL".into()))?;
    let mut builder = WorkflowBuilder::new(&parsed.name, model);

    if let Some(id) = &parsed.id {
        builder = builder.with_id(id);
    }
    if let Some(description) = &parsed.description {
        builder = builder.with_description(description);
    }
    if let Some(max) = parsed.max_counter {
        builder = builder.with_max_node_counter(narrow("MAX_COUNTER", max)?);
    }
    if let Some(sequence) = parsed.sequence {
        builder = builder.with_sequence(narrow("SEQUENCE", sequence)?);
    }
    if let Some(condition) = &parsed.condition {
        builder = builder.with_condition(condition);
    }
    if parsed.inactive {
        builder = builder.inactive();
    }

    for node in &parsed.nodes {
        builder.add_node(compile_node(node)?)?;
    }
    for transition in &parsed.transitions {
        builder.add_transition(compile_transition(transition)?)?;
    }

    let workflow = builder.build()?;
    tracing::debug!(
        workflow_id = %workflow.id(),
        nodes = workflow.node_count(),
        transitions = workflow.transition_count(),
        "Workflow compiled from DSL"
    );
    Ok(workflow)
}

fn compile_node(node: &ParsedNode) -> DslResult<Node> {
    let node_type = match node.node_type.as_str() {
        "start" => NodeType::Start,
        "task" => NodeType::Task,
        "gateway" => NodeType::Gateway,
        "end" => NodeType::End,
        other => return Err(DslError::UnknownNodeType(other.into())),
    };

    let name = node.name.as_deref().unwrap_or(node.id.as_str());
    let mut compiled = Node::new(&node.id, name, node_type);

    if let Some(description) = &node.description {
        compiled = compiled.with_description(description);
    }
    if let Some(join) = &node.join {
        compiled = compiled.with_join(parse_operator(join)?);
    }
    if let Some(split) = &node.split {
        compiled = compiled.with_split(parse_operator(split)?);
    }
    if let Some(action) = &node.action {
        compiled = compiled.with_action(action);
    }

    Ok(compiled)
}

fn compile_transition(t: &ParsedTransition) -> DslResult<Transition> {
    let id = t
        .id
        .clone()
        .unwrap_or_else(|| default_transition_id(&t.from, &t.to));
    let mut compiled = Transition::new(id, &t.from, &t.to);

    if let Some(name) = &t.name {
        compiled = compiled.with_name(name);
    }
    if let Some(sequence) = t.sequence {
        compiled = compiled.with_sequence(narrow("transition SEQUENCE", sequence)?);
    }
    if let Some(guard) = &t.guard {
        compiled = compiled.with_guard(guard);
    }

    Ok(compiled)
}

/// Id given to a transition declared without `AS`
pub fn default_transition_id(from: &str, to: &str) -> String {
    format!("{}_to_{}", from, to)
}

fn parse_operator(s: &str) -> DslResult<LogicOperator> {
    match s {
        "and" => Ok(LogicOperator::And),
        "or" => Ok(LogicOperator::Or),
        other => Err(DslError::UnknownOperator(other.into())),
    }
}

fn narrow<T: TryFrom<i64>>(field: &str, value: i64) -> DslResult<T> {
    T::try_from(value).map_err(|_| DslError::InvalidValue {
        field: field.into(),
        message: format!("{} is out of range", value),
    })
}
