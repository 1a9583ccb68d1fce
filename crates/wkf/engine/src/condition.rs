//! Condition invoker: a reference ActionInvoker over per-entity variables
//!
//! Guards are small boolean expressions over the variables of the
//! target entity:
//!
//! - comparisons: `==`, `!=`, `>`, `>=`, `<`, `<=`
//! - conjunction and disjunction: `&&`, `||` (`&&` binds tighter)
//! - bare operands: `approved`, `!approved`, `true`, `false`
//!
//! Operands are quoted strings, numbers, `true`/`false`, or variable
//! names. Operators inside a quoted operand are literal text. Referring
//! to a variable the entity does not have is an error.
//!
//! Entry actions are closures registered by key. Once a run commits,
//! the scalar fields of its merged action context are written back into
//! the entity's variables, so guards in later runs can see them. A run
//! that rolls back leaves the entity untouched.

use crate::error::InvokerError;
use crate::invoker::{ActionInvoker, ActionOutcome, InvocationContext};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use wkf_types::TargetRef;

type ActionFn =
    dyn Fn(&InvocationContext<'_>) -> Result<ActionOutcome, InvokerError> + Send + Sync;

/// Evaluates guards against entity variables and runs registered actions
#[derive(Default)]
pub struct ConditionInvoker {
    variables: DashMap<TargetRef, HashMap<String, String>>,
    actions: DashMap<String, Arc<ActionFn>>,
}

impl ConditionInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all variables of an entity
    pub fn set_entity(&self, target: TargetRef, variables: HashMap<String, String>) {
        self.variables.insert(target, variables);
    }

    /// Set one variable of an entity
    pub fn set_variable(
        &self,
        target: &TargetRef,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.variables
            .entry(target.clone())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Read one variable of an entity
    pub fn variable(&self, target: &TargetRef, key: &str) -> Option<String> {
        self.variables
            .get(target)
            .and_then(|vars| vars.get(key).cloned())
    }

    /// Register an entry action under a key
    pub fn register_action<F>(&self, key: impl Into<String>, action: F)
    where
        F: Fn(&InvocationContext<'_>) -> Result<ActionOutcome, InvokerError>
            + Send
            + Sync
            + 'static,
    {
        self.actions.insert(key.into(), Arc::new(action));
    }

    /// Evaluate an expression against explicit variables
    pub fn evaluate(
        &self,
        expression: &str,
        variables: &HashMap<String, String>,
    ) -> Result<bool, InvokerError> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(InvokerError::InvalidExpression(expression.to_string()));
        }

        for clause in split_outside_quotes(expression, "||") {
            if self.evaluate_conjunction(clause, variables)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn evaluate_conjunction(
        &self,
        clause: &str,
        variables: &HashMap<String, String>,
    ) -> Result<bool, InvokerError> {
        for term in split_outside_quotes(clause, "&&") {
            if !self.evaluate_term(term.trim(), variables)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn evaluate_term(
        &self,
        term: &str,
        variables: &HashMap<String, String>,
    ) -> Result<bool, InvokerError> {
        if term.is_empty() {
            return Err(InvokerError::InvalidExpression(term.to_string()));
        }

        // Two-character operators first so `>=` is not read as `>`
        for op in [
            Comparison::Eq,
            Comparison::Ne,
            Comparison::Ge,
            Comparison::Le,
            Comparison::Gt,
            Comparison::Lt,
        ] {
            let symbol = op.symbol();
            if let Some(at) = find_outside_quotes(term, symbol) {
                let (lhs, rhs) = (&term[..at], &term[at + symbol.len()..]);
                let lhs = resolve(lhs.trim(), variables)?;
                let rhs = resolve(rhs.trim(), variables)?;
                return op.apply(&lhs, &rhs, term);
            }
        }

        let (negated, operand) = match term.strip_prefix('!') {
            Some(rest) => (true, rest.trim()),
            None => (false, term),
        };
        let value = resolve(operand, variables)?;
        let truthy = match value.as_str() {
            "true" | "1" => true,
            "false" | "0" | "" => false,
            _ => return Err(InvokerError::InvalidExpression(term.to_string())),
        };
        Ok(truthy != negated)
    }

    /// Write the scalar fields of a committed context into the entity
    fn write_back(
        &self,
        target: &TargetRef,
        fields: &serde_json::Map<String, serde_json::Value>,
    ) {
        let mut vars = self.variables.entry(target.clone()).or_default();
        for (key, value) in fields {
            let rendered = match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Bool(b) => b.to_string(),
                serde_json::Value::Number(n) => n.to_string(),
                _ => continue,
            };
            vars.insert(key.clone(), rendered);
        }
    }
}

impl ActionInvoker for ConditionInvoker {
    fn evaluate_guard(
        &self,
        expression: &str,
        ctx: &InvocationContext<'_>,
    ) -> Result<bool, InvokerError> {
        // Clone so no map guard is held across evaluation
        let variables = self
            .variables
            .get(ctx.target)
            .map(|vars| vars.clone())
            .unwrap_or_default();
        let result = self.evaluate(expression, &variables);
        tracing::trace!(
            target_ref = %ctx.target,
            expression,
            result = ?result,
            "Guard evaluated"
        );
        result
    }

    fn execute_action(
        &self,
        action_key: &str,
        ctx: &InvocationContext<'_>,
    ) -> Result<ActionOutcome, InvokerError> {
        let action = self
            .actions
            .get(action_key)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| InvokerError::UnknownAction(action_key.to_string()))?;

        action(ctx)
    }

    fn apply_context(
        &self,
        ctx: &InvocationContext<'_>,
        context: &serde_json::Map<String, serde_json::Value>,
    ) {
        self.write_back(ctx.target, context);
    }
}

impl std::fmt::Debug for ConditionInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionInvoker")
            .field("entities", &self.variables.len())
            .field("actions", &self.actions.len())
            .finish()
    }
}

// ── Operands ─────────────────────────────────────────────────────────

/// Byte offset of the first `symbol` not inside a quoted operand
fn find_outside_quotes(text: &str, symbol: &str) -> Option<usize> {
    let mut quote: Option<char> = None;
    for (i, c) in text.char_indices() {
        match quote {
            Some(open) if c == open => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if text[i..].starts_with(symbol) => return Some(i),
            None => {}
        }
    }
    None
}

fn split_outside_quotes<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut rest = text;
    while let Some(at) = find_outside_quotes(rest, separator) {
        parts.push(&rest[..at]);
        rest = &rest[at + separator.len()..];
    }
    parts.push(rest);
    parts
}

fn resolve(operand: &str, variables: &HashMap<String, String>) -> Result<String, InvokerError> {
    if operand.is_empty() {
        return Err(InvokerError::InvalidExpression(operand.to_string()));
    }
    let quoted = operand.len() >= 2
        && ((operand.starts_with('"') && operand.ends_with('"'))
            || (operand.starts_with('\'') && operand.ends_with('\'')));
    if quoted {
        return Ok(operand[1..operand.len() - 1].to_string());
    }
    if operand == "true" || operand == "false" || operand.parse::<f64>().is_ok() {
        return Ok(operand.to_string());
    }
    variables
        .get(operand)
        .cloned()
        .ok_or_else(|| InvokerError::UnknownVariable(operand.to_string()))
}

#[derive(Clone, Copy, Debug)]
enum Comparison {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl Comparison {
    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
        }
    }

    fn apply(self, lhs: &str, rhs: &str, term: &str) -> Result<bool, InvokerError> {
        let numeric = match (lhs.parse::<f64>(), rhs.parse::<f64>()) {
            (Ok(a), Ok(b)) => Some((a, b)),
            _ => None,
        };
        match (self, numeric) {
            (Self::Eq, Some((a, b))) => Ok(a == b),
            (Self::Ne, Some((a, b))) => Ok(a != b),
            (Self::Eq, None) => Ok(lhs == rhs),
            (Self::Ne, None) => Ok(lhs != rhs),
            (Self::Ge, Some((a, b))) => Ok(a >= b),
            (Self::Le, Some((a, b))) => Ok(a <= b),
            (Self::Gt, Some((a, b))) => Ok(a > b),
            (Self::Lt, Some((a, b))) => Ok(a < b),
            (_, None) => Err(InvokerError::InvalidExpression(format!(
                "{} (ordering needs numeric operands)",
                term
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wkf_types::WorkflowId;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_equality() {
        let inv = ConditionInvoker::new();
        let v = vars(&[("state", "draft"), ("amount", "10")]);
        assert!(inv.evaluate("state == \"draft\"", &v).unwrap());
        assert!(inv.evaluate("state == 'draft'", &v).unwrap());
        assert!(!inv.evaluate("state != \"draft\"", &v).unwrap());
        assert!(inv.evaluate("amount == 10.0", &v).unwrap());
    }

    #[test]
    fn test_numeric_ordering() {
        let inv = ConditionInvoker::new();
        let v = vars(&[("value", "5")]);
        assert!(inv.evaluate("value > 0", &v).unwrap());
        assert!(inv.evaluate("value >= 5", &v).unwrap());
        assert!(!inv.evaluate("value < 5", &v).unwrap());
        assert!(inv.evaluate("value <= 5", &v).unwrap());

        let v = vars(&[("value", "-1")]);
        assert!(!inv.evaluate("value > 0", &v).unwrap());
    }

    #[test]
    fn test_ordering_rejects_text() {
        let inv = ConditionInvoker::new();
        let v = vars(&[("state", "draft")]);
        assert!(matches!(
            inv.evaluate("state > 3", &v),
            Err(InvokerError::InvalidExpression(_))
        ));
    }

    #[test]
    fn test_boolean_operands() {
        let inv = ConditionInvoker::new();
        let v = vars(&[("approved", "true"), ("blocked", "0")]);
        assert!(inv.evaluate("approved", &v).unwrap());
        assert!(!inv.evaluate("blocked", &v).unwrap());
        assert!(inv.evaluate("!blocked", &v).unwrap());
        assert!(inv.evaluate("true", &v).unwrap());
        assert!(!inv.evaluate("false", &v).unwrap());
    }

    #[test]
    fn test_connectives() {
        let inv = ConditionInvoker::new();
        let v = vars(&[("a", "1"), ("b", "0")]);
        assert!(!inv.evaluate("a && b", &v).unwrap());
        assert!(inv.evaluate("a || b", &v).unwrap());
        assert!(inv.evaluate("b && a || a", &v).unwrap());
    }

    #[test]
    fn test_operators_inside_quotes_are_literal() {
        let inv = ConditionInvoker::new();
        let v = vars(&[("name", "x||y"), ("note", "a && b")]);
        assert!(inv.evaluate("name != \"a==b\"", &v).unwrap());
        assert!(inv.evaluate("name == \"x||y\"", &v).unwrap());
        assert!(inv.evaluate("note == 'a && b' && name != '<='", &v).unwrap());
        assert!(!inv.evaluate("name == \"a\" || note == \"x || y\"", &v).unwrap());
    }

    #[test]
    fn test_unterminated_quote_is_not_split() {
        let inv = ConditionInvoker::new();
        let v = vars(&[("name", "a")]);
        assert!(matches!(
            inv.evaluate("name == \"a || b", &v),
            Err(InvokerError::InvalidExpression(_) | InvokerError::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_unknown_variable_is_error() {
        let inv = ConditionInvoker::new();
        let result = inv.evaluate("missing > 0", &HashMap::new());
        assert_eq!(
            result,
            Err(InvokerError::UnknownVariable("missing".to_string()))
        );
    }

    #[test]
    fn test_guard_uses_entity_variables() {
        let inv = ConditionInvoker::new();
        let wf = WorkflowId::new("wf");
        let order = TargetRef::new("sale.order", "1");
        inv.set_variable(&order, "value", "5");

        let ctx = InvocationContext::new(&wf, &order);
        assert!(inv.evaluate_guard("value > 0", &ctx).unwrap());

        inv.set_variable(&order, "value", "-1");
        assert!(!inv.evaluate_guard("value > 0", &ctx).unwrap());
    }

    #[test]
    fn test_committed_context_writes_back_variables() {
        let inv = ConditionInvoker::new();
        inv.register_action("approve", |_ctx| {
            Ok(ActionOutcome::new(serde_json::json!({
                "approved": true,
                "level": 2,
                "nested": { "ignored": 1 }
            })))
        });

        let wf = WorkflowId::new("wf");
        let order = TargetRef::new("sale.order", "1");
        let ctx = InvocationContext::new(&wf, &order);
        let outcome = inv.execute_action("approve", &ctx).unwrap();
        assert!(inv.variable(&order, "approved").is_none());

        let fields = outcome.value.as_object().unwrap();
        inv.apply_context(&ctx, fields);
        assert_eq!(inv.variable(&order, "approved").as_deref(), Some("true"));
        assert_eq!(inv.variable(&order, "level").as_deref(), Some("2"));
        assert!(inv.variable(&order, "nested").is_none());
    }

    #[test]
    fn test_unknown_action() {
        let inv = ConditionInvoker::new();
        let wf = WorkflowId::new("wf");
        let order = TargetRef::new("sale.order", "1");
        let result = inv.execute_action("nope", &InvocationContext::new(&wf, &order));
        assert!(matches!(result, Err(InvokerError::UnknownAction(_))));
    }
}
