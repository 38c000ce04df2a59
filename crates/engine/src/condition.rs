//! Edge condition evaluation seam
//!
//! Conditions are opaque strings authored in the workflow builder. The
//! engine only needs a boolean per edge; the expression language is the
//! host's. Evaluation must be pure with respect to the snapshot it is
//! handed; an evaluator that panics or errors counts as `false` at the
//! call site.

use greenlight_types::{ExecutionId, StepHistoryEntry};
use serde_json::{Map, Value};

/// Read-only view of an execution handed to condition evaluation
#[derive(Debug)]
pub struct ExecutionSnapshot<'a> {
    pub execution_id: &'a ExecutionId,
    /// Free-form data accumulated on the execution
    pub data: &'a Map<String, Value>,
    /// Steps executed so far, oldest first
    pub history: &'a [StepHistoryEntry],
}

/// Evaluates edge condition expressions against an execution snapshot
pub trait ConditionEvaluator: Send + Sync {
    /// Whether `expression` holds for the snapshot. Unparseable or
    /// failing expressions should return false, not panic.
    fn evaluate(&self, expression: &str, snapshot: &ExecutionSnapshot<'_>) -> bool;
}

/// Evaluator matching `key == "value"` and `key != "value"` expressions
/// against the execution data map.
///
/// Enough for demos and tests; hosts with a real expression language
/// supply their own [`ConditionEvaluator`].
#[derive(Debug, Default)]
pub struct KeyEqualsEvaluator;

impl KeyEqualsEvaluator {
    fn parse(expression: &str) -> Option<(&str, &str, bool)> {
        let (key, rest, negated) = if let Some((key, rest)) = expression.split_once("==") {
            (key, rest, false)
        } else if let Some((key, rest)) = expression.split_once("!=") {
            (key, rest, true)
        } else {
            return None;
        };
        let value = rest.trim().trim_matches('"').trim_matches('\'');
        Some((key.trim(), value, negated))
    }
}

impl ConditionEvaluator for KeyEqualsEvaluator {
    fn evaluate(&self, expression: &str, snapshot: &ExecutionSnapshot<'_>) -> bool {
        let Some((key, expected, negated)) = Self::parse(expression) else {
            return false;
        };
        let matches = match snapshot.data.get(key) {
            Some(Value::String(s)) => s == expected,
            Some(other) => other.to_string() == expected,
            None => false,
        };
        matches != negated
    }
}
