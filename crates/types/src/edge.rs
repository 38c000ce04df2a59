//! Workflow edges: directed, optionally conditional transitions
//!
//! Edge declaration order is significant — the engine selects the first
//! outgoing edge (in declaration order) whose condition is absent or
//! evaluates true. Order is carried by position in the version's edge
//! list, so there is no priority field here.

use crate::StepId;
use serde::{Deserialize, Serialize};

/// A directed transition between two steps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    /// Source step
    pub source: StepId,
    /// Target step
    pub target: StepId,
    /// Opaque condition expression, evaluated by the pluggable
    /// evaluator; `None` means the edge always matches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// Human-readable label
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
}

impl Edge {
    /// Create an unconditional edge
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: StepId::new(source),
            target: StepId::new(target),
            condition: None,
            label: String::new(),
        }
    }

    /// Create a conditional edge
    pub fn conditional(
        source: impl Into<String>,
        target: impl Into<String>,
        condition: impl Into<String>,
    ) -> Self {
        Self {
            source: StepId::new(source),
            target: StepId::new(target),
            condition: Some(condition.into()),
            label: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconditional_edge() {
        let edge = Edge::new("a", "b");
        assert!(!edge.is_conditional());
        assert_eq!(edge.target, StepId::new("b"));
    }

    #[test]
    fn test_conditional_edge() {
        let edge = Edge::conditional("check", "approve", "amount < 1000").with_label("Small");
        assert!(edge.is_conditional());
        assert_eq!(edge.label, "Small");
    }
}
