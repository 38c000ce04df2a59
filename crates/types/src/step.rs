//! Workflow steps and their kind-specific configuration
//!
//! A step is a node in the workflow graph. Its kind is a closed tagged
//! variant; each kind carries its own config payload, so dispatch in the
//! engine is an exhaustive match rather than a string switch. Kinds this
//! build does not know deserialize to `Unknown` and the engine treats
//! them as a dead end.

use crate::{Role, StepId, UserId};
use crate::task::TaskPriority;
use serde::{Deserialize, Serialize};

/// A node in a workflow version's directed graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Step identifier, unique within the version
    pub id: StepId,
    /// Kind plus kind-specific configuration
    #[serde(flatten)]
    pub kind: StepKind,
    /// Human-readable label shown in tasks and notifications
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
}

impl Step {
    pub fn new(id: impl Into<String>, kind: StepKind) -> Self {
        Self {
            id: StepId::new(id),
            kind,
            label: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Label if present, step id otherwise
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            self.id.as_str()
        } else {
            &self.label
        }
    }
}

/// The closed set of step kinds the engine can execute
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StepKind {
    /// A human decision; the execution suspends until it is resolved
    Approval(ApprovalConfig),
    /// Deliver a notification and continue
    Notification(NotificationConfig),
    /// Perform a configured automatic action and continue
    Auto(AutoConfig),
    /// Pass-through marker; the branch decision happens on this step's
    /// outgoing edges
    Condition,
    /// Catch-all for kinds authored by a newer builder than this engine
    #[serde(other)]
    Unknown,
}

impl StepKind {
    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::Approval(_) => "approval",
            StepKind::Notification(_) => "notification",
            StepKind::Auto(_) => "auto",
            StepKind::Condition => "condition",
            StepKind::Unknown => "unknown",
        }
    }
}

/// Configuration for an approval step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprovalConfig {
    /// Explicit assignee; takes precedence over `assignee_role`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<UserId>,
    /// Role to resolve against the directory when no explicit assignee
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_role: Option<Role>,
    /// Deadline in hours; when set, an SLA record tracks this step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sla_hours: Option<u32>,
    /// Priority of the generated task
    #[serde(default)]
    pub priority: TaskPriority,
}

/// Configuration for a notification step
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Recipient; steps without one are recorded but deliver nothing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Configuration for an automatic action step.
///
/// The action is opaque to the engine; it is logged into the step
/// history and never interpreted here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoConfig {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub action: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: serde_json::Map<String, serde_json::Value>,
}
