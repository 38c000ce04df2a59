//! Immutable workflow version snapshots
//!
//! A version freezes a workflow's step sequence and edge set at edit
//! time. Executions always reference a version, never the mutable
//! workflow, so a running execution is immune to later edits.

use crate::{Edge, Step, StepId, WorkflowId, VersionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable snapshot of a workflow's graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowVersion {
    /// Unique version identifier
    pub id: VersionId,
    /// The workflow this version belongs to
    pub workflow_id: WorkflowId,
    /// Monotonic version number within the workflow
    pub version_number: u32,
    /// Ordered step sequence; the first entry is the entry point
    pub steps: Vec<Step>,
    /// Edge set; declaration order is significant for branch selection
    pub edges: Vec<Edge>,
    /// When this version was created
    pub created_at: DateTime<Utc>,
}

impl WorkflowVersion {
    pub fn new(workflow_id: WorkflowId, version_number: u32) -> Self {
        Self {
            id: VersionId::generate(),
            workflow_id,
            version_number,
            steps: Vec::new(),
            edges: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    /// The entry point of the graph, if the version has any steps
    pub fn first_step(&self) -> Option<&Step> {
        self.steps.first()
    }

    /// Look up a step by id
    pub fn step(&self, id: &StepId) -> Option<&Step> {
        self.steps.iter().find(|s| &s.id == id)
    }

    /// Outgoing edges of a step, in declaration order
    pub fn outgoing_edges<'a>(&'a self, source: &'a StepId) -> impl Iterator<Item = &'a Edge> {
        self.edges.iter().filter(move |e| &e.source == source)
    }
}
