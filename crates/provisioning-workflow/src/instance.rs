use chrono::{DateTime, Utc};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct StepExecution {
    pub name: String,
    pub status: StepStatus,
    pub attempt: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub result: Option<Value>,
}

impl StepExecution {
    pub fn pending(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            attempt: 0,
            start_time: None,
            end_time: None,
            error: None,
            result: None,
        }
    }
}

/// The runtime record of one workflow run: its ordered steps, overall
/// status, and bookkeeping timestamps. Mirrors the static step
/// definitions it was constructed from one-for-one.
#[derive(Debug, Clone)]
pub struct WorkflowInstance {
    pub id: String,
    pub status: WorkflowStatus,
    pub steps: Vec<StepExecution>,
    pub current_step_index: Option<usize>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// The terminal [`crate::ErrorKind`] name (e.g. `"FirmwareCriticalError"`)
    /// that failed the workflow, for programmatic consumers. `None` unless
    /// `status == Failed`.
    pub failure_kind: Option<String>,
}

impl WorkflowInstance {
    pub fn new(id: impl Into<String>, step_names: &[String]) -> Self {
        Self {
            id: id.into(),
            status: WorkflowStatus::Pending,
            steps: step_names.iter().map(StepExecution::pending).collect(),
            current_step_index: None,
            start_time: None,
            end_time: None,
            error: None,
            failure_kind: None,
        }
    }

    /// Transitions `status`, enforcing the monotonic
    /// `pending -> running -> (completed | failed | cancelled)` state
    /// machine: terminal states never move again.
    pub fn transition(&mut self, next: WorkflowStatus) {
        if self.status.is_terminal() {
            tracing::warn!(
                workflow_id = %self.id,
                from = ?self.status,
                to = ?next,
                "ignoring transition out of a terminal workflow state"
            );
            return;
        }
        self.status = next;
    }

    pub fn completed_step_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.status, StepStatus::Completed | StepStatus::Skipped))
            .count()
    }

    /// The legacy `current_step / total_steps` progress computation,
    /// retained for external dashboards that already read it; superseded
    /// by `ProgressEvent::percentage` as the canonical value.
    pub fn step_based_percentage(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        let current = self.current_step_index.map(|i| i + 1).unwrap_or(0);
        (current as f64 / self.steps.len() as f64) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_status_is_absorbing() {
        let mut instance = WorkflowInstance::new("wf-1", &["a".to_string()]);
        instance.transition(WorkflowStatus::Running);
        instance.transition(WorkflowStatus::Failed);
        instance.transition(WorkflowStatus::Running);
        assert_eq!(instance.status, WorkflowStatus::Failed);
    }

    #[test]
    fn step_based_percentage_tracks_current_index() {
        let mut instance = WorkflowInstance::new("wf-1", &["a".to_string(), "b".to_string()]);
        instance.current_step_index = Some(0);
        assert_eq!(instance.step_based_percentage(), 50.0);
    }
}
