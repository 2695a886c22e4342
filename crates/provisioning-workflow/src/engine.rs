use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::context::{ProgressEventType, WorkflowContext};
use crate::instance::{StepStatus, WorkflowInstance, WorkflowStatus};
use crate::persistence::WorkflowPersistence;
use crate::step::{ErrorKind, StepHandler, WorkflowStep};

/// A per-instance flag checked between steps (and, cooperatively, inside
/// long-running handlers via [`WorkflowContext`]). Setting it doesn't
/// force-kill a running handler — the engine only stops starting new
/// steps once it observes the flag.
#[derive(Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub history_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_capacity: crate::context::DEFAULT_HISTORY_CAPACITY,
        }
    }
}

fn backoff_for_attempt(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt.saturating_sub(1)))
}

fn percentage_for(completed_substeps: usize, total_substeps: usize) -> f64 {
    if total_substeps == 0 {
        return 100.0;
    }
    (completed_substeps as f64 / total_substeps as f64) * 100.0
}

/// Runs every step of `steps` in order against `instance`/`ctx`, honoring
/// per-step timeout/retry policy and cooperative cancellation, persisting
/// status transitions as they happen.
pub async fn execute_workflow(
    instance: &mut WorkflowInstance,
    steps: &[WorkflowStep],
    handlers: &HashMap<String, Arc<dyn StepHandler>>,
    ctx: &mut WorkflowContext,
    cancel: &CancellationFlag,
    persistence: &dyn WorkflowPersistence,
) {
    instance.start_time = Some(Utc::now());
    instance.transition(WorkflowStatus::Running);
    persistence.on_transition(instance).await;
    ctx.broadcaster().emit(crate::context::ProgressEvent {
        event_type: ProgressEventType::OperationStarted,
        workflow_id: ctx.workflow_id().to_string(),
        timestamp: Utc::now(),
        message: format!("workflow {} started", instance.id),
        percentage: 0.0,
        subtask_name: None,
    });

    let total = steps.len();

    for (idx, step) in steps.iter().enumerate() {
        if cancel.is_cancelled() {
            for remaining in instance.steps.iter_mut().skip(idx) {
                remaining.status = StepStatus::Skipped;
            }
            instance.transition(WorkflowStatus::Cancelled);
            instance.end_time = Some(Utc::now());
            persistence.on_transition(instance).await;
            return;
        }

        instance.current_step_index = Some(idx);
        let percentage = percentage_for(idx, total);
        ctx.set_percentage(percentage);

        instance.steps[idx].status = StepStatus::Running;
        instance.steps[idx].attempt = 1;
        instance.steps[idx].start_time = Some(Utc::now());
        ctx.broadcaster().emit(crate::context::ProgressEvent {
            event_type: ProgressEventType::SubtaskStarted,
            workflow_id: ctx.workflow_id().to_string(),
            timestamp: Utc::now(),
            message: format!("step {} started", step.name),
            percentage,
            subtask_name: Some(step.name.clone()),
        });

        let handler = handlers.get(&step.handler_ref).cloned();

        loop {
            let attempt = instance.steps[idx].attempt;

            let outcome = match &handler {
                None => Err((format!("no handler registered for {}", step.handler_ref), ErrorKind::Config)),
                Some(handler) => {
                    let timeout = Duration::from_secs(step.timeout_seconds);
                    match tokio::time::timeout(timeout, handler.execute(ctx)).await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(e)) => Err((e.to_string(), e.kind())),
                        Err(_) => Err((format!("step timed out after {}s", step.timeout_seconds), ErrorKind::Timeout)),
                    }
                }
            };

            match outcome {
                Ok(value) => {
                    let step_exec = &mut instance.steps[idx];
                    step_exec.status = StepStatus::Completed;
                    step_exec.end_time = Some(Utc::now());
                    step_exec.result = value;
                    persistence.on_transition(instance).await;
                    ctx.broadcaster().emit(crate::context::ProgressEvent {
                        event_type: ProgressEventType::SubtaskCompleted { success: true },
                        workflow_id: ctx.workflow_id().to_string(),
                        timestamp: Utc::now(),
                        message: format!("step {} completed", step.name),
                        percentage: percentage_for(idx + 1, total),
                        subtask_name: Some(step.name.clone()),
                    });
                    break;
                }
                Err((message, kind)) => {
                    if kind.retryable() && attempt < step.max_attempts {
                        tracing::warn!(step = %step.name, attempt, %message, "step attempt failed, retrying");
                        tokio::time::sleep(backoff_for_attempt(attempt)).await;
                        instance.steps[idx].attempt += 1;
                        continue;
                    }

                    let step_exec = &mut instance.steps[idx];
                    step_exec.status = StepStatus::Failed;
                    step_exec.error = Some(message.clone());
                    step_exec.end_time = Some(Utc::now());
                    instance.transition(WorkflowStatus::Failed);
                    instance.error = Some(message.clone());
                    instance.failure_kind = Some(kind.as_str().to_string());
                    instance.end_time = Some(Utc::now());
                    persistence.on_transition(instance).await;
                    ctx.broadcaster().emit(crate::context::ProgressEvent {
                        event_type: ProgressEventType::SubtaskCompleted { success: false },
                        workflow_id: ctx.workflow_id().to_string(),
                        timestamp: Utc::now(),
                        message,
                        percentage,
                        subtask_name: Some(step.name.clone()),
                    });
                    return;
                }
            }
        }
    }

    instance.transition(WorkflowStatus::Completed);
    instance.end_time = Some(Utc::now());
    persistence.on_transition(instance).await;
    ctx.broadcaster().emit(crate::context::ProgressEvent {
        event_type: ProgressEventType::OperationCompleted,
        workflow_id: ctx.workflow_id().to_string(),
        timestamp: Utc::now(),
        message: format!("workflow {} completed", instance.id),
        percentage: 100.0,
        subtask_name: None,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ProgressBroadcaster;
    use crate::persistence::InMemoryPersistence;
    use crate::step::StepError;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::atomic::AtomicU32;

    struct AlwaysSucceeds;

    #[async_trait]
    impl StepHandler for AlwaysSucceeds {
        async fn execute(&self, _ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
            Ok(None)
        }
    }

    struct FailsNTimes {
        remaining_failures: AtomicU32,
    }

    #[async_trait]
    impl StepHandler for FailsNTimes {
        async fn execute(&self, _ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
            let remaining = self.remaining_failures.fetch_update(
                Ordering::SeqCst,
                Ordering::SeqCst,
                |n| if n > 0 { Some(n - 1) } else { Some(0) },
            );
            if remaining.unwrap_or(0) > 0 {
                Err(StepError::Failed("not yet".to_string()))
            } else {
                Ok(None)
            }
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl StepHandler for AlwaysFails {
        async fn execute(&self, _ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
            Err(StepError::Failed("boom".to_string()))
        }
    }

    struct AlwaysFailsValidation {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl StepHandler for AlwaysFailsValidation {
        async fn execute(&self, _ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(StepError::Validation("bad input".to_string()))
        }
    }

    fn build_context() -> WorkflowContext {
        WorkflowContext::new("wf-1", "server-1", Arc::new(ProgressBroadcaster::default()))
    }

    #[tokio::test(start_paused = true)]
    async fn happy_path_completes_every_step() {
        let steps = vec![
            WorkflowStep::new("validate", "", "validate"),
            WorkflowStep::new("commission", "", "commission"),
        ];
        let mut instance = WorkflowInstance::new("wf-1", &steps.iter().map(|s| s.name.clone()).collect::<Vec<_>>());
        let mut handlers: HashMap<String, Arc<dyn StepHandler>> = HashMap::new();
        handlers.insert("validate".to_string(), Arc::new(AlwaysSucceeds));
        handlers.insert("commission".to_string(), Arc::new(AlwaysSucceeds));
        let mut ctx = build_context();
        let cancel = CancellationFlag::new();
        let persistence = InMemoryPersistence::new();

        execute_workflow(&mut instance, &steps, &handlers, &mut ctx, &cancel, &persistence).await;

        assert_eq!(instance.status, WorkflowStatus::Completed);
        assert!(instance.steps.iter().all(|s| s.status == StepStatus::Completed));
        assert!(!persistence.snapshots().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds_within_max_attempts() {
        let steps = vec![WorkflowStep::new("flaky", "", "flaky").with_max_attempts(3)];
        let mut instance = WorkflowInstance::new("wf-1", &["flaky".to_string()]);
        let mut handlers: HashMap<String, Arc<dyn StepHandler>> = HashMap::new();
        handlers.insert(
            "flaky".to_string(),
            Arc::new(FailsNTimes {
                remaining_failures: AtomicU32::new(2),
            }),
        );
        let mut ctx = build_context();
        let cancel = CancellationFlag::new();
        let persistence = InMemoryPersistence::new();

        execute_workflow(&mut instance, &steps, &handlers, &mut ctx, &cancel, &persistence).await;

        assert_eq!(instance.status, WorkflowStatus::Completed);
        assert_eq!(instance.steps[0].attempt, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_retries_fails_the_workflow() {
        let steps = vec![WorkflowStep::new("doomed", "", "doomed").with_max_attempts(2)];
        let mut instance = WorkflowInstance::new("wf-1", &["doomed".to_string()]);
        let mut handlers: HashMap<String, Arc<dyn StepHandler>> = HashMap::new();
        handlers.insert("doomed".to_string(), Arc::new(AlwaysFails));
        let mut ctx = build_context();
        let cancel = CancellationFlag::new();
        let persistence = InMemoryPersistence::new();

        execute_workflow(&mut instance, &steps, &handlers, &mut ctx, &cancel, &persistence).await;

        assert_eq!(instance.status, WorkflowStatus::Failed);
        assert_eq!(instance.steps[0].status, StepStatus::Failed);
        assert_eq!(instance.error.as_deref(), Some("boom"));
        assert_eq!(instance.failure_kind.as_deref(), Some("RemoteCommandError"));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_kind_fails_on_first_attempt() {
        let steps = vec![WorkflowStep::new("validate", "", "validate").with_max_attempts(5)];
        let mut instance = WorkflowInstance::new("wf-1", &["validate".to_string()]);
        let handler = Arc::new(AlwaysFailsValidation {
            attempts: AtomicU32::new(0),
        });
        let mut handlers: HashMap<String, Arc<dyn StepHandler>> = HashMap::new();
        handlers.insert("validate".to_string(), handler.clone());
        let mut ctx = build_context();
        let cancel = CancellationFlag::new();
        let persistence = InMemoryPersistence::new();

        execute_workflow(&mut instance, &steps, &handlers, &mut ctx, &cancel, &persistence).await;

        assert_eq!(instance.status, WorkflowStatus::Failed);
        assert_eq!(handler.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(instance.failure_kind.as_deref(), Some("ValidationError"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_before_a_step_skips_the_rest() {
        let steps = vec![
            WorkflowStep::new("a", "", "a"),
            WorkflowStep::new("b", "", "b"),
        ];
        let mut instance = WorkflowInstance::new("wf-1", &["a".to_string(), "b".to_string()]);
        let mut handlers: HashMap<String, Arc<dyn StepHandler>> = HashMap::new();
        handlers.insert("a".to_string(), Arc::new(AlwaysSucceeds));
        handlers.insert("b".to_string(), Arc::new(AlwaysSucceeds));
        let mut ctx = build_context();
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let persistence = InMemoryPersistence::new();

        execute_workflow(&mut instance, &steps, &handlers, &mut ctx, &cancel, &persistence).await;

        assert_eq!(instance.status, WorkflowStatus::Cancelled);
        assert!(instance.steps.iter().all(|s| s.status == StepStatus::Skipped));
    }
}
