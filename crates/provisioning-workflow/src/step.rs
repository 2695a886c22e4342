use async_trait::async_trait;
use serde_json::Value;

use crate::context::WorkflowContext;

const DEFAULT_TIMEOUT_SECONDS: u64 = 300;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// The static definition of one step in a workflow template: its name,
/// retry/timeout policy, and the handler that implements it.
#[derive(Debug, Clone)]
pub struct WorkflowStep {
    pub name: String,
    pub description: String,
    pub handler_ref: String,
    pub timeout_seconds: u64,
    pub max_attempts: u32,
}

impl WorkflowStep {
    pub fn new(name: impl Into<String>, description: impl Into<String>, handler_ref: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            handler_ref: handler_ref.into(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Tags a [`StepError`] with how the engine should react to it, mirroring
/// the error-kind table: most kinds get retried per the step's own
/// `max_attempts`/backoff policy, but a kind that's already a terminal
/// verdict (bad input, a critical firmware failure, a missing
/// template/mapping) skips retry and fails the step on the first attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    RemoteCommand,
    Timeout,
    Parse,
    Config,
    Cancellation,
    FirmwareCritical,
}

impl ErrorKind {
    pub fn retryable(self) -> bool {
        matches!(self, ErrorKind::Transport | ErrorKind::RemoteCommand | ErrorKind::Timeout)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Transport => "TransportError",
            ErrorKind::RemoteCommand => "RemoteCommandError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Parse => "ParseError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::Cancellation => "CancellationError",
            ErrorKind::FirmwareCritical => "FirmwareCriticalError",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// Catch-all for remote-operation failures (SSH/Redfish/MaaS calls
    /// that returned an error) — retried per the step's policy.
    #[error("{0}")]
    Failed(String),
    #[error("step timed out after {0}s")]
    Timeout(u64),
    /// Bad input (unknown device_type, malformed IP, ...). Surfaced to the
    /// caller without retry.
    #[error("{0}")]
    Validation(String),
    /// A critical-priority firmware entry failed; remaining entries were
    /// skipped. Never retried — the workflow fails immediately.
    #[error("{0}")]
    FirmwareCritical(String),
}

impl StepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StepError::Failed(_) => ErrorKind::RemoteCommand,
            StepError::Timeout(_) => ErrorKind::Timeout,
            StepError::Validation(_) => ErrorKind::Validation,
            StepError::FirmwareCritical(_) => ErrorKind::FirmwareCritical,
        }
    }
}

/// Executes one workflow step against the shared context. Implementations
/// live in the factory crate, one per `handler_ref`.
#[async_trait]
pub trait StepHandler: Send + Sync {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError>;
}
