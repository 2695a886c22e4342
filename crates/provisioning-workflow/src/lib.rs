//! The workflow execution engine: step ordering, timeout/retry handling,
//! cancellation, and progress fan-out. Concrete step handlers and the
//! standard workflow templates live in the factory crate; this crate only
//! knows how to run a sequence of steps against a shared context.

mod context;
mod engine;
mod instance;
mod persistence;
mod step;

pub use context::{
    Credentials, ProgressBroadcaster, ProgressEvent, ProgressEventType, ProgressSink,
    WorkflowContext, DEFAULT_HISTORY_CAPACITY,
};
pub use engine::{execute_workflow, CancellationFlag, EngineConfig};
pub use instance::{StepExecution, StepStatus, WorkflowInstance, WorkflowStatus};
pub use persistence::{InMemoryPersistence, NoopPersistence, WorkflowPersistence};
pub use step::{ErrorKind, StepError, StepHandler, WorkflowStep};
