use std::sync::Mutex;

use async_trait::async_trait;

use crate::instance::WorkflowInstance;

/// Durably records workflow status/progress transitions. The engine calls
/// `on_transition` after every status change (`INSERT` on the first
/// `pending -> running`, `UPDATE` afterward, per the concrete
/// implementation); a failure here is logged by the implementation and
/// MUST NOT propagate back into step execution.
#[async_trait]
pub trait WorkflowPersistence: Send + Sync {
    async fn on_transition(&self, instance: &WorkflowInstance);
}

/// Discards every transition. Useful for tests and for running the engine
/// without a configured store.
pub struct NoopPersistence;

#[async_trait]
impl WorkflowPersistence for NoopPersistence {
    async fn on_transition(&self, _instance: &WorkflowInstance) {}
}

/// Records every transition's snapshot in memory, for tests that assert on
/// persistence call order without a real database.
#[derive(Default)]
pub struct InMemoryPersistence {
    snapshots: Mutex<Vec<WorkflowInstance>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshots(&self) -> Vec<WorkflowInstance> {
        self.snapshots.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl WorkflowPersistence for InMemoryPersistence {
    async fn on_transition(&self, instance: &WorkflowInstance) {
        self.snapshots.lock().expect("lock poisoned").push(instance.clone());
    }
}
