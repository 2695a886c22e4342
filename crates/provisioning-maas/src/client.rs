//! Typed surface over an external MaaS controller.
//!
//! This crate does not talk to a real MaaS API — that integration lives
//! outside this workspace — only the trait shape the workflow engine
//! programs against, plus a [`MockMaasClient`] for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum MaasError {
    #[error("machine not found: {0}")]
    NotFound(String),
    #[error("maas transport error: {0}")]
    Transport(String),
    #[error("maas rejected request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PowerState {
    On,
    Off,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct Machine {
    pub system_id: String,
    pub hostname: String,
    pub status_name: String,
    pub power_state: PowerState,
    pub architecture: String,
    pub cpu_count: u32,
    pub memory: u64,
}

/// Both "force_commission" and "commission" are exposed as distinct
/// operations; the source this spec was distilled from used both with
/// unclear semantic differences, and that distinction is preserved here
/// rather than collapsed.
#[async_trait]
pub trait MaasClient: Send + Sync {
    async fn list_machines(&self) -> Result<Vec<Machine>, MaasError>;
    async fn get_machine(&self, system_id: &str) -> Result<Machine, MaasError>;
    async fn commission(&self, system_id: &str) -> Result<(), MaasError>;
    async fn force_commission(&self, system_id: &str) -> Result<(), MaasError>;
    async fn deploy(&self, system_id: &str, os: &str) -> Result<(), MaasError>;
    async fn release(&self, system_id: &str) -> Result<(), MaasError>;
    async fn abort(&self, system_id: &str) -> Result<(), MaasError>;
}

/// In-memory `MaasClient` for tests, keyed on `system_id`. `status_name`
/// is updated to reflect the last action taken so assertions can observe
/// call effects without a mock framework.
pub struct MockMaasClient {
    machines: Mutex<HashMap<String, Machine>>,
}

impl MockMaasClient {
    pub fn new(machines: Vec<Machine>) -> Self {
        Self {
            machines: Mutex::new(machines.into_iter().map(|m| (m.system_id.clone(), m)).collect()),
        }
    }

    fn set_status(&self, system_id: &str, status: &str) -> Result<(), MaasError> {
        let mut machines = self.machines.lock().unwrap();
        let machine = machines.get_mut(system_id).ok_or_else(|| MaasError::NotFound(system_id.to_string()))?;
        machine.status_name = status.to_string();
        Ok(())
    }
}

#[async_trait]
impl MaasClient for MockMaasClient {
    async fn list_machines(&self) -> Result<Vec<Machine>, MaasError> {
        Ok(self.machines.lock().unwrap().values().cloned().collect())
    }

    async fn get_machine(&self, system_id: &str) -> Result<Machine, MaasError> {
        self.machines
            .lock()
            .unwrap()
            .get(system_id)
            .cloned()
            .ok_or_else(|| MaasError::NotFound(system_id.to_string()))
    }

    async fn commission(&self, system_id: &str) -> Result<(), MaasError> {
        self.set_status(system_id, "commissioning")
    }

    async fn force_commission(&self, system_id: &str) -> Result<(), MaasError> {
        self.set_status(system_id, "commissioning")
    }

    async fn deploy(&self, system_id: &str, _os: &str) -> Result<(), MaasError> {
        self.set_status(system_id, "deploying")
    }

    async fn release(&self, system_id: &str) -> Result<(), MaasError> {
        self.set_status(system_id, "releasing")
    }

    async fn abort(&self, system_id: &str) -> Result<(), MaasError> {
        self.set_status(system_id, "ready")
    }
}
