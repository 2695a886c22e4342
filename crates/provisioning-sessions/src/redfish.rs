//! A minimal typed Redfish session contract.
//!
//! This crate does not implement the Redfish wire protocol — that's out of
//! scope here — only the trait shape that BIOS and firmware components
//! program against, plus a [`MockRedfishSession`] for tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum RedfishError {
    #[error("redfish transport error: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    #[error("resource not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerAction {
    On,
    ForceOff,
    GracefulShutdown,
    ForceRestart,
    GracefulRestart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    New,
    Running,
    Completed,
    Exception,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct RedfishTask {
    pub id: String,
    pub state: TaskState,
    pub percent_complete: u8,
    pub messages: Vec<String>,
}

/// Typed surface over a BMC's Redfish service, scoped to the operations the
/// BIOS and firmware components need.
#[async_trait]
pub trait RedfishSession: Send + Sync {
    async fn get_bios_attributes(&self) -> Result<HashMap<String, Value>, RedfishError>;

    /// Whether this BMC's Redfish service advertises support for `name`.
    /// Callers route unsupported settings to a vendor tool instead.
    async fn supports_bios_attribute(&self, name: &str) -> bool;

    /// Applies `attributes` in one PATCH. Returns a task id when the BMC
    /// applies the change asynchronously; `None` means it completed inline.
    async fn patch_bios_attributes(
        &self,
        attributes: &HashMap<String, Value>,
    ) -> Result<Option<String>, RedfishError>;

    async fn reset_bios_to_defaults(&self) -> Result<(), RedfishError>;

    async fn power_action(&self, action: PowerAction) -> Result<(), RedfishError>;

    async fn get_firmware_inventory(&self) -> Result<HashMap<String, String>, RedfishError>;

    /// Starts a firmware update, returning the task id used to poll progress.
    async fn initiate_firmware_update(
        &self,
        component: &str,
        image_uri: &str,
    ) -> Result<String, RedfishError>;

    async fn get_task(&self, task_id: &str) -> Result<RedfishTask, RedfishError>;
}

/// In-memory [`RedfishSession`] for tests: BIOS attributes and firmware
/// inventory are plain maps, tasks progress deterministically to
/// `Completed` the first time they're polled unless pre-seeded otherwise.
pub struct MockRedfishSession {
    bios_attributes: Mutex<HashMap<String, Value>>,
    firmware_inventory: Mutex<HashMap<String, String>>,
    tasks: Mutex<HashMap<String, RedfishTask>>,
    power_actions: Mutex<Vec<PowerAction>>,
    next_task_id: Mutex<u64>,
    unsupported_attributes: Mutex<HashSet<String>>,
}

impl MockRedfishSession {
    pub fn new() -> Self {
        Self {
            bios_attributes: Mutex::new(HashMap::new()),
            firmware_inventory: Mutex::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
            power_actions: Mutex::new(Vec::new()),
            next_task_id: Mutex::new(1),
            unsupported_attributes: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_bios_attribute(self, key: impl Into<String>, value: Value) -> Self {
        self.bios_attributes
            .lock()
            .expect("lock poisoned")
            .insert(key.into(), value);
        self
    }

    /// Marks `name` as unsupported by this mock's Redfish service, so
    /// `supports_bios_attribute` returns `false` for it.
    pub fn with_unsupported_attribute(self, name: impl Into<String>) -> Self {
        self.unsupported_attributes
            .lock()
            .expect("lock poisoned")
            .insert(name.into());
        self
    }

    pub fn with_firmware_version(self, component: impl Into<String>, version: impl Into<String>) -> Self {
        self.firmware_inventory
            .lock()
            .expect("lock poisoned")
            .insert(component.into(), version.into());
        self
    }

    pub fn power_actions_taken(&self) -> Vec<PowerAction> {
        self.power_actions.lock().expect("lock poisoned").clone()
    }
}

impl Default for MockRedfishSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RedfishSession for MockRedfishSession {
    async fn get_bios_attributes(&self) -> Result<HashMap<String, Value>, RedfishError> {
        Ok(self.bios_attributes.lock().expect("lock poisoned").clone())
    }

    async fn supports_bios_attribute(&self, name: &str) -> bool {
        !self
            .unsupported_attributes
            .lock()
            .expect("lock poisoned")
            .contains(name)
    }

    async fn patch_bios_attributes(
        &self,
        attributes: &HashMap<String, Value>,
    ) -> Result<Option<String>, RedfishError> {
        let mut current = self.bios_attributes.lock().expect("lock poisoned");
        for (key, value) in attributes {
            current.insert(key.clone(), value.clone());
        }
        Ok(None)
    }

    async fn reset_bios_to_defaults(&self) -> Result<(), RedfishError> {
        self.bios_attributes.lock().expect("lock poisoned").clear();
        Ok(())
    }

    async fn power_action(&self, action: PowerAction) -> Result<(), RedfishError> {
        self.power_actions.lock().expect("lock poisoned").push(action);
        Ok(())
    }

    async fn get_firmware_inventory(&self) -> Result<HashMap<String, String>, RedfishError> {
        Ok(self.firmware_inventory.lock().expect("lock poisoned").clone())
    }

    async fn initiate_firmware_update(
        &self,
        component: &str,
        _image_uri: &str,
    ) -> Result<String, RedfishError> {
        let mut next_id = self.next_task_id.lock().expect("lock poisoned");
        let task_id = format!("task-{}", *next_id);
        *next_id += 1;
        self.tasks.lock().expect("lock poisoned").insert(
            task_id.clone(),
            RedfishTask {
                id: task_id.clone(),
                state: TaskState::New,
                percent_complete: 0,
                messages: vec![format!("update queued for {component}")],
            },
        );
        Ok(task_id)
    }

    async fn get_task(&self, task_id: &str) -> Result<RedfishTask, RedfishError> {
        let mut tasks = self.tasks.lock().expect("lock poisoned");
        let task = tasks
            .get_mut(task_id)
            .ok_or_else(|| RedfishError::NotFound(task_id.to_string()))?;
        task.state = TaskState::Completed;
        task.percent_complete = 100;
        Ok(task.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn patch_merges_into_existing_attributes() {
        let session = MockRedfishSession::new().with_bios_attribute("BootMode", json!("Uefi"));
        let mut patch = HashMap::new();
        patch.insert("PowerProfile".to_string(), json!("Performance"));
        session.patch_bios_attributes(&patch).await.unwrap();

        let attrs = session.get_bios_attributes().await.unwrap();
        assert_eq!(attrs.get("BootMode"), Some(&json!("Uefi")));
        assert_eq!(attrs.get("PowerProfile"), Some(&json!("Performance")));
    }

    #[tokio::test]
    async fn reset_clears_attributes() {
        let session = MockRedfishSession::new().with_bios_attribute("BootMode", json!("Uefi"));
        session.reset_bios_to_defaults().await.unwrap();
        assert!(session.get_bios_attributes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn firmware_update_task_completes_on_poll() {
        let session = MockRedfishSession::new();
        let task_id = session
            .initiate_firmware_update("BMC", "file:///fw.bin")
            .await
            .unwrap();
        let task = session.get_task(&task_id).await.unwrap();
        assert_eq!(task.state, TaskState::Completed);
        assert_eq!(task.percent_complete, 100);
    }

    #[tokio::test]
    async fn unknown_task_id_errors() {
        let session = MockRedfishSession::new();
        assert!(session.get_task("nonexistent").await.is_err());
    }

    #[tokio::test]
    async fn power_actions_are_recorded() {
        let session = MockRedfishSession::new();
        session.power_action(PowerAction::GracefulRestart).await.unwrap();
        assert_eq!(session.power_actions_taken(), vec![PowerAction::GracefulRestart]);
    }
}
