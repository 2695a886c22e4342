use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde_json::Value;

use config::{DeviceProfile, FirmwarePlanEntry};
use discovery::HardwareReport;

/// Free-form name/value credentials (IPMI password, SSH key path, MaaS
/// API token, ...) handed to step handlers. Handlers interpret the keys
/// they need and ignore the rest.
pub type Credentials = HashMap<String, String>;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEventType {
    OperationStarted,
    SubtaskStarted,
    SubtaskCompleted { success: bool },
    ProgressUpdate,
    OperationCompleted,
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub event_type: ProgressEventType,
    pub workflow_id: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub percentage: f64,
    pub subtask_name: Option<String>,
}

/// Consumes [`ProgressEvent`]s as they're emitted. Implementations MUST
/// return promptly — they're invoked synchronously on the step-execution
/// path, and a slow sink only degrades itself, not other sinks or the
/// workflow.
pub trait ProgressSink: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Fans a workflow's progress events out to every registered sink and
/// keeps a capped in-memory history (oldest events evicted first).
pub struct ProgressBroadcaster {
    sinks: Vec<Arc<dyn ProgressSink>>,
    history: Mutex<VecDeque<ProgressEvent>>,
    capacity: usize,
}

pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

impl ProgressBroadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            sinks: Vec::new(),
            history: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn emit(&self, event: ProgressEvent) {
        for sink in &self.sinks {
            sink.on_event(&event);
        }
        let mut history = self.history.lock().expect("lock poisoned");
        if history.len() >= self.capacity {
            history.pop_front();
        }
        history.push_back(event);
    }

    pub fn history(&self) -> Vec<ProgressEvent> {
        self.history.lock().expect("lock poisoned").iter().cloned().collect()
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

/// The shared mutable bag threaded through every step of a workflow
/// instance. Inputs are set up front; outputs are populated as steps run.
pub struct WorkflowContext {
    pub server_id: String,
    pub device_type: Option<String>,
    pub target_ipmi_ip: Option<String>,
    pub gateway: Option<String>,
    pub subnet_mask: Option<String>,
    pub credentials: Credentials,
    pub policy: Option<String>,

    pub hardware_report: Option<HardwareReport>,
    pub device_profile: Option<DeviceProfile>,
    pub bios_plan: Option<HashMap<String, Value>>,
    /// When set, `configure_bios` issues a Redfish-only reset-to-defaults
    /// instead of the normal pull/preserve/partition/apply template push.
    pub reset_bios_to_defaults: bool,
    pub firmware_plan: Option<Vec<FirmwarePlanEntry>>,
    pub applied_bios_settings: Option<bios::PushResult>,
    pub firmware_results: Option<Vec<firmware::FirmwareResult>>,

    pub metadata: HashMap<String, Value>,

    workflow_id: String,
    broadcaster: Arc<ProgressBroadcaster>,
    current_percentage: Mutex<f64>,
}

impl WorkflowContext {
    pub fn new(
        workflow_id: impl Into<String>,
        server_id: impl Into<String>,
        broadcaster: Arc<ProgressBroadcaster>,
    ) -> Self {
        Self {
            server_id: server_id.into(),
            device_type: None,
            target_ipmi_ip: None,
            gateway: None,
            subnet_mask: None,
            credentials: Credentials::new(),
            policy: None,
            hardware_report: None,
            device_profile: None,
            bios_plan: None,
            reset_bios_to_defaults: false,
            firmware_plan: None,
            applied_bios_settings: None,
            firmware_results: None,
            metadata: HashMap::new(),
            workflow_id: workflow_id.into(),
            broadcaster,
            current_percentage: Mutex::new(0.0),
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn broadcaster(&self) -> &Arc<ProgressBroadcaster> {
        &self.broadcaster
    }

    pub(crate) fn set_percentage(&self, percentage: f64) {
        *self.current_percentage.lock().expect("lock poisoned") = percentage;
    }

    /// Reports free-text progress from within a running step handler
    /// without changing that step's `status`. Carries forward whatever
    /// percentage the engine last computed for the enclosing step.
    pub fn report_subtask(&self, message: impl Into<String>) {
        let percentage = *self.current_percentage.lock().expect("lock poisoned");
        self.broadcaster.emit(ProgressEvent {
            event_type: ProgressEventType::SubtaskStarted,
            workflow_id: self.workflow_id.clone(),
            timestamp: Utc::now(),
            message: message.into(),
            percentage,
            subtask_name: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingSink {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_event(&self, event: &ProgressEvent) {
            self.events.lock().expect("lock poisoned").push(event.clone());
        }
    }

    #[test]
    fn history_is_capped_and_evicts_oldest() {
        let broadcaster = ProgressBroadcaster::new(2);
        for i in 0..3 {
            broadcaster.emit(ProgressEvent {
                event_type: ProgressEventType::ProgressUpdate,
                workflow_id: "wf-1".to_string(),
                timestamp: Utc::now(),
                message: format!("event {i}"),
                percentage: 0.0,
                subtask_name: None,
            });
        }
        let history = broadcaster.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message, "event 1");
        assert_eq!(history[1].message, "event 2");
    }

    #[test]
    fn report_subtask_reaches_registered_sinks() {
        let sink = Arc::new(RecordingSink {
            events: Mutex::new(Vec::new()),
        });
        let broadcaster = Arc::new(ProgressBroadcaster::new(10).with_sink(sink.clone()));
        let ctx = WorkflowContext::new("wf-1", "server-1", broadcaster);
        ctx.set_percentage(42.0);
        ctx.report_subtask("halfway there");

        let recorded = sink.events.lock().expect("lock poisoned");
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].message, "halfway there");
        assert_eq!(recorded[0].percentage, 42.0);
    }
}
