//! Owns the running set of workflow instances: creates them from the
//! factory crate's templates, starts them as background tasks, and
//! answers status/cancel/list/subscribe queries against live state.
//!
//! Two things shape this file more than anything else in the binary:
//!
//! - [`workflow::ProgressBroadcaster`]'s sink list is fixed once built
//!   (`with_sink` consumes `self`), so a progress subscription can only be
//!   honored before a workflow starts. [`Controller::subscribe_progress`]
//!   enforces that and returns an error afterward rather than silently
//!   dropping the sink.
//! - [`workflow::execute_workflow`] takes `&mut WorkflowInstance` and runs
//!   every step to completion in one call — whichever task calls it owns
//!   the instance for the run's whole duration. [`SnapshotPersistence`]
//!   mirrors every transition into a separately-lockable snapshot so
//!   `get_workflow`/`list_active_workflows` can read current state from
//!   outside that task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use config::ConfigResolver;
use factory::UnknownTemplate;
use firmware::FirmwarePolicy;
use maas::{CredentialsProvider, FirmwareRepository, MaasClient};
use store::SqliteWorkflowPersistence;
use workflow::{
    CancellationFlag, Credentials, ProgressBroadcaster, ProgressSink, StepHandler, StepStatus,
    WorkflowContext, WorkflowInstance, WorkflowPersistence, WorkflowStatus, WorkflowStep,
};

use crate::handlers;
use crate::sessions::SessionFactory;

#[derive(Debug, Clone, Default)]
pub struct WorkflowParams {
    pub server_id: String,
    pub device_type: Option<String>,
    pub target_ipmi_ip: Option<String>,
    pub gateway: Option<String>,
    pub subnet_mask: Option<String>,
    pub policy: Option<String>,
    /// Requests a Redfish-only reset to factory defaults from
    /// `configure_bios`, bypassing the template pull/preserve/partition
    /// protocol entirely.
    pub reset_bios_to_defaults: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    UnknownTemplate(#[from] UnknownTemplate),
    #[error("unknown workflow: {0}")]
    UnknownWorkflow(String),
    #[error("workflow {0} has already started and no longer accepts new progress subscribers")]
    AlreadyStarted(String),
    #[error("no credentials available for {0}: {1}")]
    Credentials(String, maas::CredentialsError),
}

fn status_name(status: WorkflowStatus) -> &'static str {
    match status {
        WorkflowStatus::Pending => "pending",
        WorkflowStatus::Running => "running",
        WorkflowStatus::Completed => "completed",
        WorkflowStatus::Failed => "failed",
        WorkflowStatus::Cancelled => "cancelled",
    }
}

fn step_status_name(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Pending => "pending",
        StepStatus::Running => "running",
        StepStatus::Completed => "completed",
        StepStatus::Failed => "failed",
        StepStatus::Skipped => "skipped",
    }
}

fn credentials_to_map(credentials: maas::Credentials) -> Credentials {
    let mut map = HashMap::new();
    map.insert("username".to_string(), credentials.username);
    map.insert("password".to_string(), credentials.password);
    if let Some(ssh_key) = credentials.ssh_key {
        map.insert("ssh_key".to_string(), ssh_key);
    }
    map
}

#[derive(Debug, Clone, Serialize)]
pub struct StepSnapshot {
    pub name: String,
    pub description: String,
    pub status: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub id: String,
    pub status: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    pub current_step_index: Option<usize>,
    pub current_step_name: Option<String>,
    pub current_subtask: Option<String>,
    pub steps: Vec<StepSnapshot>,
}

impl StatusSnapshot {
    /// `current_step / total_steps * 100`, the progress computation the
    /// source used before switching to substep-weighted percentages. Kept
    /// for callers still reading it; `ProgressEvent::percentage` is the
    /// authoritative figure now.
    pub fn step_based_percentage(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        let completed = self.steps.iter().filter(|s| s.status == "completed").count();
        (completed as f64 / self.steps.len() as f64) * 100.0
    }
}

/// Mirrors every transition into `snapshot` in addition to the real
/// store-backed persistence, so a run in flight can be read from outside
/// the task driving it.
struct SnapshotPersistence {
    inner: SqliteWorkflowPersistence,
    snapshot: Arc<StdMutex<WorkflowInstance>>,
}

#[async_trait]
impl WorkflowPersistence for SnapshotPersistence {
    async fn on_transition(&self, instance: &WorkflowInstance) {
        *self.snapshot.lock().expect("lock poisoned") = instance.clone();
        self.inner.on_transition(instance).await;
    }
}

struct WorkflowHandle {
    steps: Vec<WorkflowStep>,
    params: WorkflowParams,
    snapshot: Arc<StdMutex<WorkflowInstance>>,
    broadcaster: StdMutex<Option<Arc<ProgressBroadcaster>>>,
    pending_sinks: StdMutex<Vec<Arc<dyn ProgressSink>>>,
    cancel: CancellationFlag,
    started: AtomicBool,
}

impl WorkflowHandle {
    fn snapshot(&self, workflow_id: &str) -> StatusSnapshot {
        let instance = self.snapshot.lock().expect("lock poisoned").clone();
        let current_subtask = self
            .broadcaster
            .lock()
            .expect("lock poisoned")
            .as_ref()
            .and_then(|b| b.history().into_iter().rev().find_map(|e| e.subtask_name));

        let steps = self
            .steps
            .iter()
            .zip(instance.steps.iter())
            .map(|(step, exec)| StepSnapshot {
                name: step.name.clone(),
                description: step.description.clone(),
                status: step_status_name(exec.status).to_string(),
                start_time: exec.start_time,
                end_time: exec.end_time,
                error: exec.error.clone(),
            })
            .collect();

        StatusSnapshot {
            id: workflow_id.to_string(),
            status: status_name(instance.status).to_string(),
            start_time: instance.start_time,
            end_time: instance.end_time,
            error: instance.error,
            current_step_index: instance.current_step_index,
            current_step_name: instance
                .current_step_index
                .and_then(|idx| self.steps.get(idx))
                .map(|s| s.name.clone()),
            current_subtask,
            steps,
        }
    }
}

/// Assembles the step handler registry once and runs workflow instances
/// against it. Cheaply cloneable — every field is an `Arc` or a `SqlitePool`
/// (itself a connection-pool handle), so a `Controller` can be shared
/// across the CLI/server tasks that drive it.
#[derive(Clone)]
pub struct Controller {
    pool: SqlitePool,
    handlers: Arc<HashMap<String, Arc<dyn StepHandler>>>,
    credentials: Arc<dyn CredentialsProvider>,
    history_capacity: usize,
    workflows: Arc<StdMutex<HashMap<String, Arc<WorkflowHandle>>>>,
}

impl Controller {
    pub fn new(
        pool: SqlitePool,
        maas: Arc<dyn MaasClient>,
        credentials: Arc<dyn CredentialsProvider>,
        firmware_repository: Arc<dyn FirmwareRepository>,
        resolver: Arc<ConfigResolver>,
        sessions: Arc<dyn SessionFactory>,
        policy: FirmwarePolicy,
        history_capacity: usize,
    ) -> Self {
        let _ = &firmware_repository; // plumbed through for completeness; see DESIGN.md
        let handlers = build_handlers(maas, resolver, sessions, policy, pool.clone());
        Self {
            pool,
            handlers: Arc::new(handlers),
            credentials,
            history_capacity,
            workflows: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    pub fn create_workflow(&self, template_name: &str, params: WorkflowParams) -> Result<String, ControllerError> {
        let steps = factory::by_name(template_name)?;
        let workflow_id = Uuid::new_v4().to_string();
        let step_names: Vec<String> = steps.iter().map(|s| s.name.clone()).collect();
        let instance = WorkflowInstance::new(workflow_id.clone(), &step_names);

        let handle = Arc::new(WorkflowHandle {
            steps,
            params,
            snapshot: Arc::new(StdMutex::new(instance)),
            broadcaster: StdMutex::new(None),
            pending_sinks: StdMutex::new(Vec::new()),
            cancel: CancellationFlag::new(),
            started: AtomicBool::new(false),
        });

        self.workflows.lock().expect("lock poisoned").insert(workflow_id.clone(), handle);
        Ok(workflow_id)
    }

    /// Registers `sink` to receive progress events for `workflow_id`. Must
    /// be called before [`Controller::start_workflow`] — the broadcaster's
    /// sink list is fixed at construction, so a subscription requested
    /// after the workflow has started is rejected rather than silently
    /// dropped.
    pub fn subscribe_progress(&self, workflow_id: &str, sink: Arc<dyn ProgressSink>) -> Result<(), ControllerError> {
        let handle = self.handle(workflow_id)?;
        if handle.started.load(Ordering::SeqCst) {
            return Err(ControllerError::AlreadyStarted(workflow_id.to_string()));
        }
        handle.pending_sinks.lock().expect("lock poisoned").push(sink);
        Ok(())
    }

    pub async fn start_workflow(&self, workflow_id: &str) -> Result<(), ControllerError> {
        let handle = self.handle(workflow_id)?;
        if handle.started.swap(true, Ordering::SeqCst) {
            return Err(ControllerError::AlreadyStarted(workflow_id.to_string()));
        }

        let server_id = handle.params.server_id.clone();
        let credentials = self
            .credentials
            .credentials_for(&server_id)
            .await
            .map_err(|e| ControllerError::Credentials(server_id.clone(), e))?;

        let sinks = std::mem::take(&mut *handle.pending_sinks.lock().expect("lock poisoned"));
        let broadcaster = sinks
            .into_iter()
            .fold(ProgressBroadcaster::new(self.history_capacity), |b, sink| b.with_sink(sink));
        let broadcaster = Arc::new(broadcaster);
        *handle.broadcaster.lock().expect("lock poisoned") = Some(broadcaster.clone());

        let mut ctx = WorkflowContext::new(workflow_id.to_string(), server_id.clone(), broadcaster);
        ctx.device_type = handle.params.device_type.clone();
        ctx.target_ipmi_ip = handle.params.target_ipmi_ip.clone();
        ctx.gateway = handle.params.gateway.clone();
        ctx.subnet_mask = handle.params.subnet_mask.clone();
        ctx.policy = handle.params.policy.clone();
        ctx.reset_bios_to_defaults = handle.params.reset_bios_to_defaults;
        ctx.credentials = credentials_to_map(credentials);

        let steps = handle.steps.clone();
        let handlers = self.handlers.clone();
        let cancel = handle.cancel.clone();
        let snapshot = handle.snapshot.clone();
        let pool = self.pool.clone();
        let device_type = handle.params.device_type.clone();
        let workflow_id_owned = workflow_id.to_string();

        tokio::spawn(async move {
            let mut instance = snapshot.lock().expect("lock poisoned").clone();
            let persistence = SnapshotPersistence {
                inner: SqliteWorkflowPersistence::new(pool, server_id, device_type),
                snapshot: snapshot.clone(),
            };
            workflow::execute_workflow(&mut instance, &steps, &handlers, &mut ctx, &cancel, &persistence).await;
            tracing::info!(workflow_id = %workflow_id_owned, status = ?instance.status, "workflow run finished");
        });

        Ok(())
    }

    pub fn get_workflow(&self, workflow_id: &str) -> Result<StatusSnapshot, ControllerError> {
        let handle = self.handle(workflow_id)?;
        Ok(handle.snapshot(workflow_id))
    }

    pub fn list_active_workflows(&self) -> Vec<StatusSnapshot> {
        self.workflows
            .lock()
            .expect("lock poisoned")
            .iter()
            .filter_map(|(id, handle)| {
                let snapshot = handle.snapshot(id);
                (!matches!(snapshot.status.as_str(), "completed" | "failed" | "cancelled")).then_some(snapshot)
            })
            .collect()
    }

    pub fn cancel_workflow(&self, workflow_id: &str) -> bool {
        let Ok(handle) = self.handle(workflow_id) else {
            return false;
        };
        let already_terminal = handle.snapshot.lock().expect("lock poisoned").status.is_terminal();
        if already_terminal {
            return false;
        }
        handle.cancel.cancel();
        true
    }

    fn handle(&self, workflow_id: &str) -> Result<Arc<WorkflowHandle>, ControllerError> {
        self.workflows
            .lock()
            .expect("lock poisoned")
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| ControllerError::UnknownWorkflow(workflow_id.to_string()))
    }
}

fn build_handlers(
    maas: Arc<dyn MaasClient>,
    resolver: Arc<ConfigResolver>,
    sessions: Arc<dyn SessionFactory>,
    policy: FirmwarePolicy,
    pool: SqlitePool,
) -> HashMap<String, Arc<dyn StepHandler>> {
    let mut handlers: HashMap<String, Arc<dyn StepHandler>> = HashMap::new();

    handlers.insert("validate_server".to_string(), Arc::new(handlers::ValidateServer { maas: maas.clone() }));
    handlers.insert("commission".to_string(), Arc::new(handlers::Commission { maas: maas.clone() }));
    handlers.insert("force_commission".to_string(), Arc::new(handlers::ForceCommission { maas: maas.clone() }));
    handlers.insert("wait_commissioning".to_string(), Arc::new(handlers::WaitCommissioning { maas: maas.clone() }));
    handlers.insert("discover_hardware".to_string(), Arc::new(handlers::DiscoverHardware { sessions: sessions.clone() }));
    handlers.insert("classify_device".to_string(), Arc::new(handlers::ClassifyDevice { resolver: resolver.clone() }));
    handlers.insert("resolve_profile".to_string(), Arc::new(handlers::ResolveProfile { resolver: resolver.clone() }));
    handlers.insert("configure_bios".to_string(), Arc::new(handlers::ConfigureBios { sessions: sessions.clone() }));
    handlers.insert("setup_ipmi".to_string(), Arc::new(handlers::SetupIpmi { sessions: sessions.clone() }));
    handlers.insert("verify".to_string(), Arc::new(handlers::Verify));
    handlers.insert("pre_flight".to_string(), Arc::new(handlers::PreFlight { sessions: sessions.clone() }));
    handlers.insert(
        "firmware_update_batch".to_string(),
        Arc::new(handlers::FirmwareUpdateBatch { sessions: sessions.clone(), policy }),
    );
    handlers.insert("reboot_and_wait".to_string(), Arc::new(handlers::RebootAndWait { sessions: sessions.clone() }));
    handlers.insert(
        "validate_ipmi_connectivity".to_string(),
        Arc::new(handlers::ValidateIpmiConnectivity { sessions: sessions.clone() }),
    );
    handlers.insert("backup_bios".to_string(), Arc::new(handlers::BackupBios { sessions: sessions.clone(), db: pool }));
    handlers.insert("verify_bios".to_string(), Arc::new(handlers::VerifyBios { sessions: sessions.clone() }));
    handlers.insert("reboot".to_string(), Arc::new(handlers::Reboot { sessions: sessions.clone() }));
    handlers.insert("validate_network_config".to_string(), Arc::new(handlers::ValidateNetworkConfig));
    handlers.insert(
        "configure_ipmi_network".to_string(),
        Arc::new(handlers::ConfigureIpmiNetwork { sessions: sessions.clone() }),
    );
    handlers.insert(
        "test_ipmi_connectivity".to_string(),
        Arc::new(handlers::TestIpmiConnectivity { sessions: sessions.clone() }),
    );
    handlers.insert("verify_ipmi_setup".to_string(), Arc::new(handlers::VerifyIpmiSetup { sessions: sessions.clone() }));

    handlers
}
