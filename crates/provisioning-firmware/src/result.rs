use config::{FirmwareComponent, FirmwarePriority};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareStatus {
    Success,
    Failed,
    Skipped,
}

#[derive(Debug, Clone)]
pub struct FirmwareResult {
    pub component: FirmwareComponent,
    pub priority: FirmwarePriority,
    pub old_version: Option<String>,
    pub new_version: Option<String>,
    pub status: FirmwareStatus,
    pub duration_seconds: u64,
    pub warnings: Vec<String>,
}

impl FirmwareResult {
    /// True for a critical-priority entry that failed — the signal that
    /// must abort the rest of the plan and fail the calling workflow step.
    pub fn is_critical_failure(&self) -> bool {
        self.priority == FirmwarePriority::Critical && self.status == FirmwareStatus::Failed
    }
}
