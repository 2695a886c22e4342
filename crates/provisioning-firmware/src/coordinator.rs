use std::time::{Duration, Instant};

use config::{FirmwareComponent, FirmwarePlanEntry, FirmwarePriority};
use sessions::{RedfishError, RedfishSession, TaskState};

use crate::ping::HostPing;
use crate::policy::FirmwarePolicy;
use crate::result::{FirmwareResult, FirmwareStatus};

#[derive(Debug, thiserror::Error)]
pub enum FirmwareError {
    #[error(transparent)]
    Redfish(#[from] RedfishError),
}

const TASK_POLL_INTERVAL: Duration = Duration::from_secs(2);
const REBOOT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const REBOOT_MAX_WAIT: Duration = Duration::from_secs(15 * 60);

fn component_key(component: FirmwareComponent) -> &'static str {
    match component {
        FirmwareComponent::Bmc => "BMC",
        FirmwareComponent::Bios => "BIOS",
        FirmwareComponent::Cpld => "CPLD",
        FirmwareComponent::Nic => "NIC",
        FirmwareComponent::Uefi => "UEFI",
    }
}

async fn poll_until_terminal(
    redfish: &dyn RedfishSession,
    task_id: &str,
    timeout: Duration,
) -> Result<bool, FirmwareError> {
    let deadline = Instant::now() + timeout;
    loop {
        let task = redfish.get_task(task_id).await?;
        match task.state {
            TaskState::Completed => return Ok(true),
            TaskState::Exception | TaskState::Cancelled => return Ok(false),
            TaskState::New | TaskState::Running => {
                if Instant::now() >= deadline {
                    return Ok(false);
                }
                tokio::time::sleep(TASK_POLL_INTERVAL).await;
            }
        }
    }
}

async fn wait_for_host(ping: &dyn HostPing) -> bool {
    let deadline = Instant::now() + REBOOT_MAX_WAIT;
    loop {
        if ping.is_reachable().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(REBOOT_POLL_INTERVAL).await;
    }
}

fn skipped(entry: &FirmwarePlanEntry, old_version: Option<String>) -> FirmwareResult {
    FirmwareResult {
        component: entry.component,
        priority: entry.priority,
        old_version: old_version.clone(),
        new_version: old_version,
        status: FirmwareStatus::Skipped,
        duration_seconds: 0,
        warnings: Vec::new(),
    }
}

/// Applies `plan` in `(priority_rank, component_rank)` order, filtering by
/// `policy` and gating on reboots where a plan entry requires one.
pub async fn apply_firmware_plan(
    redfish: &dyn RedfishSession,
    ping: &dyn HostPing,
    plan: &[FirmwarePlanEntry],
    policy: FirmwarePolicy,
) -> Result<Vec<FirmwareResult>, FirmwareError> {
    let mut sorted: Vec<&FirmwarePlanEntry> = plan.iter().collect();
    sorted.sort_by_key(|e| (e.priority.rank(), e.component.rank()));

    let mut results = Vec::with_capacity(sorted.len());
    let mut aborted = false;

    for entry in sorted {
        if aborted {
            results.push(skipped(entry, None));
            continue;
        }

        let inventory = redfish.get_firmware_inventory().await?;
        let old_version = inventory.get(component_key(entry.component)).cloned();

        if old_version.as_deref() == Some(entry.required_version.as_str()) {
            results.push(skipped(entry, old_version));
            continue;
        }

        if !policy.allows(entry.priority) {
            results.push(skipped(entry, old_version));
            continue;
        }

        let start = Instant::now();
        let mut warnings = Vec::new();
        let image_uri = format!(
            "firmware://{}/{}",
            component_key(entry.component),
            entry.required_version
        );

        let task_id = redfish
            .initiate_firmware_update(component_key(entry.component), &image_uri)
            .await?;
        let timeout = Duration::from_secs(entry.estimated_seconds.saturating_mul(3));
        let mut succeeded = poll_until_terminal(redfish, &task_id, timeout).await?;

        if succeeded && entry.requires_reboot {
            redfish
                .power_action(sessions::PowerAction::ForceRestart)
                .await?;
            if !wait_for_host(ping).await {
                warnings.push("host did not return after reboot within the wait window".to_string());
                succeeded = false;
            }
        }

        let inventory_after = redfish.get_firmware_inventory().await?;
        let new_version = inventory_after.get(component_key(entry.component)).cloned();

        let status = if succeeded {
            FirmwareStatus::Success
        } else {
            FirmwareStatus::Failed
        };

        if status == FirmwareStatus::Failed && entry.priority == FirmwarePriority::Critical {
            aborted = true;
        }

        results.push(FirmwareResult {
            component: entry.component,
            priority: entry.priority,
            old_version,
            new_version,
            status,
            duration_seconds: start.elapsed().as_secs(),
            warnings,
        });
    }

    Ok(results)
}
