//! Concrete `StepHandler` implementations, one per name in the factory
//! crate's step registry. Wiring them to a `MaasClient`/`ConfigResolver`/
//! `SessionFactory`/store happens once, in [`crate::controller::Controller::new`].

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;

use bios::MockVendorBiosTool;
use config::ConfigResolver;
use firmware::{FirmwarePolicy, HostPing};
use maas::MaasClient;
use sessions::PowerAction;
use workflow::{StepError, StepHandler, WorkflowContext};

use crate::sessions::SessionFactory;

const REBOOT_POLL_INTERVAL: Duration = Duration::from_secs(10);
const REBOOT_MAX_WAIT: Duration = Duration::from_secs(15 * 60);

async fn wait_for_host(ping: &dyn HostPing) -> bool {
    let deadline = Instant::now() + REBOOT_MAX_WAIT;
    while Instant::now() < deadline {
        if ping.is_reachable().await {
            return true;
        }
        tokio::time::sleep(REBOOT_POLL_INTERVAL).await;
    }
    false
}

fn target_host(ctx: &WorkflowContext) -> Result<String, StepError> {
    ctx.target_ipmi_ip
        .clone()
        .or_else(|| ctx.hardware_report.as_ref().and_then(|r| r.ipmi.ip_address.clone()))
        .ok_or_else(|| StepError::Failed("no target host address available in context".to_string()))
}

fn bios_vendor_tool() -> MockVendorBiosTool {
    // No real vendor CLI wiring exists in this workspace; settings not
    // covered by Redfish are simply recorded as applied in-memory. See
    // DESIGN.md for the scope this leaves out.
    MockVendorBiosTool::new()
}

pub struct ValidateServer {
    pub maas: Arc<dyn MaasClient>,
}

#[async_trait]
impl StepHandler for ValidateServer {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let machine = self
            .maas
            .get_machine(&ctx.server_id)
            .await
            .map_err(|e| StepError::Failed(format!("server validation failed: {e}")))?;
        ctx.metadata.insert("hostname".to_string(), Value::String(machine.hostname));
        Ok(None)
    }
}

pub struct Commission {
    pub maas: Arc<dyn MaasClient>,
}

#[async_trait]
impl StepHandler for Commission {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        self.maas
            .commission(&ctx.server_id)
            .await
            .map_err(|e| StepError::Failed(format!("commission failed: {e}")))?;
        Ok(None)
    }
}

pub struct ForceCommission {
    pub maas: Arc<dyn MaasClient>,
}

#[async_trait]
impl StepHandler for ForceCommission {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        self.maas
            .force_commission(&ctx.server_id)
            .await
            .map_err(|e| StepError::Failed(format!("force commission failed: {e}")))?;
        Ok(None)
    }
}

const COMMISSIONING_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct WaitCommissioning {
    pub maas: Arc<dyn MaasClient>,
}

#[async_trait]
impl StepHandler for WaitCommissioning {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        loop {
            let machine = self
                .maas
                .get_machine(&ctx.server_id)
                .await
                .map_err(|e| StepError::Failed(format!("commissioning poll failed: {e}")))?;
            if machine.status_name.eq_ignore_ascii_case("ready") {
                return Ok(None);
            }
            ctx.report_subtask(format!("commissioning status: {}", machine.status_name));
            tokio::time::sleep(COMMISSIONING_POLL_INTERVAL).await;
        }
    }
}

pub struct DiscoverHardware {
    pub sessions: Arc<dyn SessionFactory>,
}

#[async_trait]
impl StepHandler for DiscoverHardware {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let host = target_host(ctx)?;
        let exec = self
            .sessions
            .exec_session(&host, &ctx.credentials)
            .await
            .map_err(|e| StepError::Failed(format!("failed to open session to {host}: {e}")))?;
        let report = discovery::discover_hardware(exec.as_ref(), &ctx.server_id).await;
        if !report.discovery_errors.is_empty() {
            ctx.report_subtask(format!("{} discovery warnings", report.discovery_errors.len()));
        }
        ctx.hardware_report = Some(report);
        Ok(None)
    }
}

pub struct ClassifyDevice {
    pub resolver: Arc<ConfigResolver>,
}

#[async_trait]
impl StepHandler for ClassifyDevice {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let report = ctx
            .hardware_report
            .as_mut()
            .ok_or_else(|| StepError::Failed("classify_device ran before discover_hardware".to_string()))?;
        let classification = self.resolver.classify(report);
        if let Some(device_type) = &classification.device_type {
            ctx.device_type = Some(device_type.clone());
        }
        ctx.metadata
            .insert("classification_confidence".to_string(), Value::from(classification.confidence));
        ctx.hardware_report.as_mut().unwrap().classification = classification;
        Ok(None)
    }
}

pub struct ResolveProfile {
    pub resolver: Arc<ConfigResolver>,
}

#[async_trait]
impl StepHandler for ResolveProfile {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let device_type = ctx
            .device_type
            .clone()
            .ok_or_else(|| StepError::Failed("resolve_profile ran before classify_device".to_string()))?;
        let profile = self.resolver.resolve(&device_type);
        ctx.firmware_plan = Some(profile.firmware_plan.clone());
        ctx.device_profile = Some(profile);
        Ok(None)
    }
}

pub struct ConfigureBios {
    pub sessions: Arc<dyn SessionFactory>,
}

#[async_trait]
impl StepHandler for ConfigureBios {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let host = target_host(ctx)?;
        let exec = self
            .sessions
            .exec_session(&host, &ctx.credentials)
            .await
            .map_err(|e| StepError::Failed(e.to_string()))?;
        let redfish = self
            .sessions
            .redfish_session(&host, &ctx.credentials)
            .await
            .map_err(|e| StepError::Failed(e.to_string()))?;
        let result = if ctx.reset_bios_to_defaults {
            bios::reset_to_defaults(redfish.as_ref())
                .await
                .map_err(|e| StepError::Failed(format!("bios reset to defaults failed: {e}")))?
        } else {
            let profile = ctx
                .device_profile
                .clone()
                .ok_or_else(|| StepError::Failed("configure_bios ran before resolve_profile".to_string()))?;
            let vendor_tool = bios_vendor_tool();
            bios::push(redfish.as_ref(), exec.as_ref(), &vendor_tool, &profile, true)
                .await
                .map_err(|e| StepError::Failed(format!("bios push failed: {e}")))?
        };
        for warning in &result.warnings {
            ctx.report_subtask(warning.clone());
        }
        ctx.applied_bios_settings = Some(result);
        Ok(None)
    }
}

pub struct SetupIpmi {
    pub sessions: Arc<dyn SessionFactory>,
}

#[async_trait]
impl StepHandler for SetupIpmi {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let Some(ip) = ctx.target_ipmi_ip.clone() else {
            ctx.report_subtask("no target IPMI address requested, skipping LAN configuration");
            return Ok(None);
        };
        let host = target_host(ctx)?;
        let exec = self
            .sessions
            .exec_session(&host, &ctx.credentials)
            .await
            .map_err(|e| StepError::Failed(e.to_string()))?;
        exec.exec_checked(&format!("ipmitool lan set 1 ipaddr {ip}"), true)
            .await
            .map_err(|e| StepError::Failed(format!("ipmitool lan set ipaddr failed: {e}")))?;
        if let Some(gateway) = &ctx.gateway {
            exec.exec_checked(&format!("ipmitool lan set 1 defgw ipaddr {gateway}"), true)
                .await
                .map_err(|e| StepError::Failed(format!("ipmitool lan set defgw failed: {e}")))?;
        }
        if let Some(netmask) = &ctx.subnet_mask {
            exec.exec_checked(&format!("ipmitool lan set 1 netmask {netmask}"), true)
                .await
                .map_err(|e| StepError::Failed(format!("ipmitool lan set netmask failed: {e}")))?;
        }
        Ok(None)
    }
}

pub struct Verify;

#[async_trait]
impl StepHandler for Verify {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let mut warnings = Vec::new();
        if ctx.device_profile.as_ref().map(|p| p.device_type.is_empty()).unwrap_or(true) {
            warnings.push("no device profile resolved; provisioning completed with defaults".to_string());
        }
        if let Some(result) = &ctx.applied_bios_settings {
            if !result.warnings.is_empty() {
                warnings.push(format!("{} BIOS warnings recorded during configuration", result.warnings.len()));
            }
        }
        for warning in &warnings {
            ctx.report_subtask(warning.clone());
        }
        Ok(Some(serde_json::json!({ "warnings": warnings })))
    }
}

pub struct PreFlight {
    pub sessions: Arc<dyn SessionFactory>,
}

#[async_trait]
impl StepHandler for PreFlight {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let host = target_host(ctx)?;
        if !self.sessions.host_ping(&host).is_reachable().await {
            return Err(StepError::Failed(format!("{host} is not reachable before firmware update")));
        }
        Ok(None)
    }
}

pub struct FirmwareUpdateBatch {
    pub sessions: Arc<dyn SessionFactory>,
    pub policy: FirmwarePolicy,
}

#[async_trait]
impl StepHandler for FirmwareUpdateBatch {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let host = target_host(ctx)?;
        let redfish = self
            .sessions
            .redfish_session(&host, &ctx.credentials)
            .await
            .map_err(|e| StepError::Failed(e.to_string()))?;
        let ping = self.sessions.host_ping(&host);
        let plan = ctx.firmware_plan.clone().unwrap_or_default();
        let results = firmware::apply_firmware_plan(redfish.as_ref(), ping.as_ref(), &plan, self.policy)
            .await
            .map_err(|e| StepError::Failed(format!("firmware update failed: {e}")))?;
        for result in &results {
            if !result.warnings.is_empty() {
                ctx.report_subtask(format!("{:?}: {}", result.component, result.warnings.join("; ")));
            }
        }
        let critical_failure = results.iter().find(|r| r.is_critical_failure()).map(|r| r.component);
        ctx.firmware_results = Some(results);
        if let Some(component) = critical_failure {
            return Err(StepError::FirmwareCritical(format!(
                "critical firmware update failed for {component:?}, remaining entries skipped"
            )));
        }
        Ok(None)
    }
}

pub struct RebootAndWait {
    pub sessions: Arc<dyn SessionFactory>,
}

#[async_trait]
impl StepHandler for RebootAndWait {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let host = target_host(ctx)?;
        let redfish = self
            .sessions
            .redfish_session(&host, &ctx.credentials)
            .await
            .map_err(|e| StepError::Failed(e.to_string()))?;
        redfish
            .power_action(PowerAction::ForceRestart)
            .await
            .map_err(|e| StepError::Failed(format!("reboot request failed: {e}")))?;
        let ping = self.sessions.host_ping(&host);
        if !wait_for_host(ping.as_ref()).await {
            return Err(StepError::Failed(format!("{host} did not return within the reboot wait window")));
        }
        Ok(None)
    }
}

pub struct ValidateIpmiConnectivity {
    pub sessions: Arc<dyn SessionFactory>,
}

#[async_trait]
impl StepHandler for ValidateIpmiConnectivity {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let host = target_host(ctx)?;
        if self
            .sessions
            .redfish_session(&host, &ctx.credentials)
            .await
            .is_err()
            && !self.sessions.host_ping(&host).is_reachable().await
        {
            return Err(StepError::Failed(format!("{host}'s BMC is not reachable")));
        }
        Ok(None)
    }
}

pub struct BackupBios {
    pub sessions: Arc<dyn SessionFactory>,
    pub db: SqlitePool,
}

#[async_trait]
impl StepHandler for BackupBios {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let host = target_host(ctx)?;
        let exec = self
            .sessions
            .exec_session(&host, &ctx.credentials)
            .await
            .map_err(|e| StepError::Failed(e.to_string()))?;
        let redfish = self
            .sessions
            .redfish_session(&host, &ctx.credentials)
            .await
            .map_err(|e| StepError::Failed(e.to_string()))?;
        let profile = ctx.device_profile.clone().unwrap_or_default();
        let vendor_tool = bios_vendor_tool();
        let current = bios::pull(redfish.as_ref(), exec.as_ref(), &vendor_tool, &profile)
            .await
            .map_err(|e| StepError::Failed(format!("bios backup pull failed: {e}")))?;
        let settings_json = serde_json::to_string(&current).map_err(|e| StepError::Failed(e.to_string()))?;
        store::record_bios_backup(&self.db, &ctx.server_id, ctx.workflow_id(), &settings_json)
            .await
            .map_err(|e| StepError::Failed(format!("persisting bios backup failed: {e}")))?;
        Ok(None)
    }
}

pub struct VerifyBios {
    pub sessions: Arc<dyn SessionFactory>,
}

#[async_trait]
impl StepHandler for VerifyBios {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let host = target_host(ctx)?;
        let exec = self
            .sessions
            .exec_session(&host, &ctx.credentials)
            .await
            .map_err(|e| StepError::Failed(e.to_string()))?;
        let redfish = self
            .sessions
            .redfish_session(&host, &ctx.credentials)
            .await
            .map_err(|e| StepError::Failed(e.to_string()))?;
        let profile = ctx
            .device_profile
            .clone()
            .ok_or_else(|| StepError::Failed("verify_bios ran before configure_bios".to_string()))?;
        let vendor_tool = bios_vendor_tool();
        let current = bios::pull(redfish.as_ref(), exec.as_ref(), &vendor_tool, &profile)
            .await
            .map_err(|e| StepError::Failed(format!("bios verify pull failed: {e}")))?;
        let desired = ctx.applied_bios_settings.clone().map(|r| r.applied).unwrap_or_default();
        let diff = bios::validate(&current, &desired);
        if !diff.is_empty() {
            ctx.report_subtask(format!("{} BIOS settings did not verify", diff.len()));
        }
        Ok(Some(serde_json::json!({ "mismatches": diff.len() })))
    }
}

pub struct Reboot {
    pub sessions: Arc<dyn SessionFactory>,
}

#[async_trait]
impl StepHandler for Reboot {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let host = target_host(ctx)?;
        let redfish = self
            .sessions
            .redfish_session(&host, &ctx.credentials)
            .await
            .map_err(|e| StepError::Failed(e.to_string()))?;
        redfish
            .power_action(PowerAction::ForceRestart)
            .await
            .map_err(|e| StepError::Failed(format!("reboot request failed: {e}")))?;
        let ping = self.sessions.host_ping(&host);
        if !wait_for_host(ping.as_ref()).await {
            return Err(StepError::Failed(format!("{host} did not return within the reboot wait window")));
        }
        Ok(None)
    }
}

pub struct ValidateNetworkConfig;

#[async_trait]
impl StepHandler for ValidateNetworkConfig {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let Some(ip) = &ctx.target_ipmi_ip else {
            return Err(StepError::Validation("target_ipmi_ip is required".to_string()));
        };
        ip.parse::<Ipv4Addr>()
            .map_err(|_| StepError::Validation(format!("invalid target_ipmi_ip: {ip}")))?;
        if let Some(gateway) = &ctx.gateway {
            gateway
                .parse::<Ipv4Addr>()
                .map_err(|_| StepError::Validation(format!("invalid gateway: {gateway}")))?;
        }
        if let Some(netmask) = &ctx.subnet_mask {
            netmask
                .parse::<Ipv4Addr>()
                .map_err(|_| StepError::Validation(format!("invalid subnet_mask: {netmask}")))?;
        }
        Ok(None)
    }
}

pub struct ConfigureIpmiNetwork {
    pub sessions: Arc<dyn SessionFactory>,
}

#[async_trait]
impl StepHandler for ConfigureIpmiNetwork {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        SetupIpmi {
            sessions: self.sessions.clone(),
        }
        .execute(ctx)
        .await
    }
}

pub struct TestIpmiConnectivity {
    pub sessions: Arc<dyn SessionFactory>,
}

#[async_trait]
impl StepHandler for TestIpmiConnectivity {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let host = target_host(ctx)?;
        if !self.sessions.host_ping(&host).is_reachable().await {
            return Err(StepError::Failed(format!("{host} is not reachable on the new IPMI address")));
        }
        Ok(None)
    }
}

pub struct VerifyIpmiSetup {
    pub sessions: Arc<dyn SessionFactory>,
}

#[async_trait]
impl StepHandler for VerifyIpmiSetup {
    async fn execute(&self, ctx: &mut WorkflowContext) -> Result<Option<Value>, StepError> {
        let host = target_host(ctx)?;
        let exec = self
            .sessions
            .exec_session(&host, &ctx.credentials)
            .await
            .map_err(|e| StepError::Failed(e.to_string()))?;
        let output = exec
            .exec_checked("ipmitool lan print 1", true)
            .await
            .map_err(|e| StepError::Failed(format!("ipmitool lan print failed: {e}")))?;
        let lan = parsers::ipmi::parse_lan_config(&output);
        match (&lan.ip_address, &ctx.target_ipmi_ip) {
            (Some(actual), Some(expected)) if actual != expected => Err(StepError::Failed(format!(
                "IPMI address mismatch after setup: expected {expected}, got {actual}"
            ))),
            _ => Ok(None),
        }
    }
}
