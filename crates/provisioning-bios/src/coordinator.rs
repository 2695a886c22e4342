use std::collections::HashMap;
use std::time::Duration;

use config::{BiosMethod, DeviceProfile};
use serde_json::Value;
use sessions::{ExecSession, RedfishError, RedfishSession, TaskState};

use crate::value::{stringify, yaml_to_json};
use crate::vendor_tool::{VendorBiosTool, VendorToolError};

#[derive(Debug, thiserror::Error)]
pub enum BiosError {
    #[error(transparent)]
    Redfish(#[from] RedfishError),
    #[error(transparent)]
    VendorTool(#[from] VendorToolError),
    #[error("preserved setting {0} did not stick")]
    PreserveFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiffEntry {
    pub expected: Value,
    pub actual: Option<Value>,
}

pub type Diff = HashMap<String, DiffEntry>;

#[derive(Debug, Clone, Default)]
pub struct PushResult {
    pub applied: HashMap<String, Value>,
    pub warnings: Vec<String>,
}

const MAX_TASK_POLLS: u32 = 30;
const TASK_POLL_INTERVAL: Duration = Duration::from_secs(2);
const MAX_VENDOR_TOOL_ATTEMPTS: u32 = 3;

/// Reads current BIOS settings: the Redfish attribute map, overlaid by
/// anything explicitly hinted to come from the vendor tool instead.
pub async fn pull(
    redfish: &dyn RedfishSession,
    exec: &dyn ExecSession,
    vendor_tool: &dyn VendorBiosTool,
    profile: &DeviceProfile,
) -> Result<HashMap<String, Value>, BiosError> {
    let mut current: HashMap<String, Value> = redfish
        .get_bios_attributes()
        .await?
        .into_iter()
        .collect();

    for (name, method) in &profile.bios_method_hints {
        if matches!(method, BiosMethod::VendorTool) {
            if let Some(value) = vendor_tool.get_setting(exec, name).await? {
                current.insert(name.clone(), Value::String(value));
            }
        }
    }

    Ok(current)
}

/// Compares `desired` against `current`, returning one entry per setting
/// that doesn't already match.
pub fn validate(current: &HashMap<String, Value>, desired: &HashMap<String, Value>) -> Diff {
    let mut diff = Diff::new();
    for (name, expected) in desired {
        let actual = current.get(name).cloned();
        if actual.as_ref() != Some(expected) {
            diff.insert(
                name.clone(),
                DiffEntry {
                    expected: expected.clone(),
                    actual,
                },
            );
        }
    }
    diff
}

async fn poll_redfish_task(redfish: &dyn RedfishSession, task_id: &str) -> Result<(), BiosError> {
    for _ in 0..MAX_TASK_POLLS {
        let task = redfish.get_task(task_id).await?;
        match task.state {
            TaskState::Completed => return Ok(()),
            TaskState::Exception | TaskState::Cancelled => {
                return Err(BiosError::Redfish(RedfishError::UnexpectedResponse(
                    format!("bios task {task_id} ended in {:?}", task.state),
                )))
            }
            TaskState::New | TaskState::Running => {
                tokio::time::sleep(TASK_POLL_INTERVAL).await;
            }
        }
    }
    Err(BiosError::Redfish(RedfishError::UnexpectedResponse(
        format!("bios task {task_id} did not complete in time"),
    )))
}

/// Resets BIOS settings to factory defaults. Bypasses the
/// pull/preserve/partition protocol entirely and goes through Redfish only
/// — vendor tools are never involved.
pub async fn reset_to_defaults(redfish: &dyn RedfishSession) -> Result<PushResult, BiosError> {
    redfish.reset_bios_to_defaults().await?;
    Ok(PushResult {
        applied: HashMap::new(),
        warnings: Vec::new(),
    })
}

/// Applies `profile`'s BIOS template to the target, following the
/// pull/preserve/partition/apply/verify protocol.
pub async fn push(
    redfish: &dyn RedfishSession,
    exec: &dyn ExecSession,
    vendor_tool: &dyn VendorBiosTool,
    profile: &DeviceProfile,
    bool_as_enabled_disabled: bool,
) -> Result<PushResult, BiosError> {
    let current = pull(redfish, exec, vendor_tool, profile).await?;

    let mut desired: HashMap<String, Value> = profile
        .bios_template
        .iter()
        .map(|(k, v)| (k.clone(), yaml_to_json(v)))
        .collect();

    for name in &profile.bios_preserve {
        if let Some(value) = current.get(name) {
            desired.insert(name.clone(), value.clone());
        }
    }

    let mut redfish_batch = HashMap::new();
    let mut vendor_batch: HashMap<String, Value> = HashMap::new();
    for (name, value) in &desired {
        let supported = redfish.supports_bios_attribute(name).await;
        match profile.bios_method_hints.get(name) {
            Some(BiosMethod::VendorTool) => {
                vendor_batch.insert(name.clone(), value.clone());
            }
            Some(BiosMethod::Redfish) if supported => {
                redfish_batch.insert(name.clone(), value.clone());
            }
            _ if !supported => {
                vendor_batch.insert(name.clone(), value.clone());
            }
            _ => {
                redfish_batch.insert(name.clone(), value.clone());
            }
        }
    }

    if !redfish_batch.is_empty() {
        match redfish.patch_bios_attributes(&redfish_batch).await {
            Ok(Some(task_id)) => poll_redfish_task(redfish, &task_id).await?,
            Ok(None) => {}
            Err(_) => {
                // The batched setting(s) weren't accepted; fall back to the
                // vendor tool for all of them and retry once there.
                vendor_batch.extend(redfish_batch.drain());
            }
        }
    }

    let mut warnings = Vec::new();
    for (name, value) in &vendor_batch {
        let rendered = stringify(value, bool_as_enabled_disabled);
        let mut last_err = None;
        let mut applied = false;
        for _ in 0..MAX_VENDOR_TOOL_ATTEMPTS {
            match vendor_tool.set_setting(exec, name, &rendered).await {
                Ok(()) => {
                    applied = true;
                    break;
                }
                Err(e) => last_err = Some(e),
            }
        }
        if !applied {
            warnings.push(format!(
                "{name} failed to apply via vendor tool: {}",
                last_err.expect("loop sets last_err on every failure")
            ));
        }
    }

    let actual = pull(redfish, exec, vendor_tool, profile).await?;
    let diff = validate(&actual, &desired);

    for (name, entry) in &diff {
        if profile.bios_preserve.contains(name) {
            return Err(BiosError::PreserveFailed(name.clone()));
        }
        warnings.push(format!(
            "{name} did not stick: expected {}, got {:?}",
            entry.expected, entry.actual
        ));
    }

    Ok(PushResult {
        applied: actual,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor_tool::MockVendorBiosTool;
    use sessions::{LocalExecSession, MockRedfishSession};
    use serde_json::json;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn profile_with(
        template: &[(&str, serde_yaml::Value)],
        preserve: &[&str],
        hints: &[(&str, BiosMethod)],
    ) -> DeviceProfile {
        DeviceProfile {
            device_type: "a1.c5.large".to_string(),
            bios_template: template.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            bios_preserve: preserve.iter().map(|s| s.to_string()).collect::<HashSet<_>>(),
            bios_method_hints: hints.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn happy_path_applies_via_redfish_and_preserves_serial() {
        let redfish = MockRedfishSession::new().with_bios_attribute("SerialNumber", json!("ABC123"));
        let exec = LocalExecSession::new();
        let vendor_tool = MockVendorBiosTool::new();
        let profile = profile_with(
            &[("BootMode", serde_yaml::Value::String("Uefi".to_string()))],
            &["SerialNumber"],
            &[("BootMode", BiosMethod::Redfish)],
        );

        let result = push(&redfish, &exec, &vendor_tool, &profile, true).await.unwrap();
        assert_eq!(result.applied.get("BootMode"), Some(&json!("Uefi")));
        assert_eq!(result.applied.get("SerialNumber"), Some(&json!("ABC123")));
        assert!(result.warnings.is_empty());
    }

    #[tokio::test]
    async fn reset_to_defaults_clears_settings_via_redfish_only() {
        let redfish = MockRedfishSession::new().with_bios_attribute("BootMode", json!("Uefi"));

        let result = reset_to_defaults(&redfish).await.unwrap();
        assert!(result.applied.is_empty());
        assert!(result.warnings.is_empty());

        let remaining = redfish.get_bios_attributes().await.unwrap();
        assert!(remaining.is_empty());
    }

    #[tokio::test]
    async fn unsupported_redfish_setting_falls_back_to_vendor_tool() {
        let redfish = MockRedfishSession::new().with_unsupported_attribute("PowerProfile");
        let exec = LocalExecSession::new();
        let vendor_tool = MockVendorBiosTool::new();
        let profile = profile_with(
            &[("PowerProfile", serde_yaml::Value::String("Performance".to_string()))],
            &[],
            &[],
        );

        let result = push(&redfish, &exec, &vendor_tool, &profile, true).await.unwrap();
        assert_eq!(
            vendor_tool.get_setting(&exec, "PowerProfile").await.unwrap(),
            Some("Performance".to_string())
        );
        assert_eq!(result.applied.get("PowerProfile"), Some(&json!("Performance")));
    }

    #[tokio::test]
    async fn preserve_overrides_conflicting_template_value() {
        let redfish = MockRedfishSession::new().with_bios_attribute("BootMode", json!("Legacy"));
        let exec = LocalExecSession::new();
        let vendor_tool = MockVendorBiosTool::new();
        let profile = profile_with(
            &[("BootMode", serde_yaml::Value::String("Uefi".to_string()))],
            &["BootMode"],
            &[],
        );

        let result = push(&redfish, &exec, &vendor_tool, &profile, true).await.unwrap();
        assert_eq!(result.applied.get("BootMode"), Some(&json!("Legacy")));
    }

    struct DriftingVendorTool {
        calls: Mutex<u32>,
    }

    #[async_trait::async_trait]
    impl VendorBiosTool for DriftingVendorTool {
        async fn get_setting(
            &self,
            _session: &dyn ExecSession,
            _name: &str,
        ) -> Result<Option<String>, VendorToolError> {
            let mut calls = self.calls.lock().expect("lock poisoned");
            *calls += 1;
            Ok(Some(if *calls == 1 { "ABC123" } else { "DRIFTED" }.to_string()))
        }

        async fn set_setting(
            &self,
            _session: &dyn ExecSession,
            _name: &str,
            _value: &str,
        ) -> Result<(), VendorToolError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn preserved_setting_drifting_after_apply_is_an_error() {
        let redfish = MockRedfishSession::new();
        let exec = LocalExecSession::new();
        let vendor_tool = DriftingVendorTool {
            calls: Mutex::new(0),
        };
        let profile = profile_with(&[], &["SerialNumber"], &[("SerialNumber", BiosMethod::VendorTool)]);

        let result = push(&redfish, &exec, &vendor_tool, &profile, true).await;
        assert!(matches!(result, Err(BiosError::PreserveFailed(name)) if name == "SerialNumber"));
    }

    #[test]
    fn validate_reports_only_mismatches() {
        let mut current = HashMap::new();
        current.insert("BootMode".to_string(), json!("Uefi"));
        let mut desired = HashMap::new();
        desired.insert("BootMode".to_string(), json!("Uefi"));
        desired.insert("PowerProfile".to_string(), json!("Performance"));

        let diff = validate(&current, &desired);
        assert_eq!(diff.len(), 1);
        assert!(diff.contains_key("PowerProfile"));
    }
}
