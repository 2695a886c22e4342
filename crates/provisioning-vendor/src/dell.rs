use std::collections::HashMap;

use async_trait::async_trait;
use sessions::ExecSession;

use crate::{ensure_tool_installed, parse_prefixed_fields, VendorAdapter};

const CHASSIS_FIELDS: &[&str] = &[
    "chassis_model",
    "chassis_service_tag",
    "chassis_asset_tag",
    "power_supply_count",
    "cooling_device_count",
];

pub struct DellAdapter;

impl DellAdapter {
    async fn tool_available(&self, session: &dyn ExecSession, tool: &str) -> bool {
        session
            .exec(&format!("command -v {tool}"), false)
            .await
            .map(|o| o.success())
            .unwrap_or(false)
    }

    fn service_tag(output: &str) -> Option<String> {
        let tag = output.trim();
        (tag.len() == 7 && tag.chars().all(|c| c.is_ascii_alphanumeric()))
            .then(|| tag.to_string())
    }
}

#[async_trait]
impl VendorAdapter for DellAdapter {
    fn can_handle(&self, manufacturer: &str) -> bool {
        manufacturer.to_lowercase().contains("dell")
    }

    fn priority(&self) -> u32 {
        10
    }

    async fn install_tools(&self, session: &dyn ExecSession) -> bool {
        ensure_tool_installed(session, "racadm", "apt-get install -y srvadmin-idracadm7").await
    }

    async fn discover_extensions(
        &self,
        session: &dyn ExecSession,
        errors: &mut Vec<String>,
    ) -> HashMap<String, String> {
        let mut extensions = HashMap::new();

        if self.tool_available(session, "omreport").await {
            match session.exec("omreport chassis info", true).await {
                Ok(output) if output.success() => {
                    extensions.extend(parse_prefixed_fields(
                        &output.stdout,
                        "dell",
                        CHASSIS_FIELDS,
                    ));
                }
                Ok(output) => errors.push(format!("omreport chassis failed: {}", output.stderr)),
                Err(e) => errors.push(format!("omreport chassis failed: {e}")),
            }
        }

        if self.tool_available(session, "racadm").await {
            for (command, key) in [
                ("racadm getniccfg", "nic_config"),
                ("racadm get System.ServerTopology", "server_topology"),
            ] {
                match session.exec(command, true).await {
                    Ok(output) if output.success() => {
                        extensions.insert(key.to_string(), output.stdout.trim().to_string());
                    }
                    Ok(output) => errors.push(format!("{command} failed: {}", output.stderr)),
                    Err(e) => errors.push(format!("{command} failed: {e}")),
                }
            }
        }

        match session
            .exec("dmidecode -s system-serial-number", true)
            .await
        {
            Ok(output) if output.success() => {
                if let Some(tag) = Self::service_tag(&output.stdout) {
                    extensions.insert("dell_service_tag".to_string(), tag);
                }
            }
            Ok(output) => errors.push(format!("service tag lookup failed: {}", output.stderr)),
            Err(e) => errors.push(format!("service tag lookup failed: {e}")),
        }

        extensions
    }

    fn name(&self) -> &'static str {
        "dell"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessions::{ExecOutput, LocalExecSession};

    fn ok(stdout: &str) -> ExecOutput {
        ExecOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    #[tokio::test]
    async fn extracts_valid_service_tag() {
        let session = LocalExecSession::new()
            .with_response("command -v omreport", ExecOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 1,
            })
            .with_response("command -v racadm", ExecOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 1,
            })
            .with_response("sudo dmidecode -s system-serial-number", ok("ABC1234\n"));
        let adapter = DellAdapter;
        let mut errors = Vec::new();
        let extensions = adapter.discover_extensions(&session, &mut errors).await;
        assert_eq!(extensions.get("dell_service_tag").unwrap(), "ABC1234");
    }

    #[test]
    fn rejects_non_seven_char_tag() {
        assert_eq!(DellAdapter::service_tag("TOOLONGTAG"), None);
        assert_eq!(DellAdapter::service_tag("AB-1234"), None);
    }

    #[test]
    fn can_handle_matches_dell_inc() {
        assert!(DellAdapter.can_handle("Dell Inc."));
    }
}
