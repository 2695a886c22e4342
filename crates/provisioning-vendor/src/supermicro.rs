use std::collections::HashMap;

use async_trait::async_trait;
use sessions::ExecSession;

use crate::{ensure_tool_installed, parse_prefixed_fields, VendorAdapter};

const SUM_TOOL_CANDIDATES: &[&str] = &["sum", "sumtool", "/opt/supermicro/sum/sum"];

pub struct SupermicroAdapter;

impl SupermicroAdapter {
    async fn find_sum_tool(&self, session: &dyn ExecSession) -> Option<&'static str> {
        for tool in SUM_TOOL_CANDIDATES {
            if session
                .exec(&format!("command -v {tool}"), false)
                .await
                .map(|o| o.success())
                .unwrap_or(false)
            {
                return Some(tool);
            }
        }
        None
    }
}

#[async_trait]
impl VendorAdapter for SupermicroAdapter {
    fn can_handle(&self, manufacturer: &str) -> bool {
        manufacturer.to_lowercase().contains("supermicro")
    }

    fn priority(&self) -> u32 {
        10
    }

    async fn install_tools(&self, session: &dyn ExecSession) -> bool {
        ensure_tool_installed(session, "sum", "apt-get install -y smcipmitool").await
    }

    async fn discover_extensions(
        &self,
        session: &dyn ExecSession,
        errors: &mut Vec<String>,
    ) -> HashMap<String, String> {
        let mut extensions = HashMap::new();

        let Some(sum_tool) = self.find_sum_tool(session).await else {
            errors.push("Supermicro SUM tool not found".to_string());
            return extensions;
        };

        for (command, prefix, allowed) in [
            (
                "GetSystemInfo",
                "sum",
                &["product_name", "serial_number", "manufacturer"][..],
            ),
            (
                "GetBiosInfo",
                "sum",
                &["bios_version", "bios_date", "bios_revision"][..],
            ),
            (
                "GetBmcInfo",
                "sum",
                &["bmc_firmware_version", "bmc_ip_address", "bmc_mac_address"][..],
            ),
        ] {
            match session
                .exec(&format!("{sum_tool} -c {command}"), true)
                .await
            {
                Ok(output) if output.success() => {
                    extensions.extend(parse_prefixed_fields(&output.stdout, prefix, allowed));
                }
                Ok(output) => errors.push(format!("SUM {command} failed: {}", output.stderr)),
                Err(e) => errors.push(format!("SUM {command} failed: {e}")),
            }
        }

        extensions
    }

    fn name(&self) -> &'static str {
        "supermicro"
    }
}
