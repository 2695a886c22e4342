use std::collections::HashMap;

use async_trait::async_trait;
use sessions::ExecSession;

use crate::{ensure_tool_installed, VendorAdapter};

const HPE_TOOL_CANDIDATES: &[&str] = &["hpssacli", "ssacli", "hpacucli"];

pub struct HpeAdapter;

impl HpeAdapter {
    async fn find_tool(&self, session: &dyn ExecSession) -> Option<&'static str> {
        for tool in HPE_TOOL_CANDIDATES {
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

    fn controller_count(output: &str) -> usize {
        output
            .lines()
            .filter(|l| {
                let lower = l.to_lowercase();
                lower.contains("smart array") || lower.contains("controller")
            })
            .count()
    }
}

#[async_trait]
impl VendorAdapter for HpeAdapter {
    fn can_handle(&self, manufacturer: &str) -> bool {
        let lower = manufacturer.to_lowercase();
        ["hpe", "hewlett", "hp"].iter().any(|v| lower.contains(v))
    }

    fn priority(&self) -> u32 {
        10
    }

    async fn install_tools(&self, session: &dyn ExecSession) -> bool {
        ensure_tool_installed(session, "ssacli", "apt-get install -y ssacli").await
    }

    async fn discover_extensions(
        &self,
        session: &dyn ExecSession,
        errors: &mut Vec<String>,
    ) -> HashMap<String, String> {
        let mut extensions = HashMap::new();

        if let Some(tool) = self.find_tool(session).await {
            match session.exec(&format!("{tool} ctrl all show config"), true).await {
                Ok(output) if output.success() => {
                    let count = Self::controller_count(&output.stdout);
                    if count > 0 {
                        extensions.insert("controller_count".to_string(), count.to_string());
                    }
                }
                Ok(output) => {
                    errors.push(format!("{tool} controller query failed: {}", output.stderr))
                }
                Err(e) => errors.push(format!("{tool} controller query failed: {e}")),
            }
        }

        match session.exec("dmidecode -t 38 | grep -i ilo", true).await {
            Ok(output) if output.success() && !output.stdout.trim().is_empty() => {
                extensions.insert("ilo_present".to_string(), "true".to_string());
                if let Some(line) = output
                    .stdout
                    .lines()
                    .find(|l| l.to_lowercase().contains("ilo"))
                {
                    extensions.insert("ilo_details".to_string(), line.trim().to_string());
                }
            }
            Ok(_) => {}
            Err(e) => errors.push(format!("ilo lookup failed: {e}")),
        }

        extensions
    }

    fn name(&self) -> &'static str {
        "hpe"
    }
}
