use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sessions::ExecSession;

#[derive(Debug, thiserror::Error)]
pub enum VendorToolError {
    #[error("vendor tool command failed: {0}")]
    Command(String),
}

/// Applies/reads individual BIOS settings via a vendor CLI tool (e.g. SUM,
/// racadm, ssacli) rather than Redfish.
#[async_trait]
pub trait VendorBiosTool: Send + Sync {
    async fn get_setting(
        &self,
        session: &dyn ExecSession,
        name: &str,
    ) -> Result<Option<String>, VendorToolError>;

    async fn set_setting(
        &self,
        session: &dyn ExecSession,
        name: &str,
        value: &str,
    ) -> Result<(), VendorToolError>;
}

/// In-memory tool for tests: settings live in a map rather than going
/// through an exec session at all.
pub struct MockVendorBiosTool {
    settings: Mutex<HashMap<String, String>>,
}

impl MockVendorBiosTool {
    pub fn new() -> Self {
        Self {
            settings: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_setting(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings
            .lock()
            .expect("lock poisoned")
            .insert(name.into(), value.into());
        self
    }
}

impl Default for MockVendorBiosTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VendorBiosTool for MockVendorBiosTool {
    async fn get_setting(
        &self,
        _session: &dyn ExecSession,
        name: &str,
    ) -> Result<Option<String>, VendorToolError> {
        Ok(self.settings.lock().expect("lock poisoned").get(name).cloned())
    }

    async fn set_setting(
        &self,
        _session: &dyn ExecSession,
        name: &str,
        value: &str,
    ) -> Result<(), VendorToolError> {
        self.settings
            .lock()
            .expect("lock poisoned")
            .insert(name.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sessions::LocalExecSession;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let tool = MockVendorBiosTool::new();
        let session = LocalExecSession::new();
        tool.set_setting(&session, "BootMode", "Uefi").await.unwrap();
        assert_eq!(
            tool.get_setting(&session, "BootMode").await.unwrap(),
            Some("Uefi".to_string())
        );
    }

    #[tokio::test]
    async fn unset_setting_is_none() {
        let tool = MockVendorBiosTool::new();
        let session = LocalExecSession::new();
        assert_eq!(tool.get_setting(&session, "Nope").await.unwrap(), None);
    }
}
