use std::collections::HashMap;

use async_trait::async_trait;
use sessions::ExecSession;

use crate::VendorAdapter;

/// Catch-all adapter for manufacturers with no dedicated integration. Always
/// matches and never contributes extensions, so every machine gets a
/// consistent (if empty) `vendor_extensions` entry.
pub struct GenericAdapter;

#[async_trait]
impl VendorAdapter for GenericAdapter {
    fn can_handle(&self, _manufacturer: &str) -> bool {
        true
    }

    fn priority(&self) -> u32 {
        100
    }

    async fn install_tools(&self, _session: &dyn ExecSession) -> bool {
        true
    }

    async fn discover_extensions(
        &self,
        _session: &dyn ExecSession,
        _errors: &mut Vec<String>,
    ) -> HashMap<String, String> {
        HashMap::new()
    }

    fn name(&self) -> &'static str {
        "generic"
    }
}
