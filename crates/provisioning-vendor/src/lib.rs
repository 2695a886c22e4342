//! Vendor-specific hardware discovery extensions.
//!
//! Discovery runs the same generic commands (dmidecode, ipmitool, ip addr)
//! against every machine, then asks each registered [`VendorAdapter`]
//! whether it recognizes the reported manufacturer. Recognized adapters run
//! in priority order and their output is merged into the hardware report as
//! `vendor_extensions`.

use std::collections::HashMap;

use async_trait::async_trait;
use sessions::ExecSession;

/// A manufacturer-specific discovery extension.
#[async_trait]
pub trait VendorAdapter: Send + Sync {
    /// Whether this adapter applies to a machine reporting `manufacturer`.
    /// Matching is a case-insensitive substring check against the vendor's
    /// name(s), mirroring the loose matching dmidecode output requires.
    fn can_handle(&self, manufacturer: &str) -> bool;

    /// Lower runs first when more than one adapter matches — vendor-specific
    /// adapters use `10`, the generic fallback uses the default of `100`.
    fn priority(&self) -> u32;

    /// Installs whatever vendor CLI tool this adapter depends on. Returning
    /// `false` aborts this adapter's discovery step without failing the
    /// overall pipeline.
    async fn install_tools(&self, session: &dyn ExecSession) -> bool;

    /// Runs vendor-specific discovery commands, returning a flat key/value
    /// extension map. Errors are pushed to `errors` rather than propagated —
    /// a failed vendor probe must never abort the rest of discovery.
    async fn discover_extensions(
        &self,
        session: &dyn ExecSession,
        errors: &mut Vec<String>,
    ) -> HashMap<String, String>;

    fn name(&self) -> &'static str;
}

pub mod dell;
pub mod generic;
pub mod hpe;
pub mod supermicro;

/// Installs `tool` via `install_command` if it isn't already on `PATH`.
/// Idempotent: a tool already present counts as success. A failed install
/// is logged, not surfaced — tool installation never aborts discovery.
pub(crate) async fn ensure_tool_installed(
    session: &dyn ExecSession,
    tool: &str,
    install_command: &str,
) -> bool {
    let present = session
        .exec(&format!("command -v {tool}"), false)
        .await
        .map(|o| o.success())
        .unwrap_or(false);
    if present {
        return true;
    }
    match session.exec(install_command, true).await {
        Ok(output) if output.success() => true,
        Ok(output) => {
            tracing::warn!(tool, stderr = %output.stderr, "vendor tool install failed");
            true
        }
        Err(e) => {
            tracing::warn!(tool, error = %e, "vendor tool install failed");
            true
        }
    }
}

/// Parses `Key: Value` lines, keeping only keys (lowercased, spaces
/// replaced with underscores) present in `allowed`, and prefixing each
/// retained key with `prefix_`.
pub(crate) fn parse_prefixed_fields(
    output: &str,
    prefix: &str,
    allowed: &[&str],
) -> HashMap<String, String> {
    let mut fields = HashMap::new();
    for line in output.lines() {
        let line = line.trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_lowercase().replace(' ', "_");
        let value = value.trim();
        if allowed.contains(&key.as_str()) {
            fields.insert(format!("{prefix}_{key}"), value.to_string());
        }
    }
    fields
}

pub use dell::DellAdapter;
pub use generic::GenericAdapter;
pub use hpe::HpeAdapter;
pub use supermicro::SupermicroAdapter;

/// Returns the built-in adapter set, ordered by ascending priority (lower
/// runs first), with [`GenericAdapter`] last as the catch-all.
pub fn default_adapters() -> Vec<Box<dyn VendorAdapter>> {
    let mut adapters: Vec<Box<dyn VendorAdapter>> = vec![
        Box::new(SupermicroAdapter),
        Box::new(DellAdapter),
        Box::new(HpeAdapter),
        Box::new(GenericAdapter),
    ];
    adapters.sort_by_key(|a| a.priority());
    adapters
}

/// Returns the first adapter (in ascending-priority order) that claims
/// `manufacturer`. [`GenericAdapter`] always matches, so this never returns
/// `None` given [`default_adapters`].
pub fn select_adapter<'a>(
    adapters: &'a [Box<dyn VendorAdapter>],
    manufacturer: &str,
) -> Option<&'a dyn VendorAdapter> {
    adapters
        .iter()
        .find(|a| a.can_handle(manufacturer))
        .map(|a| a.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_adapters_are_priority_sorted() {
        let adapters = default_adapters();
        let priorities: Vec<u32> = adapters.iter().map(|a| a.priority()).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);
        assert_eq!(adapters.last().unwrap().name(), "generic");
    }

    #[test]
    fn supermicro_manufacturer_selects_supermicro_adapter() {
        let adapters = default_adapters();
        let selected = select_adapter(&adapters, "Supermicro").unwrap();
        assert_eq!(selected.name(), "supermicro");
    }

    #[test]
    fn unknown_manufacturer_falls_back_to_generic() {
        let adapters = default_adapters();
        let selected = select_adapter(&adapters, "Acme Widgets Inc.").unwrap();
        assert_eq!(selected.name(), "generic");
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let adapters = default_adapters();
        assert_eq!(
            select_adapter(&adapters, "DELL INC.").unwrap().name(),
            "dell"
        );
    }
}
