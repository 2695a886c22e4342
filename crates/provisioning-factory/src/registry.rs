use std::collections::HashMap;

use workflow::WorkflowStep;

/// Everything the registry knows about a named step except the handler
/// implementation itself, which is wired up by the binary that owns the
/// concrete `MaasClient`/store/session instances.
#[derive(Debug, Clone)]
pub struct StepRegistration {
    pub description: &'static str,
    pub default_timeout_seconds: u64,
    pub default_max_attempts: u32,
}

impl StepRegistration {
    const fn new(description: &'static str) -> Self {
        Self {
            description,
            default_timeout_seconds: 300,
            default_max_attempts: 3,
        }
    }

    const fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.default_timeout_seconds = timeout_seconds;
        self
    }

    const fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.default_max_attempts = max_attempts;
        self
    }
}

macro_rules! registrations {
    ($($name:literal => $reg:expr),+ $(,)?) => {
        &[$(($name, $reg)),+]
    };
}

/// Every step name known to the standard templates, its description, and
/// its default timeout/retry policy. `handler_ref` in the resulting
/// `WorkflowStep` is always the step's own name; the process embedding
/// this crate resolves names to `StepHandler` impls.
const REGISTRATIONS: &[(&str, StepRegistration)] = registrations! {
    "validate_server" => StepRegistration::new("Validates server_id and input parameters against the MaaS inventory"),
    "commission" => StepRegistration::new("Commissions the server via the MaaS client").with_timeout(1800),
    "force_commission" => StepRegistration::new("Forces commissioning, bypassing the normal eligibility checks").with_timeout(1800),
    "wait_commissioning" => StepRegistration::new("Polls MaaS until commissioning finishes").with_timeout(1800).with_max_attempts(1),
    "discover_hardware" => StepRegistration::new("Runs the hardware discovery pipeline over SSH"),
    "classify_device" => StepRegistration::new("Classifies discovered hardware against device mappings").with_max_attempts(1),
    "resolve_profile" => StepRegistration::new("Resolves the device profile's BIOS/firmware plans").with_max_attempts(1),
    "configure_bios" => StepRegistration::new("Applies the resolved BIOS template").with_timeout(900),
    "setup_ipmi" => StepRegistration::new("Configures the BMC's IPMI LAN settings"),
    "verify" => StepRegistration::new("Final post-provisioning validation pass"),
    "pre_flight" => StepRegistration::new("Pre-flight checks before a firmware-first run").with_max_attempts(1),
    "firmware_update_batch" => StepRegistration::new("Applies the ordered firmware plan").with_timeout(3600).with_max_attempts(1),
    "reboot_and_wait" => StepRegistration::new("Issues a reboot and waits for the host to return").with_timeout(1200).with_max_attempts(1),
    "validate_ipmi_connectivity" => StepRegistration::new("Confirms the BMC's Redfish/IPMI endpoint is reachable"),
    "backup_bios" => StepRegistration::new("Pulls and persists current BIOS settings before changing them").with_max_attempts(1),
    "verify_bios" => StepRegistration::new("Confirms applied BIOS settings stuck"),
    "reboot" => StepRegistration::new("Issues a reboot to apply BIOS changes").with_timeout(1200).with_max_attempts(1),
    "validate_network_config" => StepRegistration::new("Validates requested IPMI network parameters").with_max_attempts(1),
    "configure_ipmi_network" => StepRegistration::new("Applies the IPMI network configuration"),
    "test_ipmi_connectivity" => StepRegistration::new("Confirms the BMC answers on the new IPMI address"),
    "verify_ipmi_setup" => StepRegistration::new("Final check that IPMI network settings match the request").with_max_attempts(1),
};

/// Builds a [`WorkflowStep`] from the registry entry for `name`.
///
/// # Panics
/// Panics if `name` isn't a registered step — template assembly is a
/// programming error otherwise, not a runtime condition to recover from.
pub fn step(name: &str) -> WorkflowStep {
    let (_, registration) = REGISTRATIONS
        .iter()
        .find(|(n, _)| *n == name)
        .unwrap_or_else(|| panic!("unregistered workflow step: {name}"));
    WorkflowStep::new(name, registration.description, name)
        .with_timeout_seconds(registration.default_timeout_seconds)
        .with_max_attempts(registration.default_max_attempts)
}

pub fn registry() -> HashMap<String, StepRegistration> {
    REGISTRATIONS
        .iter()
        .map(|(name, reg)| (name.to_string(), reg.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_registered_name_builds_a_step() {
        for (name, _) in REGISTRATIONS {
            let built = step(name);
            assert_eq!(built.name, *name);
        }
    }

    #[test]
    #[should_panic(expected = "unregistered workflow step")]
    fn unknown_step_panics() {
        step("does_not_exist");
    }
}
