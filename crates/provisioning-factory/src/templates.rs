use workflow::WorkflowStep;

use crate::registry::step;

fn build(names: &[&str]) -> Vec<WorkflowStep> {
    names.iter().map(|name| step(name)).collect()
}

/// `[validate_server, commission, wait_commissioning, discover_hardware,
/// classify_device, resolve_profile, configure_bios, setup_ipmi, verify]`
pub fn basic_provisioning() -> Vec<WorkflowStep> {
    build(&[
        "validate_server",
        "commission",
        "wait_commissioning",
        "discover_hardware",
        "classify_device",
        "resolve_profile",
        "configure_bios",
        "setup_ipmi",
        "verify",
    ])
}

/// Same as [`basic_provisioning`] but commissions via the MaaS
/// force-commission action instead of the normal one. Never selected by
/// name alone — only when a caller explicitly asks for it, per the
/// `force_commission` vs. `commission` open question.
pub fn basic_provisioning_with_force_commission() -> Vec<WorkflowStep> {
    build(&[
        "validate_server",
        "force_commission",
        "wait_commissioning",
        "discover_hardware",
        "classify_device",
        "resolve_profile",
        "configure_bios",
        "setup_ipmi",
        "verify",
    ])
}

/// `[pre_flight, discover_hardware, classify_device, resolve_profile,
/// firmware_update_batch, reboot_and_wait, configure_bios, verify]`
pub fn firmware_first() -> Vec<WorkflowStep> {
    build(&[
        "pre_flight",
        "discover_hardware",
        "classify_device",
        "resolve_profile",
        "firmware_update_batch",
        "reboot_and_wait",
        "configure_bios",
        "verify",
    ])
}

/// `[validate_ipmi_connectivity, backup_bios, configure_bios, verify_bios,
/// reboot]`
pub fn bios_only() -> Vec<WorkflowStep> {
    build(&[
        "validate_ipmi_connectivity",
        "backup_bios",
        "configure_bios",
        "verify_bios",
        "reboot",
    ])
}

/// `[validate_network_config, configure_ipmi_network,
/// test_ipmi_connectivity, verify_ipmi_setup]`
pub fn ipmi_only() -> Vec<WorkflowStep> {
    build(&[
        "validate_network_config",
        "configure_ipmi_network",
        "test_ipmi_connectivity",
        "verify_ipmi_setup",
    ])
}

#[derive(Debug, thiserror::Error)]
#[error("unknown workflow template: {0}")]
pub struct UnknownTemplate(pub String);

/// Resolves one of the four standard templates (or the force-commission
/// variant of `basic_provisioning`) by name.
pub fn by_name(name: &str) -> Result<Vec<WorkflowStep>, UnknownTemplate> {
    match name {
        "basic_provisioning" => Ok(basic_provisioning()),
        "basic_provisioning_force_commission" => Ok(basic_provisioning_with_force_commission()),
        "firmware_first" => Ok(firmware_first()),
        "bios_only" => Ok(bios_only()),
        "ipmi_only" => Ok(ipmi_only()),
        other => Err(UnknownTemplate(other.to_string())),
    }
}
