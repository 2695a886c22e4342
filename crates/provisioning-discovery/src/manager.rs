use chrono::Utc;
use parsers::dmidecode::DmidecodeRecord;
use sessions::ExecSession;
use vendor::{default_adapters, select_adapter};

use crate::report::{HardwareReport, IpmiSummary};

async fn tool_available(session: &dyn ExecSession, tool: &str) -> bool {
    session
        .exec(&format!("command -v {tool}"), false)
        .await
        .map(|o| o.success())
        .unwrap_or(false)
}

async fn ensure_ipmitool(session: &dyn ExecSession, errors: &mut Vec<String>) -> bool {
    if tool_available(session, "ipmitool").await {
        return true;
    }
    match session.exec("apt-get install -y ipmitool", true).await {
        Ok(output) if output.success() => true,
        _ => {
            errors.push("Failed to install ipmitool".to_string());
            false
        }
    }
}

async fn discover_system(session: &dyn ExecSession, errors: &mut Vec<String>) -> crate::report::SystemSummary {
    let mut system = crate::report::SystemSummary::default();

    match session.exec("dmidecode -t system", true).await {
        Ok(output) if output.success() => {
            if let DmidecodeRecord::System(info) = parsers::dmidecode::parse_auto(&output.stdout) {
                system.manufacturer = info.manufacturer;
                system.product_name = info.product_name;
                system.serial_number = info.serial_number;
                system.uuid = info.uuid;
            }
        }
        Ok(output) => errors.push(format!("dmidecode system failed: {}", output.stderr)),
        Err(e) => errors.push(format!("dmidecode system failed: {e}")),
    }

    match session.exec("dmidecode -t bios", true).await {
        Ok(output) if output.success() => {
            let info = parsers::dmidecode::parse_bios_info(&output.stdout);
            system.bios_version = info.version;
            system.bios_date = info.date;
        }
        Ok(output) => errors.push(format!("dmidecode bios failed: {}", output.stderr)),
        Err(e) => errors.push(format!("dmidecode bios failed: {e}")),
    }

    match session.exec("lscpu", false).await {
        Ok(output) if output.success() => {
            let info = parsers::dmidecode::parse_cpu_info(&output.stdout);
            system.cpu_model = info.model;
            system.cpu_cores = info.cores;
        }
        Ok(output) => errors.push(format!("lscpu failed: {}", output.stderr)),
        Err(e) => errors.push(format!("lscpu failed: {e}")),
    }

    match session.exec("free -h", false).await {
        Ok(output) if output.success() => {
            system.memory_total = parsers::dmidecode::parse_memory_info(&output.stdout).total;
        }
        Ok(output) => errors.push(format!("memory info failed: {}", output.stderr)),
        Err(e) => errors.push(format!("memory info failed: {e}")),
    }

    system
}

async fn discover_ipmi(session: &dyn ExecSession, errors: &mut Vec<String>) -> IpmiSummary {
    if !ensure_ipmitool(session, errors).await {
        return IpmiSummary::default();
    }

    match session.exec("ipmitool lan print 1", true).await {
        Ok(output) if output.success() => {
            let lan = parsers::ipmi::parse_lan_config(&output.stdout);
            return IpmiSummary {
                ip_address: lan.ip_address,
                mac_address: lan.mac_address,
                gateway: lan.gateway,
                netmask: lan.netmask,
                vlan_id: lan.vlan_id,
                channel: Some(1),
                enabled: lan.enabled,
            };
        }
        _ => {
            match session.exec("ipmitool lan print 8", true).await {
                Ok(output) if output.success() => {
                    let lan = parsers::ipmi::parse_lan_config(&output.stdout);
                    return IpmiSummary {
                        ip_address: lan.ip_address,
                        mac_address: lan.mac_address,
                        gateway: lan.gateway,
                        netmask: lan.netmask,
                        vlan_id: lan.vlan_id,
                        channel: Some(8),
                        enabled: lan.enabled,
                    };
                }
                Ok(output) => errors.push(format!("IPMI lan print failed: {}", output.stderr)),
                Err(e) => errors.push(format!("IPMI lan print failed: {e}")),
            }
        }
    }

    IpmiSummary::default()
}

/// Runs the full discovery pipeline against an already-open session,
/// always returning a report — partial failures land in
/// `discovery_errors` rather than aborting the call.
pub async fn discover_hardware(session: &dyn ExecSession, hostname: &str) -> HardwareReport {
    let mut errors = Vec::new();

    let mut system = discover_system(session, &mut errors).await;
    let ipmi = discover_ipmi(session, &mut errors).await;

    let network_interfaces = match session.exec("ip addr show", false).await {
        Ok(output) if output.success() => parsers::network::parse_auto(&output.stdout),
        Ok(output) => {
            errors.push(format!("Network interface discovery failed: {}", output.stderr));
            Vec::new()
        }
        Err(e) => {
            errors.push(format!("Network interface discovery failed: {e}"));
            Vec::new()
        }
    };

    let adapters = default_adapters();
    let manufacturer = system.manufacturer.clone().unwrap_or_default();
    let mut vendor_extensions = std::collections::HashMap::new();
    if let Some(adapter) = select_adapter(&adapters, &manufacturer) {
        if adapter.install_tools(session).await {
            vendor_extensions = adapter.discover_extensions(session, &mut errors).await;
        } else {
            errors.push(format!("Failed to install {} tools", adapter.name()));
        }
    }

    if let Some(product_name) = vendor_extensions.get("sum_product_name") {
        system.product_name = Some(product_name.clone());
    }
    if let Some(service_tag) = vendor_extensions.get("dell_service_tag") {
        system.serial_number = Some(service_tag.clone());
    }

    HardwareReport {
        hostname: hostname.to_string(),
        discovered_at: Utc::now(),
        system,
        ipmi,
        network_interfaces,
        vendor_extensions,
        classification: crate::report::Classification::default(),
        discovery_errors: errors,
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

    fn failed(stderr: &str) -> ExecOutput {
        ExecOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            exit_code: 1,
        }
    }

    #[tokio::test]
    async fn happy_path_merges_all_sources() {
        let session = LocalExecSession::new()
            .with_response(
                "sudo dmidecode -t system",
                ok("System Information\n\tManufacturer: Supermicro\n\tProduct Name: SYS-X12\n\tSerial Number: S1\n\tUUID: u-1\n"),
            )
            .with_response(
                "sudo dmidecode -t bios",
                ok("BIOS Information\n\tVersion: 3.4\n\tRelease Date: 01/01/2024\n"),
            )
            .with_response("lscpu", ok("Model name: Xeon\nCPU(s): 32\n"))
            .with_response("free -h", ok("Mem:  128Gi  1Gi\n"))
            .with_response("command -v ipmitool", ok(""))
            .with_response(
                "sudo ipmitool lan print 1",
                ok("IP Address              : 10.0.0.5\nMAC Address              : aa:bb:cc:dd:ee:ff\n"),
            )
            .with_response("ip addr show", ok("1: lo: <LOOPBACK,UP> state UP\n"))
            .with_response("command -v sum", ok(""))
            .with_response(
                "sudo sum -c GetSystemInfo",
                ok("Product Name: SYS-OVERRIDE\n"),
            )
            .with_response("sudo sum -c GetBiosInfo", ok(""))
            .with_response("sudo sum -c GetBmcInfo", ok(""));

        let report = discover_hardware(&session, "host1").await;
        assert_eq!(report.system.manufacturer.as_deref(), Some("Supermicro"));
        assert_eq!(report.system.product_name.as_deref(), Some("SYS-OVERRIDE"));
        assert_eq!(report.ipmi.ip_address.as_deref(), Some("10.0.0.5"));
        assert_eq!(report.ipmi.channel, Some(1));
        assert!(report.ipmi.enabled);
        assert_eq!(report.network_interfaces.len(), 1);
        assert!(report.discovery_errors.is_empty());
    }

    #[tokio::test]
    async fn ipmi_falls_back_to_channel_eight() {
        let session = LocalExecSession::new()
            .with_response("sudo dmidecode -t system", failed("no tool"))
            .with_response("sudo dmidecode -t bios", failed("no tool"))
            .with_response("lscpu", failed("no tool"))
            .with_response("free -h", failed("no tool"))
            .with_response("command -v ipmitool", ok(""))
            .with_response("sudo ipmitool lan print 1", failed("channel unavailable"))
            .with_response(
                "sudo ipmitool lan print 8",
                ok("IP Address              : 10.0.0.9\n"),
            )
            .with_response("ip addr show", failed("no tool"));

        let report = discover_hardware(&session, "host2").await;
        assert_eq!(report.ipmi.channel, Some(8));
        assert_eq!(report.ipmi.ip_address.as_deref(), Some("10.0.0.9"));
    }

    #[tokio::test]
    async fn total_failure_still_returns_report() {
        let session = LocalExecSession::new();
        let report = discover_hardware(&session, "host3").await;
        assert_eq!(report.system, crate::report::SystemSummary::default());
        assert!(!report.ipmi.enabled);
        assert!(!report.discovery_errors.is_empty());
    }
}
