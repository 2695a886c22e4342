use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parsers::NetworkInterface;

/// Hardware/firmware summary assembled from `dmidecode`, `lscpu`, and
/// `free` output, overlaid with vendor-reported fields where present.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SystemSummary {
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
    pub serial_number: Option<String>,
    pub uuid: Option<String>,
    pub bios_version: Option<String>,
    pub bios_date: Option<String>,
    pub cpu_model: Option<String>,
    pub cpu_cores: Option<u32>,
    pub memory_total: Option<String>,
    pub chassis_type: Option<String>,
}

/// BMC LAN configuration as discovered via `ipmitool`.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct IpmiSummary {
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub gateway: Option<String>,
    pub netmask: Option<String>,
    pub vlan_id: Option<u32>,
    pub channel: Option<u32>,
    pub enabled: bool,
}

/// Device-type match produced by the config resolver; defaults to an
/// unresolved classification until `classify()` runs.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Classification {
    pub device_type: Option<String>,
    pub confidence: f64,
    pub matching_criteria: Vec<String>,
}

/// Full discovery result for one target. Produced once per workflow and
/// read-only thereafter.
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareReport {
    pub hostname: String,
    pub discovered_at: DateTime<Utc>,
    pub system: SystemSummary,
    pub ipmi: IpmiSummary,
    pub network_interfaces: Vec<NetworkInterface>,
    pub vendor_extensions: HashMap<String, String>,
    pub classification: Classification,
    pub discovery_errors: Vec<String>,
}

impl HardwareReport {
    pub fn empty(hostname: impl Into<String>, discovered_at: DateTime<Utc>) -> Self {
        Self {
            hostname: hostname.into(),
            discovered_at,
            system: SystemSummary::default(),
            ipmi: IpmiSummary::default(),
            network_interfaces: Vec::new(),
            vendor_extensions: HashMap::new(),
            classification: Classification::default(),
            discovery_errors: Vec::new(),
        }
    }
}
