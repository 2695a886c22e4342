//! Parser for `ipmitool lan print` and related BMC channel output.

use crate::split_key_value;

/// BMC LAN configuration as read from `ipmitool lan print <channel>`.
///
/// `0.0.0.0` values are treated as absent, not as the literal address —
/// `ipmitool` reports that value for unconfigured fields.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IpmiLanInfo {
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub gateway: Option<String>,
    pub netmask: Option<String>,
    pub vlan_id: Option<u32>,
    /// Derived: `true` iff `ip_address` parsed to a non-nil value.
    pub enabled: bool,
}

fn non_zero_address(value: &str) -> Option<String> {
    if value == "0.0.0.0" {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parses `ipmitool lan print <channel>` output into [`IpmiLanInfo`].
pub fn parse_lan_config(output: &str) -> IpmiLanInfo {
    let mut info = IpmiLanInfo::default();
    for line in output.lines() {
        let Some((key, value)) = split_key_value(line.trim()) else {
            continue;
        };
        match key {
            "IP Address" => info.ip_address = non_zero_address(value),
            "MAC Address" => info.mac_address = Some(value.to_string()),
            "Default Gateway IP" => info.gateway = non_zero_address(value),
            "Subnet Mask" => info.netmask = non_zero_address(value),
            "802.1q VLAN ID" => {
                if !value.eq_ignore_ascii_case("disabled") {
                    info.vlan_id = value.parse().ok();
                }
            }
            _ => {}
        }
    }
    info.enabled = info.ip_address.is_some();
    info
}

/// Extracts the channel number from `ipmitool channel info` style output.
pub fn parse_channel_number(output: &str) -> Option<u32> {
    let line = output.lines().find(|l| l.contains("Channel") && l.contains(':'))?;
    let idx = line.find("Channel")?;
    line[idx + "Channel".len()..]
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

/// Subset of `ipmitool bmc info` fields worth recording as vendor extensions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BmcInfo {
    pub device_id: Option<String>,
    pub device_revision: Option<String>,
    pub firmware_revision: Option<String>,
}

/// Parses `ipmitool bmc info` output.
pub fn parse_bmc_info(output: &str) -> BmcInfo {
    let mut info = BmcInfo::default();
    for line in output.lines() {
        let Some((key, value)) = split_key_value(line.trim()) else {
            continue;
        };
        match key.to_ascii_lowercase().replace(' ', "_").as_str() {
            "device_id" => info.device_id = Some(value.to_string()),
            "device_revision" => info.device_revision = Some(value.to_string()),
            "firmware_revision" => info.firmware_revision = Some(value.to_string()),
            _ => {}
        }
    }
    info
}

/// Auto-detects LAN vs. channel vs. BMC-device output and parses whichever
/// table is present. Falls back to an empty [`IpmiLanInfo`] when the format
/// isn't recognized, logging a warning rather than failing.
pub fn parse_auto(output: &str) -> IpmiLanInfo {
    if output.contains("IP Address") && output.contains("MAC Address") {
        parse_lan_config(output)
    } else {
        tracing::warn!("unknown ipmitool output format");
        IpmiLanInfo::default()
    }
}
