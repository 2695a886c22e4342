//! Parser for `ip addr` and legacy `ifconfig` output.

use regex::Regex;

use crate::cidr_to_netmask;

/// Administrative/operational state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterfaceState {
    Up,
    Down,
    #[default]
    Unknown,
}

/// A single network interface as read from `ip addr` or `ifconfig`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NetworkInterface {
    pub name: String,
    pub mac_address: Option<String>,
    pub ipv4_address: Option<String>,
    pub netmask: Option<String>,
    pub state: InterfaceState,
}

fn ip_addr_interface_re() -> Regex {
    Regex::new(r"^\d+:\s+([^:@]+)[:@].*state\s+(\S+)").expect("static regex")
}

fn ip_addr_inet_re() -> Regex {
    Regex::new(r"inet\s+(\d+\.\d+\.\d+\.\d+)/(\d+)").expect("static regex")
}

fn ip_addr_link_re() -> Regex {
    Regex::new(r"link/ether\s+([0-9a-fA-F:]+)").expect("static regex")
}

fn ifconfig_interface_re() -> Regex {
    Regex::new(r"^(\S+):\s+flags=\d+<([^>]*)>").expect("static regex")
}

fn ifconfig_inet_re() -> Regex {
    Regex::new(r"inet\s+(\d+\.\d+\.\d+\.\d+)\s+netmask\s+(\S+)").expect("static regex")
}

fn ifconfig_ether_re() -> Regex {
    Regex::new(r"ether\s+([0-9a-fA-F:]+)").expect("static regex")
}

fn state_from_flags(flags: &str) -> InterfaceState {
    if flags.contains("UP") {
        InterfaceState::Up
    } else {
        InterfaceState::Down
    }
}

/// Parses `ip addr` (iproute2) output. Interfaces are delimited by lines
/// beginning with a numeric index.
pub fn parse_ip_addr(output: &str) -> Vec<NetworkInterface> {
    let iface_re = ip_addr_interface_re();
    let inet_re = ip_addr_inet_re();
    let link_re = ip_addr_link_re();

    let mut interfaces = Vec::new();
    let mut current: Option<NetworkInterface> = None;

    for line in output.lines() {
        if let Some(caps) = iface_re.captures(line) {
            if let Some(iface) = current.take() {
                interfaces.push(iface);
            }
            let flags = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            current = Some(NetworkInterface {
                name: caps[1].trim().to_string(),
                state: state_from_flags(flags),
                ..Default::default()
            });
            continue;
        }
        let Some(iface) = current.as_mut() else {
            continue;
        };
        if let Some(caps) = link_re.captures(line) {
            iface.mac_address = Some(caps[1].to_string());
        } else if let Some(caps) = inet_re.captures(line) {
            iface.ipv4_address = Some(caps[1].to_string());
            if let Ok(prefix) = caps[2].parse::<u32>() {
                iface.netmask = Some(cidr_to_netmask(prefix));
            }
        }
    }
    if let Some(iface) = current.take() {
        interfaces.push(iface);
    }
    interfaces
}

/// Parses legacy `ifconfig` output.
pub fn parse_ifconfig(output: &str) -> Vec<NetworkInterface> {
    let iface_re = ifconfig_interface_re();
    let inet_re = ifconfig_inet_re();
    let ether_re = ifconfig_ether_re();

    let mut interfaces = Vec::new();
    let mut current: Option<NetworkInterface> = None;

    for line in output.lines() {
        if let Some(caps) = iface_re.captures(line) {
            if let Some(iface) = current.take() {
                interfaces.push(iface);
            }
            current = Some(NetworkInterface {
                name: caps[1].to_string(),
                state: state_from_flags(&caps[2]),
                ..Default::default()
            });
            continue;
        }
        let Some(iface) = current.as_mut() else {
            continue;
        };
        if let Some(caps) = inet_re.captures(line) {
            iface.ipv4_address = Some(caps[1].to_string());
            iface.netmask = Some(caps[2].to_string());
        } else if let Some(caps) = ether_re.captures(line) {
            iface.mac_address = Some(caps[1].to_string());
        }
    }
    if let Some(iface) = current.take() {
        interfaces.push(iface);
    }
    interfaces
}

/// Auto-detects `ip addr` vs. `ifconfig` format and parses accordingly.
///
/// Unrecognized output yields an empty interface list rather than erroring.
pub fn parse_auto(output: &str) -> Vec<NetworkInterface> {
    if output.contains("link/ether") || Regex::new(r"^\d+:\s").unwrap().is_match(output) {
        parse_ip_addr(output)
    } else if output.contains("flags=") {
        parse_ifconfig(output)
    } else {
        tracing::warn!("unknown network interface output format");
        Vec::new()
    }
}
