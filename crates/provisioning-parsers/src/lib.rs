//! Deterministic text-to-struct extraction for remote shell output.
//!
//! Every parser here is a pure function `(&str) -> T` that never panics and
//! never fails loudly: an unrecognized format yields an empty/default record
//! plus a logged warning, per the discovery pipeline's contract that a single
//! bad parse must never abort the rest of discovery.

pub mod dmidecode;
pub mod ipmi;
pub mod network;

pub use dmidecode::{BiosInfo, SystemInfo};
pub use ipmi::IpmiLanInfo;
pub use network::{InterfaceState, NetworkInterface};

/// Splits a `Key: Value` line on the first colon, trimming both sides.
///
/// Returns `None` if the line has no colon. Shared by all line-oriented
/// parsers in this crate.
pub(crate) fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    Some((key.trim(), value.trim()))
}

/// Converts a CIDR prefix length (0..=32) into a dotted-quad netmask.
///
/// `cidr_to_netmask(0) == "0.0.0.0"`, `cidr_to_netmask(32) ==
/// "255.255.255.255"`. Values outside `0..=32` saturate to the nearest
/// bound rather than panicking.
pub fn cidr_to_netmask(cidr: u32) -> String {
    let cidr = cidr.min(32);
    let mask: u32 = if cidr == 0 {
        0
    } else {
        (0xFFFF_FFFFu32) << (32 - cidr)
    };
    format!(
        "{}.{}.{}.{}",
        (mask >> 24) & 0xff,
        (mask >> 16) & 0xff,
        (mask >> 8) & 0xff,
        mask & 0xff
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cidr_boundaries() {
        assert_eq!(cidr_to_netmask(0), "0.0.0.0");
        assert_eq!(cidr_to_netmask(32), "255.255.255.255");
        assert_eq!(cidr_to_netmask(24), "255.255.255.0");
        assert_eq!(cidr_to_netmask(16), "255.255.0.0");
    }

    #[test]
    fn split_key_value_trims() {
        assert_eq!(
            split_key_value("  Manufacturer:   Supermicro  "),
            Some(("Manufacturer", "Supermicro"))
        );
        assert_eq!(split_key_value("no colon here"), None);
    }
}
