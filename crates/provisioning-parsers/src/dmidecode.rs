//! Parser for `dmidecode`, `lscpu`, and `free` output.

/// Fields recognized from the `dmidecode -t system` table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SystemInfo {
    pub manufacturer: Option<String>,
    pub product_name: Option<String>,
    pub serial_number: Option<String>,
    pub uuid: Option<String>,
}

/// Fields recognized from the `dmidecode -t bios` table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BiosInfo {
    pub version: Option<String>,
    pub date: Option<String>,
}

/// Fields recognized from `lscpu` output.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CpuInfo {
    pub model: Option<String>,
    pub cores: Option<u32>,
}

/// Fields recognized from `free -h` output (first "Mem:" line only).
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryInfo {
    pub total: Option<String>,
}

/// Parses `dmidecode -t system` output.
///
/// Lines that don't match a recognized key are ignored. Never fails on
/// malformed input; at worst every field stays `None`.
pub fn parse_system_info(output: &str) -> SystemInfo {
    let mut info = SystemInfo::default();
    for line in output.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Manufacturer:") {
            info.manufacturer = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("Product Name:") {
            info.product_name = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("Serial Number:") {
            info.serial_number = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("UUID:") {
            info.uuid = Some(value.trim().to_string());
        }
    }
    info
}

/// Parses `dmidecode -t bios` output.
pub fn parse_bios_info(output: &str) -> BiosInfo {
    let mut info = BiosInfo::default();
    for line in output.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Version:") {
            info.version = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("Release Date:") {
            info.date = Some(value.trim().to_string());
        }
    }
    info
}

/// Parses `lscpu` output.
pub fn parse_cpu_info(output: &str) -> CpuInfo {
    let mut info = CpuInfo::default();
    for line in output.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("Model name:") {
            info.model = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("CPU(s):") {
            info.cores = value.trim().parse().ok();
        }
    }
    info
}

/// Parses `free -h` output, reading the total column of the `Mem:` row.
pub fn parse_memory_info(output: &str) -> MemoryInfo {
    for line in output.lines() {
        if let Some(rest) = line.strip_prefix("Mem:") {
            if let Some(total) = rest.split_whitespace().next() {
                return MemoryInfo {
                    total: Some(total.to_string()),
                };
            }
        }
    }
    MemoryInfo::default()
}

/// Best-effort record returned when the table kind couldn't be identified
/// up front, e.g. when dispatching generically over raw command output.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UnknownTable;

/// Auto-detects which of the four tables `output` holds and parses it.
///
/// Unknown formats log a warning and return every field empty rather than
/// erroring — parsers never fail on a single bad table.
pub fn parse_auto(output: &str) -> DmidecodeRecord {
    if output.contains("System Information") {
        DmidecodeRecord::System(parse_system_info(output))
    } else if output.contains("BIOS Information") {
        DmidecodeRecord::Bios(parse_bios_info(output))
    } else if output.contains("Model name:") {
        DmidecodeRecord::Cpu(parse_cpu_info(output))
    } else if output.contains("Mem:") {
        DmidecodeRecord::Memory(parse_memory_info(output))
    } else {
        tracing::warn!("unknown dmidecode output format");
        DmidecodeRecord::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DmidecodeRecord {
    System(SystemInfo),
    Bios(BiosInfo),
    Cpu(CpuInfo),
    Memory(MemoryInfo),
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM_TABLE: &str = "\
# dmidecode 3.3
Handle 0x0001, DMI type 1, 27 bytes
System Information
\tManufacturer: Supermicro
\tProduct Name: SYS-2029U-TN24R4T
\tVersion: 0123456789
\tSerial Number: S123456X0
\tUUID: 4c4c4544-0031-3210-8032-b9c04f435631
\tWake-up Type: Power Switch
";

    const BIOS_TABLE: &str = "\
BIOS Information
\tVendor: American Megatrends International, LLC.
\tVersion: 3.4
\tRelease Date: 06/15/2023
";

    #[test]
    fn parses_system_table() {
        let info = parse_system_info(SYSTEM_TABLE);
        assert_eq!(info.manufacturer.as_deref(), Some("Supermicro"));
        assert_eq!(info.product_name.as_deref(), Some("SYS-2029U-TN24R4T"));
        assert_eq!(info.serial_number.as_deref(), Some("S123456X0"));
        assert_eq!(
            info.uuid.as_deref(),
            Some("4c4c4544-0031-3210-8032-b9c04f435631")
        );
    }

    #[test]
    fn parses_bios_table() {
        let info = parse_bios_info(BIOS_TABLE);
        assert_eq!(info.version.as_deref(), Some("3.4"));
        assert_eq!(info.date.as_deref(), Some("06/15/2023"));
    }

    #[test]
    fn parses_cpu_info() {
        let info = parse_cpu_info("Model name:            Intel(R) Xeon(R) Gold 6338\nCPU(s):                64\n");
        assert_eq!(info.model.as_deref(), Some("Intel(R) Xeon(R) Gold 6338"));
        assert_eq!(info.cores, Some(64));
    }

    #[test]
    fn cpu_cores_non_numeric_is_ignored() {
        let info = parse_cpu_info("CPU(s):                many\n");
        assert_eq!(info.cores, None);
    }

    #[test]
    fn parses_memory_info() {
        let info = parse_memory_info("              total        used\nMem:            251Gi        12Gi\n");
        assert_eq!(info.total.as_deref(), Some("251Gi"));
    }

    #[test]
    fn auto_detects_system_table() {
        matches!(parse_auto(SYSTEM_TABLE), DmidecodeRecord::System(_));
    }

    #[test]
    fn unrecognized_input_yields_unknown_not_error() {
        assert_eq!(parse_auto("garbage\nnot a table\n"), DmidecodeRecord::Unknown);
    }

    #[test]
    fn empty_input_never_panics() {
        assert_eq!(parse_system_info(""), SystemInfo::default());
        assert_eq!(parse_auto(""), DmidecodeRecord::Unknown);
    }
}
