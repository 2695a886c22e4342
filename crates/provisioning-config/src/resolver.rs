use std::collections::HashMap;

use discovery::{Classification, HardwareReport};

use crate::profile::{BiosTemplate, DeviceMapping, DeviceProfile, FirmwareTemplate};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse {document}: {source}")]
    Parse {
        document: &'static str,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Holds the three loaded configuration documents and answers
/// classification/resolution queries against them.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    device_mappings: HashMap<String, DeviceMapping>,
    bios_templates: HashMap<String, BiosTemplate>,
    firmware_templates: HashMap<String, FirmwareTemplate>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_device_mappings(&mut self, yaml: &str) -> Result<(), ConfigError> {
        self.device_mappings = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            document: "device_mappings.yaml",
            source,
        })?;
        Ok(())
    }

    pub fn load_bios_templates(&mut self, yaml: &str) -> Result<(), ConfigError> {
        self.bios_templates = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            document: "bios template",
            source,
        })?;
        Ok(())
    }

    pub fn load_firmware_templates(&mut self, yaml: &str) -> Result<(), ConfigError> {
        self.firmware_templates =
            serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
                document: "firmware_repository.yaml",
                source,
            })?;
        Ok(())
    }

    pub fn list_device_types(&self) -> Vec<&str> {
        self.device_mappings.keys().map(String::as_str).collect()
    }

    pub fn get_device(&self, device_type: &str) -> Option<&DeviceMapping> {
        self.device_mappings.get(device_type)
    }

    /// Matches `report.system.{manufacturer, product_name}` against every
    /// mapping's `(vendor, motherboard)` pair. Confidence is `1.0` when
    /// both match, `0.7` when only the manufacturer matches, `0.0`
    /// otherwise — never an error, even with an empty mapping set.
    pub fn classify(&self, report: &HardwareReport) -> Classification {
        let Some(manufacturer) = report.system.manufacturer.as_deref() else {
            return Classification::default();
        };
        let motherboard = report.system.product_name.as_deref();

        let mut best: Option<(&str, f64, Vec<String>)> = None;
        for (device_type, mapping) in &self.device_mappings {
            if !mapping.vendor.eq_ignore_ascii_case(manufacturer) {
                continue;
            }
            let (confidence, criteria) = match motherboard {
                Some(mb) if mapping.motherboard.eq_ignore_ascii_case(mb) => {
                    (1.0, vec!["vendor".to_string(), "motherboard".to_string()])
                }
                _ => (0.7, vec!["vendor".to_string()]),
            };
            if best.as_ref().map(|(_, c, _)| confidence > *c).unwrap_or(true) {
                best = Some((device_type, confidence, criteria));
            }
        }

        match best {
            Some((device_type, confidence, criteria)) => Classification {
                device_type: Some(device_type.to_string()),
                confidence,
                matching_criteria: criteria,
            },
            None => Classification::default(),
        }
    }

    /// Combines the three documents into a [`DeviceProfile`]. Absent
    /// entries leave the corresponding section empty rather than erroring.
    pub fn resolve(&self, device_type: &str) -> DeviceProfile {
        let mapping = self.device_mappings.get(device_type);
        let bios = self.bios_templates.get(device_type).cloned().unwrap_or_default();
        let firmware = self
            .firmware_templates
            .get(device_type)
            .cloned()
            .unwrap_or_default();

        DeviceProfile {
            device_type: device_type.to_string(),
            vendor: mapping.map(|m| m.vendor.clone()).unwrap_or_default(),
            motherboard: mapping.map(|m| m.motherboard.clone()).unwrap_or_default(),
            hardware_specs: mapping.map(|m| m.hardware_specs.clone()).unwrap_or_default(),
            bios_template: bios.settings,
            bios_preserve: bios.preserve,
            bios_method_hints: bios.method_hints,
            firmware_plan: firmware.firmware_plan,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use discovery::{HardwareReport, SystemSummary};

    const DEVICE_MAPPINGS: &str = "\
a1.c5.large:
  vendor: Supermicro
  motherboard: SYS-2029U
  hardware_specs:
    cpu_name: Xeon Gold 6338
    ram_gb: \"256\"
  description: Large compute node
";

    const BIOS_TEMPLATE: &str = "\
a1.c5.large:
  settings:
    BootMode: Uefi
  preserve:
    - SerialNumber
  method_hints:
    BootMode: redfish
";

    const FIRMWARE_TEMPLATE: &str = "\
a1.c5.large:
  firmware_plan:
    - component: BMC
      required_version: \"2.78\"
      priority: critical
      requires_reboot: false
      estimated_seconds: 300
";

    fn report_for(manufacturer: &str, product_name: &str) -> HardwareReport {
        let mut report = HardwareReport::empty("host1", Utc::now());
        report.system = SystemSummary {
            manufacturer: Some(manufacturer.to_string()),
            product_name: Some(product_name.to_string()),
            ..Default::default()
        };
        report
    }

    fn loaded_resolver() -> ConfigResolver {
        let mut resolver = ConfigResolver::new();
        resolver.load_device_mappings(DEVICE_MAPPINGS).unwrap();
        resolver.load_bios_templates(BIOS_TEMPLATE).unwrap();
        resolver.load_firmware_templates(FIRMWARE_TEMPLATE).unwrap();
        resolver
    }

    #[test]
    fn exact_match_has_full_confidence() {
        let resolver = loaded_resolver();
        let classification = resolver.classify(&report_for("Supermicro", "SYS-2029U"));
        assert_eq!(classification.device_type.as_deref(), Some("a1.c5.large"));
        assert_eq!(classification.confidence, 1.0);
    }

    #[test]
    fn manufacturer_only_match_has_partial_confidence() {
        let resolver = loaded_resolver();
        let classification = resolver.classify(&report_for("Supermicro", "UNKNOWN-BOARD"));
        assert_eq!(classification.confidence, 0.7);
    }

    #[test]
    fn no_match_yields_zero_confidence_and_no_device_type() {
        let resolver = loaded_resolver();
        let classification = resolver.classify(&report_for("ACME", "Z9"));
        assert_eq!(classification.confidence, 0.0);
        assert_eq!(classification.device_type, None);
    }

    #[test]
    fn resolve_combines_all_three_documents() {
        let resolver = loaded_resolver();
        let profile = resolver.resolve("a1.c5.large");
        assert_eq!(profile.vendor, "Supermicro");
        assert!(profile.bios_preserve.contains("SerialNumber"));
        assert_eq!(profile.firmware_plan.len(), 1);
    }

    #[test]
    fn resolve_missing_device_type_yields_empty_profile_not_error() {
        let resolver = loaded_resolver();
        let profile = resolver.resolve("unknown.device");
        assert!(profile.vendor.is_empty());
        assert!(profile.bios_template.is_empty());
        assert!(profile.firmware_plan.is_empty());
    }
}
