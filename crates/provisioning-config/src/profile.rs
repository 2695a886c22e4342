use std::collections::{HashMap, HashSet};

use serde::Deserialize;

/// One entry of the `device_mappings.yaml` document.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceMapping {
    pub vendor: String,
    pub motherboard: String,
    #[serde(default)]
    pub hardware_specs: HashMap<String, String>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiosMethod {
    Redfish,
    VendorTool,
    Hybrid,
}

/// One entry of a `bios/templates/<device_type>.yaml` document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BiosTemplate {
    #[serde(default)]
    pub settings: HashMap<String, serde_yaml::Value>,
    #[serde(default)]
    pub preserve: HashSet<String>,
    #[serde(default)]
    pub method_hints: HashMap<String, BiosMethod>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FirmwareComponent {
    Bmc,
    Bios,
    Cpld,
    Nic,
    Uefi,
}

impl FirmwareComponent {
    /// Ordering rank used when sorting a firmware plan: BMC < BIOS < CPLD < NIC < UEFI.
    pub fn rank(self) -> u8 {
        match self {
            FirmwareComponent::Bmc => 0,
            FirmwareComponent::Bios => 1,
            FirmwareComponent::Cpld => 2,
            FirmwareComponent::Nic => 3,
            FirmwareComponent::Uefi => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FirmwarePriority {
    Critical,
    High,
    Normal,
    Low,
}

impl FirmwarePriority {
    /// Ordering rank: critical < high < normal < low.
    pub fn rank(self) -> u8 {
        match self {
            FirmwarePriority::Critical => 0,
            FirmwarePriority::High => 1,
            FirmwarePriority::Normal => 2,
            FirmwarePriority::Low => 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FirmwarePlanEntry {
    pub component: FirmwareComponent,
    pub required_version: String,
    pub priority: FirmwarePriority,
    #[serde(default)]
    pub requires_reboot: bool,
    pub estimated_seconds: u64,
}

/// A `firmware/firmware_repository.yaml` entry: one ordered plan per
/// device type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FirmwareTemplate {
    #[serde(default)]
    pub firmware_plan: Vec<FirmwarePlanEntry>,
}

/// The fully resolved per-device configuration plan: the combination of
/// a device mapping, its BIOS template, and its firmware template.
///
/// A device type absent from one or more documents still produces a
/// `DeviceProfile` — the missing piece is simply empty.
#[derive(Debug, Clone, Default)]
pub struct DeviceProfile {
    pub device_type: String,
    pub vendor: String,
    pub motherboard: String,
    pub hardware_specs: HashMap<String, String>,
    pub bios_template: HashMap<String, serde_yaml::Value>,
    pub bios_preserve: HashSet<String>,
    pub bios_method_hints: HashMap<String, BiosMethod>,
    pub firmware_plan: Vec<FirmwarePlanEntry>,
}
