//! Assembles the standard workflow templates from a static step registry.
//! Step handler implementations (wiring to MaaS, discovery, BIOS, and
//! firmware crates) are the embedding binary's responsibility — this
//! crate only knows step names, descriptions, and ordering.

mod registry;
mod templates;

pub use registry::{registry, step, StepRegistration};
pub use templates::{
    basic_provisioning, basic_provisioning_with_force_commission, bios_only, by_name,
    firmware_first, ipmi_only, UnknownTemplate,
};
