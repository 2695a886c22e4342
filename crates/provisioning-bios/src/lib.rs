//! BIOS configuration coordinator: pulls current settings, decides per
//! setting whether to apply via Redfish or a vendor CLI tool, pushes the
//! result, and verifies what stuck.

mod coordinator;
mod value;
mod vendor_tool;

pub use coordinator::{validate, pull, push, reset_to_defaults, BiosError, Diff, PushResult};
pub use vendor_tool::{MockVendorBiosTool, VendorBiosTool};
