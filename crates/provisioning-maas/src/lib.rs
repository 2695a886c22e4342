//! Trait contracts for the external collaborators the workflow engine
//! consumes: the MaaS controller, a per-target credentials source, and
//! the firmware file repository. No production client lives here.

mod client;
mod credentials;
mod firmware_repository;

pub use client::{MaasClient, MaasError, Machine, MockMaasClient, PowerState};
pub use credentials::{Credentials, CredentialsError, CredentialsProvider, StaticCredentialsProvider};
pub use firmware_repository::{FilesystemFirmwareRepository, FirmwareRepository, FirmwareRepositoryError};
