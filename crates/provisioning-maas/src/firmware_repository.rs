use std::path::PathBuf;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum FirmwareRepositoryError {
    #[error("no firmware file for {vendor}/{component}/{version}")]
    NotFound {
        vendor: String,
        component: String,
        version: String,
    },
}

/// Resolves a vendor/component/version triple to a filesystem path laid
/// out as `<root>/<vendor>/<component>/<filename>`. File contents are
/// opaque to the engine; acquisition (signed URLs, checksums) is
/// intentionally out of scope here.
#[async_trait]
pub trait FirmwareRepository: Send + Sync {
    async fn resolve(&self, vendor: &str, component: &str, version: &str) -> Result<PathBuf, FirmwareRepositoryError>;
}

pub struct FilesystemFirmwareRepository {
    root: PathBuf,
}

impl FilesystemFirmwareRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl FirmwareRepository for FilesystemFirmwareRepository {
    async fn resolve(&self, vendor: &str, component: &str, version: &str) -> Result<PathBuf, FirmwareRepositoryError> {
        let dir = self.root.join(vendor).join(component);
        let candidate = dir.join(version);
        if candidate.exists() {
            return Ok(candidate);
        }
        // Accept any filename inside the version-less component directory
        // whose stem matches the requested version; layouts in the wild
        // keep vendor-specific extensions (.bin, .cap, .fwpkg).
        if let Ok(entries) = std::fs::read_dir(&dir) {
            for entry in entries.flatten() {
                let path = entry.path();
                if path.file_stem().and_then(|s| s.to_str()) == Some(version) {
                    return Ok(path);
                }
            }
        }
        Err(FirmwareRepositoryError::NotFound {
            vendor: vendor.to_string(),
            component: component.to_string(),
            version: version.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn resolves_exact_filename_match() {
        let dir = tempfile::tempdir().unwrap();
        let component_dir = dir.path().join("supermicro").join("bios");
        fs::create_dir_all(&component_dir).unwrap();
        fs::write(component_dir.join("2.3.1"), b"firmware-bytes").unwrap();

        let repo = FilesystemFirmwareRepository::new(dir.path());
        let resolved = repo.resolve("supermicro", "bios", "2.3.1").await.unwrap();
        assert_eq!(resolved, component_dir.join("2.3.1"));
    }

    #[tokio::test]
    async fn resolves_by_file_stem_when_extension_present() {
        let dir = tempfile::tempdir().unwrap();
        let component_dir = dir.path().join("dell").join("bmc");
        fs::create_dir_all(&component_dir).unwrap();
        fs::write(component_dir.join("1.0.0.cap"), b"firmware-bytes").unwrap();

        let repo = FilesystemFirmwareRepository::new(dir.path());
        let resolved = repo.resolve("dell", "bmc", "1.0.0").await.unwrap();
        assert_eq!(resolved, component_dir.join("1.0.0.cap"));
    }

    #[tokio::test]
    async fn missing_firmware_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FilesystemFirmwareRepository::new(dir.path());
        assert!(matches!(
            repo.resolve("hpe", "nic", "9.9.9").await,
            Err(FirmwareRepositoryError::NotFound { .. })
        ));
    }
}
