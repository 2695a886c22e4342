use figment::providers::{Env, Format, Toml};
use figment::Figment;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_true")]
    pub auto_migrate: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SshConfig {
    pub username: String,
    #[serde(default = "default_ssh_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_history_events")]
    pub history_events_per_instance: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaasConfig {
    pub host: String,
    pub consumer_key: String,
    pub token_key: String,
    pub token_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    pub database: DatabaseConfig,
    pub ssh: SshConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    pub maas: MaasConfig,
}

fn default_true() -> bool {
    true
}

fn default_ssh_timeout() -> u64 {
    30
}

fn default_max_concurrent() -> usize {
    16
}

fn default_history_events() -> usize {
    workflow::DEFAULT_HISTORY_CAPACITY
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            history_events_per_instance: default_history_events(),
        }
    }
}

/// Loads `RuntimeConfig` from a TOML file at `path`, overridable by
/// `PROVISIOND_`-prefixed environment variables (e.g.
/// `PROVISIOND_DATABASE.PATH`), mirroring the teacher's
/// `Figment::new().merge(Toml::file(...)).merge(Env::prefixed(...))`
/// pattern.
pub fn load(path: &str) -> Result<RuntimeConfig, figment::Error> {
    Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("PROVISIOND_").split("__"))
        .extract()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_runtime_config_from_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[database]
path = "provisioning.db"

[ssh]
username = "root"

[maas]
host = "maas.example.internal"
consumer_key = "ck"
token_key = "tk"
token_secret = "ts"
"#
        )
        .unwrap();

        let config = load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.database.path, "provisioning.db");
        assert!(config.database.auto_migrate);
        assert_eq!(config.ssh.timeout_seconds, 30);
        assert_eq!(config.workflow.max_concurrent, 16);
        assert_eq!(config.maas.host, "maas.example.internal");
    }

    #[test]
    fn env_override_wins_over_file_value() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[database]
path = "provisioning.db"

[ssh]
username = "root"

[maas]
host = "maas.example.internal"
consumer_key = "ck"
token_key = "tk"
token_secret = "ts"
"#
        )
        .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("PROVISIOND_DATABASE.PATH", "/override/path.db");
            let config = load(file.path().to_str().unwrap()).unwrap();
            assert_eq!(config.database.path, "/override/path.db");
            Ok(())
        });
    }
}
