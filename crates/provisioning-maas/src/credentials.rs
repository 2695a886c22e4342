use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub ssh_key: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("no credentials available for {0}")]
    NotFound(String),
}

/// Supplies per-target credentials; opaque to the engine beyond this
/// shape. A static map is enough for tests — production wiring (vault,
/// secrets manager) happens outside this crate.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    async fn credentials_for(&self, target: &str) -> Result<Credentials, CredentialsError>;
}

pub struct StaticCredentialsProvider {
    credentials: Credentials,
}

impl StaticCredentialsProvider {
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentialsProvider {
    async fn credentials_for(&self, _target: &str) -> Result<Credentials, CredentialsError> {
        Ok(self.credentials.clone())
    }
}
