//! Turns a target host and a set of credentials into the trait objects
//! handlers need (`ExecSession`, `RedfishSession`, `HostPing`).
//!
//! This workspace's `sessions` crate deliberately stops at the trait
//! contract for Redfish — it doesn't implement the wire protocol. Real
//! Redfish connectivity is therefore out of scope for this binary too;
//! [`SshSessionFactory::redfish_session`] returns an error so that's an
//! explicit, loud failure rather than a silent no-op.

use std::collections::HashMap;
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use async_ssh2_tokio::client::AuthMethod;
use async_trait::async_trait;
use firmware::HostPing;
use sessions::{ExecSession, RedfishSession, SshExecSession};

/// Same shape as [`workflow::Credentials`] — a free-form name/value map
/// (`username`, `password`, `ssh_key`, ...) rather than a fixed struct, so
/// handlers can pass `&ctx.credentials` straight through.
pub type Credentials = HashMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum SessionFactoryError {
    #[error("ssh connect to {0} failed: {1}")]
    Ssh(String, #[source] sessions::ExecError),
    #[error("redfish wire protocol is not implemented in this workspace")]
    RedfishUnavailable,
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn exec_session(&self, host: &str, credentials: &Credentials) -> Result<Arc<dyn ExecSession>, SessionFactoryError>;

    async fn redfish_session(&self, host: &str, credentials: &Credentials) -> Result<Arc<dyn RedfishSession>, SessionFactoryError>;

    fn host_ping(&self, host: &str) -> Arc<dyn HostPing>;
}

fn auth_method(credentials: &Credentials) -> AuthMethod {
    if let Some(key_path) = credentials.get("ssh_key") {
        AuthMethod::with_key_file(key_path, None)
    } else {
        AuthMethod::with_password(credentials.get("password").map(String::as_str).unwrap_or_default())
    }
}

pub struct SshSessionFactory {
    pub ssh_timeout: Duration,
}

#[async_trait]
impl SessionFactory for SshSessionFactory {
    async fn exec_session(&self, host: &str, credentials: &Credentials) -> Result<Arc<dyn ExecSession>, SessionFactoryError> {
        let username = credentials.get("username").map(String::as_str).unwrap_or("root");
        let auth = auth_method(credentials);
        let session = tokio::time::timeout(self.ssh_timeout, SshExecSession::connect(host, 22, username, auth))
            .await
            .map_err(|_| SessionFactoryError::Ssh(host.to_string(), sessions::ExecError::Connect("timed out".to_string())))?
            .map_err(|e| SessionFactoryError::Ssh(host.to_string(), e))?;
        Ok(Arc::new(session))
    }

    async fn redfish_session(&self, _host: &str, _credentials: &Credentials) -> Result<Arc<dyn RedfishSession>, SessionFactoryError> {
        Err(SessionFactoryError::RedfishUnavailable)
    }

    fn host_ping(&self, host: &str) -> Arc<dyn HostPing> {
        Arc::new(TcpHostPing { host: host.to_string() })
    }
}

/// Substitutes a TCP connect probe on port 22 for ICMP, which needs a raw
/// socket this workspace doesn't take a dependency for. Close enough for
/// "did the host come back up after a reboot".
pub struct TcpHostPing {
    host: String,
}

#[async_trait]
impl HostPing for TcpHostPing {
    async fn is_reachable(&self) -> bool {
        let Ok(mut addrs) = format!("{}:22", self.host).to_socket_addrs() else {
            return false;
        };
        let Some(addr) = addrs.next() else {
            return false;
        };
        tokio::time::timeout(Duration::from_secs(3), tokio::net::TcpStream::connect(addr))
            .await
            .map(|r| r.is_ok())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_host_reports_unreachable() {
        let ping = TcpHostPing {
            host: "203.0.113.1".to_string(),
        };
        assert!(!ping.is_reachable().await);
    }
}
