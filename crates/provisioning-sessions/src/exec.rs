//! Command execution over a remote or local shell.

use std::sync::Mutex;

use async_ssh2_tokio::client::{AuthMethod, Client, ServerCheckMethod};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("ssh connect failed: {0}")]
    Connect(String),
    #[error("command execution failed: {0}")]
    Execute(String),
    #[error("session already closed")]
    Closed,
}

/// Output of a completed command, mirroring `subprocess.run`'s three fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// A session capable of running commands against a host.
///
/// Implementations own whatever connection state they need and must release
/// it on every exit path — including early return and panic unwind via
/// `Drop` — so a caller that gives up on a command never leaks a socket.
#[async_trait]
pub trait ExecSession: Send + Sync {
    async fn exec(&self, command: &str, use_sudo: bool) -> Result<ExecOutput, ExecError>;

    /// Convenience wrapper returning stdout only, erroring on non-zero exit.
    async fn exec_checked(&self, command: &str, use_sudo: bool) -> Result<String, ExecError> {
        let output = self.exec(command, use_sudo).await?;
        if !output.success() {
            return Err(ExecError::Execute(format!(
                "`{command}` exited {}: {}",
                output.exit_code, output.stderr
            )));
        }
        Ok(output.stdout)
    }
}

fn wrap_sudo(command: &str, use_sudo: bool) -> String {
    if use_sudo {
        format!("sudo {command}")
    } else {
        command.to_string()
    }
}

/// SSH-backed [`ExecSession`] using password or key auth.
pub struct SshExecSession {
    client: Client,
}

impl SshExecSession {
    pub async fn connect(
        host: &str,
        port: u16,
        username: &str,
        auth: AuthMethod,
    ) -> Result<Self, ExecError> {
        let client = Client::connect(
            (host, port),
            username,
            auth,
            ServerCheckMethod::NoCheck,
        )
        .await
        .map_err(|e| ExecError::Connect(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ExecSession for SshExecSession {
    async fn exec(&self, command: &str, use_sudo: bool) -> Result<ExecOutput, ExecError> {
        let full = wrap_sudo(command, use_sudo);
        tracing::debug!(command = %full, "executing remote command");
        let result = self
            .client
            .execute(&full)
            .await
            .map_err(|e| ExecError::Execute(e.to_string()))?;
        Ok(ExecOutput {
            stdout: result.stdout,
            stderr: result.stderr,
            exit_code: result.exit_status as i32,
        })
    }
}

/// In-process session that replays canned responses, keyed by exact command
/// string. Used by tests and by any caller that wants to run against a host
/// it's already local to without an SSH round trip.
pub struct LocalExecSession {
    responses: Mutex<Vec<(String, ExecOutput)>>,
}

impl LocalExecSession {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(self, command: impl Into<String>, output: ExecOutput) -> Self {
        self.responses
            .lock()
            .expect("lock poisoned")
            .push((command.into(), output));
        self
    }
}

impl Default for LocalExecSession {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecSession for LocalExecSession {
    async fn exec(&self, command: &str, use_sudo: bool) -> Result<ExecOutput, ExecError> {
        let full = wrap_sudo(command, use_sudo);
        let responses = self.responses.lock().expect("lock poisoned");
        responses
            .iter()
            .find(|(cmd, _)| cmd == &full || cmd == command)
            .map(|(_, output)| output.clone())
            .ok_or_else(|| ExecError::Execute(format!("no canned response for `{full}`")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_output(stdout: &str) -> ExecOutput {
        ExecOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    #[tokio::test]
    async fn local_session_replays_canned_response() {
        let session = LocalExecSession::new().with_response("dmidecode -t system", ok_output("ok"));
        let out = session.exec("dmidecode -t system", false).await.unwrap();
        assert_eq!(out.stdout, "ok");
    }

    #[tokio::test]
    async fn local_session_matches_sudo_wrapped_command() {
        let session =
            LocalExecSession::new().with_response("sudo dmidecode -t system", ok_output("ok"));
        let out = session.exec("dmidecode -t system", true).await.unwrap();
        assert_eq!(out.stdout, "ok");
    }

    #[tokio::test]
    async fn unmatched_command_errors() {
        let session = LocalExecSession::new();
        let result = session.exec("whatever", false).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn exec_checked_errors_on_nonzero_exit() {
        let session = LocalExecSession::new().with_response(
            "false",
            ExecOutput {
                stdout: String::new(),
                stderr: "boom".to_string(),
                exit_code: 1,
            },
        );
        let result = session.exec_checked("false", false).await;
        assert!(result.is_err());
    }
}
