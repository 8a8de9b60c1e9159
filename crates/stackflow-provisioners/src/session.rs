//! Remote session abstraction

use crate::connection::ConnectionArgs;
use crate::error::{ProvisionError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stackflow_dynamic::{RetryConfig, RetryError, retry};
use std::path::Path;

/// Captured output of one remote command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// An open connection to a remote host
#[async_trait]
pub trait SshSession: Send + Sync {
    /// Run a shell command and capture its output; non-zero exits are not errors here
    async fn exec(&self, command: &str) -> Result<CommandResult>;

    /// Copy a local file to `dest` on the remote host
    async fn copy_file(&self, src: &Path, dest: &str) -> Result<()>;
}

/// Opens sessions; a single attempt per call
#[async_trait]
pub trait SshConnector: Send + Sync {
    async fn connect(&self, conn: &ConnectionArgs) -> Result<Box<dyn SshSession>>;
}

/// Connect, retrying connection failures as configured
///
/// Hosts created earlier in the same run may not accept connections yet.
/// Errors other than [`ProvisionError::ConnectionFailed`] abort immediately.
pub async fn connect_with_retry(
    connector: &dyn SshConnector,
    conn: &ConnectionArgs,
    config: &RetryConfig,
) -> Result<Box<dyn SshSession>> {
    conn.ensure_ssh()?;

    let result = retry(
        config,
        |attempt| {
            tracing::debug!(host = %conn.host, attempt, "Connecting");
            connector.connect(conn)
        },
        ProvisionError::is_connection_error,
    )
    .await;

    match result {
        Ok(session) => Ok(session),
        Err(RetryError::Aborted(e)) => Err(e),
        Err(RetryError::Exhausted {
            attempts,
            last_error,
        }) => Err(ProvisionError::RetryExhausted {
            host: conn.host.clone(),
            attempts,
            last_error: last_error.to_string(),
        }),
    }
}
