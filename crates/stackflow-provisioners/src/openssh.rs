//! OpenSSH CLI wrapper
//!
//! Drives the system `ssh` and `scp` binaries. Credentials never appear on
//! the command line: the private key is written to a private temporary
//! directory and passwords/passphrases are answered by an `SSH_ASKPASS`
//! helper that reads them from the child's environment.

use crate::connection::ConnectionArgs;
use crate::error::{ProvisionError, Result};
use crate::session::{CommandResult, SshConnector, SshSession};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;

/// Exit status ssh and scp use for their own (connection) failures
const SSH_CONNECTION_FAILURE: i32 = 255;

/// stderr markers of failures a retry cannot fix
const AUTH_FAILURE_MARKERS: [&str; 2] = ["Permission denied", "Host key verification failed"];

const ASKPASS_SECRET_ENV: &str = "STACKFLOW_SSH_ASKPASS_SECRET";
const ASKPASS_SCRIPT: &str = "#!/bin/sh\nprintf '%s\\n' \"$STACKFLOW_SSH_ASKPASS_SECRET\"\n";

/// Connector backed by the OpenSSH client binaries
#[derive(Debug, Clone)]
pub struct OpenSsh {
    ssh_program: String,
    scp_program: String,
    connect_timeout_secs: u32,
}

impl Default for OpenSsh {
    fn default() -> Self {
        Self {
            ssh_program: "ssh".to_string(),
            scp_program: "scp".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl OpenSsh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use different client binaries (e.g. absolute paths)
    pub fn with_programs(mut self, ssh: impl Into<String>, scp: impl Into<String>) -> Self {
        self.ssh_program = ssh.into();
        self.scp_program = scp.into();
        self
    }

    pub fn with_connect_timeout(mut self, secs: u32) -> Self {
        self.connect_timeout_secs = secs;
        self
    }
}

#[async_trait]
impl SshConnector for OpenSsh {
    async fn connect(&self, conn: &ConnectionArgs) -> Result<Box<dyn SshSession>> {
        conn.ensure_ssh()?;
        let session = OpenSshSession::prepare(self, conn)?;

        // Prove the host accepts us before handing the session out
        let probe = session.run_ssh("true").await?;
        if probe.code == SSH_CONNECTION_FAILURE {
            return Err(session.ssh_failure(&probe.stderr));
        }
        if !probe.success() {
            return Err(ProvisionError::ConnectionFailed {
                host: conn.host.clone(),
                message: format!("probe exited with {}", probe.code),
            });
        }

        tracing::info!(host = %conn.host, port = conn.port(), "SSH connection established");
        Ok(Box::new(session))
    }
}

/// Session state: connection options plus the private files backing them
pub struct OpenSshSession {
    ssh_program: String,
    scp_program: String,
    host: String,
    destination: String,
    port: u16,
    connect_timeout_secs: u32,
    key_path: Option<PathBuf>,
    askpass: Option<(PathBuf, String)>,
    // Removed on drop along with the key and askpass helper
    _workdir: TempDir,
}

impl OpenSshSession {
    fn prepare(client: &OpenSsh, conn: &ConnectionArgs) -> Result<Self> {
        let workdir = tempfile::Builder::new().prefix("stackflow-ssh-").tempdir()?;

        let key_path = match conn.decoded_private_key()? {
            Some(pem) => {
                let path = workdir.path().join("id");
                write_private_file(&path, &pem, 0o600)?;
                Some(path)
            }
            None => None,
        };

        // A passphrase unlocks the key; otherwise a password logs in
        let secret = conn
            .private_key_passphrase
            .clone()
            .filter(|_| key_path.is_some())
            .or_else(|| conn.password.clone());
        let askpass = match secret {
            Some(secret) => {
                let path = workdir.path().join("askpass");
                write_private_file(&path, ASKPASS_SCRIPT, 0o700)?;
                Some((path, secret))
            }
            None => None,
        };

        Ok(Self {
            ssh_program: client.ssh_program.clone(),
            scp_program: client.scp_program.clone(),
            host: conn.host.clone(),
            destination: conn.destination(),
            port: conn.port(),
            connect_timeout_secs: client.connect_timeout_secs,
            key_path,
            askpass,
            _workdir: workdir,
        })
    }

    /// Options shared by ssh and scp
    fn common_options(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            "-o".to_string(),
            "LogLevel=ERROR".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
        ];

        if self.askpass.is_none() {
            args.push("-o".to_string());
            args.push("BatchMode=yes".to_string());
        }

        if let Some(key) = &self.key_path {
            args.push("-i".to_string());
            args.push(key.display().to_string());
            args.push("-o".to_string());
            args.push("IdentitiesOnly=yes".to_string());
        }

        args
    }

    fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = self.common_options();
        args.push("-p".to_string());
        args.push(self.port.to_string());
        args.push(self.destination.clone());
        args.push("--".to_string());
        args.push(command.to_string());
        args
    }

    fn scp_args(&self, src: &Path, dest: &str) -> Vec<String> {
        let mut args = self.common_options();
        args.push("-P".to_string());
        args.push(self.port.to_string());
        args.push(src.display().to_string());
        args.push(format!("{}:{}", self.destination, dest));
        args
    }

    fn command(&self, program: &str, args: &[String]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        if let Some((helper, secret)) = &self.askpass {
            cmd.env("SSH_ASKPASS", helper);
            cmd.env("SSH_ASKPASS_REQUIRE", "force");
            cmd.env(ASKPASS_SECRET_ENV, secret);
        }
        cmd
    }

    /// Classify a failure of ssh itself; only unreachable hosts are worth retrying
    fn ssh_failure(&self, stderr: &str) -> ProvisionError {
        let message = stderr.trim().to_string();
        if AUTH_FAILURE_MARKERS.iter().any(|m| stderr.contains(m)) {
            ProvisionError::AuthFailed {
                host: self.host.clone(),
                message,
            }
        } else {
            ProvisionError::ConnectionFailed {
                host: self.host.clone(),
                message,
            }
        }
    }

    async fn run_ssh(&self, command: &str) -> Result<CommandResult> {
        tracing::debug!(
            "Running: {} -p {} {} -- {}",
            self.ssh_program,
            self.port,
            self.destination,
            command
        );

        let output = self
            .command(&self.ssh_program, &self.ssh_args(command))
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let code = output.status.code().unwrap_or(-1);

        Ok(CommandResult {
            stdout,
            stderr,
            code,
        })
    }
}

#[async_trait]
impl SshSession for OpenSshSession {
    /// The connection was proven by [`OpenSsh::connect`], so a 255 here is
    /// the remote command's own exit status
    async fn exec(&self, command: &str) -> Result<CommandResult> {
        self.run_ssh(command).await
    }

    async fn copy_file(&self, src: &Path, dest: &str) -> Result<()> {
        tracing::debug!(
            "Running: {} -P {} {} {}:{}",
            self.scp_program,
            self.port,
            src.display(),
            self.destination,
            dest
        );

        let output = self
            .command(&self.scp_program, &self.scp_args(src, dest))
            .output()
            .await?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        // scp reports both connection and transfer errors as 1; a refused
        // connection still mentions ssh in its message
        if output.status.code() == Some(SSH_CONNECTION_FAILURE) || stderr.contains("ssh:") {
            return Err(self.ssh_failure(&stderr));
        }

        Err(ProvisionError::CopyFailed {
            dest: dest.to_string(),
            message: stderr.trim().to_string(),
        })
    }
}

fn write_private_file(path: &Path, content: &str, mode: u32) -> Result<()> {
    std::fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))?;
    }
    #[cfg(not(unix))]
    let _ = mode;
    Ok(())
}
