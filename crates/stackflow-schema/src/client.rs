//! SQL execution through the database CLI clients

use crate::error::{Result, SchemaError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Database engine behind a schema
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlEngine {
    #[default]
    Mysql,
    Postgres,
}

impl SqlEngine {
    pub fn default_port(&self) -> u16 {
        match self {
            SqlEngine::Mysql => 3306,
            SqlEngine::Postgres => 5432,
        }
    }

    /// Name of the CLI client binary
    pub fn client_program(&self) -> &'static str {
        match self {
            SqlEngine::Mysql => "mysql",
            SqlEngine::Postgres => "psql",
        }
    }

    /// Prefix of the resource ids this engine's schemas get
    pub fn id_prefix(&self) -> &'static str {
        match self {
            SqlEngine::Mysql => "schema-",
            SqlEngine::Postgres => "postgresqlSchema-",
        }
    }

    fn password_env(&self) -> &'static str {
        match self {
            SqlEngine::Mysql => "MYSQL_PWD",
            SqlEngine::Postgres => "PGPASSWORD",
        }
    }
}

impl fmt::Display for SqlEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlEngine::Mysql => write!(f, "mysql"),
            SqlEngine::Postgres => write!(f, "postgres"),
        }
    }
}

/// Where and as whom a script runs
#[derive(Clone, PartialEq, Eq)]
pub struct SqlTarget {
    pub engine: SqlEngine,
    pub host: String,
    pub port: u16,
    pub database: String,
    /// Login user; the client's own default when absent
    pub user: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for SqlTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlTarget")
            .field("engine", &self.engine)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[secret]"))
            .finish()
    }
}

/// Runs SQL scripts against a database
#[async_trait]
pub trait SqlClient: Send + Sync {
    async fn execute(&self, target: &SqlTarget, script: &str) -> Result<()>;
}

/// [`SqlClient`] driving `mysql` / `psql`
///
/// The script goes to the client's stdin and the password through
/// `MYSQL_PWD` / `PGPASSWORD`, so neither shows up in process listings.
#[derive(Debug, Clone, Default)]
pub struct CliSqlClient {
    program_override: Option<String>,
}

impl CliSqlClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific client binary regardless of engine
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program_override: Some(program.into()),
        }
    }

    fn program(&self, engine: SqlEngine) -> &str {
        self.program_override
            .as_deref()
            .unwrap_or(engine.client_program())
    }

    /// Client arguments; never includes the password
    pub fn args(target: &SqlTarget) -> Vec<String> {
        let mut args = vec![
            "--host".to_string(),
            target.host.clone(),
            "--port".to_string(),
            target.port.to_string(),
        ];

        match target.engine {
            SqlEngine::Mysql => {
                if let Some(user) = &target.user {
                    args.push("--user".to_string());
                    args.push(user.clone());
                }
                args.push("--database".to_string());
                args.push(target.database.clone());
                args.push("--batch".to_string());
            }
            SqlEngine::Postgres => {
                if let Some(user) = &target.user {
                    args.push("--username".to_string());
                    args.push(user.clone());
                }
                args.extend(
                    [
                        "--dbname",
                        target.database.as_str(),
                        "--no-password",
                        "--no-psqlrc",
                        "--quiet",
                        "--set",
                        "ON_ERROR_STOP=1",
                    ]
                    .map(String::from),
                );
            }
        }
        args
    }
}

#[async_trait]
impl SqlClient for CliSqlClient {
    async fn execute(&self, target: &SqlTarget, script: &str) -> Result<()> {
        let program = self.program(target.engine);
        let args = Self::args(target);

        tracing::debug!("Running: {} {}", program, args.join(" "));

        let mut cmd = Command::new(program);
        cmd.args(&args);
        if let Some(password) = &target.password {
            cmd.env(target.engine.password_env(), password);
        }
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SchemaError::ClientNotFound(program.to_string()),
            _ => SchemaError::Io(e),
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(script.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(SchemaError::ScriptFailed {
                engine: target.engine.to_string(),
                host: target.host.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(engine: SqlEngine) -> SqlTarget {
        SqlTarget {
            engine,
            host: "db.example.com".to_string(),
            port: engine.default_port(),
            database: "votes".to_string(),
            user: Some("admin".to_string()),
            password: Some("hunter2".to_string()),
        }
    }

    #[test]
    fn test_mysql_args() {
        let args = CliSqlClient::args(&target(SqlEngine::Mysql));
        assert_eq!(
            args,
            vec![
                "--host", "db.example.com", "--port", "3306", "--user", "admin", "--database",
                "votes", "--batch"
            ]
        );
    }

    #[test]
    fn test_client_default_user() {
        let target = SqlTarget {
            user: None,
            password: None,
            ..target(SqlEngine::Mysql)
        };
        let args = CliSqlClient::args(&target);
        assert!(!args.contains(&"--user".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--batch"));
    }

    #[test]
    fn test_password_stays_out_of_args_and_debug() {
        for engine in [SqlEngine::Mysql, SqlEngine::Postgres] {
            let target = target(engine);
            assert!(!CliSqlClient::args(&target).iter().any(|a| a.contains("hunter2")));
            assert!(!format!("{:?}", target).contains("hunter2"));
        }
    }

    #[test]
    fn test_postgres_stops_on_error() {
        let args = CliSqlClient::args(&target(SqlEngine::Postgres));
        assert!(args.windows(2).any(|w| w == ["--set", "ON_ERROR_STOP=1"]));
        assert!(args.contains(&"5432".to_string()));
    }

    #[tokio::test]
    async fn test_missing_client_binary() {
        let client = CliSqlClient::with_program("/nonexistent/stackflow-mysql");
        let err = client
            .execute(&target(SqlEngine::Mysql), "SELECT 1")
            .await
            .unwrap_err();

        assert!(matches!(err, SchemaError::ClientNotFound(p) if p == "/nonexistent/stackflow-mysql"));
    }
}
