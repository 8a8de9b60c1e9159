//! RemoteExec: run commands on a freshly created host

use crate::connection::ConnectionArgs;
use crate::error::{ProvisionError, Result};
use crate::session::{CommandResult, SshConnector, connect_with_retry};
use async_trait::async_trait;
use stackflow_dynamic::{
    CreateResult, DiffPolicy, DynamicError, PropertyMap, ResourceId, ResourceProvider,
    RetryConfig,
};
use std::sync::Arc;

pub const REMOTE_EXEC_TYPE: &str = "stackflow:provisioners:RemoteExec";

/// Output key holding one [`CommandResult`] per executed command
pub const RESULTS_KEY: &str = "results";

/// Runs `command` or `commands` over `conn`, in order, stopping at the first failure
pub struct RemoteExecProvider {
    connector: Arc<dyn SshConnector>,
    retry: RetryConfig,
}

impl RemoteExecProvider {
    pub fn new(connector: Arc<dyn SshConnector>) -> Self {
        Self {
            connector,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn run(&self, conn: &ConnectionArgs, commands: &[String]) -> Result<Vec<CommandResult>> {
        let session = connect_with_retry(self.connector.as_ref(), conn, &self.retry).await?;

        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            let result = session.exec(command).await?;
            tracing::debug!(host = %conn.host, code = result.code, "Command finished");

            if !result.success() {
                tracing::warn!(
                    host = %conn.host,
                    code = result.code,
                    stderr = %result.stderr.trim(),
                    "Remote command failed"
                );
                return Err(ProvisionError::CommandFailed {
                    code: result.code,
                    stderr: result.stderr,
                });
            }
            results.push(result);
        }

        tracing::info!(host = %conn.host, commands = results.len(), "Remote commands completed");
        Ok(results)
    }
}

/// Exactly one of `command` and `commands` must be given
fn commands(inputs: &PropertyMap) -> stackflow_dynamic::Result<Vec<String>> {
    let single = inputs.get_as::<String>("command");
    let many = inputs.get_as::<Vec<String>>("commands");

    match (single, many) {
        (Some(_), Some(_)) => Err(DynamicError::invalid_input(
            "commands",
            "specify either command or commands, not both",
        )),
        (Some(command), None) => Ok(vec![command]),
        (None, Some(commands)) if !commands.is_empty() => Ok(commands),
        (None, Some(_)) => Err(DynamicError::invalid_input("commands", "must not be empty")),
        (None, None) => {
            if inputs.contains_key("command") || inputs.contains_key("commands") {
                Err(DynamicError::invalid_input(
                    "commands",
                    "command must be a string and commands a list of strings",
                ))
            } else {
                Err(DynamicError::MissingInput("command".to_string()))
            }
        }
    }
}

#[async_trait]
impl ResourceProvider for RemoteExecProvider {
    fn type_token(&self) -> &str {
        REMOTE_EXEC_TYPE
    }

    fn display_name(&self) -> &str {
        "RemoteExec"
    }

    fn diff_policy(&self) -> DiffPolicy {
        DiffPolicy::replace_any().ignoring([RESULTS_KEY])
    }

    async fn create(&self, inputs: &PropertyMap) -> stackflow_dynamic::Result<CreateResult> {
        let conn: ConnectionArgs = inputs.require_as("conn")?;
        let commands = commands(inputs)?;

        let results = self
            .run(&conn, &commands)
            .await
            .map_err(|e| e.into_create_error())?;

        let mut outs = inputs.clone();
        outs.insert(RESULTS_KEY, serde_json::to_value(results)?);

        Ok(CreateResult {
            id: ResourceId::uuid(),
            outs,
        })
    }

    async fn delete(&self, _id: &ResourceId, _inputs: &PropertyMap) -> stackflow_dynamic::Result<()> {
        Ok(())
    }
}
