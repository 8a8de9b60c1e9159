//! StackFlow provisioners
//!
//! Dynamic providers that finish setting up hosts created earlier in the
//! same run: copying files onto them and running commands on them over SSH.
//!
//! - **CopyFile** (`stackflow:provisioners:CopyFile`): `conn`, `src`, `dest`
//! - **RemoteExec** (`stackflow:provisioners:RemoteExec`): `conn`, `command` | `commands`
//!
//! Both connect with bounded retry (24 attempts, 5 seconds apart by default)
//! since a new host rarely accepts SSH the moment its id is known.

pub mod connection;
pub mod copy_file;
pub mod error;
pub mod openssh;
pub mod remote_exec;
pub mod session;

pub use connection::{ConnectionArgs, ConnectionType, decode_private_key};
pub use copy_file::{COPY_FILE_TYPE, CopyFileProvider};
pub use error::{ProvisionError, Result};
pub use openssh::{OpenSsh, OpenSshSession};
pub use remote_exec::{REMOTE_EXEC_TYPE, RESULTS_KEY, RemoteExecProvider};
pub use session::{CommandResult, SshConnector, SshSession, connect_with_retry};

use stackflow_dynamic::{ResourceProvider, RetryConfig};
use std::sync::Arc;

/// Both provisioners sharing one connector and retry policy
pub fn providers(
    connector: Arc<dyn SshConnector>,
    retry: RetryConfig,
) -> Vec<Arc<dyn ResourceProvider>> {
    vec![
        Arc::new(CopyFileProvider::new(Arc::clone(&connector)).with_retry(retry.clone())),
        Arc::new(RemoteExecProvider::new(connector).with_retry(retry)),
    ]
}
