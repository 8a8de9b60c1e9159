//! CopyFile: copy a local file to a freshly created host

use crate::connection::ConnectionArgs;
use crate::error::Result;
use crate::session::{SshConnector, connect_with_retry};
use async_trait::async_trait;
use stackflow_dynamic::{
    CreateResult, DiffPolicy, PropertyMap, ResourceId, ResourceProvider, RetryConfig,
};
use std::path::PathBuf;
use std::sync::Arc;

pub const COPY_FILE_TYPE: &str = "stackflow:provisioners:CopyFile";

/// Copies `src` (local) to `dest` (remote) over `conn`
///
/// Any input change replaces the resource, which copies the file again.
/// Delete leaves the remote file in place.
pub struct CopyFileProvider {
    connector: Arc<dyn SshConnector>,
    retry: RetryConfig,
}

impl CopyFileProvider {
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

    async fn copy(&self, inputs: &PropertyMap) -> Result<()> {
        let conn: ConnectionArgs = inputs.require_as("conn")?;
        let src = PathBuf::from(inputs.require_str("src")?);
        let dest = inputs.require_str("dest")?;

        let session = connect_with_retry(self.connector.as_ref(), &conn, &self.retry).await?;
        session.copy_file(&src, dest).await?;

        tracing::info!(host = %conn.host, src = %src.display(), dest, "Copied file");
        Ok(())
    }
}

#[async_trait]
impl ResourceProvider for CopyFileProvider {
    fn type_token(&self) -> &str {
        COPY_FILE_TYPE
    }

    fn display_name(&self) -> &str {
        "CopyFile"
    }

    fn diff_policy(&self) -> DiffPolicy {
        DiffPolicy::replace_any()
    }

    async fn create(&self, inputs: &PropertyMap) -> stackflow_dynamic::Result<CreateResult> {
        self.copy(inputs)
            .await
            .map_err(|e| e.into_create_error())?;

        Ok(CreateResult {
            id: ResourceId::uuid(),
            outs: inputs.clone(),
        })
    }

    async fn delete(&self, _id: &ResourceId, _inputs: &PropertyMap) -> stackflow_dynamic::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::fake::FakeConnector;
    use serde_json::json;
    use stackflow_dynamic::{DynamicError, StepKind};

    fn inputs(dest: &str) -> PropertyMap {
        PropertyMap::new()
            .with_secret(
                "conn",
                json!({"host": "10.0.0.5", "username": "ec2-user", "private_key": "k"}),
            )
            .with("src", "myapp.conf")
            .with("dest", dest)
    }

    fn provider(connector: Arc<FakeConnector>) -> CopyFileProvider {
        CopyFileProvider::new(connector).with_retry(RetryConfig::immediate(24))
    }

    #[tokio::test]
    async fn test_create_copies_and_echoes_inputs() {
        let connector = Arc::new(FakeConnector {
            unreachable_for: 2,
            ..Default::default()
        });
        let provider = provider(Arc::clone(&connector));

        let created = provider.create(&inputs("myapp.conf")).await.unwrap();

        assert_eq!(created.id.as_str().len(), 32);
        assert_eq!(created.outs, inputs("myapp.conf"));
        assert_eq!(
            connector.copies(),
            vec![("myapp.conf".to_string(), "myapp.conf".to_string())]
        );
    }

    #[tokio::test]
    async fn test_missing_dest() {
        let provider = provider(Arc::new(FakeConnector::default()));
        let mut inputs = inputs("x");
        inputs.remove("dest");

        let err = provider.create(&inputs).await.unwrap_err();
        assert!(matches!(err, DynamicError::MissingInput(k) if k == "dest"));
    }

    #[tokio::test]
    async fn test_unreachable_host_exhausts_retries() {
        let connector = Arc::new(FakeConnector {
            unreachable_for: u32::MAX,
            ..Default::default()
        });
        let provider =
            CopyFileProvider::new(connector.clone()).with_retry(RetryConfig::immediate(3));

        let err = provider.create(&inputs("x")).await.unwrap_err();
        assert!(matches!(err, DynamicError::RetryExhausted { attempts: 3, .. }));
        assert!(connector.copies().is_empty());
    }

    #[tokio::test]
    async fn test_any_change_replaces() {
        let provider = provider(Arc::new(FakeConnector::default()));
        let id = ResourceId::uuid();

        let diff = provider
            .diff(&id, &inputs("a.conf"), &inputs("b.conf"))
            .await
            .unwrap();
        assert_eq!(diff.replaces, vec!["dest"]);
        assert_eq!(diff.step(), StepKind::DeleteReplace);

        provider.delete(&id, &inputs("a.conf")).await.unwrap();
    }
}
