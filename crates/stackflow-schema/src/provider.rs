//! Schema: a SQL schema provisioned by a creation script and removed by a deletion script

use crate::client::{SqlClient, SqlEngine, SqlTarget};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stackflow_dynamic::{
    CreateResult, DiffPolicy, DynamicError, PropertyMap, ResourceId, ResourceProvider,
};
use std::fmt;
use std::sync::Arc;

pub const SCHEMA_TYPE: &str = "stackflow:schema:Schema";

/// Inputs whose change requires dropping and recreating the schema
pub const CRITICAL_INPUTS: [&str; 3] = ["server_address", "database_name", "creation_script"];

/// Typed view of the resource inputs
///
/// Create needs the server, database and creation script. Credentials fall
/// back to the client's defaults, and the deletion script is only read by
/// delete.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaInputs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_password: Option<String>,
    pub server_address: String,
    pub database_name: String,
    pub creation_script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_script: Option<String>,
    #[serde(default)]
    pub engine: SqlEngine,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl fmt::Debug for SchemaInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaInputs")
            .field("creator_name", &self.creator_name)
            .field(
                "creator_password",
                &self.creator_password.as_ref().map(|_| "[secret]"),
            )
            .field("server_address", &self.server_address)
            .field("database_name", &self.database_name)
            .field("engine", &self.engine)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl SchemaInputs {
    pub fn target(&self) -> SqlTarget {
        SqlTarget {
            engine: self.engine,
            host: self.server_address.clone(),
            port: self.port.unwrap_or(self.engine.default_port()),
            database: self.database_name.clone(),
            user: self.creator_name.clone(),
            password: self.creator_password.clone(),
        }
    }

    /// Property map for a declaration; the password is marked secret
    pub fn to_properties(&self) -> stackflow_dynamic::Result<PropertyMap> {
        let mut props = PropertyMap::from_serializable(self)?;
        props.mark_secret("creator_password");
        Ok(props)
    }
}

/// Dynamic provider running schema scripts through a [`SqlClient`]
pub struct SchemaProvider {
    client: Arc<dyn SqlClient>,
}

impl SchemaProvider {
    pub fn new(client: Arc<dyn SqlClient>) -> Self {
        Self { client }
    }

    async fn run_creation(&self, inputs: &PropertyMap) -> Result<SchemaInputs> {
        let schema: SchemaInputs = inputs.to_typed()?;
        self.client
            .execute(&schema.target(), &schema.creation_script)
            .await?;
        Ok(schema)
    }

    async fn run_deletion(&self, inputs: &PropertyMap) -> Result<SchemaInputs> {
        let schema: SchemaInputs = inputs.to_typed()?;
        let script = schema
            .deletion_script
            .as_deref()
            .ok_or_else(|| DynamicError::MissingInput("deletion_script".to_string()))?;
        self.client.execute(&schema.target(), script).await?;
        Ok(schema)
    }
}

#[async_trait]
impl ResourceProvider for SchemaProvider {
    fn type_token(&self) -> &str {
        SCHEMA_TYPE
    }

    fn display_name(&self) -> &str {
        "Schema"
    }

    fn diff_policy(&self) -> DiffPolicy {
        DiffPolicy::replace_on(CRITICAL_INPUTS)
    }

    async fn create(&self, inputs: &PropertyMap) -> stackflow_dynamic::Result<CreateResult> {
        let schema = self
            .run_creation(inputs)
            .await
            .map_err(|e| e.into_create_error())?;

        let id = ResourceId::random_hex(schema.engine.id_prefix());
        tracing::info!(
            id = %id,
            host = %schema.server_address,
            database = %schema.database_name,
            "Schema created"
        );

        Ok(CreateResult {
            id,
            outs: inputs.clone(),
        })
    }

    async fn delete(&self, id: &ResourceId, inputs: &PropertyMap) -> stackflow_dynamic::Result<()> {
        let schema = self
            .run_deletion(inputs)
            .await
            .map_err(|e| e.into_delete_error())?;

        tracing::info!(
            id = %id,
            host = %schema.server_address,
            database = %schema.database_name,
            "Schema deleted"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;
    use crate::scripts::{VOTES_MYSQL_CREATE, VOTES_MYSQL_DELETE};
    use stackflow_dynamic::{DynamicError, StepKind};
    use std::collections::BTreeSet;
    use std::sync::Mutex;

    /// Applies scripts to an in-memory set of table names
    #[derive(Default)]
    struct FakeDatabase {
        tables: Mutex<BTreeSet<String>>,
        executed: Mutex<Vec<(SqlTarget, String)>>,
    }

    #[async_trait]
    impl SqlClient for FakeDatabase {
        async fn execute(&self, target: &SqlTarget, script: &str) -> Result<()> {
            self.executed
                .lock()
                .unwrap()
                .push((target.clone(), script.to_string()));

            let mut tables = self.tables.lock().unwrap();
            if script.contains("CREATE TABLE votesTable") {
                if !tables.insert("votesTable".to_string()) {
                    return Err(SchemaError::ScriptFailed {
                        engine: target.engine.to_string(),
                        host: target.host.clone(),
                        code: 1,
                        stderr: "Table 'votesTable' already exists".to_string(),
                    });
                }
            } else if script.contains("DROP TABLE votesTable") {
                tables.remove("votesTable");
            }
            Ok(())
        }
    }

    fn inputs(script: &str) -> PropertyMap {
        SchemaInputs {
            creator_name: Some("admin".to_string()),
            creator_password: Some("hunter2".to_string()),
            server_address: "db.example.com".to_string(),
            database_name: "votes".to_string(),
            creation_script: script.to_string(),
            deletion_script: Some(VOTES_MYSQL_DELETE.to_string()),
            engine: SqlEngine::Mysql,
            port: None,
        }
        .to_properties()
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_returns_schema_id_and_echoes_inputs() {
        let db = Arc::new(FakeDatabase::default());
        let provider = SchemaProvider::new(db.clone());

        let created = provider.create(&inputs(VOTES_MYSQL_CREATE)).await.unwrap();

        let hex = created.id.as_str().strip_prefix("schema-").unwrap();
        assert_eq!(hex.len(), 32);
        assert_eq!(created.outs, inputs(VOTES_MYSQL_CREATE));
        assert!(created.outs.is_secret("creator_password"));

        let executed = db.executed.lock().unwrap();
        assert_eq!(executed[0].0.port, 3306);
        assert_eq!(executed[0].0.user.as_deref(), Some("admin"));
        assert_eq!(executed[0].1, VOTES_MYSQL_CREATE);
    }

    #[tokio::test]
    async fn test_create_then_delete_leaves_nothing_behind() {
        let db = Arc::new(FakeDatabase::default());
        let provider = SchemaProvider::new(db.clone());
        let inputs = inputs(VOTES_MYSQL_CREATE);

        let created = provider.create(&inputs).await.unwrap();
        assert!(db.tables.lock().unwrap().contains("votesTable"));

        provider.delete(&created.id, &created.outs).await.unwrap();
        assert!(db.tables.lock().unwrap().is_empty());

        // The same inputs can be created again
        provider.create(&inputs).await.unwrap();
    }

    #[tokio::test]
    async fn test_script_failure_aborts_create() {
        let db = Arc::new(FakeDatabase::default());
        let provider = SchemaProvider::new(db);
        provider.create(&inputs(VOTES_MYSQL_CREATE)).await.unwrap();

        let err = provider.create(&inputs(VOTES_MYSQL_CREATE)).await.unwrap_err();
        match err {
            DynamicError::CreateFailed(message) => assert!(message.contains("already exists")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_input_is_reported() {
        let provider = SchemaProvider::new(Arc::new(FakeDatabase::default()));
        let mut inputs = inputs(VOTES_MYSQL_CREATE);
        inputs.remove("creation_script");

        let err = provider.create(&inputs).await.unwrap_err();
        assert!(matches!(err, DynamicError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_minimal_inputs_create_and_diff() {
        let db = Arc::new(FakeDatabase::default());
        let provider = SchemaProvider::new(db.clone());
        let olds = PropertyMap::new()
            .with("server_address", "db.example.com")
            .with("database_name", "votes")
            .with("creation_script", "CREATE TABLE votesTable (id int)");

        let created = provider.create(&olds).await.unwrap();
        assert!(!created.id.as_str().is_empty());
        assert_eq!(created.outs, olds);
        assert_eq!(db.executed.lock().unwrap()[0].0.user, None);

        let news = olds.clone().with("creation_script", "CREATE TABLE votesTable (id bigint)");
        let diff = provider.diff(&created.id, &created.outs, &news).await.unwrap();
        assert!(diff.changes);
        assert_eq!(diff.replaces, vec!["creation_script"]);
    }

    #[tokio::test]
    async fn test_delete_requires_deletion_script() {
        let db = Arc::new(FakeDatabase::default());
        let provider = SchemaProvider::new(db.clone());
        let mut inputs = inputs(VOTES_MYSQL_CREATE);
        inputs.remove("deletion_script");

        let err = provider
            .delete(&ResourceId::new("schema-1"), &inputs)
            .await
            .unwrap_err();
        assert!(matches!(err, DynamicError::MissingInput(key) if key == "deletion_script"));
        assert!(db.executed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_diff_on_critical_inputs() {
        let provider = SchemaProvider::new(Arc::new(FakeDatabase::default()));
        let id = ResourceId::random_hex("schema-");
        let olds = inputs("CREATE TABLE t (id int)");

        let same = provider.diff(&id, &olds, &olds.clone()).await.unwrap();
        assert_eq!(same.step(), StepKind::Same);

        let news = inputs("CREATE TABLE t (id bigint)");
        let diff = provider.diff(&id, &olds, &news).await.unwrap();
        assert!(diff.changes);
        assert_eq!(diff.replaces, vec!["creation_script"]);
        assert!(diff.delete_before_replace);

        let mut renamed = olds.clone();
        renamed.insert("creator_name", "operator");
        let diff = provider.diff(&id, &olds, &renamed).await.unwrap();
        assert_eq!(diff.step(), StepKind::Update);

        let updated = provider.update(&id, &olds, &renamed).await.unwrap();
        assert_eq!(updated.outs, renamed);
    }

    #[tokio::test]
    async fn test_postgres_engine() {
        let db = Arc::new(FakeDatabase::default());
        let provider = SchemaProvider::new(db.clone());
        let mut inputs = inputs("CREATE SCHEMA voting_app");
        inputs.insert("engine", "postgres");
        inputs.insert("port", 2000);

        let created = provider.create(&inputs).await.unwrap();

        assert!(created.id.as_str().starts_with("postgresqlSchema-"));
        let executed = db.executed.lock().unwrap();
        assert_eq!(executed[0].0.engine, SqlEngine::Postgres);
        assert_eq!(executed[0].0.port, 2000);
    }
}
