pub mod config;
pub mod diff;
pub mod providers;
pub mod serve;

use stackflow_dynamic::{ProviderHost, RetryConfig};
use stackflow_provisioners::OpenSsh;
use stackflow_schema::{CliSqlClient, SchemaProvider};
use std::sync::Arc;

/// Every provider this binary serves
pub fn build_host(retry: RetryConfig) -> ProviderHost {
    let mut host =
        ProviderHost::new().with_provider(Arc::new(SchemaProvider::new(Arc::new(CliSqlClient::new()))));

    for provider in stackflow_provisioners::providers(Arc::new(OpenSsh::default()), retry) {
        host.register(provider);
    }
    host
}
