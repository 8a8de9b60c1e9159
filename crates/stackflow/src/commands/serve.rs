use stackflow_dynamic::RetryConfig;
use std::time::Duration;
use tokio::io::BufReader;

pub async fn handle(retry_attempts: u32, retry_interval: u64) -> anyhow::Result<()> {
    if retry_attempts == 0 {
        anyhow::bail!("--retry-attempts must be at least 1");
    }

    let retry = RetryConfig::fixed(retry_attempts, Duration::from_secs(retry_interval));
    let host = super::build_host(retry);

    tracing::info!(
        providers = ?host.type_tokens().collect::<Vec<_>>(),
        "Serving lifecycle requests on stdio"
    );

    let handled = stackflow_dynamic::serve(
        &host,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;

    tracing::info!(handled, "Provider host stopped");
    Ok(())
}
