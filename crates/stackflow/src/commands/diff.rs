use anyhow::Context;
use colored::Colorize;
use stackflow_dynamic::{PropertyMap, ResourceId, RetryConfig, StepKind};
use std::path::Path;

fn load_inputs(path: &Path) -> anyhow::Result<PropertyMap> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(PropertyMap::from_value(value)?)
}

pub async fn handle(type_token: &str, olds: &Path, news: &Path) -> anyhow::Result<()> {
    let host = super::build_host(RetryConfig::default());
    let provider = host.provider(type_token)?;

    let olds = load_inputs(olds)?;
    let news = load_inputs(news)?;
    let diff = provider
        .diff(&ResourceId::new("preview"), &olds, &news)
        .await?;

    let step = diff.step();
    let label = match step {
        StepKind::Same => step.to_string().green(),
        StepKind::Update => step.to_string().yellow(),
        StepKind::Replace | StepKind::DeleteReplace => step.to_string().red(),
    };
    println!("{} {}", provider.display_name().bold(), label);

    for key in &diff.replaces {
        println!("  {} {}", "±".red(), key);
    }
    for key in stackflow_dynamic::changed_keys(&olds, &news, &[]) {
        if !diff.replaces.contains(&key) {
            println!("  {} {}", "~".yellow(), key);
        }
    }
    Ok(())
}
