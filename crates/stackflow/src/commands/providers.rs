use colored::Colorize;
use stackflow_dynamic::RetryConfig;

pub fn handle() {
    let host = super::build_host(RetryConfig::default());

    println!("{}", "Resource providers:".bold());
    for provider in host.providers() {
        println!(
            "  {} {}",
            provider.type_token().cyan(),
            format!("({})", provider.display_name()).dimmed()
        );
    }
}
