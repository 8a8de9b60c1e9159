mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stackflow")]
#[command(
    about = "Custom resource providers for declarative infrastructure",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve lifecycle requests as newline-delimited JSON over stdin/stdout
    Serve {
        /// Connection attempts before a provisioner gives up
        #[arg(long, env = "STACKFLOW_RETRY_ATTEMPTS", default_value = "24")]
        retry_attempts: u32,
        /// Seconds between connection attempts
        #[arg(long, env = "STACKFLOW_RETRY_INTERVAL", default_value = "5")]
        retry_interval: u64,
    },
    /// Read and write stack configuration
    #[command(subcommand)]
    Config(ConfigCommands),
    /// List the resource types this binary provides
    Providers,
    /// Show how a change of inputs would be applied
    Diff {
        /// Resource type token (e.g. stackflow:schema:Schema)
        type_token: String,
        /// JSON file with the current inputs
        olds: PathBuf,
        /// JSON file with the desired inputs
        news: PathBuf,
    },
    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print a configuration value
    Get {
        /// Key, optionally qualified as namespace:key
        key: String,
        /// Print secure values in plaintext
        #[arg(long)]
        show_secrets: bool,
        #[command(flatten)]
        scope: commands::config::Scope,
    },
    /// Set a configuration value
    Set {
        /// Key, optionally qualified as namespace:key
        key: String,
        value: String,
        /// Encrypt the value with STACKFLOW_SECRETS_KEY
        #[arg(long)]
        secret: bool,
        #[command(flatten)]
        scope: commands::config::Scope,
    },
    /// List all configuration values
    List {
        /// Print secure values in plaintext
        #[arg(long)]
        show_secrets: bool,
        #[command(flatten)]
        scope: commands::config::Scope,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries protocol lines in serve mode, so logs always go to stderr
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Serve {
            retry_attempts,
            retry_interval,
        } => commands::serve::handle(retry_attempts, retry_interval).await,
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Get {
                key,
                show_secrets,
                scope,
            } => commands::config::handle_get(&scope, &key, show_secrets),
            ConfigCommands::Set {
                key,
                value,
                secret,
                scope,
            } => commands::config::handle_set(&scope, &key, &value, secret),
            ConfigCommands::List {
                show_secrets,
                scope,
            } => commands::config::handle_list(&scope, show_secrets),
        },
        Commands::Providers => {
            commands::providers::handle();
            Ok(())
        }
        Commands::Diff {
            type_token,
            olds,
            news,
        } => commands::diff::handle(&type_token, &olds, &news).await,
        Commands::Version => {
            println!("stackflow {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
