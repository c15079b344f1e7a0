use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use jc_nag::{Nagger, NagConfig, RunMode};
use tracing::info;

/// Nag journal club owners about stale records.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process at most one record and print the run summary as JSON
    Run {
        /// Use the sandbox repository and mail domain; only the sentinel record is eligible
        #[arg(long, default_value_t = false)]
        sandbox: bool,

        /// Render and address the message without sending or writing anything
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Serve the HTTP trigger
    Serve {
        #[arg(long, default_value = "0.0.0.0:8080")]
        bind: String,

        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = NagConfig::from_env().context("Invalid configuration")?;

    match args.command {
        Command::Run { sandbox, dry_run } => {
            let mode = if sandbox {
                RunMode::Sandbox
            } else {
                RunMode::Production
            };
            info!(%mode, dry_run, repo = config.repo_for(mode), "jc-nag starting");

            let nagger = Nagger::from_config(&config, mode, dry_run)?;
            let summary = nagger.run_once(Utc::now()).await?;
            println!("{}", serde_json::to_string(&summary)?);
        }
        Command::Serve { bind, dry_run } => {
            jc_nag::server::serve(config, &bind, dry_run).await?;
        }
    }

    Ok(())
}
