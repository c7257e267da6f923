use anyhow::Result;
use clap::Parser;
use meetsync::cli::{self, Cli, CliCommand};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_level = if cli.verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(CliCommand::Version) => {
            println!("meetsync {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Some(CliCommand::Config(args)) => cli::handle_config_command(args),
        Some(CliCommand::Run) | None => cli::handle_run().await,
    }
}
