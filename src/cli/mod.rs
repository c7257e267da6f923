use crate::analysis::ModelClient;
use crate::auth::TokenManager;
use crate::config::Config;
use crate::docs::DriveClient;
use crate::pipeline::{self, Stores};
use crate::sheets::SheetsClient;
use crate::source::SourceClient;
use crate::global;
use anyhow::{Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "meetsync")]
#[command(about = "Meeting transcript archival and analysis pipeline", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Run all three stages once: sync, propagate, analyze
    Run,
    /// Print version information
    Version,
    /// Inspect the resolved configuration
    Config(ConfigCliArgs),
}

#[derive(ClapArgs, Debug)]
pub struct ConfigCliArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the current configuration with secrets masked
    Show,
}

pub async fn handle_run() -> Result<()> {
    let cfg = Config::load()?;

    let source_key = cfg.source.resolved_api_key().context(
        "Transcript source API key not configured (set source.api_key or MEETSYNC_SOURCE_API_KEY)",
    )?;
    let model_key = cfg.model.resolved_api_key().context(
        "Analysis model API key not configured (set model.api_key or MEETSYNC_MODEL_API_KEY)",
    )?;

    let auth = Arc::new(TokenManager::load(global::token_file()?)?);

    let source = SourceClient::new(
        cfg.source.base_url.clone(),
        source_key,
        cfg.source.page_size,
        cfg.source.fetch_cap,
    );
    let docs = DriveClient::new(auth.clone());
    let sheets = SheetsClient::new(auth);
    let model = ModelClient::new(cfg.model.name.clone(), model_key);

    let stores = Stores {
        source: &source,
        docs: &docs,
        sheets: &sheets,
        model: &model,
    };

    pipeline::run(&stores, &cfg).await?;
    Ok(())
}

pub fn handle_config_command(args: ConfigCliArgs) -> Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let cfg = Config::load()?;

            println!("Source:");
            println!("  base_url: {}", cfg.source.base_url);
            println!("  page_size: {}", cfg.source.page_size);
            println!("  fetch_cap: {}", cfg.source.fetch_cap);
            println!("  api_key: {}", mask(cfg.source.resolved_api_key()));
            println!("Model:");
            println!("  name: {}", cfg.model.name);
            println!("  api_key: {}", mask(cfg.model.resolved_api_key()));
            println!("  max_transcript_chars: {}", cfg.model.max_transcript_chars);
            println!("Drive:");
            println!("  archive_folder_id: {}", display_id(&cfg.drive.archive_folder_id));
            println!("Sheets:");
            println!(
                "  tracking: {} ({})",
                display_id(&cfg.sheets.tracking_spreadsheet_id),
                cfg.sheets.tracking_tab
            );
            println!(
                "  master: {} ({} / {})",
                display_id(&cfg.sheets.master_spreadsheet_id),
                cfg.sheets.master_tab,
                cfg.sheets.audit_tab
            );
            println!(
                "  prompts: {} ({})",
                display_id(&cfg.sheets.prompts_spreadsheet_id),
                cfg.sheets.prompts_cell
            );
            println!("Pipeline:");
            println!(
                "  analysis_window_rows: {}",
                cfg.pipeline.analysis_window_rows
            );
            println!("  master_match: {:?}", cfg.pipeline.master_match);
            println!("  flush_threshold: {}", cfg.pipeline.flush_threshold);
            println!("Limits:");
            println!(
                "  {} calls / {}s window, {} write retries",
                cfg.limits.calls_per_window, cfg.limits.window_secs, cfg.limits.write_retries
            );
        }
    }
    Ok(())
}

fn mask(secret: Option<String>) -> String {
    match secret {
        Some(s) if s.len() > 4 => {
            let prefix: String = s.chars().take(4).collect();
            format!("{}...", prefix)
        }
        Some(_) => "set".to_string(),
        None => "not set".to_string(),
    }
}

fn display_id(id: &str) -> &str {
    if id.is_empty() {
        "(not configured)"
    } else {
        id
    }
}
