use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub model: ModelConfig,
    pub drive: DriveConfig,
    pub sheets: SheetsConfig,
    pub columns: ColumnsConfig,
    pub pipeline: PipelineConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    /// Base URL for per-transcript deep links shown in the tracking sheet.
    pub view_base_url: String,
    pub page_size: usize,
    /// Hard cap on transcripts fetched per run.
    pub fetch_cap: usize,
    /// Bearer credential; MEETSYNC_SOURCE_API_KEY overrides.
    pub api_key: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.fireflies.ai/graphql".to_string(),
            view_base_url: "https://app.fireflies.ai/view".to_string(),
            page_size: 50,
            fetch_cap: 100,
            api_key: None,
        }
    }
}

impl SourceConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var("MEETSYNC_SOURCE_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    /// API key; MEETSYNC_MODEL_API_KEY overrides.
    pub api_key: Option<String>,
    /// Transcript text is truncated to this many characters before prompting.
    pub max_transcript_chars: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gemini-2.0-flash".to_string(),
            api_key: None,
            max_transcript_chars: 90_000,
        }
    }
}

impl ModelConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        std::env::var("MEETSYNC_MODEL_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Folder that holds one archive document per transcript.
    pub archive_folder_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetsConfig {
    pub tracking_spreadsheet_id: String,
    pub tracking_tab: String,
    pub master_spreadsheet_id: String,
    pub master_tab: String,
    /// Audit tab lives in the master spreadsheet, row-aligned with the master tab.
    pub audit_tab: String,
    pub prompts_spreadsheet_id: String,
    /// Cell holding the analysis prompt template ({transcript}/{brief} placeholders).
    pub prompts_cell: String,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            tracking_spreadsheet_id: String::new(),
            tracking_tab: "Sheet1".to_string(),
            master_spreadsheet_id: String::new(),
            master_tab: "Meeting_data".to_string(),
            audit_tab: "Audit_data".to_string(),
            prompts_spreadsheet_id: String::new(),
            prompts_cell: "Prompts!A1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnsConfig {
    /// Tracking tab column holding transcript ids (the dedupe key).
    pub tracking_transcript_id: String,
    pub master_calendar_id: String,
    pub master_archive_url: String,
    /// Must sit immediately right of the archive column; the pair is
    /// written as one range.
    pub master_duration: String,
    /// Optional per-meeting brief document link used as extra analysis context.
    pub master_brief_url: String,
    /// First column of the business analysis block in the master tab.
    pub business_block_start: String,
    pub audit_archive_url: String,
    /// Same adjacency constraint as the master pair.
    pub audit_duration: String,
    /// First column of the audit analysis block in the audit tab.
    pub audit_block_start: String,
    /// Header names resolved to column letters once per run.
    pub owner_sync_header: String,
    pub meeting_done_header: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            tracking_transcript_id: "C".to_string(),
            master_calendar_id: "A".to_string(),
            master_archive_url: "I".to_string(),
            master_duration: "J".to_string(),
            master_brief_url: "K".to_string(),
            business_block_start: "L".to_string(),
            audit_archive_url: "B".to_string(),
            audit_duration: "C".to_string(),
            audit_block_start: "D".to_string(),
            owner_sync_header: "Sheet Sync".to_string(),
            meeting_done_header: "Meeting Status".to_string(),
        }
    }
}

/// Which master row wins when several share a calendar id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    First,
    Latest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Only the most recent N master rows are scanned for analysis.
    pub analysis_window_rows: usize,
    pub master_match: MatchMode,
    /// Pacing delay after each analyzed record.
    pub record_delay_secs: u64,
    /// Queued range updates that trigger a bulk flush.
    pub flush_threshold: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analysis_window_rows: 300,
            master_match: MatchMode::First,
            record_delay_secs: 2,
            flush_threshold: 40,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Spreadsheet calls allowed inside one sliding window.
    pub calls_per_window: usize,
    pub window_secs: u64,
    /// Attempts per cell write before the record is abandoned for the run.
    pub write_retries: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            calls_per_window: 45,
            window_secs: 60,
            write_retries: 5,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
