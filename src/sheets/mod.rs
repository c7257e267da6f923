//! Spreadsheet store: capability trait, typed errors and the live
//! Sheets API client.
//!
//! The error type distinguishes throttling from everything else because
//! the retry policy in [`writer`] only ever retries throttled writes.

use crate::auth::TokenManager;
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub mod limiter;
pub mod range;
pub mod writer;

pub use limiter::RateLimiter;
pub use writer::BatchAccumulator;

const SHEETS_BASE_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

#[derive(Debug, thiserror::Error)]
pub enum SheetsError {
    /// HTTP 429 class response; the only retryable failure.
    #[error("Spreadsheet API rate limit exceeded")]
    RateLimited,
    #[error("Spreadsheet API error {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Spreadsheet API transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Authorization failed: {0}")]
    Auth(String),
}

/// One sparse cell-range write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeUpdate {
    pub range: String,
    pub rows: Vec<Vec<String>>,
}

impl RangeUpdate {
    pub fn new(range: impl Into<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            range: range.into(),
            rows,
        }
    }

    /// Convenience for the common single-cell case.
    pub fn cell(range: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            range: range.into(),
            rows: vec![vec![value.into()]],
        }
    }
}

#[async_trait]
pub trait SpreadsheetStore: Send + Sync {
    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SheetsError>;

    async fn set_range(
        &self,
        spreadsheet_id: &str,
        update: &RangeUpdate,
    ) -> Result<(), SheetsError>;

    /// One bulk call covering many sparse ranges.
    async fn batch_set(
        &self,
        spreadsheet_id: &str,
        updates: &[RangeUpdate],
    ) -> Result<(), SheetsError>;

    /// Append rows after the last populated row of the given table range.
    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SheetsError>;
}

pub struct SheetsClient {
    client: reqwest::Client,
    auth: Arc<TokenManager>,
    base_url: String,
}

impl SheetsClient {
    pub fn new(auth: Arc<TokenManager>) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth,
            base_url: SHEETS_BASE_URL.to_string(),
        }
    }

    async fn bearer(&self) -> Result<String, SheetsError> {
        self.auth
            .bearer()
            .await
            .map_err(|e| SheetsError::Auth(e.to_string()))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SheetsError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(SheetsError::RateLimited);
        }
        let message = response.text().await.unwrap_or_default();
        Err(SheetsError::Api {
            status: status.as_u16(),
            message,
        })
    }

    fn cell_to_string(value: &serde_json::Value) -> String {
        match value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[async_trait]
impl SpreadsheetStore for SheetsClient {
    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = format!("{}/{}/values/{}", self.base_url, spreadsheet_id, range);
        let response = self
            .client
            .get(&url)
            .bearer_auth(self.bearer().await?)
            .send()
            .await?;
        let response = Self::check(response).await?;

        let body: serde_json::Value = response.json().await?;
        let rows: Vec<Vec<String>> = body["values"]
            .as_array()
            .map(|raw| {
                raw.iter()
                    .map(|row| {
                        row.as_array()
                            .map(|cells| cells.iter().map(Self::cell_to_string).collect())
                            .unwrap_or_default()
                    })
                    .collect()
            })
            .unwrap_or_default();

        debug!("Retrieved {} rows from {}", rows.len(), range);
        Ok(rows)
    }

    async fn set_range(
        &self,
        spreadsheet_id: &str,
        update: &RangeUpdate,
    ) -> Result<(), SheetsError> {
        let url = format!(
            "{}/{}/values/{}?valueInputOption=RAW",
            self.base_url, spreadsheet_id, update.range
        );
        let response = self
            .client
            .put(&url)
            .bearer_auth(self.bearer().await?)
            .json(&json!({ "values": update.rows }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn batch_set(
        &self,
        spreadsheet_id: &str,
        updates: &[RangeUpdate],
    ) -> Result<(), SheetsError> {
        let data: Vec<serde_json::Value> = updates
            .iter()
            .map(|u| json!({ "range": u.range, "values": u.rows }))
            .collect();
        let url = format!("{}/{}/values:batchUpdate", self.base_url, spreadsheet_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.bearer().await?)
            .json(&json!({ "valueInputOption": "RAW", "data": data }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn append_rows(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: &[Vec<String>],
    ) -> Result<(), SheetsError> {
        let url = format!(
            "{}/{}/values/{}:append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
            self.base_url, spreadsheet_id, range
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.bearer().await?)
            .json(&json!({ "values": rows }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
