//! Document store: archive documents live in one Drive folder, tagged
//! with their transcript id via app properties, and flip a `processed`
//! property once analysis has been written back.

use crate::auth::TokenManager;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

pub const TRANSCRIPT_TAG: &str = "transcript_id";
pub const PROCESSED_TAG: &str = "processed";

const DRIVE_BASE_URL: &str = "https://www.googleapis.com/drive/v3";
const DOCS_BASE_URL: &str = "https://docs.googleapis.com/v1";
const DOC_MIME_TYPE: &str = "application/vnd.google-apps.document";

/// Handle to a created archive document.
#[derive(Debug, Clone)]
pub struct ArchivedDoc {
    pub id: String,
    pub url: String,
}

/// Extract the document id from a `/d/<id>` style web link.
pub fn doc_id_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/d/")?;
    let id: String = rest
        .chars()
        .take_while(|c| *c != '/' && *c != '?' && *c != '#')
        .collect();
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Map of transcript id to web link for every tagged document in
    /// the folder. Built once per run to avoid a lookup per transcript.
    async fn list_tagged(&self, folder_id: &str) -> Result<HashMap<String, String>>;

    /// Create a document in the folder, write the body, and tag it
    /// with the transcript id.
    async fn create_document(
        &self,
        folder_id: &str,
        name: &str,
        body: &str,
        transcript_id: &str,
    ) -> Result<ArchivedDoc>;

    /// Full plain-text content of a document.
    async fn document_text(&self, doc_id: &str) -> Result<String>;

    async fn is_processed(&self, doc_id: &str) -> Result<bool>;

    /// Flip the processed property to true. Called strictly after the
    /// analysis data write succeeds.
    async fn mark_processed(&self, doc_id: &str) -> Result<()>;
}

pub struct DriveClient {
    client: reqwest::Client,
    auth: Arc<TokenManager>,
    drive_base: String,
    docs_base: String,
}

impl DriveClient {
    pub fn new(auth: Arc<TokenManager>) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth,
            drive_base: DRIVE_BASE_URL.to_string(),
            docs_base: DOCS_BASE_URL.to_string(),
        }
    }

    async fn bearer(&self) -> Result<String> {
        self.auth.bearer().await
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(anyhow!("{} failed with status {}: {}", what, status, body))
    }
}

#[async_trait]
impl DocumentStore for DriveClient {
    async fn list_tagged(&self, folder_id: &str) -> Result<HashMap<String, String>> {
        let query = format!(
            "'{}' in parents and mimeType='{}' and trashed=false",
            folder_id, DOC_MIME_TYPE
        );

        let mut map = HashMap::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(format!("{}/files", self.drive_base))
                .bearer_auth(self.bearer().await?)
                .query(&[
                    ("q", query.as_str()),
                    ("fields", "nextPageToken, files(id, name, webViewLink, appProperties)"),
                    ("pageSize", "1000"),
                ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let response = request.send().await.context("Failed to list documents")?;
            let response = Self::check(response, "Document listing").await?;
            let body: serde_json::Value = response
                .json()
                .await
                .context("Failed to parse document listing")?;

            if let Some(files) = body["files"].as_array() {
                for file in files {
                    let Some(id) = file["id"].as_str() else {
                        continue;
                    };
                    let Some(transcript_id) = file["appProperties"][TRANSCRIPT_TAG].as_str()
                    else {
                        continue;
                    };
                    let url = file["webViewLink"]
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("https://docs.google.com/document/d/{}", id));
                    map.insert(transcript_id.to_string(), url);
                }
            }

            page_token = body["nextPageToken"].as_str().map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }

        info!("Found {} tagged archive documents", map.len());
        Ok(map)
    }

    async fn create_document(
        &self,
        folder_id: &str,
        name: &str,
        body: &str,
        transcript_id: &str,
    ) -> Result<ArchivedDoc> {
        let metadata = json!({
            "name": name,
            "mimeType": DOC_MIME_TYPE,
            "parents": [folder_id],
            "appProperties": { TRANSCRIPT_TAG: transcript_id },
        });

        let response = self
            .client
            .post(format!("{}/files", self.drive_base))
            .bearer_auth(self.bearer().await?)
            .query(&[("fields", "id, name")])
            .json(&metadata)
            .send()
            .await
            .context("Failed to create document")?;
        let response = Self::check(response, "Document creation").await?;
        let created: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse document creation response")?;
        let doc_id = created["id"]
            .as_str()
            .ok_or_else(|| anyhow!("Document creation response carried no id"))?
            .to_string();

        debug!("Created archive document {} ({})", name, doc_id);

        if !body.is_empty() {
            let insert = json!({
                "requests": [
                    { "insertText": { "location": { "index": 1 }, "text": body } }
                ]
            });
            let response = self
                .client
                .post(format!("{}/documents/{}:batchUpdate", self.docs_base, doc_id))
                .bearer_auth(self.bearer().await?)
                .json(&insert)
                .send()
                .await
                .context("Failed to write document body")?;
            Self::check(response, "Document body write").await?;
        }

        info!(
            "Archived transcript {} as document {}",
            transcript_id, doc_id
        );

        Ok(ArchivedDoc {
            url: format!("https://docs.google.com/document/d/{}", doc_id),
            id: doc_id,
        })
    }

    async fn document_text(&self, doc_id: &str) -> Result<String> {
        let response = self
            .client
            .get(format!("{}/files/{}/export", self.drive_base, doc_id))
            .bearer_auth(self.bearer().await?)
            .query(&[("mimeType", "text/plain")])
            .send()
            .await
            .context("Failed to export document text")?;
        let response = Self::check(response, "Document export").await?;
        response
            .text()
            .await
            .context("Failed to read exported document text")
    }

    async fn is_processed(&self, doc_id: &str) -> Result<bool> {
        let response = self
            .client
            .get(format!("{}/files/{}", self.drive_base, doc_id))
            .bearer_auth(self.bearer().await?)
            .query(&[("fields", "appProperties")])
            .send()
            .await
            .context("Failed to read document properties")?;
        let response = Self::check(response, "Document property read").await?;
        let body: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse document properties")?;
        Ok(body["appProperties"][PROCESSED_TAG].as_str() == Some("true"))
    }

    async fn mark_processed(&self, doc_id: &str) -> Result<()> {
        let response = self
            .client
            .patch(format!("{}/files/{}", self.drive_base, doc_id))
            .bearer_auth(self.bearer().await?)
            .json(&json!({ "appProperties": { PROCESSED_TAG: "true" } }))
            .send()
            .await
            .context("Failed to update document properties")?;
        Self::check(response, "Document property update").await?;
        debug!("Marked document {} processed", doc_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_id_from_standard_link() {
        assert_eq!(
            doc_id_from_url("https://docs.google.com/document/d/abc123/edit").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn test_doc_id_from_bare_link() {
        assert_eq!(
            doc_id_from_url("https://docs.google.com/document/d/abc123").as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn test_doc_id_strips_query() {
        assert_eq!(
            doc_id_from_url("https://docs.google.com/document/d/abc?usp=sharing").as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn test_doc_id_missing() {
        assert!(doc_id_from_url("https://example.com/no-doc-here").is_none());
        assert!(doc_id_from_url("https://docs.google.com/document/d/").is_none());
    }
}
