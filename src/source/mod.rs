//! Transcript source: typed records, document-body rendering, the
//! conducted classification and the paginated GraphQL client.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

/// Meetings shorter than this never count as conducted.
const CONDUCTED_MIN_MINUTES: f64 = 10.0;
/// Neither do transcripts with no more text than this.
const CONDUCTED_MIN_CHARS: usize = 10;

/// One transcript as returned by the source system. Immutable once
/// fetched. `sentences` is absent or empty while transcription is
/// still in progress upstream.
#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptRecord {
    pub id: String,
    #[serde(default)]
    pub calendar_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sentences: Option<Vec<Utterance>>,
}

impl TranscriptRecord {
    pub fn title_or_default(&self) -> &str {
        match self.title.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => "Untitled meeting",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Utterance {
    #[serde(default)]
    pub speaker_name: String,
    #[serde(default)]
    pub text: String,
    pub start_time: f64,
    pub end_time: f64,
}

/// Concatenate utterances into the archived document body, each
/// prefixed with its timestamp header.
pub fn render_transcript(sentences: &[Utterance]) -> String {
    let mut body = String::new();
    for sentence in sentences {
        body.push_str(&format!(
            "Time (in seconds): {} to {}\n",
            sentence.start_time, sentence.end_time
        ));
        body.push_str(&format!("{}: {}\n\n", sentence.speaker_name, sentence.text));
    }
    body
}

/// Meeting length in minutes, from first utterance start to last
/// utterance end. Empty input is 0.0.
pub fn duration_minutes(sentences: &[Utterance]) -> f64 {
    match (sentences.first(), sentences.last()) {
        (Some(first), Some(last)) => (last.end_time - first.start_time) / 60.0,
        _ => 0.0,
    }
}

/// Whether a meeting actually took place, derived from length and
/// transcript substance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Conducted,
    NotConducted,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Classification::Conducted => "Conducted",
            Classification::NotConducted => "Not Conducted",
        }
    }
}

/// Conducted iff the meeting ran strictly longer than ten minutes and
/// the rendered transcript holds more than ten characters.
pub fn classify(duration_min: f64, transcript_text: &str) -> Classification {
    if duration_min > CONDUCTED_MIN_MINUTES && transcript_text.chars().count() > CONDUCTED_MIN_CHARS
    {
        Classification::Conducted
    } else {
        Classification::NotConducted
    }
}

#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Fetch all currently available transcripts, up to the configured cap.
    async fn fetch_transcripts(&self) -> Result<Vec<TranscriptRecord>>;
}

const TRANSCRIPTS_QUERY: &str = r#"
query Transcripts($limit: Int, $skip: Int) {
  transcripts(limit: $limit, skip: $skip) {
    id
    calendar_id
    title
    sentences {
      speaker_name
      text
      start_time
      end_time
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<TranscriptsData>,
    #[serde(default)]
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct TranscriptsData {
    #[serde(default)]
    transcripts: Vec<TranscriptRecord>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// GraphQL client for the transcription service, paging with a
/// limit/skip cursor until an empty page or the hard cap.
pub struct SourceClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    page_size: usize,
    fetch_cap: usize,
}

impl SourceClient {
    pub fn new(base_url: String, api_key: String, page_size: usize, fetch_cap: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            page_size: page_size.max(1),
            fetch_cap: fetch_cap.max(1),
        }
    }

    async fn fetch_page(&self, skip: usize) -> Result<Vec<TranscriptRecord>> {
        let payload = json!({
            "query": TRANSCRIPTS_QUERY,
            "variables": { "limit": self.page_size, "skip": skip },
        });

        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Failed to reach the transcript source")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read transcript source response")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Transcript source returned status {}: {}",
                status,
                body
            ));
        }

        let parsed: GraphQlResponse =
            serde_json::from_str(&body).context("Failed to parse transcript source response")?;

        if let Some(errors) = parsed.errors {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(anyhow!("Transcript query failed: {}", messages.join("; ")));
        }

        Ok(parsed.data.map(|d| d.transcripts).unwrap_or_default())
    }
}

#[async_trait]
impl TranscriptSource for SourceClient {
    async fn fetch_transcripts(&self) -> Result<Vec<TranscriptRecord>> {
        let mut all = Vec::new();
        let mut skip = 0;

        loop {
            let batch = self.fetch_page(skip).await?;
            if batch.is_empty() {
                break;
            }

            skip += self.page_size;
            all.extend(batch);
            debug!("Fetched {} transcripts so far", all.len());

            if all.len() >= self.fetch_cap {
                info!("Transcript fetch cap of {} reached", self.fetch_cap);
                break;
            }
        }

        info!("Fetched {} transcripts from source", all.len());
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utterance(speaker: &str, text: &str, start: f64, end: f64) -> Utterance {
        Utterance {
            speaker_name: speaker.to_string(),
            text: text.to_string(),
            start_time: start,
            end_time: end,
        }
    }

    #[test]
    fn test_render_includes_timestamp_headers() {
        let sentences = vec![
            utterance("Alice", "Hello there.", 0.0, 2.5),
            utterance("Bob", "Hi.", 2.5, 3.0),
        ];
        let body = render_transcript(&sentences);
        assert!(body.starts_with("Time (in seconds): 0 to 2.5\nAlice: Hello there.\n\n"));
        assert!(body.contains("Bob: Hi.\n\n"));
    }

    #[test]
    fn test_duration_spans_first_start_to_last_end() {
        let sentences = vec![
            utterance("A", "x", 30.0, 40.0),
            utterance("B", "y", 40.0, 630.0),
        ];
        assert!((duration_minutes(&sentences) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_duration_of_empty_transcript_is_zero() {
        assert_eq!(duration_minutes(&[]), 0.0);
    }

    #[test]
    fn test_exactly_ten_minutes_is_not_conducted() {
        // Strict greater-than on both sides of the boundary.
        assert_eq!(
            classify(10.0, "elevenchars"),
            Classification::NotConducted
        );
    }

    #[test]
    fn test_just_over_ten_minutes_is_conducted() {
        assert_eq!(classify(10.01, "elevenchars"), Classification::Conducted);
    }

    #[test]
    fn test_short_text_is_not_conducted() {
        assert_eq!(classify(25.0, "ten chars."), Classification::NotConducted);
    }

    #[test]
    fn test_labels() {
        assert_eq!(Classification::Conducted.label(), "Conducted");
        assert_eq!(Classification::NotConducted.label(), "Not Conducted");
    }

    #[test]
    fn test_record_with_null_sentences_parses() {
        let json = r#"{"id": "t1", "calendar_id": "cal1", "title": "Sync", "sentences": null}"#;
        let record: TranscriptRecord = serde_json::from_str(json).unwrap();
        assert!(record.sentences.is_none());
        assert_eq!(record.title_or_default(), "Sync");
    }

    #[test]
    fn test_record_with_missing_fields_parses() {
        let json = r#"{"id": "t2"}"#;
        let record: TranscriptRecord = serde_json::from_str(json).unwrap();
        assert!(record.calendar_id.is_none());
        assert_eq!(record.title_or_default(), "Untitled meeting");
    }
}
