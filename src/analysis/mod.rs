//! Structured-output analysis model: prompt assembly, the response
//! schema contract, and the live generateContent client.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

pub mod result;

pub use result::{AnalysisResult, BrandSize, AUDIT_FIELDS, BUSINESS_FIELDS};

const MODEL_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Fill the prompt template. The transcript is truncated to the
/// character budget so oversized meetings cannot blow the request.
pub fn build_prompt(
    template: &str,
    transcript: &str,
    brief: &str,
    max_transcript_chars: usize,
) -> String {
    let transcript = truncate_chars(transcript, max_transcript_chars);
    template
        .replace("{transcript}", &transcript)
        .replace("{brief}", brief)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

const FREE_TEXT_FIELDS: &[&str] = &[
    "Meeting_Type",
    "Meeting_Agenda",
    "Competition_Discussion",
    "Rebuttal_Handling",
    "Rapport_Building",
    "Budget_or_Scope",
    "Lead_Category",
    "Tone_of_Voice",
    "Values_and_Mission",
    "Need_Identification",
    "Value_Proposition_Articulation",
    "Product_Knowledge_Displayed",
    "Call_Effectiveness_and_Control",
    "Next_Steps_Clarity_and_Commitment",
    "Overall_Client_Sentiment",
    "Key_Managerial_Summary",
    "Pitched_Asset_Relevance_to_Needs",
    "Pre_vs_Post_Meeting_Score",
];

const INTEGER_FIELDS: &[&str] = &["Closure_Score", "Sales_Pitch_Rating"];

const STRING_LIST_FIELDS: &[&str] = &[
    "Key_Discussion_Points",
    "Key_Questions",
    "Marketing_Assets",
    "Improvement_Areas",
    "Other_Sales_Parameters",
    "Positive_Factors",
    "Negative_Factors",
    "Brand_Traits",
    "Customer_Needs",
    "Client_Pain_Points",
    "Identified_Missed_Opportunities",
];

/// Response schema sent with every analysis request. Field names are
/// the contract boundary and must not drift from `result`.
pub fn response_schema() -> serde_json::Value {
    let mut properties = serde_json::Map::new();

    properties.insert(
        "Brand_Size".to_string(),
        json!({
            "type": "STRING",
            "enum": ["National", "Regional", "City Level", "Unknown"],
        }),
    );
    for field in FREE_TEXT_FIELDS {
        properties.insert(field.to_string(), json!({ "type": "STRING" }));
    }
    for field in INTEGER_FIELDS {
        properties.insert(field.to_string(), json!({ "type": "INTEGER" }));
    }
    for field in STRING_LIST_FIELDS {
        properties.insert(
            field.to_string(),
            json!({ "type": "ARRAY", "items": { "type": "STRING" } }),
        );
    }
    properties.insert(
        "Action_Items".to_string(),
        json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "owner": { "type": "STRING" },
                    "task": { "type": "STRING" },
                    "priority": { "type": "STRING" },
                },
            },
        }),
    );
    properties.insert(
        "Specific_Competitor_Insights".to_string(),
        json!({
            "type": "ARRAY",
            "items": {
                "type": "OBJECT",
                "properties": {
                    "competitor_name": { "type": "STRING" },
                    "client_perception_or_insight": { "type": "STRING" },
                },
            },
        }),
    );

    json!({ "type": "OBJECT", "properties": properties })
}

#[async_trait]
pub trait AnalysisModel: Send + Sync {
    /// Submit a formatted prompt; returns a schema-conforming analysis
    /// or an error on any validation or transport failure.
    async fn analyze(&self, prompt: &str) -> Result<AnalysisResult>;
}

pub struct ModelClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl ModelClient {
    pub fn new(model: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: MODEL_BASE_URL.to_string(),
            model,
            api_key,
        }
    }
}

#[async_trait]
impl AnalysisModel for ModelClient {
    async fn analyze(&self, prompt: &str) -> Result<AnalysisResult> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url, self.model
        );

        let payload = json!({
            "contents": [ { "parts": [ { "text": prompt } ] } ],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": response_schema(),
            },
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await
            .context("Failed to reach the analysis model")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read analysis model response")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Analysis model returned status {}: {}",
                status,
                body
            ));
        }

        let parsed: serde_json::Value =
            serde_json::from_str(&body).context("Failed to parse analysis model response")?;
        let text = parsed["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow!("Analysis model response carried no content"))?;

        debug!("Analysis model returned {} chars", text.len());

        serde_json::from_str(text).context("Analysis result did not match the response schema")
    }
}
