//! Typed analysis record and the business/audit column split.
//!
//! Field names mirror the response schema contract exactly. Ownership
//! of each field by the master ("business") block, the audit block,
//! both, or neither is declared once here and consumed by the analysis
//! stage and its tests.

use serde::Deserialize;

/// Delimiter used when list fields are rendered into a single cell.
pub const LIST_DELIMITER: &str = "; ";

/// Closed categorical brand size; anything off the wire that is not a
/// known member lands on `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrandSize {
    National,
    Regional,
    CityLevel,
    Unknown,
}

impl Default for BrandSize {
    fn default() -> Self {
        BrandSize::Unknown
    }
}

impl BrandSize {
    pub fn from_label(label: &str) -> Self {
        match label {
            "National" => BrandSize::National,
            "Regional" => BrandSize::Regional,
            "City Level" => BrandSize::CityLevel,
            _ => BrandSize::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BrandSize::National => "National",
            BrandSize::Regional => "Regional",
            BrandSize::CityLevel => "City Level",
            BrandSize::Unknown => "Unknown",
        }
    }
}

impl<'de> Deserialize<'de> for BrandSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(BrandSize::from_label(&label))
    }
}

/// Some model variants return this field as free text, others as a
/// list; both are accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TextOrList {
    Text(String),
    List(Vec<String>),
}

impl Default for TextOrList {
    fn default() -> Self {
        TextOrList::Text(String::new())
    }
}

impl TextOrList {
    pub fn render(&self) -> String {
        match self {
            TextOrList::Text(text) => text.clone(),
            TextOrList::List(items) => items.join(LIST_DELIMITER),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionItem {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub priority: String,
}

impl ActionItem {
    fn render(&self) -> String {
        format!("{}: {} [{}]", self.owner, self.task, self.priority)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompetitorInsight {
    #[serde(default)]
    pub competitor_name: String,
    #[serde(default)]
    pub client_perception_or_insight: String,
}

impl CompetitorInsight {
    fn render(&self) -> String {
        format!(
            "{}: {}",
            self.competitor_name, self.client_perception_or_insight
        )
    }
}

/// The structured sales analysis returned by the model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalysisResult {
    #[serde(rename = "Brand_Size", default)]
    pub brand_size: BrandSize,
    #[serde(rename = "Meeting_Type", default)]
    pub meeting_type: String,
    #[serde(rename = "Meeting_Agenda", default)]
    pub meeting_agenda: String,
    #[serde(rename = "Competition_Discussion", default)]
    pub competition_discussion: String,
    #[serde(rename = "Rebuttal_Handling", default)]
    pub rebuttal_handling: String,
    #[serde(rename = "Rapport_Building", default)]
    pub rapport_building: String,
    #[serde(rename = "Budget_or_Scope", default)]
    pub budget_or_scope: String,
    #[serde(rename = "Lead_Category", default)]
    pub lead_category: String,
    #[serde(rename = "Tone_of_Voice", default)]
    pub tone_of_voice: String,
    #[serde(rename = "Values_and_Mission", default)]
    pub values_and_mission: String,
    #[serde(rename = "Need_Identification", default)]
    pub need_identification: String,
    #[serde(rename = "Value_Proposition_Articulation", default)]
    pub value_proposition_articulation: String,
    #[serde(rename = "Product_Knowledge_Displayed", default)]
    pub product_knowledge_displayed: String,
    #[serde(rename = "Call_Effectiveness_and_Control", default)]
    pub call_effectiveness_and_control: String,
    #[serde(rename = "Next_Steps_Clarity_and_Commitment", default)]
    pub next_steps_clarity_and_commitment: String,
    #[serde(rename = "Overall_Client_Sentiment", default)]
    pub overall_client_sentiment: String,
    #[serde(rename = "Key_Managerial_Summary", default)]
    pub key_managerial_summary: String,
    #[serde(rename = "Pitched_Asset_Relevance_to_Needs", default)]
    pub pitched_asset_relevance_to_needs: String,
    #[serde(rename = "Pre_vs_Post_Meeting_Score", default)]
    pub pre_vs_post_meeting_score: String,
    #[serde(rename = "Closure_Score", default)]
    pub closure_score: i64,
    #[serde(rename = "Sales_Pitch_Rating", default)]
    pub sales_pitch_rating: i64,
    #[serde(rename = "Key_Discussion_Points", default)]
    pub key_discussion_points: Vec<String>,
    #[serde(rename = "Key_Questions", default)]
    pub key_questions: Vec<String>,
    #[serde(rename = "Marketing_Assets", default)]
    pub marketing_assets: Vec<String>,
    #[serde(rename = "Improvement_Areas", default)]
    pub improvement_areas: Vec<String>,
    #[serde(rename = "Other_Sales_Parameters", default)]
    pub other_sales_parameters: Vec<String>,
    #[serde(rename = "Positive_Factors", default)]
    pub positive_factors: Vec<String>,
    #[serde(rename = "Negative_Factors", default)]
    pub negative_factors: Vec<String>,
    #[serde(rename = "Brand_Traits", default)]
    pub brand_traits: Vec<String>,
    #[serde(rename = "Customer_Needs", default)]
    pub customer_needs: Vec<String>,
    #[serde(rename = "Client_Pain_Points", default)]
    pub client_pain_points: Vec<String>,
    #[serde(rename = "Identified_Missed_Opportunities", default)]
    pub identified_missed_opportunities: TextOrList,
    #[serde(rename = "Action_Items", default)]
    pub action_items: Vec<ActionItem>,
    #[serde(rename = "Specific_Competitor_Insights", default)]
    pub specific_competitor_insights: Vec<CompetitorInsight>,
}

/// Fields written to the master sheet's business block, in column order.
pub const BUSINESS_FIELDS: &[&str] = &[
    "Brand_Size",
    "Meeting_Type",
    "Meeting_Agenda",
    "Lead_Category",
    "Budget_or_Scope",
    "Competition_Discussion",
    "Specific_Competitor_Insights",
    "Key_Discussion_Points",
    "Key_Questions",
    "Customer_Needs",
    "Client_Pain_Points",
    "Brand_Traits",
    "Marketing_Assets",
    "Positive_Factors",
    "Negative_Factors",
    "Overall_Client_Sentiment",
    "Action_Items",
    "Closure_Score",
    "Key_Managerial_Summary",
];

/// Fields written to the audit tab's block, in column order.
pub const AUDIT_FIELDS: &[&str] = &[
    "Meeting_Type",
    "Rebuttal_Handling",
    "Rapport_Building",
    "Tone_of_Voice",
    "Values_and_Mission",
    "Need_Identification",
    "Value_Proposition_Articulation",
    "Product_Knowledge_Displayed",
    "Call_Effectiveness_and_Control",
    "Next_Steps_Clarity_and_Commitment",
    "Sales_Pitch_Rating",
    "Improvement_Areas",
    "Identified_Missed_Opportunities",
    "Pitched_Asset_Relevance_to_Needs",
    "Pre_vs_Post_Meeting_Score",
    "Key_Managerial_Summary",
];

/// Every field name the schema defines, whether or not a column owns it.
pub const ALL_FIELDS: &[&str] = &[
    "Brand_Size",
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
    "Closure_Score",
    "Sales_Pitch_Rating",
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
    "Action_Items",
    "Specific_Competitor_Insights",
];

fn join(items: &[String]) -> String {
    items.join(LIST_DELIMITER)
}

impl AnalysisResult {
    /// Rendered string value for a schema field name. Non-string fields
    /// are rendered to their cell form; list fields are joined.
    pub fn field_value(&self, field: &str) -> Option<String> {
        let value = match field {
            "Brand_Size" => self.brand_size.label().to_string(),
            "Meeting_Type" => self.meeting_type.clone(),
            "Meeting_Agenda" => self.meeting_agenda.clone(),
            "Competition_Discussion" => self.competition_discussion.clone(),
            "Rebuttal_Handling" => self.rebuttal_handling.clone(),
            "Rapport_Building" => self.rapport_building.clone(),
            "Budget_or_Scope" => self.budget_or_scope.clone(),
            "Lead_Category" => self.lead_category.clone(),
            "Tone_of_Voice" => self.tone_of_voice.clone(),
            "Values_and_Mission" => self.values_and_mission.clone(),
            "Need_Identification" => self.need_identification.clone(),
            "Value_Proposition_Articulation" => self.value_proposition_articulation.clone(),
            "Product_Knowledge_Displayed" => self.product_knowledge_displayed.clone(),
            "Call_Effectiveness_and_Control" => self.call_effectiveness_and_control.clone(),
            "Next_Steps_Clarity_and_Commitment" => {
                self.next_steps_clarity_and_commitment.clone()
            }
            "Overall_Client_Sentiment" => self.overall_client_sentiment.clone(),
            "Key_Managerial_Summary" => self.key_managerial_summary.clone(),
            "Pitched_Asset_Relevance_to_Needs" => self.pitched_asset_relevance_to_needs.clone(),
            "Pre_vs_Post_Meeting_Score" => self.pre_vs_post_meeting_score.clone(),
            "Closure_Score" => self.closure_score.to_string(),
            "Sales_Pitch_Rating" => self.sales_pitch_rating.to_string(),
            "Key_Discussion_Points" => join(&self.key_discussion_points),
            "Key_Questions" => join(&self.key_questions),
            "Marketing_Assets" => join(&self.marketing_assets),
            "Improvement_Areas" => join(&self.improvement_areas),
            "Other_Sales_Parameters" => join(&self.other_sales_parameters),
            "Positive_Factors" => join(&self.positive_factors),
            "Negative_Factors" => join(&self.negative_factors),
            "Brand_Traits" => join(&self.brand_traits),
            "Customer_Needs" => join(&self.customer_needs),
            "Client_Pain_Points" => join(&self.client_pain_points),
            "Identified_Missed_Opportunities" => self.identified_missed_opportunities.render(),
            "Action_Items" => self
                .action_items
                .iter()
                .map(ActionItem::render)
                .collect::<Vec<_>>()
                .join(LIST_DELIMITER),
            "Specific_Competitor_Insights" => self
                .specific_competitor_insights
                .iter()
                .map(CompetitorInsight::render)
                .collect::<Vec<_>>()
                .join(LIST_DELIMITER),
            _ => return None,
        };
        Some(value)
    }

    /// The business block row, in `BUSINESS_FIELDS` column order.
    pub fn business_values(&self) -> Vec<String> {
        BUSINESS_FIELDS
            .iter()
            .filter_map(|field| self.field_value(field))
            .collect()
    }

    /// The audit block row, in `AUDIT_FIELDS` column order.
    pub fn audit_values(&self) -> Vec<String> {
        AUDIT_FIELDS
            .iter()
            .filter_map(|field| self.field_value(field))
            .collect()
    }
}
