//! Core types shared across the agent pipeline.
//!
//! Everything here is flat and serde-derived: records come in from the CSV,
//! the structured outputs come back from the LLM, and all of it ends up in
//! the JSON artifacts at the end of a run. Confidence values are clamped to
//! [0,1] at every parse site so downstream consumers never see out-of-range
//! scores.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Dataset rows
// ============================================================================

/// One row of the Facebook Ads performance dataset, post-cleaning.
///
/// Missing numerics are coerced to 0 by the loader; `ctr` and `roas` are
/// derived from clicks/impressions and revenue/spend when a row leaves them
/// blank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdRecord {
    pub date: Option<NaiveDate>,
    pub campaign_name: String,
    pub adset_name: Option<String>,
    pub creative_type: Option<String>,
    pub creative_message: Option<String>,
    pub audience_type: Option<String>,
    pub platform: Option<String>,
    pub spend: f64,
    pub impressions: u64,
    pub clicks: u64,
    pub purchases: u64,
    pub revenue: f64,
    pub ctr: f64,
    pub roas: f64,
}

// ============================================================================
// Data summary (produced by the data agent, no LLM involved)
// ============================================================================

/// Statistical summary of the dataset, fed into every downstream prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSummary {
    pub overview: Overview,
    pub performance: PerformanceMetrics,
    pub time_analysis: Option<TimeAnalysis>,
    pub campaigns: CampaignBreakdown,
    pub creative_analysis: Option<CreativeAnalysis>,
    pub audiences: Vec<SegmentStats>,
    pub platforms: Vec<SegmentStats>,
    pub top_performers: TopPerformers,
    pub underperformers: Underperformers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Overview {
    pub total_rows: usize,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub date_span_days: Option<i64>,
    pub unique_campaigns: usize,
    pub unique_adsets: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_spend: f64,
    pub total_revenue: f64,
    pub total_impressions: u64,
    pub total_clicks: u64,
    pub total_purchases: u64,
    pub avg_roas: f64,
    pub avg_ctr: f64,
    pub median_roas: f64,
    pub median_ctr: f64,
}

/// Recent-week vs previous-week comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeAnalysis {
    pub recent_week: WeekStats,
    pub previous_week: WeekStats,
    pub roas_change_pct: f64,
    pub ctr_change_pct: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WeekStats {
    pub avg_roas: f64,
    pub avg_ctr: f64,
    pub total_spend: f64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignBreakdown {
    pub total_campaigns: usize,
    pub top_by_revenue: Vec<CampaignStats>,
    pub top_by_roas: Vec<CampaignStats>,
}

/// Per-campaign aggregate used in breakdowns and the creative stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignStats {
    pub campaign_name: String,
    pub spend: f64,
    pub revenue: f64,
    pub roas: f64,
    pub ctr: f64,
    pub creative_message: Option<String>,
    pub creative_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreativeAnalysis {
    pub by_type: Vec<SegmentStats>,
    pub best_type_roas: String,
    pub best_type_ctr: String,
}

/// Aggregate stats for one segment value (creative type, audience, platform).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentStats {
    pub segment: String,
    pub avg_roas: f64,
    pub avg_ctr: f64,
    pub total_spend: f64,
    pub total_revenue: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopPerformers {
    pub campaigns: Vec<CampaignStats>,
    pub messages: Vec<MessageStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageStats {
    pub creative_message: String,
    pub avg_ctr: f64,
    pub avg_roas: f64,
    pub total_clicks: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Underperformers {
    pub low_ctr: Vec<CampaignStats>,
    pub low_roas: Vec<CampaignStats>,
    pub count_low_ctr: usize,
    pub count_low_roas: usize,
}

// ============================================================================
// Planner output
// ============================================================================

/// Structured analysis plan produced by the planner agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub query: String,
    #[serde(default = "default_intent")]
    pub intent: String,
    #[serde(default)]
    pub tasks: Vec<PlanTask>,
    #[serde(default)]
    pub success_criteria: String,
}

fn default_intent() -> String {
    "general_analysis".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanTask {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub data_requirements: Vec<String>,
    #[serde(default)]
    pub expected_output: String,
}

// ============================================================================
// Insight / evaluation output
// ============================================================================

/// A single LLM-generated hypothesis about the performance data.
///
/// The confidence score is the model's self-reported certainty; it is not
/// independently computed, only range-enforced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    #[serde(default)]
    pub id: String,
    #[serde(default, alias = "text", alias = "statement")]
    pub hypothesis: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub category: String,
}

fn default_confidence() -> f64 {
    0.5
}

impl Hypothesis {
    /// Force confidence into [0,1]. NaN collapses to 0.
    pub fn clamp_confidence(&mut self) {
        if self.confidence.is_nan() {
            self.confidence = 0.0;
        }
        self.confidence = self.confidence.clamp(0.0, 1.0);
    }
}

/// Raw output of the insight agent before evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightSet {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub hypotheses: Vec<Hypothesis>,
    #[serde(default)]
    pub reasoning: String,
}

/// Evaluator output: hypotheses with adjusted confidences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedInsights {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub hypotheses: Vec<Hypothesis>,
    #[serde(default)]
    pub overall_confidence: f64,
    #[serde(default)]
    pub validation_summary: String,
}

impl ValidatedInsights {
    /// Clamp all confidences and recompute `overall_confidence` as the mean
    /// of the per-hypothesis scores. A model-supplied overall is discarded:
    /// it cannot be allowed to drift from the scores it claims to summarize.
    pub fn normalize(&mut self) {
        for h in &mut self.hypotheses {
            h.clamp_confidence();
        }
        if !self.hypotheses.is_empty() {
            self.overall_confidence = self.hypotheses.iter().map(|h| h.confidence).sum::<f64>()
                / self.hypotheses.len() as f64;
        }
        if self.overall_confidence.is_nan() {
            self.overall_confidence = 0.0;
        }
        self.overall_confidence = self.overall_confidence.clamp(0.0, 1.0);
    }
}

// ============================================================================
// Creative output
// ============================================================================

/// One proposed creative variant for an underperforming campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreativeVariant {
    #[serde(default)]
    pub headline: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub cta: String,
    #[serde(default)]
    pub creative_type: String,
    #[serde(default)]
    pub rationale: String,
    #[serde(default)]
    pub inspiration: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreativeRecommendation {
    #[serde(default)]
    pub campaign_name: String,
    #[serde(default)]
    pub current_ctr: f64,
    #[serde(default)]
    pub current_roas: f64,
    #[serde(default)]
    pub current_message: String,
    #[serde(default)]
    pub issue: String,
    #[serde(default)]
    pub new_creatives: Vec<CreativeVariant>,
}

/// Patterns extracted from high-CTR rows, echoed into the artifact for
/// marketer context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SuccessfulPatterns {
    #[serde(default)]
    pub top_themes: Vec<String>,
    #[serde(default)]
    pub best_creative_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreativeSet {
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub recommendations: Vec<CreativeRecommendation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_patterns: Option<SuccessfulPatterns>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl CreativeSet {
    pub fn empty(note: &str) -> Self {
        Self {
            timestamp: Utc::now(),
            recommendations: Vec::new(),
            successful_patterns: None,
            note: Some(note.to_string()),
        }
    }
}

// ============================================================================
// Run context
// ============================================================================

/// Accumulating context threaded through the pipeline, one per run.
///
/// Each stage fills in its slot; the report writer serializes the whole thing
/// into the run log. Discarded at process exit, never persisted elsewhere.
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    pub query: String,
    pub started_at: DateTime<Utc>,
    pub plan: Option<Plan>,
    pub summary: Option<DataSummary>,
    pub insights: Option<ValidatedInsights>,
    pub creatives: Option<CreativeSet>,
    pub reflection_ran: bool,
    pub llm_calls: u64,
}

impl RunContext {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            started_at: Utc::now(),
            plan: None,
            summary: None,
            insights: None,
            creatives: None,
            reflection_ran: false,
            llm_calls: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hypothesis(confidence: f64) -> Hypothesis {
        Hypothesis {
            id: "H1".to_string(),
            hypothesis: "CTR collapsed".to_string(),
            confidence,
            evidence: vec![],
            recommendation: String::new(),
            category: String::new(),
        }
    }

    #[test]
    fn test_confidence_clamped_above_one() {
        let mut h = hypothesis(1.7);
        h.clamp_confidence();
        assert_eq!(h.confidence, 1.0);
    }

    #[test]
    fn test_confidence_nan_collapses_to_zero() {
        let mut h = hypothesis(f64::NAN);
        h.clamp_confidence();
        assert_eq!(h.confidence, 0.0);
    }

    #[test]
    fn test_overall_confidence_filled_from_mean() {
        let mut v = ValidatedInsights {
            timestamp: Utc::now(),
            hypotheses: vec![hypothesis(0.4), hypothesis(0.8)],
            overall_confidence: 0.0,
            validation_summary: String::new(),
        };
        v.normalize();
        assert!((v.overall_confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_overall_confidence_overrides_model_supplied_value() {
        // A self-reported overall that disagrees with the per-hypothesis
        // scores is replaced by their mean.
        let mut v = ValidatedInsights {
            timestamp: Utc::now(),
            hypotheses: vec![hypothesis(0.2), hypothesis(0.4)],
            overall_confidence: 0.95,
            validation_summary: String::new(),
        };
        v.normalize();
        assert!((v.overall_confidence - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_hypothesis_accepts_text_alias() {
        let json = r#"{"id":"H1","text":"Creative fatigue","confidence":0.7}"#;
        let h: Hypothesis = serde_json::from_str(json).unwrap();
        assert_eq!(h.hypothesis, "Creative fatigue");
    }
}
