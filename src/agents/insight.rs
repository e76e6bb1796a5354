//! Insight agent - generates ranked hypotheses from the data summary.
//!
//! Receives the plan and the statistical summary, never raw rows. On a
//! reflection pass the previous attempt and the evaluator's critique are
//! appended to the prompt so the model can produce a sharper second draft.

use crate::config::AnalystConfig;
use crate::llm::{call_and_parse, CompletionRequest, LlmBackend};
use crate::types::{DataSummary, Hypothesis, InsightSet, Plan};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

const INSIGHT_SYSTEM_PROMPT: &str = r#"You are a senior Facebook Ads analyst. You generate data-driven hypotheses about ad performance.

Return a JSON object with this structure:

{
  "hypotheses": [
    {
      "id": "H1",
      "hypothesis": "clear statement of what is happening and why",
      "confidence": 0.8,
      "evidence": ["specific metric from the data supporting this"],
      "recommendation": "concrete action to take",
      "category": "creative | audience | budget | platform | timing"
    }
  ],
  "reasoning": "brief summary of your analytical approach"
}

Rules:
- Generate 3 to 5 hypotheses, ordered by confidence descending.
- Confidence must be between 0.0 and 1.0.
- Every hypothesis must cite specific numbers from the data summary.
- Return ONLY JSON, no markdown, no extra text."#;

const INSIGHT_USER_PROMPT: &str = r#"Query: {query}

Analysis plan:
{plan}

Data summary:
{summary}
{reflection}
Generate your hypotheses now. Return ONLY JSON."#;

const REFLECTION_ADDENDUM: &str = r#"
Your previous attempt was judged insufficient. Previous hypotheses:
{previous}

Evaluator critique: {critique}

Address the critique: strengthen the evidence, drop weak hypotheses, and add
any angle the first attempt missed.
"#;

pub struct InsightAgent {
    backend: Arc<dyn LlmBackend>,
    config: Arc<AnalystConfig>,
}

impl InsightAgent {
    pub fn new(backend: Arc<dyn LlmBackend>, config: Arc<AnalystConfig>) -> Self {
        Self { backend, config }
    }

    /// Generate hypotheses for the query. `previous` carries the first
    /// attempt plus the evaluator's summary on a reflection pass.
    pub async fn generate(
        &self,
        query: &str,
        plan: &Plan,
        summary: &DataSummary,
        previous: Option<(&InsightSet, &str)>,
    ) -> InsightSet {
        let reflection = match previous {
            Some((prior, critique)) => REFLECTION_ADDENDUM
                .replace(
                    "{previous}",
                    &serde_json::to_string_pretty(&prior.hypotheses).unwrap_or_default(),
                )
                .replace("{critique}", critique),
            None => String::new(),
        };

        let request = CompletionRequest {
            system: INSIGHT_SYSTEM_PROMPT.to_string(),
            user: INSIGHT_USER_PROMPT
                .replace("{query}", query)
                .replace("{plan}", &render_plan(plan))
                .replace(
                    "{summary}",
                    &serde_json::to_string_pretty(summary).unwrap_or_default(),
                )
                .replace("{reflection}", &reflection),
            temperature: self.config.model.temperature,
            max_tokens: self.config.model.max_tokens,
        };

        match call_and_parse::<InsightSet>(
            self.backend.as_ref(),
            &request,
            self.config.agents.max_retries,
        )
        .await
        {
            Ok(mut insights) => {
                sanitize(&mut insights, query);
                info!(hypotheses = insights.hypotheses.len(), "Insights generated");
                insights
            }
            Err(e) => {
                warn!(error = %e, "Insight generation failed, emitting fallback hypothesis");
                fallback_insights(query, summary)
            }
        }
    }
}

/// Compact plan rendering for the prompt; the full JSON would waste tokens.
fn render_plan(plan: &Plan) -> String {
    let mut out = format!("Intent: {}\n", plan.intent);
    for task in &plan.tasks {
        out.push_str(&format!("- [{}] {}\n", task.task_id, task.description));
    }
    out
}

/// Clamp confidences, assign missing ids, sort by confidence descending.
fn sanitize(insights: &mut InsightSet, query: &str) {
    if insights.query.is_empty() {
        insights.query = query.to_string();
    }
    for (i, h) in insights.hypotheses.iter_mut().enumerate() {
        h.clamp_confidence();
        if h.id.is_empty() {
            h.id = format!("H{}", i + 1);
        }
    }
    insights
        .hypotheses
        .sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
}

/// Single low-confidence hypothesis built from the summary alone, so the
/// report still has something defensible to say.
fn fallback_insights(query: &str, summary: &DataSummary) -> InsightSet {
    let trend = summary
        .time_analysis
        .as_ref()
        .map(|t| {
            format!(
                "ROAS changed {:.1}% and CTR changed {:.1}% week over week.",
                t.roas_change_pct, t.ctr_change_pct
            )
        })
        .unwrap_or_else(|| "No week-over-week trend data available.".to_string());

    InsightSet {
        timestamp: Utc::now(),
        query: query.to_string(),
        hypotheses: vec![Hypothesis {
            id: "H1".to_string(),
            hypothesis: format!(
                "Performance shift visible in aggregate metrics (avg ROAS {:.2}, avg CTR {:.3}). {}",
                summary.performance.avg_roas, summary.performance.avg_ctr, trend
            ),
            confidence: 0.3,
            evidence: vec![trend],
            recommendation: "Review the underperforming campaigns listed in the data summary manually."
                .to_string(),
            category: "general".to_string(),
        }],
        reasoning: "LLM insight generation failed; hypothesis derived from summary statistics only."
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::DataAgent;
    use crate::llm::StaticBackend;
    use crate::types::AdRecord;
    use chrono::NaiveDate;
    use serde_json::json;

    fn record(campaign: &str, day: u32, roas: f64) -> AdRecord {
        AdRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, day),
            campaign_name: campaign.to_string(),
            adset_name: None,
            creative_type: Some("video".to_string()),
            creative_message: Some("Shop now".to_string()),
            audience_type: None,
            platform: None,
            spend: 200.0,
            impressions: 10_000,
            clicks: 150,
            purchases: 12,
            revenue: 200.0 * roas,
            ctr: 0.015,
            roas,
        }
    }

    fn summary() -> DataSummary {
        let config = Arc::new(AnalystConfig::default());
        let records: Vec<AdRecord> = (1..=14).map(|d| record("C1", d, 3.5)).collect();
        DataAgent::new(config).summarize(&records)
    }

    #[tokio::test]
    async fn test_generate_sorts_and_clamps() {
        let response = json!({
            "hypotheses": [
                {"id": "", "hypothesis": "Weak", "confidence": 0.2},
                {"id": "H2", "hypothesis": "Strong", "confidence": 1.4}
            ],
            "reasoning": "test"
        });
        let backend = Arc::new(StaticBackend::new(vec![response.to_string()]));
        let agent = InsightAgent::new(backend, Arc::new(AnalystConfig::default()));
        let plan = Plan {
            query: "q".to_string(),
            intent: "general_analysis".to_string(),
            tasks: vec![],
            success_criteria: String::new(),
        };
        let insights = agent.generate("q", &plan, &summary(), None).await;
        assert_eq!(insights.hypotheses[0].hypothesis, "Strong");
        assert_eq!(insights.hypotheses[0].confidence, 1.0);
        assert_eq!(insights.hypotheses[1].id, "H1");
        assert_eq!(insights.query, "q");
    }

    #[tokio::test]
    async fn test_generate_falls_back_on_garbage() {
        let backend = Arc::new(StaticBackend::new(vec![
            "nope".to_string(),
            "nope".to_string(),
            "nope".to_string(),
        ]));
        let agent = InsightAgent::new(backend, Arc::new(AnalystConfig::default()));
        let plan = Plan {
            query: "q".to_string(),
            intent: "general_analysis".to_string(),
            tasks: vec![],
            success_criteria: String::new(),
        };
        let insights = agent.generate("q", &plan, &summary(), None).await;
        assert_eq!(insights.hypotheses.len(), 1);
        assert!(insights.hypotheses[0].confidence <= 0.5);
    }

    #[tokio::test]
    async fn test_reflection_context_included_in_prompt() {
        // The static backend ignores the prompt, so verify indirectly: the
        // reflection variant still parses and the previous attempt is not
        // returned verbatim.
        let response = json!({
            "hypotheses": [{"id": "H1", "hypothesis": "Revised", "confidence": 0.9}],
            "reasoning": "second pass"
        });
        let backend = Arc::new(StaticBackend::new(vec![response.to_string()]));
        let agent = InsightAgent::new(backend, Arc::new(AnalystConfig::default()));
        let plan = Plan {
            query: "q".to_string(),
            intent: "general_analysis".to_string(),
            tasks: vec![],
            success_criteria: String::new(),
        };
        let previous = InsightSet {
            timestamp: Utc::now(),
            query: "q".to_string(),
            hypotheses: vec![],
            reasoning: "first pass".to_string(),
        };
        let insights = agent
            .generate("q", &plan, &summary(), Some((&previous, "too vague")))
            .await;
        assert_eq!(insights.hypotheses[0].hypothesis, "Revised");
    }
}
