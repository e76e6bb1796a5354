//! Sequential pipeline runner.
//!
//! Owns the stage ordering and the single reflection pass. Individual agents
//! never fail the run; the workflow's only job is sequencing, context
//! threading, and deciding whether the evaluator's verdict warrants a second
//! insight attempt.

use crate::agents::{CreativeAgent, DataAgent, EvaluatorAgent, InsightAgent, PlannerAgent};
use crate::config::AnalystConfig;
use crate::llm::LlmBackend;
use crate::types::{AdRecord, RunContext, ValidatedInsights};
use std::sync::Arc;
use tracing::info;

pub struct Workflow {
    backend: Arc<dyn LlmBackend>,
    config: Arc<AnalystConfig>,
}

impl Workflow {
    pub fn new(backend: Arc<dyn LlmBackend>, config: Arc<AnalystConfig>) -> Self {
        Self { backend, config }
    }

    /// Run the full pipeline over pre-loaded records.
    ///
    /// Stage order is fixed: plan, summarize, insights, evaluation, at most
    /// one reflection pass, creatives. The returned context carries every
    /// intermediate artifact for the report writer and the run log.
    pub async fn run(&self, query: &str, records: &[AdRecord]) -> RunContext {
        let mut ctx = RunContext::new(query);

        let planner = PlannerAgent::new(self.backend.clone(), self.config.clone());
        let data = DataAgent::new(self.config.clone());
        let insight = InsightAgent::new(self.backend.clone(), self.config.clone());
        let evaluator = EvaluatorAgent::new(self.backend.clone(), self.config.clone());
        let creative = CreativeAgent::new(self.backend.clone(), self.config.clone());

        info!(query, rows = records.len(), backend = self.backend.backend_name(), "Pipeline started");

        let plan = planner.create_plan(query).await;
        let summary = data.summarize(records);

        let first = insight.generate(query, &plan, &summary, None).await;
        let mut validated = evaluator.evaluate(&first, &summary).await;

        if self.needs_reflection(&validated) {
            info!(
                overall_confidence = validated.overall_confidence,
                min_confidence = self.config.agents.min_confidence,
                "Confidence below threshold, running reflection pass"
            );
            ctx.reflection_ran = true;

            let second = insight
                .generate(
                    query,
                    &plan,
                    &summary,
                    Some((&first, &validated.validation_summary)),
                )
                .await;
            // The reflection verdict stands as returned, even when it comes
            // back lower than the first attempt.
            validated = evaluator.evaluate(&second, &summary).await;
        }

        let creatives = creative.generate(records, &summary, &validated).await;

        ctx.plan = Some(plan);
        ctx.summary = Some(summary);
        ctx.insights = Some(validated);
        ctx.creatives = Some(creatives);
        ctx.llm_calls = self.backend.call_count();

        info!(
            llm_calls = ctx.llm_calls,
            reflection_ran = ctx.reflection_ran,
            "Pipeline finished"
        );
        ctx
    }

    fn needs_reflection(&self, validated: &ValidatedInsights) -> bool {
        self.config.agents.reflection_enabled
            && (validated.overall_confidence < self.config.agents.min_confidence
                || validated.hypotheses.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::StaticBackend;
    use chrono::NaiveDate;
    use serde_json::json;

    fn records() -> Vec<AdRecord> {
        (1..=14)
            .map(|d| AdRecord {
                date: NaiveDate::from_ymd_opt(2024, 3, d),
                campaign_name: "C1".to_string(),
                adset_name: None,
                creative_type: Some("video".to_string()),
                creative_message: Some("Shop the sale".to_string()),
                audience_type: None,
                platform: None,
                spend: 200.0,
                impressions: 10_000,
                clicks: 250,
                purchases: 12,
                revenue: 700.0,
                ctr: 0.025,
                roas: 3.5,
            })
            .collect()
    }

    fn plan_response() -> String {
        json!({
            "query": "q", "intent": "general_analysis",
            "tasks": [{"task_id": "T1", "description": "Analyze"}],
            "success_criteria": "done"
        })
        .to_string()
    }

    fn insight_response(confidence: f64) -> String {
        json!({
            "hypotheses": [{"id": "H1", "hypothesis": "Stable performance", "confidence": confidence}],
            "reasoning": "r"
        })
        .to_string()
    }

    fn evaluation_response(overall: f64) -> String {
        json!({
            "hypotheses": [{"id": "H1", "hypothesis": "Stable performance", "confidence": overall}],
            "overall_confidence": overall,
            "validation_summary": "checked"
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_high_confidence_skips_reflection() {
        // No low-CTR campaigns in the dataset, so the creative stage makes
        // no LLM call: 3 calls total (plan, insight, evaluation).
        let backend = Arc::new(StaticBackend::new(vec![
            plan_response(),
            insight_response(0.9),
            evaluation_response(0.9),
        ]));
        let workflow = Workflow::new(backend.clone(), Arc::new(AnalystConfig::default()));
        let ctx = workflow.run("How are things?", &records()).await;
        assert!(!ctx.reflection_ran);
        assert_eq!(ctx.llm_calls, 3);
        assert_eq!(backend.remaining(), 0);
    }

    #[tokio::test]
    async fn test_low_confidence_triggers_single_reflection() {
        // First evaluation below the 0.6 default threshold, second above.
        let backend = Arc::new(StaticBackend::new(vec![
            plan_response(),
            insight_response(0.4),
            evaluation_response(0.4),
            insight_response(0.8),
            evaluation_response(0.8),
        ]));
        let workflow = Workflow::new(backend.clone(), Arc::new(AnalystConfig::default()));
        let ctx = workflow.run("Why the dip?", &records()).await;
        assert!(ctx.reflection_ran);
        assert_eq!(ctx.llm_calls, 5);
        let insights = ctx.insights.unwrap();
        assert!((insights.overall_confidence - 0.8).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_reflection_verdict_stands_even_when_lower() {
        // The second evaluation comes back below the first; the re-validated
        // result is still the one that ships.
        let backend = Arc::new(StaticBackend::new(vec![
            plan_response(),
            insight_response(0.5),
            evaluation_response(0.5),
            insight_response(0.2),
            evaluation_response(0.2),
        ]));
        let workflow = Workflow::new(backend, Arc::new(AnalystConfig::default()));
        let ctx = workflow.run("q", &records()).await;
        assert!(ctx.reflection_ran);
        let insights = ctx.insights.unwrap();
        assert!((insights.overall_confidence - 0.2).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_reflection_disabled_never_retries() {
        let mut config = AnalystConfig::default();
        config.agents.reflection_enabled = false;
        let backend = Arc::new(StaticBackend::new(vec![
            plan_response(),
            insight_response(0.1),
            evaluation_response(0.1),
        ]));
        let workflow = Workflow::new(backend, Arc::new(config));
        let ctx = workflow.run("q", &records()).await;
        assert!(!ctx.reflection_ran);
        assert_eq!(ctx.llm_calls, 3);
    }
}
