//! Evaluator agent - validates hypotheses against the data summary.
//!
//! A set of cheap quantitative checks is computed locally and handed to the
//! model alongside the hypotheses, so the critique is anchored in facts the
//! model cannot hallucinate. The output is the same hypothesis list with
//! adjusted confidences plus an overall score the workflow uses to decide
//! whether a reflection pass is warranted.

use crate::config::AnalystConfig;
use crate::llm::{call_and_parse, CompletionRequest, LlmBackend};
use crate::types::{DataSummary, InsightSet, ValidatedInsights};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

const EVALUATOR_SYSTEM_PROMPT: &str = r#"You are a rigorous data analyst reviewing hypotheses about Facebook Ads performance.

For each hypothesis, check it against the data summary and the quantitative checks. Adjust the confidence: lower it when evidence is weak or contradicted, raise it when the data strongly supports it.

Return a JSON object with this structure:

{
  "hypotheses": [
    {
      "id": "H1",
      "hypothesis": "the statement, unchanged",
      "confidence": 0.75,
      "evidence": ["evidence, possibly extended with what you verified"],
      "recommendation": "the recommendation, refined if needed",
      "category": "unchanged"
    }
  ],
  "overall_confidence": 0.7,
  "validation_summary": "one paragraph on the overall quality of the analysis"
}

Rules:
- Keep every hypothesis; adjust confidences rather than deleting.
- All confidences between 0.0 and 1.0.
- Return ONLY JSON, no markdown, no extra text."#;

const EVALUATOR_USER_PROMPT: &str = r#"Hypotheses to validate:
{hypotheses}

Data summary:
{summary}

Quantitative checks:
{checks}

Validate now. Return ONLY JSON."#;

/// Facts computed locally from the summary, injected into the prompt.
#[derive(Debug)]
struct QuantChecks {
    sample_adequate: bool,
    total_rows: usize,
    significant_roas_change: Option<f64>,
    significant_ctr_change: Option<f64>,
    creative_type_spread: Option<f64>,
    underperformer_count: usize,
}

impl QuantChecks {
    fn compute(summary: &DataSummary) -> Self {
        let (roas_change, ctr_change) = summary
            .time_analysis
            .as_ref()
            .map(|t| {
                (
                    (t.roas_change_pct.abs() > 10.0).then_some(t.roas_change_pct),
                    (t.ctr_change_pct.abs() > 10.0).then_some(t.ctr_change_pct),
                )
            })
            .unwrap_or((None, None));

        // Spread between best and worst creative type by ROAS
        let creative_type_spread = summary.creative_analysis.as_ref().and_then(|c| {
            let roas: Vec<f64> = c.by_type.iter().map(|s| s.avg_roas).collect();
            let max = roas.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let min = roas.iter().copied().fold(f64::INFINITY, f64::min);
            (roas.len() > 1).then_some(max - min)
        });

        Self {
            sample_adequate: summary.overview.total_rows >= 30,
            total_rows: summary.overview.total_rows,
            significant_roas_change: roas_change,
            significant_ctr_change: ctr_change,
            creative_type_spread,
            underperformer_count: summary.underperformers.count_low_ctr
                + summary.underperformers.count_low_roas,
        }
    }

    fn render(&self) -> String {
        let mut lines = vec![format!(
            "- Sample size: {} rows ({})",
            self.total_rows,
            if self.sample_adequate {
                "adequate for trend conclusions"
            } else {
                "small, treat trend conclusions with caution"
            }
        )];
        match self.significant_roas_change {
            Some(pct) => lines.push(format!(
                "- ROAS changed {pct:.1}% week over week (significant, >10%)"
            )),
            None => lines.push("- No significant week-over-week ROAS change (<=10%)".to_string()),
        }
        match self.significant_ctr_change {
            Some(pct) => lines.push(format!(
                "- CTR changed {pct:.1}% week over week (significant, >10%)"
            )),
            None => lines.push("- No significant week-over-week CTR change (<=10%)".to_string()),
        }
        if let Some(spread) = self.creative_type_spread {
            lines.push(format!(
                "- ROAS spread across creative types: {spread:.2}"
            ));
        }
        lines.push(format!(
            "- Underperforming campaign entries (low CTR or low ROAS): {}",
            self.underperformer_count
        ));
        lines.join("\n")
    }
}

pub struct EvaluatorAgent {
    backend: Arc<dyn LlmBackend>,
    config: Arc<AnalystConfig>,
}

impl EvaluatorAgent {
    pub fn new(backend: Arc<dyn LlmBackend>, config: Arc<AnalystConfig>) -> Self {
        Self { backend, config }
    }

    /// Validate the insight set. Never fails: on LLM failure the hypotheses
    /// pass through unadjusted with a neutral overall confidence.
    pub async fn evaluate(
        &self,
        insights: &InsightSet,
        summary: &DataSummary,
    ) -> ValidatedInsights {
        let checks = QuantChecks::compute(summary);

        let request = CompletionRequest {
            system: EVALUATOR_SYSTEM_PROMPT.to_string(),
            user: EVALUATOR_USER_PROMPT
                .replace(
                    "{hypotheses}",
                    &serde_json::to_string_pretty(&insights.hypotheses).unwrap_or_default(),
                )
                .replace(
                    "{summary}",
                    &serde_json::to_string_pretty(summary).unwrap_or_default(),
                )
                .replace("{checks}", &checks.render()),
            // Validation should be conservative
            temperature: 0.2,
            max_tokens: self.config.model.max_tokens,
        };

        match call_and_parse::<ValidatedInsights>(
            self.backend.as_ref(),
            &request,
            self.config.agents.max_retries,
        )
        .await
        {
            Ok(mut validated) => {
                validated.normalize();
                info!(
                    overall_confidence = validated.overall_confidence,
                    hypotheses = validated.hypotheses.len(),
                    "Insights validated"
                );
                validated
            }
            Err(e) => {
                warn!(error = %e, "Evaluation failed, passing insights through unvalidated");
                passthrough(insights)
            }
        }
    }
}

/// Unvalidated fallback: original hypotheses with a neutral overall score.
/// Skips `normalize` so the 0.5 marker survives; nothing here validated the
/// per-hypothesis scores, so their mean would overstate what we know.
fn passthrough(insights: &InsightSet) -> ValidatedInsights {
    let mut hypotheses = insights.hypotheses.clone();
    for h in &mut hypotheses {
        h.clamp_confidence();
    }
    ValidatedInsights {
        timestamp: Utc::now(),
        hypotheses,
        overall_confidence: 0.5,
        validation_summary: "Validation failed; hypotheses passed through with unadjusted confidences."
            .to_string(),
    }
}
