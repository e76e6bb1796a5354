//! Creative agent - proposes new ad creatives for low-CTR campaigns.
//!
//! Runs last and only when underperformers exist. Before calling the model
//! it mines the high-CTR rows for recurring message themes, so the generated
//! variants borrow from what already works in this account rather than from
//! generic ad copy. On LLM failure, deterministic template variants keep the
//! artifact useful.

use crate::config::AnalystConfig;
use crate::llm::{call_and_parse, CompletionRequest, LlmBackend};
use crate::types::{
    AdRecord, CampaignStats, CreativeRecommendation, CreativeSet, CreativeVariant, DataSummary,
    SuccessfulPatterns, ValidatedInsights,
};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

const CREATIVE_SYSTEM_PROMPT: &str = r#"You are a Facebook Ads creative strategist. You write new ad creatives for underperforming campaigns, drawing on patterns that already work in this account.

Return a JSON object with this structure:

{
  "recommendations": [
    {
      "campaign_name": "exact campaign name from the input",
      "issue": "one sentence on why this campaign underperforms",
      "new_creatives": [
        {
          "headline": "short punchy headline",
          "message": "primary ad text, 1-2 sentences",
          "cta": "call to action",
          "creative_type": "video | image | carousel | static",
          "rationale": "why this should outperform the current creative",
          "inspiration": "which successful pattern it borrows from"
        }
      ]
    }
  ]
}

Rules:
- Exactly 2 creative variants per campaign.
- Use the successful patterns where they fit.
- Return ONLY JSON, no markdown, no extra text."#;

const CREATIVE_USER_PROMPT: &str = r#"Underperforming campaigns (low CTR):
{campaigns}

Key insights from the analysis:
{insights}

Successful patterns in this account:
- Recurring message themes: {themes}
- Best performing creative type: {best_type}

Write new creatives now. Return ONLY JSON."#;

/// Rows count as "winners" for pattern mining at this multiple of the
/// configured low-CTR threshold.
const PATTERN_CTR_MULTIPLIER: f64 = 1.5;

const STOP_WORDS: [&str; 24] = [
    "the", "a", "an", "and", "or", "for", "to", "of", "in", "on", "at", "is", "are", "your",
    "you", "our", "we", "with", "now", "get", "it", "this", "that", "all",
];

/// Wire shape of the model response; current-metrics fields are filled
/// locally afterwards.
#[derive(Debug, Deserialize)]
struct RawRecommendations {
    #[serde(default)]
    recommendations: Vec<CreativeRecommendation>,
}

pub struct CreativeAgent {
    backend: Arc<dyn LlmBackend>,
    config: Arc<AnalystConfig>,
}

impl CreativeAgent {
    pub fn new(backend: Arc<dyn LlmBackend>, config: Arc<AnalystConfig>) -> Self {
        Self { backend, config }
    }

    /// Generate creative recommendations for the low-CTR campaigns in the
    /// summary, steered by the validated hypotheses so the variants address
    /// the diagnosed cause. Skips the LLM entirely when there is nothing to
    /// fix.
    pub async fn generate(
        &self,
        records: &[AdRecord],
        summary: &DataSummary,
        insights: &ValidatedInsights,
    ) -> CreativeSet {
        let targets = &summary.underperformers.low_ctr;
        if targets.is_empty() {
            info!("No low-CTR campaigns, skipping creative generation");
            return CreativeSet::empty("No campaigns below the CTR threshold; nothing to rework.");
        }

        let patterns = extract_patterns(
            records,
            self.config.thresholds.low_ctr * PATTERN_CTR_MULTIPLIER,
        );

        let request = CompletionRequest {
            system: CREATIVE_SYSTEM_PROMPT.to_string(),
            user: CREATIVE_USER_PROMPT
                .replace("{campaigns}", &render_targets(targets))
                .replace("{insights}", &render_hypotheses(insights))
                .replace(
                    "{themes}",
                    &if patterns.top_themes.is_empty() {
                        "none identified".to_string()
                    } else {
                        patterns.top_themes.join(", ")
                    },
                )
                .replace(
                    "{best_type}",
                    if patterns.best_creative_type.is_empty() {
                        "unknown"
                    } else {
                        &patterns.best_creative_type
                    },
                ),
            // Creative copy is the one place high temperature helps
            temperature: 0.9,
            max_tokens: self.config.model.max_tokens,
        };

        let recommendations = match call_and_parse::<RawRecommendations>(
            self.backend.as_ref(),
            &request,
            self.config.agents.max_retries,
        )
        .await
        {
            Ok(raw) if !raw.recommendations.is_empty() => raw.recommendations,
            Ok(_) => {
                warn!("Model returned no recommendations, using templates");
                template_recommendations(targets)
            }
            Err(e) => {
                warn!(error = %e, "Creative generation failed, using templates");
                template_recommendations(targets)
            }
        };

        let mut set = CreativeSet {
            timestamp: Utc::now(),
            recommendations,
            successful_patterns: Some(patterns),
            note: None,
        };
        fill_current_metrics(&mut set.recommendations, targets);
        info!(campaigns = set.recommendations.len(), "Creative recommendations ready");
        set
    }
}

fn render_targets(targets: &[CampaignStats]) -> String {
    targets
        .iter()
        .map(|c| {
            format!(
                "- {} (CTR {:.3}, ROAS {:.2}, current message: \"{}\")",
                c.campaign_name,
                c.ctr,
                c.roas,
                c.creative_message.as_deref().unwrap_or("unknown")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The diagnosed causes, rendered for the prompt. Strongest hypotheses first,
/// capped at five.
fn render_hypotheses(insights: &ValidatedInsights) -> String {
    if insights.hypotheses.is_empty() {
        return "- No validated insights available.".to_string();
    }
    insights
        .hypotheses
        .iter()
        .take(5)
        .map(|h| {
            let mut line = format!("- {} (confidence {:.2})", h.hypothesis, h.confidence);
            if !h.recommendation.is_empty() {
                line.push_str(&format!("; recommended: {}", h.recommendation));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Mine rows above the CTR cutoff for recurring message words and the
/// dominant creative type.
fn extract_patterns(records: &[AdRecord], ctr_cutoff: f64) -> SuccessfulPatterns {
    let winners: Vec<&AdRecord> = records.iter().filter(|r| r.ctr >= ctr_cutoff).collect();
    if winners.is_empty() {
        return SuccessfulPatterns::default();
    }

    let mut word_counts: HashMap<String, usize> = HashMap::new();
    for r in &winners {
        if let Some(message) = &r.creative_message {
            for word in message.to_lowercase().split_whitespace() {
                let word: String = word.chars().filter(|c| c.is_alphanumeric()).collect();
                if word.len() > 2 && !STOP_WORDS.contains(&word.as_str()) {
                    *word_counts.entry(word).or_insert(0) += 1;
                }
            }
        }
    }

    let mut ranked: Vec<(String, usize)> = word_counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut type_counts: HashMap<&str, usize> = HashMap::new();
    for r in &winners {
        if let Some(t) = &r.creative_type {
            *type_counts.entry(t.as_str()).or_insert(0) += 1;
        }
    }
    let best_type = type_counts
        .into_iter()
        .max_by_key(|(_, n)| *n)
        .map(|(t, _)| t.to_string())
        .unwrap_or_default();

    SuccessfulPatterns {
        top_themes: ranked.into_iter().take(5).map(|(w, _)| w).collect(),
        best_creative_type: best_type,
    }
}

/// Deterministic variants for the worst three campaigns when the LLM is
/// unavailable.
fn template_recommendations(targets: &[CampaignStats]) -> Vec<CreativeRecommendation> {
    targets
        .iter()
        .take(3)
        .map(|c| CreativeRecommendation {
            campaign_name: c.campaign_name.clone(),
            current_ctr: c.ctr,
            current_roas: c.roas,
            current_message: c.creative_message.clone().unwrap_or_default(),
            issue: format!("CTR of {:.3} is below the account threshold.", c.ctr),
            new_creatives: vec![
                CreativeVariant {
                    headline: "Limited Time: See What Everyone Is Talking About".to_string(),
                    message: "Join thousands of happy customers. Offer ends soon.".to_string(),
                    cta: "Shop Now".to_string(),
                    creative_type: "video".to_string(),
                    rationale: "Urgency plus social proof, the two highest-lift levers for low-CTR campaigns."
                        .to_string(),
                    inspiration: "template".to_string(),
                },
                CreativeVariant {
                    headline: "The Smarter Way to Get More".to_string(),
                    message: "Real results, real reviews. See why customers switch to us.".to_string(),
                    cta: "Learn More".to_string(),
                    creative_type: "carousel".to_string(),
                    rationale: "Benefit-led framing with a softer CTA for colder audiences.".to_string(),
                    inspiration: "template".to_string(),
                },
            ],
        })
        .collect()
}

/// Overwrite the current-metrics fields from our own data; the model is not
/// trusted to echo numbers back accurately.
fn fill_current_metrics(recommendations: &mut [CreativeRecommendation], targets: &[CampaignStats]) {
    for rec in recommendations {
        if let Some(target) = targets
            .iter()
            .find(|t| t.campaign_name == rec.campaign_name)
        {
            rec.current_ctr = target.ctr;
            rec.current_roas = target.roas;
            rec.current_message = target.creative_message.clone().unwrap_or_default();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::DataAgent;
    use crate::llm::StaticBackend;
    use crate::types::Hypothesis;
    use chrono::{NaiveDate, Utc};
    use serde_json::json;

    fn validated_insights() -> ValidatedInsights {
        ValidatedInsights {
            timestamp: Utc::now(),
            hypotheses: vec![Hypothesis {
                id: "H1".to_string(),
                hypothesis: "Static creatives are fatiguing the broad audience".to_string(),
                confidence: 0.8,
                evidence: vec![],
                recommendation: "Shift budget to video".to_string(),
                category: "creative".to_string(),
            }],
            overall_confidence: 0.8,
            validation_summary: "checked".to_string(),
        }
    }

    fn record(campaign: &str, ctr: f64, roas: f64, message: &str, ctype: &str) -> AdRecord {
        let impressions = 10_000u64;
        AdRecord {
            date: NaiveDate::from_ymd_opt(2024, 3, 1),
            campaign_name: campaign.to_string(),
            adset_name: None,
            creative_type: Some(ctype.to_string()),
            creative_message: Some(message.to_string()),
            audience_type: None,
            platform: None,
            spend: 200.0,
            impressions,
            clicks: (ctr * impressions as f64) as u64,
            purchases: 10,
            revenue: 200.0 * roas,
            ctr,
            roas,
        }
    }

    fn dataset() -> Vec<AdRecord> {
        let mut records = Vec::new();
        // Strong campaign, repeated message for pattern mining
        for _ in 0..10 {
            records.push(record("Winner", 0.030, 5.0, "Free shipping today only", "video"));
        }
        // Weak campaign below the default 0.015 CTR threshold
        for _ in 0..10 {
            records.push(record("Loser", 0.008, 1.5, "Buy our product", "static"));
        }
        records
    }

    #[test]
    fn test_extract_patterns_finds_themes_and_type() {
        let records = dataset();
        // Default low_ctr 0.015 * 1.5 = 0.0225: only Winner rows qualify
        let cutoff = AnalystConfig::default().thresholds.low_ctr * PATTERN_CTR_MULTIPLIER;
        let patterns = extract_patterns(&records, cutoff);
        assert!(patterns.top_themes.contains(&"free".to_string()));
        assert!(patterns.top_themes.contains(&"shipping".to_string()));
        assert_eq!(patterns.best_creative_type, "video");
    }

    #[test]
    fn test_render_hypotheses_lists_top_findings() {
        let rendered = render_hypotheses(&validated_insights());
        assert!(rendered.contains("Static creatives are fatiguing"));
        assert!(rendered.contains("0.80"));
        assert!(rendered.contains("Shift budget to video"));
    }

    #[test]
    fn test_extract_patterns_empty_when_no_winners() {
        let records = dataset();
        let patterns = extract_patterns(&records, 1.0);
        assert!(patterns.top_themes.is_empty());
        assert!(patterns.best_creative_type.is_empty());
    }

    #[tokio::test]
    async fn test_generate_skips_llm_when_no_underperformers() {
        let records: Vec<AdRecord> = (0..10)
            .map(|_| record("Fine", 0.025, 4.0, "Great stuff", "video"))
            .collect();
        let summary = DataAgent::new(Arc::new(AnalystConfig::default())).summarize(&records);
        let backend = Arc::new(StaticBackend::new(vec![]));
        let agent = CreativeAgent::new(backend.clone(), Arc::new(AnalystConfig::default()));
        let set = agent.generate(&records, &summary, &validated_insights()).await;
        assert!(set.recommendations.is_empty());
        assert!(set.note.is_some());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_generate_fills_metrics_from_data() {
        let records = dataset();
        let summary = DataAgent::new(Arc::new(AnalystConfig::default())).summarize(&records);
        let response = json!({
            "recommendations": [{
                "campaign_name": "Loser",
                "current_ctr": 0.99,
                "issue": "weak hook",
                "new_creatives": [
                    {"headline": "H", "message": "M", "cta": "C", "creative_type": "video",
                     "rationale": "R", "inspiration": "free shipping"}
                ]
            }]
        });
        let backend = Arc::new(StaticBackend::new(vec![response.to_string()]));
        let agent = CreativeAgent::new(backend, Arc::new(AnalystConfig::default()));
        let set = agent.generate(&records, &summary, &validated_insights()).await;
        assert_eq!(set.recommendations.len(), 1);
        // Model-echoed CTR overwritten with the real value
        assert!((set.recommendations[0].current_ctr - 0.008).abs() < 1e-9);
        assert!(set.successful_patterns.is_some());
    }

    #[tokio::test]
    async fn test_generate_templates_on_failure() {
        let records = dataset();
        let summary = DataAgent::new(Arc::new(AnalystConfig::default())).summarize(&records);
        let backend = Arc::new(StaticBackend::new(vec![
            "x".to_string(),
            "x".to_string(),
            "x".to_string(),
        ]));
        let agent = CreativeAgent::new(backend, Arc::new(AnalystConfig::default()));
        let set = agent.generate(&records, &summary, &validated_insights()).await;
        assert!(!set.recommendations.is_empty());
        assert_eq!(set.recommendations[0].new_creatives.len(), 2);
        assert_eq!(set.recommendations[0].campaign_name, "Loser");
    }
}
