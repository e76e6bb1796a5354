//! Report writer - turns a finished run into files on disk.
//!
//! Four artifacts per run: a human-readable markdown report, the validated
//! insights and creative recommendations as JSON, and a timestamped run log
//! carrying the full pipeline context for later inspection.

use crate::config::AnalystConfig;
use crate::types::{CreativeSet, DataSummary, RunContext, ValidatedInsights};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report artifact: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to serialize run artifact: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Paths of everything a run wrote, echoed to the user at the end.
#[derive(Debug)]
pub struct ReportPaths {
    pub report: PathBuf,
    pub insights: PathBuf,
    pub creatives: PathBuf,
    pub run_log: PathBuf,
}

pub struct ReportWriter {
    config: Arc<AnalystConfig>,
}

impl ReportWriter {
    pub fn new(config: Arc<AnalystConfig>) -> Self {
        Self { config }
    }

    /// Write all artifacts for the run. Directories are created as needed.
    pub fn write(&self, ctx: &RunContext) -> Result<ReportPaths, ReportError> {
        let reports_dir = &self.config.output.reports_dir;
        let logs_dir = &self.config.output.logs_dir;
        fs::create_dir_all(reports_dir)?;
        fs::create_dir_all(logs_dir)?;

        let report = reports_dir.join("report.md");
        fs::write(&report, render_markdown(ctx))?;

        let insights = reports_dir.join("insights.json");
        if let Some(validated) = &ctx.insights {
            fs::write(&insights, serde_json::to_string_pretty(validated)?)?;
        }

        let creatives = reports_dir.join("creatives.json");
        if let Some(set) = &ctx.creatives {
            fs::write(&creatives, serde_json::to_string_pretty(set)?)?;
        }

        let run_log = logs_dir.join(format!(
            "run_{}.json",
            ctx.started_at.format("%Y%m%d_%H%M%S")
        ));
        fs::write(&run_log, serde_json::to_string_pretty(ctx)?)?;

        info!(report = %report.display(), run_log = %run_log.display(), "Run artifacts written");

        Ok(ReportPaths {
            report,
            insights,
            creatives,
            run_log,
        })
    }
}

// ============================================================================
// Markdown rendering
// ============================================================================

fn render_markdown(ctx: &RunContext) -> String {
    let mut out = String::new();

    out.push_str("# Facebook Ads Analysis Report\n\n");
    out.push_str(&format!("**Query:** {}\n\n", ctx.query));
    out.push_str(&format!(
        "**Generated:** {}\n\n",
        ctx.started_at.format("%Y-%m-%d %H:%M UTC")
    ));
    if ctx.reflection_ran {
        out.push_str("*Initial analysis fell below the confidence threshold; a reflection pass was run.*\n\n");
    }

    if let Some(summary) = &ctx.summary {
        out.push_str(&render_snapshot(summary));
    }
    if let Some(insights) = &ctx.insights {
        out.push_str(&render_findings(insights));
    }
    if let Some(creatives) = &ctx.creatives {
        out.push_str(&render_creatives(creatives));
    }
    out.push_str(&render_next_steps(ctx));

    out
}

fn render_snapshot(summary: &DataSummary) -> String {
    let mut out = String::from("## Data Snapshot\n\n");
    out.push_str(&format!(
        "- {} rows across {} campaigns\n",
        summary.overview.total_rows, summary.overview.unique_campaigns
    ));
    if let (Some(start), Some(end)) = (summary.overview.date_start, summary.overview.date_end) {
        out.push_str(&format!("- Date range: {start} to {end}\n"));
    }
    out.push_str(&format!(
        "- Total spend ${:.2}, total revenue ${:.2}\n",
        summary.performance.total_spend, summary.performance.total_revenue
    ));
    out.push_str(&format!(
        "- Average ROAS {:.2}, average CTR {:.3}\n",
        summary.performance.avg_roas, summary.performance.avg_ctr
    ));
    if let Some(trend) = &summary.time_analysis {
        out.push_str(&format!(
            "- Week over week: ROAS {:+.1}%, CTR {:+.1}%\n",
            trend.roas_change_pct, trend.ctr_change_pct
        ));
    }
    out.push('\n');
    out
}

fn render_findings(insights: &ValidatedInsights) -> String {
    let mut out = String::from("## Key Findings\n\n");
    out.push_str(&format!(
        "Overall confidence: **{:.0}%**. {}\n\n",
        insights.overall_confidence * 100.0,
        insights.validation_summary
    ));

    for (i, h) in insights.hypotheses.iter().take(3).enumerate() {
        out.push_str(&format!(
            "### {}. {} ({:.0}% confidence)\n\n",
            i + 1,
            h.hypothesis,
            h.confidence * 100.0
        ));
        for e in &h.evidence {
            out.push_str(&format!("- {e}\n"));
        }
        if !h.recommendation.is_empty() {
            out.push_str(&format!("\n**Recommended action:** {}\n", h.recommendation));
        }
        out.push('\n');
    }
    out
}

fn render_creatives(creatives: &CreativeSet) -> String {
    let mut out = String::from("## Creative Recommendations\n\n");

    if let Some(note) = &creatives.note {
        out.push_str(&format!("{note}\n\n"));
        return out;
    }

    if let Some(patterns) = &creatives.successful_patterns {
        if !patterns.top_themes.is_empty() {
            out.push_str(&format!(
                "Themes that work in this account: {}.\n",
                patterns.top_themes.join(", ")
            ));
        }
        if !patterns.best_creative_type.is_empty() {
            out.push_str(&format!(
                "Best performing creative type: {}.\n",
                patterns.best_creative_type
            ));
        }
        out.push('\n');
    }

    for rec in creatives.recommendations.iter().take(5) {
        out.push_str(&format!(
            "### {} (CTR {:.3}, ROAS {:.2})\n\n",
            rec.campaign_name, rec.current_ctr, rec.current_roas
        ));
        if !rec.issue.is_empty() {
            out.push_str(&format!("{}\n\n", rec.issue));
        }
        for (i, variant) in rec.new_creatives.iter().take(2).enumerate() {
            out.push_str(&format!(
                "**Variant {}: {}** ({})\n\n",
                i + 1,
                variant.headline,
                variant.creative_type
            ));
            out.push_str(&format!("> {}\n>\n> CTA: {}\n\n", variant.message, variant.cta));
            if !variant.rationale.is_empty() {
                out.push_str(&format!("*{}*\n\n", variant.rationale));
            }
        }
    }
    out
}

fn render_next_steps(ctx: &RunContext) -> String {
    let mut out = String::from("## Next Steps\n\n");
    let has_creatives = ctx
        .creatives
        .as_ref()
        .map(|c| !c.recommendations.is_empty())
        .unwrap_or(false);

    out.push_str("1. Review the top findings above and confirm them against the ad account.\n");
    if has_creatives {
        out.push_str("2. Launch the proposed creative variants as an A/B test against the current creatives.\n");
        out.push_str("3. Re-run this analysis after one week of test data.\n");
    } else {
        out.push_str("2. Re-run this analysis after the next reporting period.\n");
    }
    out.push('\n');
    out
}
