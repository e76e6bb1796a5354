//! Data agent - summarizes the ads dataset for downstream prompts.
//!
//! The only agent with no LLM call: everything here is arithmetic over the
//! loaded records. The resulting [`DataSummary`] is the numeric ground truth
//! every later prompt is built from.

use crate::config::AnalystConfig;
use crate::types::{
    AdRecord, CampaignBreakdown, CampaignStats, CreativeAnalysis, DataSummary, MessageStats,
    Overview, PerformanceMetrics, SegmentStats, TimeAnalysis, TopPerformers, Underperformers,
    WeekStats,
};
use chrono::{Duration, NaiveDate};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::info;

pub struct DataAgent {
    config: Arc<AnalystConfig>,
}

impl DataAgent {
    pub fn new(config: Arc<AnalystConfig>) -> Self {
        Self { config }
    }

    /// Produce the full statistical summary of the dataset.
    pub fn summarize(&self, records: &[AdRecord]) -> DataSummary {
        let summary = DataSummary {
            overview: overview(records),
            performance: performance(records),
            time_analysis: time_analysis(records),
            campaigns: campaign_breakdown(records),
            creative_analysis: creative_analysis(records),
            audiences: segment_stats(records, |r| r.audience_type.as_deref()),
            platforms: segment_stats(records, |r| r.platform.as_deref()),
            top_performers: self.top_performers(records),
            underperformers: self.underperformers(records),
        };

        info!(
            rows = summary.overview.total_rows,
            campaigns = summary.overview.unique_campaigns,
            avg_roas = format!("{:.2}", summary.performance.avg_roas),
            "Data summary complete"
        );

        summary
    }

    /// Campaigns worth imitating: best ROAS among those with real spend,
    /// plus the messages pulling the highest CTR.
    fn top_performers(&self, records: &[AdRecord]) -> TopPerformers {
        let min_spend = self.config.thresholds.min_spend;
        let campaigns_map = group_by_campaign(records);

        let mut campaigns: Vec<CampaignStats> = campaigns_map
            .values()
            .map(|rows| campaign_stats(rows))
            .filter(|c| c.spend >= min_spend)
            .collect();
        campaigns.sort_by(|a, b| b.roas.total_cmp(&a.roas));
        campaigns.truncate(10);

        let mut by_message: BTreeMap<&str, Vec<&AdRecord>> = BTreeMap::new();
        for r in records {
            if r.spend >= min_spend {
                if let Some(msg) = r.creative_message.as_deref() {
                    by_message.entry(msg).or_default().push(r);
                }
            }
        }
        let mut messages: Vec<MessageStats> = by_message
            .iter()
            .map(|(msg, rows)| MessageStats {
                creative_message: (*msg).to_string(),
                avg_ctr: mean(rows.iter().map(|r| r.ctr)),
                avg_roas: mean(rows.iter().map(|r| r.roas)),
                total_clicks: rows.iter().map(|r| r.clicks).sum(),
            })
            .collect();
        messages.sort_by(|a, b| b.avg_ctr.total_cmp(&a.avg_ctr));
        messages.truncate(10);

        TopPerformers {
            campaigns,
            messages,
        }
    }

    /// Campaigns needing attention: low CTR or low ROAS with spend above the
    /// judgment floor.
    fn underperformers(&self, records: &[AdRecord]) -> Underperformers {
        let t = &self.config.thresholds;
        let stats: Vec<CampaignStats> = group_by_campaign(records)
            .values()
            .map(|rows| campaign_stats(rows))
            .filter(|c| c.spend >= t.min_spend)
            .collect();

        let mut low_ctr: Vec<CampaignStats> = stats
            .iter()
            .filter(|c| c.ctr < t.low_ctr)
            .cloned()
            .collect();
        low_ctr.sort_by(|a, b| a.ctr.total_cmp(&b.ctr));
        let count_low_ctr = low_ctr.len();
        low_ctr.truncate(10);

        let mut low_roas: Vec<CampaignStats> = stats
            .iter()
            .filter(|c| c.roas < t.low_roas)
            .cloned()
            .collect();
        low_roas.sort_by(|a, b| a.roas.total_cmp(&b.roas));
        let count_low_roas = low_roas.len();
        low_roas.truncate(10);

        Underperformers {
            low_ctr,
            low_roas,
            count_low_ctr,
            count_low_roas,
        }
    }
}

// ============================================================================
// Aggregation helpers
// ============================================================================

fn overview(records: &[AdRecord]) -> Overview {
    let dates: Vec<NaiveDate> = records.iter().filter_map(|r| r.date).collect();
    let date_start = dates.iter().min().copied();
    let date_end = dates.iter().max().copied();
    let date_span_days = match (date_start, date_end) {
        (Some(s), Some(e)) => Some((e - s).num_days()),
        _ => None,
    };

    let campaigns: HashSet<&str> = records.iter().map(|r| r.campaign_name.as_str()).collect();
    let adsets: HashSet<&str> = records
        .iter()
        .filter_map(|r| r.adset_name.as_deref())
        .collect();

    Overview {
        total_rows: records.len(),
        date_start,
        date_end,
        date_span_days,
        unique_campaigns: campaigns.len(),
        unique_adsets: adsets.len(),
    }
}

fn performance(records: &[AdRecord]) -> PerformanceMetrics {
    PerformanceMetrics {
        total_spend: records.iter().map(|r| r.spend).sum(),
        total_revenue: records.iter().map(|r| r.revenue).sum(),
        total_impressions: records.iter().map(|r| r.impressions).sum(),
        total_clicks: records.iter().map(|r| r.clicks).sum(),
        total_purchases: records.iter().map(|r| r.purchases).sum(),
        avg_roas: mean(records.iter().map(|r| r.roas)),
        avg_ctr: mean(records.iter().map(|r| r.ctr)),
        median_roas: median(records.iter().map(|r| r.roas)),
        median_ctr: median(records.iter().map(|r| r.ctr)),
    }
}

/// Recent week vs the week before it, anchored on the newest date in the data.
fn time_analysis(records: &[AdRecord]) -> Option<TimeAnalysis> {
    let max_date = records.iter().filter_map(|r| r.date).max()?;
    let week_ago = max_date - Duration::days(7);
    let two_weeks_ago = max_date - Duration::days(14);

    let recent: Vec<&AdRecord> = records
        .iter()
        .filter(|r| r.date.is_some_and(|d| d > week_ago))
        .collect();
    let previous: Vec<&AdRecord> = records
        .iter()
        .filter(|r| r.date.is_some_and(|d| d > two_weeks_ago && d <= week_ago))
        .collect();

    let recent_week = week_stats(&recent);
    let previous_week = week_stats(&previous);
    let roas_change_pct = pct_change(recent_week.avg_roas, previous_week.avg_roas);
    let ctr_change_pct = pct_change(recent_week.avg_ctr, previous_week.avg_ctr);

    Some(TimeAnalysis {
        recent_week,
        previous_week,
        roas_change_pct,
        ctr_change_pct,
    })
}

fn week_stats(rows: &[&AdRecord]) -> WeekStats {
    WeekStats {
        avg_roas: mean(rows.iter().map(|r| r.roas)),
        avg_ctr: mean(rows.iter().map(|r| r.ctr)),
        total_spend: rows.iter().map(|r| r.spend).sum(),
        total_revenue: rows.iter().map(|r| r.revenue).sum(),
    }
}

fn campaign_breakdown(records: &[AdRecord]) -> CampaignBreakdown {
    let groups = group_by_campaign(records);
    let mut stats: Vec<CampaignStats> = groups.values().map(|rows| campaign_stats(rows)).collect();

    let total_campaigns = stats.len();

    stats.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    let top_by_revenue: Vec<CampaignStats> = stats.iter().take(5).cloned().collect();

    stats.sort_by(|a, b| b.roas.total_cmp(&a.roas));
    let top_by_roas: Vec<CampaignStats> = stats.iter().take(5).cloned().collect();

    CampaignBreakdown {
        total_campaigns,
        top_by_revenue,
        top_by_roas,
    }
}

fn creative_analysis(records: &[AdRecord]) -> Option<CreativeAnalysis> {
    let by_type = segment_stats(records, |r| r.creative_type.as_deref());
    if by_type.is_empty() {
        return None;
    }

    let best_type_roas = by_type
        .iter()
        .max_by(|a, b| a.avg_roas.total_cmp(&b.avg_roas))
        .map(|s| s.segment.clone())
        .unwrap_or_default();
    let best_type_ctr = by_type
        .iter()
        .max_by(|a, b| a.avg_ctr.total_cmp(&b.avg_ctr))
        .map(|s| s.segment.clone())
        .unwrap_or_default();

    Some(CreativeAnalysis {
        by_type,
        best_type_roas,
        best_type_ctr,
    })
}

/// Aggregate per segment value (creative type, audience, platform).
/// Rows without the segment field are skipped.
fn segment_stats<'a, F>(records: &'a [AdRecord], key: F) -> Vec<SegmentStats>
where
    F: Fn(&'a AdRecord) -> Option<&'a str>,
{
    let mut groups: BTreeMap<&str, Vec<&AdRecord>> = BTreeMap::new();
    for r in records {
        if let Some(k) = key(r) {
            groups.entry(k).or_default().push(r);
        }
    }

    groups
        .iter()
        .map(|(segment, rows)| SegmentStats {
            segment: (*segment).to_string(),
            avg_roas: mean(rows.iter().map(|r| r.roas)),
            avg_ctr: mean(rows.iter().map(|r| r.ctr)),
            total_spend: rows.iter().map(|r| r.spend).sum(),
            total_revenue: rows.iter().map(|r| r.revenue).sum(),
        })
        .collect()
}

pub(crate) fn group_by_campaign(records: &[AdRecord]) -> BTreeMap<&str, Vec<&AdRecord>> {
    let mut groups: BTreeMap<&str, Vec<&AdRecord>> = BTreeMap::new();
    for r in records {
        groups.entry(r.campaign_name.as_str()).or_default().push(r);
    }
    groups
}

pub(crate) fn campaign_stats(rows: &[&AdRecord]) -> CampaignStats {
    CampaignStats {
        campaign_name: rows
            .first()
            .map(|r| r.campaign_name.clone())
            .unwrap_or_default(),
        spend: rows.iter().map(|r| r.spend).sum(),
        revenue: rows.iter().map(|r| r.revenue).sum(),
        roas: mean(rows.iter().map(|r| r.roas)),
        ctr: mean(rows.iter().map(|r| r.ctr)),
        creative_message: rows.iter().find_map(|r| r.creative_message.clone()),
        creative_type: rows.iter().find_map(|r| r.creative_type.clone()),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        return 0.0;
    }
    collected.iter().sum::<f64>() / collected.len() as f64
}

fn median(values: impl Iterator<Item = f64>) -> f64 {
    let mut collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        return 0.0;
    }
    collected.sort_by(f64::total_cmp);
    let mid = collected.len() / 2;
    if collected.len() % 2 == 0 {
        (collected[mid - 1] + collected[mid]) / 2.0
    } else {
        collected[mid]
    }
}

/// Percentage change, 0 when the old value is 0.
pub(crate) fn pct_change(new_val: f64, old_val: f64) -> f64 {
    if old_val == 0.0 {
        return 0.0;
    }
    (new_val - old_val) / old_val * 100.0
}
