//! Allocation optimizer.
//!
//! Recomputes upcoming allocations from the configured rules, falling back
//! to performance-share targets from the latest analytics window for dates
//! no rule covers.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::{AllocationRule, AllotmentConfig, FallbackStrategy, RuleKind};
use crate::infra::Result;

use super::rules::{apply_matching_rules, apply_rule_to_horizon, RuleOutcomeStatus};
use super::DynamicAllocator;

/// How far ahead the optimizer rewrites allocations.
const OPTIMIZE_HORIZON_DAYS: i64 = 30;

/// Summary of one optimization pass.
#[derive(Debug, Clone, Serialize)]
pub struct OptimizeSummary {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub dates_applied: u32,
    pub dates_skipped: u32,
    pub dates_failed: u32,
}

/// Recompute allocations over the optimization horizon. Dates covered by a
/// matching rule use that rule; the rest are redistributed by historical
/// performance when analytics exist.
pub fn optimize(
    config: &mut AllotmentConfig,
    today: NaiveDate,
    dynamic: Option<&dyn DynamicAllocator>,
    now: DateTime<Utc>,
) -> Result<OptimizeSummary> {
    let start = today;
    let end = today + Duration::days(OPTIMIZE_HORIZON_DAYS - 1);

    let mut outcomes = apply_matching_rules(config, start, end, today, dynamic, now)?;

    // Dates without a matching rule: redistribute by historical performance.
    let uncovered: Vec<NaiveDate> = outcomes
        .iter()
        .filter(|o| {
            o.status == RuleOutcomeStatus::Skipped
                && o.detail.as_deref() == Some("no matching rule")
        })
        .map(|o| o.date)
        .collect();
    if !uncovered.is_empty() && config.analytics.is_some() {
        let mut redistribute = AllocationRule::new("optimizer", RuleKind::Dynamic);
        redistribute.fallback = FallbackStrategy::HistoricalPerformance;
        let extra = apply_rule_to_horizon(config, &redistribute, &uncovered, today, dynamic, now);
        outcomes.retain(|o| !uncovered.contains(&o.date));
        outcomes.extend(extra);
    }

    let summary = OptimizeSummary {
        start,
        end,
        dates_applied: outcomes
            .iter()
            .filter(|o| o.status == RuleOutcomeStatus::Applied)
            .count() as u32,
        dates_skipped: outcomes
            .iter()
            .filter(|o| o.status == RuleOutcomeStatus::Skipped)
            .count() as u32,
        dates_failed: outcomes
            .iter()
            .filter(|o| o.status == RuleOutcomeStatus::Failed)
            .count() as u32,
    };

    tracing::info!(
        config_id = %config.id,
        applied = summary.dates_applied,
        skipped = summary.dates_skipped,
        failed = summary.dates_failed,
        "optimization pass complete"
    );
    Ok(summary)
}
