//! Analytics aggregation over daily records.
//!
//! Computes rolling per-channel and overall metrics for a window. The
//! aggregator either computes from recorded data or fails; it never
//! synthesizes values. Re-running over the same window yields identical
//! metrics.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};

use crate::domain::{
    Analytics, AllotmentConfig, CalculationFrequency, ChangeAction, ChannelId, ChannelMetrics,
    Clock, MetricsWindow, OverallMetrics,
};
use crate::infra::{EngineError, Result};

use super::recommend::generate_recommendations;

/// Days covered by a scheduled analytics sweep, per frequency.
fn sweep_window_days(frequency: CalculationFrequency) -> i64 {
    match frequency {
        CalculationFrequency::Hourly | CalculationFrequency::Daily => 30,
        CalculationFrequency::Weekly => 84,
    }
}

/// Compute metrics for an inclusive window from the configuration's daily
/// records and change log.
pub fn compute_window(
    config: &AllotmentConfig,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<MetricsWindow> {
    if end < start {
        return Err(EngineError::validation("end", "must not precede start"));
    }

    let mut channels: BTreeMap<ChannelId, ChannelMetrics> = BTreeMap::new();
    let mut day_count = 0u64;
    let mut occupancy_sum = 0.0;

    for (_, record) in config.records_in_range(start, end) {
        day_count += 1;
        occupancy_sum += record.occupancy_rate;
        for allotment in &record.channels {
            let metrics = channels.entry(allotment.channel_id).or_default();
            metrics.allocated += u64::from(allotment.allocated);
            metrics.sold += u64::from(allotment.sold);
            metrics.revenue += f64::from(allotment.sold) * allotment.rate;
        }
    }

    // Cancellations and no-shows come from released log entries carrying
    // structured details inside the window.
    let mut released: BTreeMap<ChannelId, (u64, u64)> = BTreeMap::new();
    for entry in &config.change_log {
        if entry.action != ChangeAction::Released {
            continue;
        }
        let date = entry.timestamp.date_naive();
        if date < start || date > end {
            continue;
        }
        let Some(details) = &entry.details else { continue };
        let Some(channel) = details
            .get("channel")
            .and_then(|v| serde_json::from_value::<ChannelId>(v.clone()).ok())
        else {
            continue;
        };
        let rooms = details.get("rooms").and_then(|v| v.as_u64()).unwrap_or(0);
        let slot = released.entry(channel).or_insert((0, 0));
        slot.0 += rooms;
        if entry.reason.as_deref() == Some("no_show") {
            slot.1 += rooms;
        }
    }

    for (channel, metrics) in &mut channels {
        metrics.adr = if metrics.sold == 0 {
            0.0
        } else {
            metrics.revenue / metrics.sold as f64
        };
        metrics.conversion = if metrics.allocated == 0 {
            0.0
        } else {
            metrics.sold as f64 / metrics.allocated as f64 * 100.0
        };
        metrics.utilization = metrics.conversion;
        metrics.revpar = if metrics.allocated == 0 {
            0.0
        } else {
            metrics.revenue / metrics.allocated as f64
        };
        if let Some((cancelled, no_shows)) = released.get(channel) {
            let turnover = metrics.sold + cancelled;
            if turnover > 0 {
                metrics.cancellation_rate = *cancelled as f64 / turnover as f64 * 100.0;
                metrics.no_show_rate = *no_shows as f64 / turnover as f64 * 100.0;
            }
        }
        // No external booking timestamps flow through the engine.
        metrics.lead_time_days = 0.0;
    }

    let allocated: u64 = channels.values().map(|m| m.allocated).sum();
    let sold: u64 = channels.values().map(|m| m.sold).sum();
    let revenue: f64 = channels.values().map(|m| m.revenue).sum();
    let overall = OverallMetrics {
        allocated,
        sold,
        revenue,
        adr: if sold == 0 { 0.0 } else { revenue / sold as f64 },
        revpar: if allocated == 0 {
            0.0
        } else {
            revenue / allocated as f64
        },
        average_occupancy: if day_count == 0 {
            0.0
        } else {
            occupancy_sum / day_count as f64
        },
    };

    Ok(MetricsWindow {
        start,
        end,
        channels,
        overall,
    })
}

/// Scheduled analytics pass: compute the trailing window, retain twelve
/// months of windows, refresh recommendations and alerts, and schedule the
/// next run. Idempotent for a fixed clock.
pub fn run_analytics(config: &mut AllotmentConfig, clock: &dyn Clock) -> Result<()> {
    let now = clock.now();
    let today = clock.today_local(config.utc_offset_minutes);

    let frequency = config
        .analytics
        .as_ref()
        .map(|a| a.frequency)
        .unwrap_or(CalculationFrequency::Daily);
    let start = today - Duration::days(sweep_window_days(frequency));
    let window = compute_window(config, start, today)?;

    let mut analytics = config
        .analytics
        .take()
        .unwrap_or_else(|| Analytics::new(frequency, now));

    // Replace a window covering the same range rather than stacking it.
    analytics
        .windows
        .retain(|w| !(w.start == window.start && w.end == window.end));
    analytics.windows.push(window);
    analytics.windows.sort_by_key(|w| (w.start, w.end));
    analytics.evict_stale_windows(today);

    analytics.recommendations = generate_recommendations(&analytics);
    analytics.alerts = super::recommend::generate_alerts(&analytics, config.needs_sync, now);
    analytics.last_calculated = now;
    analytics.next_calculation = now + analytics.frequency.interval();

    config.analytics = Some(analytics);
    Ok(())
}
