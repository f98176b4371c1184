//! Rolling performance analytics attached to an allotment configuration.
//!
//! Analytics live in a separate, overwritable slot on the aggregate and are
//! never on the critical path of a reservation.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ChannelId;

/// How often the analytics sweep recomputes metrics for a configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalculationFrequency {
    Hourly,
    Daily,
    Weekly,
}

impl CalculationFrequency {
    pub fn interval(&self) -> Duration {
        match self {
            CalculationFrequency::Hourly => Duration::hours(1),
            CalculationFrequency::Daily => Duration::days(1),
            CalculationFrequency::Weekly => Duration::weeks(1),
        }
    }
}

/// The analytics slot: metric windows, alerts and the rolling advisory list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analytics {
    pub last_calculated: DateTime<Utc>,
    pub next_calculation: DateTime<Utc>,
    pub frequency: CalculationFrequency,
    /// Metric windows, oldest first. Trailing 12 months are retained.
    pub windows: Vec<MetricsWindow>,
    pub alerts: Vec<Alert>,
    /// Overwritten on each analytics pass; not an append log.
    pub recommendations: Vec<Recommendation>,
}

impl Analytics {
    pub fn new(frequency: CalculationFrequency, now: DateTime<Utc>) -> Self {
        Self {
            last_calculated: now,
            next_calculation: now + frequency.interval(),
            frequency,
            windows: Vec::new(),
            alerts: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn latest_window(&self) -> Option<&MetricsWindow> {
        self.windows.last()
    }

    /// Drop windows that ended more than ~12 months before `today`.
    pub fn evict_stale_windows(&mut self, today: NaiveDate) {
        let horizon = today - Duration::days(365);
        self.windows.retain(|w| w.end >= horizon);
    }
}

/// Metrics computed over one [start, end] date window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub channels: BTreeMap<ChannelId, ChannelMetrics>,
    pub overall: OverallMetrics,
}

/// Per-channel performance over a window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelMetrics {
    pub allocated: u64,
    pub sold: u64,
    pub revenue: f64,
    /// Average daily rate: revenue / sold, 0 when nothing sold.
    pub adr: f64,
    /// sold / allocated * 100, 0 when nothing allocated.
    pub conversion: f64,
    /// Synonym of conversion, retained for back-compat.
    pub utilization: f64,
    pub cancellation_rate: f64,
    pub no_show_rate: f64,
    /// Days between booking and check-in; 0 when no external booking
    /// timestamps are available.
    pub lead_time_days: f64,
    /// Revenue per allocated room.
    pub revpar: f64,
}

/// Aggregated metrics across all channels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallMetrics {
    pub allocated: u64,
    pub sold: u64,
    pub revenue: f64,
    pub adr: f64,
    pub revpar: f64,
    /// Mean of the per-day occupancy rates in the window.
    pub average_occupancy: f64,
}

/// An advisory condition raised by the analytics pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
    pub raised_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// An advisory action derived from the latest metrics window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub action: RecommendedAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<ChannelId>,
    pub priority: RecommendationPriority,
    /// 0..=100.
    pub confidence: u8,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    IncreaseAllocation,
    DecreaseAllocation,
    AdjustRates,
    ChangeRestrictions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    Low,
    Medium,
    High,
}
