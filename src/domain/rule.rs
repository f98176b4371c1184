//! Allocation rules: declarative rewrites of per-channel allocations.
//!
//! A rule is a tagged variant per allocation strategy plus the conditions
//! gating which dates it applies to. Rules never touch `sold`.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::ids::{ChannelId, RuleId};

/// A declarative allocation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRule {
    pub id: RuleId,
    pub name: String,
    pub active: bool,
    #[serde(flatten)]
    pub kind: RuleKind,
    pub conditions: RuleConditions,
    pub fallback: FallbackStrategy,
}

/// The allocation strategy payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleKind {
    /// Percentages of total inventory per channel; remainder stays free.
    Percentage { shares: BTreeMap<ChannelId, f64> },
    /// Absolute room counts per channel, clamped to total inventory.
    Fixed { counts: BTreeMap<ChannelId, u32> },
    /// Descending channel priority with per-channel min/max caps.
    Priority { caps: BTreeMap<ChannelId, PriorityCap> },
    /// Externally supplied allocation function; falls back to the rule's
    /// fallback strategy when no function is registered.
    Dynamic,
}

/// Per-channel bounds for the priority strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriorityCap {
    pub min: u32,
    pub max: u32,
}

/// Every configured condition must match for a rule to apply to a date.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConditions {
    /// Inclusive applicable date range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<NaiveDate>,
    /// Applicable days of week; empty/None means all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<Weekday>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    /// Minimum occupancy on the prior day, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_occupancy_pct: Option<f64>,
    /// Booking window: date must lie this many days ahead of "today",
    /// inclusive on both ends.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advance_window_days: Option<AdvanceWindow>,
}

/// Inclusive advance-booking window in days.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AdvanceWindow {
    pub min: u32,
    pub max: u32,
}

impl RuleConditions {
    /// Does every configured condition match for `date`?
    ///
    /// `prior_occupancy` is the previous day's occupancy rate when known;
    /// an occupancy threshold with no prior-day data does not match.
    pub fn matches(
        &self,
        date: NaiveDate,
        today: NaiveDate,
        prior_occupancy: Option<f64>,
    ) -> bool {
        if let Some(start) = self.start {
            if date < start {
                return false;
            }
        }
        if let Some(end) = self.end {
            if date > end {
                return false;
            }
        }
        if let Some(days) = &self.days_of_week {
            if !days.is_empty() && !days.contains(&date.weekday()) {
                return false;
            }
        }
        if let Some(threshold) = self.min_occupancy_pct {
            match prior_occupancy {
                Some(occ) if occ >= threshold => {}
                _ => return false,
            }
        }
        if let Some(window) = self.advance_window_days {
            let lead = (date - today).num_days();
            if lead < i64::from(window.min) || lead > i64::from(window.max) {
                return false;
            }
        }
        true
    }
}

/// What to do when the dynamic strategy has no external function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackStrategy {
    EqualDistribution,
    PriorityBased,
    HistoricalPerformance,
    RevenueOptimization,
}

impl AllocationRule {
    pub fn new(name: impl Into<String>, kind: RuleKind) -> Self {
        Self {
            id: RuleId::new(),
            name: name.into(),
            active: true,
            kind,
            conditions: RuleConditions::default(),
            fallback: FallbackStrategy::EqualDistribution,
        }
    }

    /// Payload validation against the configured total inventory.
    pub fn validate(&self, total_inventory: u32) -> Result<(), String> {
        match &self.kind {
            RuleKind::Percentage { shares } => {
                if shares.values().any(|pct| *pct < 0.0) {
                    return Err(format!("rule {}: negative percentage share", self.name));
                }
                let sum: f64 = shares.values().sum();
                if sum > 100.0 + 1e-9 {
                    return Err(format!(
                        "rule {}: percentage shares sum to {sum:.2}, above 100",
                        self.name
                    ));
                }
            }
            RuleKind::Fixed { counts } => {
                let sum: u64 = counts.values().map(|c| u64::from(*c)).sum();
                if sum > u64::from(total_inventory) {
                    return Err(format!(
                        "rule {}: fixed counts sum to {sum}, above inventory {total_inventory}",
                        self.name
                    ));
                }
            }
            RuleKind::Priority { caps } => {
                for (channel, cap) in caps {
                    if cap.max < cap.min {
                        return Err(format!(
                            "rule {}: {channel} max cap {} below min cap {}",
                            self.name, cap.max, cap.min
                        ));
                    }
                }
            }
            RuleKind::Dynamic => {}
        }
        if let Some(window) = self.conditions.advance_window_days {
            if window.max < window.min {
                return Err(format!(
                    "rule {}: advance window max {} below min {}",
                    self.name, window.max, window.min
                ));
            }
        }
        Ok(())
    }
}

/// Round a fractional room count to the nearest integer, ties toward the
/// lower value.
pub fn round_share(value: f64) -> u32 {
    let floor = value.floor();
    let frac = value - floor;
    let rounded = if frac > 0.5 { floor + 1.0 } else { floor };
    rounded.max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn round_share_ties_go_lower() {
        assert_eq!(round_share(2.5), 2);
        assert_eq!(round_share(2.51), 3);
        assert_eq!(round_share(2.49), 2);
        assert_eq!(round_share(40.0), 40);
    }

    #[test]
    fn percentage_over_100_rejected() {
        let mut shares = BTreeMap::new();
        shares.insert(ChannelId::Direct, 60.0);
        shares.insert(ChannelId::Expedia, 50.0);
        let rule = AllocationRule::new("summer", RuleKind::Percentage { shares });
        assert!(rule.validate(100).is_err());
    }

    #[test]
    fn fixed_above_inventory_rejected() {
        let mut counts = BTreeMap::new();
        counts.insert(ChannelId::Direct, 80);
        counts.insert(ChannelId::Expedia, 30);
        let rule = AllocationRule::new("fixed", RuleKind::Fixed { counts });
        assert!(rule.validate(100).is_err());
        assert!(rule.validate(110).is_ok());
    }

    #[test]
    fn conditions_date_range_is_inclusive() {
        let conditions = RuleConditions {
            start: Some(d("2023-06-01")),
            end: Some(d("2023-06-07")),
            ..RuleConditions::default()
        };
        let today = d("2023-05-01");
        assert!(conditions.matches(d("2023-06-01"), today, None));
        assert!(conditions.matches(d("2023-06-07"), today, None));
        assert!(!conditions.matches(d("2023-06-08"), today, None));
    }

    #[test]
    fn conditions_occupancy_threshold_needs_prior_data() {
        let conditions = RuleConditions {
            min_occupancy_pct: Some(70.0),
            ..RuleConditions::default()
        };
        let today = d("2023-06-01");
        assert!(!conditions.matches(d("2023-06-02"), today, None));
        assert!(!conditions.matches(d("2023-06-02"), today, Some(50.0)));
        assert!(conditions.matches(d("2023-06-02"), today, Some(80.0)));
    }

    #[test]
    fn conditions_advance_window() {
        let conditions = RuleConditions {
            advance_window_days: Some(AdvanceWindow { min: 7, max: 30 }),
            ..RuleConditions::default()
        };
        let today = d("2023-06-01");
        assert!(!conditions.matches(d("2023-06-05"), today, None));
        assert!(conditions.matches(d("2023-06-08"), today, None));
        assert!(conditions.matches(d("2023-07-01"), today, None));
        assert!(!conditions.matches(d("2023-07-02"), today, None));
    }

    #[test]
    fn rule_kind_serde_tag() {
        let mut shares = BTreeMap::new();
        shares.insert(ChannelId::Direct, 40.0);
        let rule = AllocationRule::new("pct", RuleKind::Percentage { shares });
        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["type"], "percentage");
        let back: AllocationRule = serde_json::from_value(json).unwrap();
        assert!(matches!(back.kind, RuleKind::Percentage { .. }));
    }
}
