//! Allocation rule engine.
//!
//! Applies a rule over a date range, rewriting per-channel allocations on
//! each daily record. Rules never touch `sold`; a date where the rewrite
//! would drop an allocation below what is already sold fails that date and
//! processing continues.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::{
    round_share, AllocationRule, AllotmentConfig, ChannelId, FallbackStrategy, RuleId, RuleKind,
};
use crate::infra::{EngineError, Result};

use super::daily_manager::{ensure_allotment, get_or_seed};

/// Externally supplied allocation function for the dynamic rule type.
///
/// Returns per-channel allocations for the date, summing to at most the
/// total inventory, or `None` to defer to the rule's fallback strategy.
pub trait DynamicAllocator: Send + Sync {
    fn allocate(
        &self,
        config: &AllotmentConfig,
        date: NaiveDate,
    ) -> Option<BTreeMap<ChannelId, u32>>;
}

/// Outcome of applying a rule to a single date.
#[derive(Debug, Clone, Serialize)]
pub struct RuleOutcome {
    pub date: NaiveDate,
    pub status: RuleOutcomeStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOutcomeStatus {
    Applied,
    Skipped,
    Failed,
}

/// Apply one rule by id over an inclusive date range, returning a per-date
/// outcome list. The configuration is mutated in place; persisting it is the
/// caller's concern.
pub fn apply_rule(
    config: &mut AllotmentConfig,
    rule_id: &RuleId,
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
    dynamic: Option<&dyn DynamicAllocator>,
    now: DateTime<Utc>,
) -> Result<Vec<RuleOutcome>> {
    if end < start {
        return Err(EngineError::validation("end", "must not precede start"));
    }
    let rule = config
        .rule(rule_id)
        .ok_or(EngineError::RuleNotFound(*rule_id))?
        .clone();
    if !rule.active {
        return Err(EngineError::validation(
            "rule",
            format!("rule {} is inactive", rule.name),
        ));
    }

    let mut outcomes = Vec::new();
    let mut date = start;
    while date <= end {
        outcomes.push(apply_rule_to_date(config, &rule, date, today, dynamic, now));
        date += Duration::days(1);
    }
    Ok(outcomes)
}

/// First active rule whose conditions all match the date, in list order.
/// List order is priority order; later matching rules never override.
pub fn select_rule<'a>(
    config: &'a AllotmentConfig,
    date: NaiveDate,
    today: NaiveDate,
) -> Option<&'a AllocationRule> {
    let prior = config.prior_day_occupancy(date);
    config
        .rules
        .iter()
        .find(|rule| rule.active && rule.conditions.matches(date, today, prior))
}

/// For each date in range, apply the first matching rule, if any.
pub fn apply_matching_rules(
    config: &mut AllotmentConfig,
    start: NaiveDate,
    end: NaiveDate,
    today: NaiveDate,
    dynamic: Option<&dyn DynamicAllocator>,
    now: DateTime<Utc>,
) -> Result<Vec<RuleOutcome>> {
    if end < start {
        return Err(EngineError::validation("end", "must not precede start"));
    }
    let mut outcomes = Vec::new();
    let mut date = start;
    while date <= end {
        match select_rule(config, date, today).cloned() {
            Some(rule) => {
                outcomes.push(apply_rule_to_date(config, &rule, date, today, dynamic, now))
            }
            None => outcomes.push(RuleOutcome {
                date,
                status: RuleOutcomeStatus::Skipped,
                detail: Some("no matching rule".to_string()),
            }),
        }
        date += Duration::days(1);
    }
    Ok(outcomes)
}

/// Apply one rule object to an explicit set of dates. Used by the optimizer
/// for its synthetic redistribution rule.
pub(crate) fn apply_rule_to_horizon(
    config: &mut AllotmentConfig,
    rule: &AllocationRule,
    dates: &[NaiveDate],
    today: NaiveDate,
    dynamic: Option<&dyn DynamicAllocator>,
    now: DateTime<Utc>,
) -> Vec<RuleOutcome> {
    dates
        .iter()
        .map(|date| apply_rule_to_date(config, rule, *date, today, dynamic, now))
        .collect()
}

fn apply_rule_to_date(
    config: &mut AllotmentConfig,
    rule: &AllocationRule,
    date: NaiveDate,
    today: NaiveDate,
    dynamic: Option<&dyn DynamicAllocator>,
    now: DateTime<Utc>,
) -> RuleOutcome {
    let prior = config.prior_day_occupancy(date);
    if !rule.conditions.matches(date, today, prior) {
        return RuleOutcome {
            date,
            status: RuleOutcomeStatus::Skipped,
            detail: Some("conditions not met".to_string()),
        };
    }

    let total = config.defaults.total_inventory;
    let (targets, mut detail) = match compute_targets(config, rule, date, total, dynamic) {
        Ok(pair) => pair,
        Err(message) => {
            return RuleOutcome {
                date,
                status: RuleOutcomeStatus::Failed,
                detail: Some(message),
            }
        }
    };

    // A rewrite may not drop any channel below its current sold + blocked.
    {
        let record = get_or_seed(config, date);
        for allotment in &record.channels {
            let target = targets.get(&allotment.channel_id).copied().unwrap_or(0);
            let floor = allotment.sold + allotment.blocked;
            if target < floor {
                return RuleOutcome {
                    date,
                    status: RuleOutcomeStatus::Failed,
                    detail: Some(format!(
                        "allocation {target} for {} below sold+blocked {floor}",
                        allotment.channel_id
                    )),
                };
            }
        }
    }

    let channels = config.channels.clone();
    let defaults = config.defaults.clone();
    let record = get_or_seed(config, date);
    let mut working = record.clone();

    // Channels absent from the target map lose their allocation; the rule
    // defines the complete distribution for the date.
    for allotment in &mut working.channels {
        allotment.allocated = targets.get(&allotment.channel_id).copied().unwrap_or(0);
        allotment.last_updated = now;
    }
    for (channel_id, target) in &targets {
        if working.channel(*channel_id).is_none() {
            match ensure_allotment(&channels, &mut working, *channel_id, now) {
                Ok(allotment) => allotment.allocated = *target,
                Err(e) => {
                    return RuleOutcome {
                        date,
                        status: RuleOutcomeStatus::Failed,
                        detail: Some(e.to_string()),
                    }
                }
            }
        }
    }

    working.recompute();
    if let Err((invariant, message)) = working.check_invariants(&defaults) {
        return RuleOutcome {
            date,
            status: RuleOutcomeStatus::Failed,
            detail: Some(format!("{invariant}: {message}")),
        };
    }

    *get_or_seed(config, date) = working;
    RuleOutcome {
        date,
        status: RuleOutcomeStatus::Applied,
        detail: detail.take(),
    }
}

/// Compute the complete per-channel allocation for a date under the rule.
/// The optional string is a warning carried into the outcome detail.
fn compute_targets(
    config: &AllotmentConfig,
    rule: &AllocationRule,
    date: NaiveDate,
    total: u32,
    dynamic: Option<&dyn DynamicAllocator>,
) -> std::result::Result<(BTreeMap<ChannelId, u32>, Option<String>), String> {
    match &rule.kind {
        RuleKind::Percentage { shares } => {
            let mut targets = BTreeMap::new();
            for (channel, pct) in shares {
                targets.insert(*channel, round_share(f64::from(total) * pct / 100.0));
            }
            Ok((targets, None))
        }
        RuleKind::Fixed { counts } => {
            let mut warning = None;
            let mut targets = BTreeMap::new();
            for (channel, count) in counts {
                let clamped = (*count).min(total);
                if clamped < *count {
                    warning = Some(format!(
                        "{channel} fixed allocation {count} clamped to inventory {total}"
                    ));
                }
                targets.insert(*channel, clamped);
            }
            Ok((targets, warning))
        }
        RuleKind::Priority { caps } => {
            // Descending channel priority, equal priorities broken by
            // channel-id lexicographic order.
            let mut ordered: Vec<_> = config
                .channels
                .iter()
                .filter(|c| caps.contains_key(&c.id))
                .collect();
            ordered.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then_with(|| a.id.as_str().cmp(b.id.as_str()))
            });

            let mut remaining = total;
            let mut targets = BTreeMap::new();
            for channel in ordered {
                let cap = caps[&channel.id];
                let want = cap.max.min(cap.min.max(remaining));
                let granted = if want > remaining { 0 } else { want };
                targets.insert(channel.id, granted);
                remaining -= granted;
            }
            Ok((targets, None))
        }
        RuleKind::Dynamic => {
            if let Some(allocator) = dynamic {
                if let Some(targets) = allocator.allocate(config, date) {
                    let sum: u64 = targets.values().map(|v| u64::from(*v)).sum();
                    if sum > u64::from(total) {
                        return Err(format!(
                            "dynamic allocation sums to {sum}, above inventory {total}"
                        ));
                    }
                    return Ok((targets, None));
                }
            }
            fallback_targets(config, rule.fallback, total)
        }
    }
}

/// Distribution used when the dynamic rule has no external function.
fn fallback_targets(
    config: &AllotmentConfig,
    strategy: FallbackStrategy,
    total: u32,
) -> std::result::Result<(BTreeMap<ChannelId, u32>, Option<String>), String> {
    let active: Vec<_> = config.channels.iter().filter(|c| c.active).collect();
    if active.is_empty() {
        return Err("no active channels to allocate to".to_string());
    }

    let weights: Vec<(ChannelId, f64)> = match strategy {
        FallbackStrategy::EqualDistribution => {
            active.iter().map(|c| (c.id, 1.0)).collect()
        }
        FallbackStrategy::PriorityBased => active
            .iter()
            .map(|c| (c.id, f64::from(c.priority).max(0.0)))
            .collect(),
        FallbackStrategy::HistoricalPerformance | FallbackStrategy::RevenueOptimization => {
            let window = config
                .analytics
                .as_ref()
                .and_then(|a| a.latest_window());
            match window {
                Some(window) => active
                    .iter()
                    .map(|c| {
                        let weight = window
                            .channels
                            .get(&c.id)
                            .map(|m| {
                                if strategy == FallbackStrategy::HistoricalPerformance {
                                    m.sold as f64
                                } else {
                                    m.revenue
                                }
                            })
                            .unwrap_or(0.0);
                        (c.id, weight)
                    })
                    .collect(),
                // No analytics yet: fall through to an even split.
                None => active.iter().map(|c| (c.id, 1.0)).collect(),
            }
        }
    };

    let sum: f64 = weights.iter().map(|(_, w)| w).sum();
    let mut targets = BTreeMap::new();
    if sum <= 0.0 {
        let share = f64::from(total) / active.len() as f64;
        for channel in &active {
            targets.insert(channel.id, round_share(share));
        }
    } else {
        for (channel, weight) in &weights {
            targets.insert(*channel, round_share(f64::from(total) * weight / sum));
        }
    }

    // Rounding must never allocate above inventory; trim from the smallest
    // shares up if it does.
    let mut allocated: u64 = targets.values().map(|v| u64::from(*v)).sum();
    while allocated > u64::from(total) {
        let (channel, value) = targets
            .iter()
            .filter(|(_, v)| **v > 0)
            .min_by_key(|(channel, v)| (**v, channel.as_str()))
            .map(|(c, v)| (*c, *v))
            .expect("allocated > 0 implies a positive share");
        targets.insert(channel, value - 1);
        allocated -= 1;
    }

    Ok((targets, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Channel, DefaultSettings, HotelId, PriorityCap, RoomTypeId,
    };
    use crate::engine::daily_manager::ChannelAllotmentPatch;
    use crate::engine::upsert_channel;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn config(total: u32) -> AllotmentConfig {
        let mut cfg = AllotmentConfig::new(
            HotelId::new(),
            RoomTypeId::new(),
            "Std",
            DefaultSettings {
                total_inventory: total,
                ..DefaultSettings::default()
            },
            Utc::now(),
        );
        cfg.channels
            .push(Channel::new(ChannelId::Direct, "Direct", 100.0));
        cfg.channels
            .push(Channel::new(ChannelId::BookingCom, "Booking.com", 110.0));
        cfg.channels
            .push(Channel::new(ChannelId::Expedia, "Expedia", 105.0));
        cfg
    }

    fn percentage_rule(shares: &[(ChannelId, f64)]) -> AllocationRule {
        AllocationRule::new(
            "pct",
            RuleKind::Percentage {
                shares: shares.iter().copied().collect(),
            },
        )
    }

    #[test]
    fn percentage_rule_distributes_and_is_idempotent() {
        let mut cfg = config(100);
        let rule = percentage_rule(&[
            (ChannelId::Direct, 40.0),
            (ChannelId::BookingCom, 35.0),
            (ChannelId::Expedia, 25.0),
        ]);
        let rule_id = rule.id;
        cfg.rules.push(rule);

        let today = d("2023-05-01");
        let outcomes =
            apply_rule(&mut cfg, &rule_id, d("2023-06-01"), d("2023-06-07"), today, None, Utc::now())
                .unwrap();
        assert_eq!(outcomes.len(), 7);
        assert!(outcomes
            .iter()
            .all(|o| o.status == RuleOutcomeStatus::Applied));

        let check = |cfg: &AllotmentConfig| {
            for (_, record) in cfg.records_in_range(d("2023-06-01"), d("2023-06-07")) {
                assert_eq!(record.channel(ChannelId::Direct).unwrap().allocated, 40);
                assert_eq!(record.channel(ChannelId::BookingCom).unwrap().allocated, 35);
                assert_eq!(record.channel(ChannelId::Expedia).unwrap().allocated, 25);
                assert_eq!(record.free_stock, 0);
            }
        };
        check(&cfg);

        // Second application changes nothing.
        apply_rule(&mut cfg, &rule_id, d("2023-06-01"), d("2023-06-07"), today, None, Utc::now())
            .unwrap();
        check(&cfg);
    }

    #[test]
    fn rule_failing_one_date_continues_with_the_rest() {
        let mut cfg = config(10);
        // Sell 5 direct rooms on 2023-06-02.
        upsert_channel(
            &mut cfg,
            d("2023-06-02"),
            ChannelId::Direct,
            &ChannelAllotmentPatch {
                allocated: Some(10),
                sold: Some(5),
                ..ChannelAllotmentPatch::default()
            },
            Utc::now(),
        )
        .unwrap();

        // A rule granting direct only 3 rooms cannot apply on the sold date.
        let rule = percentage_rule(&[(ChannelId::Direct, 30.0)]);
        let rule_id = rule.id;
        cfg.rules.push(rule);

        let outcomes = apply_rule(
            &mut cfg,
            &rule_id,
            d("2023-06-01"),
            d("2023-06-03"),
            d("2023-05-01"),
            None,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(outcomes[0].status, RuleOutcomeStatus::Applied);
        assert_eq!(outcomes[1].status, RuleOutcomeStatus::Failed);
        assert_eq!(outcomes[2].status, RuleOutcomeStatus::Applied);

        // The failed date is untouched.
        let record = cfg.daily_records.get(&d("2023-06-02")).unwrap();
        assert_eq!(record.channel(ChannelId::Direct).unwrap().allocated, 10);
        assert_eq!(record.channel(ChannelId::Direct).unwrap().sold, 5);
    }

    #[test]
    fn fixed_rule_clamps_to_inventory_with_warning() {
        let mut cfg = config(10);
        let rule = AllocationRule::new(
            "fixed",
            RuleKind::Fixed {
                counts: [(ChannelId::Direct, 8u32)].into_iter().collect(),
            },
        );
        let rule_id = rule.id;
        cfg.rules.push(rule);
        // Shrink inventory after rule creation so the clamp engages.
        cfg.defaults.total_inventory = 6;

        let outcomes = apply_rule(
            &mut cfg,
            &rule_id,
            d("2023-06-01"),
            d("2023-06-01"),
            d("2023-05-01"),
            None,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(outcomes[0].status, RuleOutcomeStatus::Applied);
        assert!(outcomes[0].detail.as_deref().unwrap().contains("clamped"));
        let record = cfg.daily_records.get(&d("2023-06-01")).unwrap();
        assert_eq!(record.channel(ChannelId::Direct).unwrap().allocated, 6);
    }

    #[test]
    fn priority_rule_orders_by_priority_then_channel_id() {
        let mut cfg = config(10);
        cfg.channel_mut(ChannelId::Direct).unwrap().priority = 90;
        cfg.channel_mut(ChannelId::BookingCom).unwrap().priority = 50;
        cfg.channel_mut(ChannelId::Expedia).unwrap().priority = 50;

        let caps: BTreeMap<ChannelId, PriorityCap> = [
            (ChannelId::Direct, PriorityCap { min: 0, max: 6 }),
            (ChannelId::BookingCom, PriorityCap { min: 0, max: 3 }),
            (ChannelId::Expedia, PriorityCap { min: 0, max: 3 }),
        ]
        .into_iter()
        .collect();
        let rule = AllocationRule::new("prio", RuleKind::Priority { caps });
        let rule_id = rule.id;
        cfg.rules.push(rule);

        apply_rule(
            &mut cfg,
            &rule_id,
            d("2023-06-01"),
            d("2023-06-01"),
            d("2023-05-01"),
            None,
            Utc::now(),
        )
        .unwrap();

        let record = cfg.daily_records.get(&d("2023-06-01")).unwrap();
        assert_eq!(record.channel(ChannelId::Direct).unwrap().allocated, 6);
        // booking_com sorts before expedia at equal priority.
        assert_eq!(record.channel(ChannelId::BookingCom).unwrap().allocated, 3);
        assert_eq!(record.channel(ChannelId::Expedia).unwrap().allocated, 1);
    }

    #[test]
    fn dynamic_rule_falls_back_to_equal_distribution() {
        let mut cfg = config(9);
        let rule = AllocationRule::new("dyn", RuleKind::Dynamic);
        let rule_id = rule.id;
        cfg.rules.push(rule);

        apply_rule(
            &mut cfg,
            &rule_id,
            d("2023-06-01"),
            d("2023-06-01"),
            d("2023-05-01"),
            None,
            Utc::now(),
        )
        .unwrap();

        let record = cfg.daily_records.get(&d("2023-06-01")).unwrap();
        assert_eq!(record.channel(ChannelId::Direct).unwrap().allocated, 3);
        assert_eq!(record.channel(ChannelId::BookingCom).unwrap().allocated, 3);
        assert_eq!(record.channel(ChannelId::Expedia).unwrap().allocated, 3);
    }

    #[test]
    fn dynamic_rule_uses_registered_allocator() {
        struct Fixed;
        impl DynamicAllocator for Fixed {
            fn allocate(
                &self,
                _config: &AllotmentConfig,
                _date: NaiveDate,
            ) -> Option<BTreeMap<ChannelId, u32>> {
                Some([(ChannelId::Direct, 7u32)].into_iter().collect())
            }
        }

        let mut cfg = config(10);
        let rule = AllocationRule::new("dyn", RuleKind::Dynamic);
        let rule_id = rule.id;
        cfg.rules.push(rule);

        apply_rule(
            &mut cfg,
            &rule_id,
            d("2023-06-01"),
            d("2023-06-01"),
            d("2023-05-01"),
            Some(&Fixed),
            Utc::now(),
        )
        .unwrap();
        let record = cfg.daily_records.get(&d("2023-06-01")).unwrap();
        assert_eq!(record.channel(ChannelId::Direct).unwrap().allocated, 7);
    }

    #[test]
    fn first_matching_rule_wins() {
        let mut cfg = config(10);
        let mut first = percentage_rule(&[(ChannelId::Direct, 50.0)]);
        first.conditions.start = Some(d("2023-06-01"));
        first.conditions.end = Some(d("2023-06-30"));
        let second = percentage_rule(&[(ChannelId::Direct, 20.0)]);
        cfg.rules.push(first);
        cfg.rules.push(second);

        let selected = select_rule(&cfg, d("2023-06-15"), d("2023-05-01")).unwrap();
        assert_eq!(selected.name, "pct");
        // Outside the first rule's range the second applies.
        let outcomes = apply_matching_rules(
            &mut cfg,
            d("2023-07-01"),
            d("2023-07-01"),
            d("2023-05-01"),
            None,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(outcomes[0].status, RuleOutcomeStatus::Applied);
        let record = cfg.daily_records.get(&d("2023-07-01")).unwrap();
        assert_eq!(record.channel(ChannelId::Direct).unwrap().allocated, 2);
    }
}
