//! Sales-channel definitions embedded in an allotment configuration.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use super::ids::ChannelId;

/// A sales surface a hotel distributes inventory through: the direct booking
/// engine or an external travel portal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    pub name: String,
    pub active: bool,
    /// Tie-break weight for priority-based allocation, 0..=100.
    pub priority: u8,
    pub commission_pct: f64,
    pub markup_pct: f64,
    /// Minimum days between booking and check-in, if constrained.
    pub min_advance_days: Option<u32>,
    /// Maximum days between booking and check-in, if constrained.
    pub max_advance_days: Option<u32>,
    /// Same-day bookings are rejected after this local time.
    pub cutoff_time: Option<NaiveTime>,
    /// Nightly base rate before modifiers.
    pub base_rate: f64,
    pub restrictions: ChannelRestrictions,
    pub rate_modifiers: RateModifiers,
}

impl Channel {
    /// A channel with sane defaults, open for sale.
    pub fn new(id: ChannelId, name: impl Into<String>, base_rate: f64) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
            priority: 50,
            commission_pct: 0.0,
            markup_pct: 0.0,
            min_advance_days: None,
            max_advance_days: None,
            cutoff_time: None,
            base_rate,
            restrictions: ChannelRestrictions::default(),
            rate_modifiers: RateModifiers::default(),
        }
    }

    /// Nightly rate snapshot for a date, applying weekday/weekend/holiday
    /// modifiers and the channel markup.
    pub fn rate_for(&self, date: NaiveDate, holiday: bool) -> f64 {
        let modifier = if holiday {
            self.rate_modifiers.holiday
        } else if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            self.rate_modifiers.weekend
        } else {
            self.rate_modifiers.weekday
        };
        self.base_rate * modifier * (1.0 + self.markup_pct / 100.0)
    }

    /// Field-level validation for creation and updates.
    pub fn validate(&self) -> Result<(), String> {
        if self.priority > 100 {
            return Err(format!(
                "channel {}: priority {} exceeds 100",
                self.id, self.priority
            ));
        }
        if self.restrictions.min_stay < 1 {
            return Err(format!("channel {}: min_stay must be >= 1", self.id));
        }
        if self.restrictions.max_stay < self.restrictions.min_stay {
            return Err(format!(
                "channel {}: max_stay {} below min_stay {}",
                self.id, self.restrictions.max_stay, self.restrictions.min_stay
            ));
        }
        if let (Some(min), Some(max)) = (self.min_advance_days, self.max_advance_days) {
            if max < min {
                return Err(format!(
                    "channel {}: max_advance_days {} below min_advance_days {}",
                    self.id, max, min
                ));
            }
        }
        if self.base_rate < 0.0 {
            return Err(format!("channel {}: negative base rate", self.id));
        }
        Ok(())
    }
}

/// Day-level sale restrictions for a channel.
///
/// CTA/CTD and stop-sell are date sets on the channel; the blackout flag for
/// a whole day lives on the daily record instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRestrictions {
    pub min_stay: u32,
    pub max_stay: u32,
    pub closed_to_arrival: BTreeSet<NaiveDate>,
    pub closed_to_departure: BTreeSet<NaiveDate>,
    pub stop_sell: BTreeSet<NaiveDate>,
}

impl Default for ChannelRestrictions {
    fn default() -> Self {
        Self {
            min_stay: 1,
            max_stay: 30,
            closed_to_arrival: BTreeSet::new(),
            closed_to_departure: BTreeSet::new(),
            stop_sell: BTreeSet::new(),
        }
    }
}

impl ChannelRestrictions {
    /// Point-in-time snapshot for a single date, embedded in the daily
    /// channel allotment.
    pub fn snapshot_for(&self, date: NaiveDate) -> RestrictionSnapshot {
        RestrictionSnapshot {
            stop_sell: self.stop_sell.contains(&date),
            closed_to_arrival: self.closed_to_arrival.contains(&date),
            closed_to_departure: self.closed_to_departure.contains(&date),
            min_stay: self.min_stay,
            max_stay: self.max_stay,
        }
    }
}

/// The restriction state of one channel on one date, as recorded on the
/// daily channel allotment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RestrictionSnapshot {
    pub stop_sell: bool,
    pub closed_to_arrival: bool,
    pub closed_to_departure: bool,
    pub min_stay: u32,
    pub max_stay: u32,
}

impl Default for RestrictionSnapshot {
    fn default() -> Self {
        Self {
            stop_sell: false,
            closed_to_arrival: false,
            closed_to_departure: false,
            min_stay: 1,
            max_stay: 30,
        }
    }
}

/// Rate multipliers by day class. 1.0 means the base rate unchanged.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateModifiers {
    pub weekday: f64,
    pub weekend: f64,
    pub holiday: f64,
}

impl Default for RateModifiers {
    fn default() -> Self {
        Self {
            weekday: 1.0,
            weekend: 1.0,
            holiday: 1.0,
        }
    }
}
