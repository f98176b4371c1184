//! Daily inventory records and per-channel allotments.
//!
//! A `DailyRecord` is the unit every reservation, rule application and
//! external sync ultimately mutates. Derived fields are recomputed after
//! each edit and the conservation invariants checked before the edit is
//! accepted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::channel::RestrictionSnapshot;
use super::config::DefaultSettings;
use super::ids::ChannelId;

/// One channel's slice of a day's inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelAllotment {
    pub channel_id: ChannelId,
    /// Rooms this channel is permitted to sell on the date.
    pub allocated: u32,
    /// Rooms the channel has reserved.
    pub sold: u32,
    /// Rooms held back from sale (maintenance, VIP hold).
    pub blocked: u32,
    /// allocated - sold - blocked; negative only under overbooking.
    pub available: i64,
    /// Rooms sold beyond the allocation, when overbooking is allowed.
    pub overbooked: u32,
    /// Nightly rate snapshot used for revenue metrics.
    pub rate: f64,
    pub restrictions: RestrictionSnapshot,
    pub last_updated: DateTime<Utc>,
}

impl ChannelAllotment {
    pub fn new(channel_id: ChannelId, allocated: u32, rate: f64, now: DateTime<Utc>) -> Self {
        Self {
            channel_id,
            allocated,
            sold: 0,
            blocked: 0,
            available: i64::from(allocated),
            overbooked: 0,
            rate,
            restrictions: RestrictionSnapshot::default(),
            last_updated: now,
        }
    }

    fn recompute(&mut self) {
        self.available =
            i64::from(self.allocated) - i64::from(self.sold) - i64::from(self.blocked);
        self.overbooked = u32::try_from((-self.available).max(0)).unwrap_or(0);
    }
}

/// The full inventory picture for one room type on one date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub total_inventory: u32,
    pub channels: Vec<ChannelAllotment>,
    /// total_inventory - sum(allocated); negative only under overbooking.
    pub free_stock: i64,
    pub total_sold: u32,
    /// total_sold / total_inventory * 100; 0 when inventory is 0.
    pub occupancy_rate: f64,
    pub holiday: bool,
    pub blackout: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl DailyRecord {
    /// A fresh record seeded from the configuration defaults: full inventory,
    /// no channel allotments yet.
    pub fn seeded(date: NaiveDate, defaults: &DefaultSettings) -> Self {
        Self {
            date,
            total_inventory: defaults.total_inventory,
            channels: Vec::new(),
            free_stock: i64::from(defaults.total_inventory),
            total_sold: 0,
            occupancy_rate: 0.0,
            holiday: false,
            blackout: false,
            notes: None,
        }
    }

    pub fn channel(&self, id: ChannelId) -> Option<&ChannelAllotment> {
        self.channels.iter().find(|c| c.channel_id == id)
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut ChannelAllotment> {
        self.channels.iter_mut().find(|c| c.channel_id == id)
    }

    pub fn allocated_total(&self) -> u64 {
        self.channels.iter().map(|c| u64::from(c.allocated)).sum()
    }

    /// Re-establish every derived field from the primitive counters.
    pub fn recompute(&mut self) {
        for ch in &mut self.channels {
            ch.recompute();
        }
        let allocated: i64 = self.channels.iter().map(|c| i64::from(c.allocated)).sum();
        self.free_stock = i64::from(self.total_inventory) - allocated;
        self.total_sold = self.channels.iter().map(|c| c.sold).sum();
        self.occupancy_rate = if self.total_inventory == 0 {
            0.0
        } else {
            f64::from(self.total_sold) / f64::from(self.total_inventory) * 100.0
        };
    }

    /// Check the conservation invariants against the configured overbooking
    /// policy. Returns the violated invariant's name and a diagnostic.
    pub fn check_invariants(&self, defaults: &DefaultSettings) -> Result<(), (String, String)> {
        let tolerance = if defaults.overbooking_allowed {
            i64::from(defaults.overbooking_limit)
        } else {
            0
        };

        for ch in &self.channels {
            if ch.available < -tolerance {
                return Err((
                    "channel_available_within_tolerance".to_string(),
                    format!(
                        "{} on {}: available {} below permitted floor -{}",
                        ch.channel_id, self.date, ch.available, tolerance
                    ),
                ));
            }
        }

        let allocated = self.allocated_total() as i64;
        if allocated > i64::from(self.total_inventory) + tolerance {
            return Err((
                "allocation_within_inventory".to_string(),
                format!(
                    "{}: sum of allocations {} exceeds inventory {} (+{} tolerance)",
                    self.date, allocated, self.total_inventory, tolerance
                ),
            ));
        }

        Ok(())
    }
}
