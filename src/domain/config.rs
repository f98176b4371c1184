//! The allotment configuration aggregate.
//!
//! One configuration per (hotel, room type, active status). It exclusively
//! owns its channels, rules, daily records, analytics slot and change log,
//! and is the unit of optimistic concurrency control.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::analytics::Analytics;
use super::changelog::ChangeLogEntry;
use super::channel::Channel;
use super::daily::DailyRecord;
use super::ids::{ChannelId, ConfigId, HotelId, RoomTypeId};
use super::rule::AllocationRule;

/// Lifecycle status of a configuration. Gates all mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigStatus {
    Active,
    Inactive,
    Suspended,
}

impl ConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigStatus::Active => "active",
            ConfigStatus::Inactive => "inactive",
            ConfigStatus::Suspended => "suspended",
        }
    }
}

impl std::fmt::Display for ConfigStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How new daily records distribute inventory by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationMethod {
    Percentage,
    Fixed,
    Dynamic,
}

/// Per-configuration defaults applied when seeding daily records and when
/// evaluating the overbooking policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultSettings {
    pub total_inventory: u32,
    pub allocation_method: AllocationMethod,
    pub overbooking_allowed: bool,
    /// Absolute count of rooms sellable beyond an allocation.
    pub overbooking_limit: u32,
    /// Hours before check-in after which unpaid holds auto-release.
    pub release_window_hours: u32,
    pub auto_release: bool,
    /// Days a no-show keeps rooms blocked.
    pub block_period_days: u32,
    /// When true, reserving against a channel with no allotment on a day
    /// assigns that day's free stock to the channel instead of failing
    /// closed.
    pub auto_create_allotments: bool,
}

impl Default for DefaultSettings {
    fn default() -> Self {
        Self {
            total_inventory: 0,
            allocation_method: AllocationMethod::Percentage,
            overbooking_allowed: false,
            overbooking_limit: 0,
            release_window_hours: 24,
            auto_release: false,
            block_period_days: 1,
            auto_create_allotments: false,
        }
    }
}

impl DefaultSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.overbooking_allowed && self.overbooking_limit == 0 {
            return Err("overbooking allowed but overbooking_limit is 0".to_string());
        }
        Ok(())
    }
}

/// External channel-manager integration knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationSettings {
    /// Push allocation changes to the channel manager on every mutation.
    pub auto_sync: bool,
    pub sync_frequency_minutes: u32,
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self {
            auto_sync: false,
            sync_frequency_minutes: 60,
        }
    }
}

/// The per-(hotel, room-type) aggregate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllotmentConfig {
    pub id: ConfigId,
    pub hotel_id: HotelId,
    pub room_type_id: RoomTypeId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: ConfigStatus,
    pub defaults: DefaultSettings,
    pub channels: Vec<Channel>,
    pub rules: Vec<AllocationRule>,
    /// Daily records keyed by hotel-local date, ascending.
    pub daily_records: BTreeMap<NaiveDate, DailyRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analytics: Option<Analytics>,
    pub integration: IntegrationSettings,
    /// IANA timezone label for the hotel, informational.
    pub timezone: String,
    /// UTC offset in minutes used to resolve hotel-local dates.
    pub utc_offset_minutes: i32,
    /// Set when channel-manager pushes exhausted their retries.
    pub needs_sync: bool,
    /// Incremented by exactly one on every successful save.
    pub version: u64,
    pub change_log: Vec<ChangeLogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AllotmentConfig {
    pub fn new(
        hotel_id: HotelId,
        room_type_id: RoomTypeId,
        name: impl Into<String>,
        defaults: DefaultSettings,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ConfigId::new(),
            hotel_id,
            room_type_id,
            name: name.into(),
            description: None,
            status: ConfigStatus::Active,
            defaults,
            channels: Vec::new(),
            rules: Vec::new(),
            daily_records: BTreeMap::new(),
            analytics: None,
            integration: IntegrationSettings::default(),
            timezone: "UTC".to_string(),
            utc_offset_minutes: 0,
            needs_sync: false,
            version: 1,
            change_log: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.iter().find(|c| c.id == id)
    }

    pub fn channel_mut(&mut self, id: ChannelId) -> Option<&mut Channel> {
        self.channels.iter_mut().find(|c| c.id == id)
    }

    pub fn rule(&self, id: &super::ids::RuleId) -> Option<&AllocationRule> {
        self.rules.iter().find(|r| r.id == *id)
    }

    /// Mutations are only admitted while the configuration is active.
    pub fn is_mutable(&self) -> bool {
        self.status == ConfigStatus::Active
    }

    /// Daily records clipped to an inclusive date range, ascending.
    pub fn records_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Iterator<Item = (&NaiveDate, &DailyRecord)> {
        self.daily_records.range(start..=end)
    }

    /// Occupancy rate of the day before `date`, when recorded.
    pub fn prior_day_occupancy(&self, date: NaiveDate) -> Option<f64> {
        let prior = date.pred_opt()?;
        self.daily_records.get(&prior).map(|r| r.occupancy_rate)
    }

    pub fn push_log(&mut self, entry: ChangeLogEntry) {
        self.change_log.push(entry);
    }

    /// Structural validation for creation and full updates.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        self.defaults.validate()?;
        let mut seen = std::collections::BTreeSet::new();
        for channel in &self.channels {
            channel.validate()?;
            if !seen.insert(channel.id) {
                return Err(format!("duplicate channel id: {}", channel.id));
            }
        }
        for rule in &self.rules {
            rule.validate(self.defaults.total_inventory)?;
        }
        Ok(())
    }
}
