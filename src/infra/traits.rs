//! Trait definitions for the allotment engine's ports.

use async_trait::async_trait;
use chrono::NaiveDate;
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::domain::{AllotmentConfig, ConfigId, ConfigStatus, HotelId, RoomTypeId};

use super::Result;

/// Filters and paging for configuration listings.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFilter {
    pub status: Option<ConfigStatus>,
    pub room_type: Option<RoomTypeId>,
    /// Case-insensitive match on name and description.
    pub search: Option<String>,
    pub page: u32,
    pub per_page: u32,
    pub sort: SortOrder,
}

impl Default for ConfigFilter {
    fn default() -> Self {
        Self {
            status: None,
            room_type: None,
            search: None,
            page: 1,
            per_page: 20,
            sort: SortOrder::CreatedDesc,
        }
    }
}

/// Stable listing orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    CreatedDesc,
    CreatedAsc,
    NameAsc,
}

/// One page of configurations.
#[derive(Debug, Clone)]
pub struct ConfigPage {
    pub items: Vec<AllotmentConfig>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

/// Durable, versioned storage of allotment configurations.
///
/// `save` is the only write path for existing configurations: it writes only
/// when the stored version equals `expected_version` and increments the
/// version by exactly one. Change-log entries ride inside the document, so
/// appending is atomic with the save.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Load the active configuration for a (hotel, room type) pair.
    async fn load(&self, hotel: &HotelId, room_type: &RoomTypeId) -> Result<AllotmentConfig>;

    /// Load any configuration by id, regardless of status.
    async fn load_by_id(&self, id: &ConfigId) -> Result<AllotmentConfig>;

    /// List configurations for a hotel with filters and stable paging.
    async fn list(&self, hotel: &HotelId, filter: &ConfigFilter) -> Result<ConfigPage>;

    /// Insert a new configuration. Fails with `AlreadyActive` when an active
    /// configuration exists for the same (hotel, room type).
    async fn insert(&self, config: &AllotmentConfig) -> Result<()>;

    /// Write `config` if the stored version equals `expected_version`.
    /// Returns the new version (`expected_version + 1`).
    async fn save(&self, config: &AllotmentConfig, expected_version: u64) -> Result<u64>;

    /// All configurations for a hotel that have daily records intersecting
    /// the inclusive range, optionally narrowed to a room type.
    async fn range_query<'a>(
        &self,
        hotel: &HotelId,
        start: NaiveDate,
        end: NaiveDate,
        room_type: Option<&'a RoomTypeId>,
    ) -> Result<Vec<AllotmentConfig>>;
}

/// Inclusive date range for channel-manager pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }
}

/// Narrow outbound interface to an external channel manager.
///
/// The engine never calls specific providers directly; deployments wire an
/// adapter implementing this port.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ChannelSyncPort: Send + Sync {
    /// Push per-channel allocations for the range.
    async fn push_allocation(&self, config: &AllotmentConfig, range: DateRange) -> Result<()>;

    /// Push rate snapshots for the range.
    async fn push_rate(&self, config: &AllotmentConfig, range: DateRange) -> Result<()>;

    /// Push restriction state for the range.
    async fn push_restrictions(&self, config: &AllotmentConfig, range: DateRange) -> Result<()>;
}
