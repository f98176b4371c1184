//! Shared request and response types for REST API handlers.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{AllotmentConfig, ChannelId, ConfigStatus, RoomTypeId};
use crate::infra::SortOrder;

// ============================================================================
// Listing
// ============================================================================

/// Query string for configuration listings.
#[derive(Debug, Default, Deserialize)]
pub struct ListConfigsQuery {
    pub status: Option<ConfigStatus>,
    pub room_type: Option<Uuid>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub sort: Option<SortOrder>,
}

/// One row of a configuration listing.
#[derive(Debug, Serialize)]
pub struct ConfigSummary {
    pub id: Uuid,
    pub hotel_id: Uuid,
    pub room_type_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub status: ConfigStatus,
    pub total_inventory: u32,
    pub channels: usize,
    pub needs_sync: bool,
    pub version: u64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl From<&AllotmentConfig> for ConfigSummary {
    fn from(config: &AllotmentConfig) -> Self {
        Self {
            id: config.id.0,
            hotel_id: config.hotel_id.0,
            room_type_id: config.room_type_id.0,
            name: config.name.clone(),
            description: config.description.clone(),
            status: config.status,
            total_inventory: config.defaults.total_inventory,
            channels: config.channels.len(),
            needs_sync: config.needs_sync,
            version: config.version,
            created_at: config.created_at,
        }
    }
}

/// Paged listing response.
#[derive(Debug, Serialize)]
pub struct ConfigListResponse {
    pub items: Vec<ConfigSummary>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

// ============================================================================
// Date ranges
// ============================================================================

/// Inclusive [start, end] query string, both optional together.
#[derive(Debug, Default, Deserialize)]
pub struct DateRangeQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRangeQuery {
    /// Both-or-neither; returns the pair when both are present.
    pub fn as_range(&self) -> Result<Option<(NaiveDate, NaiveDate)>, String> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Ok(Some((start, end))),
            (None, None) => Ok(None),
            _ => Err("start and end must be supplied together".to_string()),
        }
    }

    pub fn required(&self) -> Result<(NaiveDate, NaiveDate), String> {
        self.as_range()?
            .ok_or_else(|| "start and end are required".to_string())
    }
}

/// Range query across configurations.
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub room_type: Option<Uuid>,
}

// ============================================================================
// Rules
// ============================================================================

/// Body for rule application.
#[derive(Debug, Deserialize)]
pub struct ApplyRuleRequest {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

// ============================================================================
// Reservations
// ============================================================================

/// Body for reserve and release.
#[derive(Debug, Deserialize)]
pub struct ReserveRequest {
    pub room_type_id: Uuid,
    pub channel_id: ChannelId,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub rooms: u32,
    /// Optional release reason, e.g. "cancellation" or "no_show".
    #[serde(default)]
    pub reason: Option<String>,
}

impl ReserveRequest {
    pub fn room_type(&self) -> RoomTypeId {
        RoomTypeId::from_uuid(self.room_type_id)
    }
}

/// Availability query string.
#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub room_type: Uuid,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub channel: Option<ChannelId>,
}

// ============================================================================
// Webhook
// ============================================================================

/// Channel-manager inventory update webhook body.
#[derive(Debug, Deserialize)]
pub struct WebhookRequest {
    pub room_type_id: Uuid,
    pub updates: Vec<crate::engine::ExternalPatch>,
}

/// Webhook acknowledgement.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub processed: usize,
}

// ============================================================================
// Export
// ============================================================================

/// Export query string.
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: ExportFormat,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
}
