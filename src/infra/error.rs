//! Error types for the allotment engine.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::{ChannelId, ConfigId, HotelId, RoomTypeId, RuleId};

/// Errors that can occur in the engine and its infrastructure.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Transient storage failure, safe to retry
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// No configuration for the identifier
    #[error("configuration not found: {0}")]
    ConfigNotFound(String),

    /// No active configuration for the (hotel, room type) pair
    #[error("no active configuration for hotel {hotel}, room type {room_type}")]
    ConfigNotFoundForRoomType {
        hotel: HotelId,
        room_type: RoomTypeId,
    },

    /// Channel not defined in the configuration
    #[error("channel not found: {0}")]
    ChannelNotFound(ChannelId),

    /// Rule not defined in the configuration
    #[error("rule not found: {0}")]
    RuleNotFound(RuleId),

    /// An active configuration already exists for the pair
    #[error("an active configuration already exists for hotel {hotel}, room type {room_type}")]
    AlreadyActive {
        hotel: HotelId,
        room_type: RoomTypeId,
    },

    /// Stored version does not match the expected version
    #[error("version conflict for config {config_id}: expected {expected}, got {actual}")]
    VersionConflict {
        config_id: ConfigId,
        expected: u64,
        actual: u64,
    },

    /// Input ill-formed; never retried
    #[error("validation failed on {field}: {message}")]
    Validation { field: String, message: String },

    /// One or more dates lack available rooms for the channel
    #[error("insufficient inventory on {date}: requested {requested}, available {available}")]
    InsufficientInventory {
        date: NaiveDate,
        requested: u32,
        available: i64,
    },

    /// Restrictions forbid the operation
    #[error("sales closed on {date}: {rule}")]
    Closed { date: NaiveDate, rule: String },

    /// A mutation would break a daily-record invariant
    #[error("invariant violation: {invariant} - {message}")]
    InvariantViolation { invariant: String, message: String },

    /// Deadline exceeded; tentative changes rolled back
    #[error("operation timed out")]
    Timeout,

    /// Rate limit exceeded
    #[error("rate limit exceeded")]
    RateLimited,

    /// Channel-manager push failed after retries
    #[error("channel sync failed: {0}")]
    SyncFailed(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Transient errors are retried internally with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::StorageUnavailable(_) => true,
            EngineError::Database(e) => super::retry::is_retryable_db_error(e),
            _ => false,
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        EngineError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
