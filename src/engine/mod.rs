//! Engine services over the domain model.
//!
//! Each service operates on configurations loaded under optimistic
//! concurrency: load, mutate a working copy, save with a version check, and
//! retry the whole operation on conflict.

mod analytics;
mod daily_manager;
mod export;
mod optimize;
mod recommend;
mod reservation;
mod rules;
mod service;

pub use analytics::{compute_window, run_analytics};
pub use daily_manager::{
    enforce_total_cap, ensure_allotment, get_or_seed, upsert_channel, ChannelAllotmentPatch,
};
pub use export::{export_change_log_csv, export_csv, export_json};
pub use optimize::{optimize, OptimizeSummary};
pub use recommend::generate_recommendations;
pub use reservation::{
    AvailabilityChannel, AvailabilityDay, DayAllocation, ReservationEngine, ReservationOutcome,
    StayRequest,
};
pub use rules::{
    apply_matching_rules, apply_rule, select_rule, DynamicAllocator, RuleOutcome,
    RuleOutcomeStatus,
};
pub use service::{AllotmentService, ConfigPatch, CreateConfig, ExternalPatch};

use chrono::{DateTime, Utc};

use crate::domain::{AllotmentConfig, ConfigId, HotelId, RoomTypeId};
use crate::infra::{EngineError, InventoryStore, Result};

/// How a mutation addresses its configuration.
#[derive(Debug, Clone, Copy)]
pub enum ConfigKey<'a> {
    Id(&'a ConfigId),
    RoomType(&'a HotelId, &'a RoomTypeId),
}

/// Load-mutate-save under optimistic concurrency.
///
/// The closure runs against a fresh copy on every attempt; an error from it
/// aborts without saving, which is the rollback path. Version conflicts are
/// retried up to `max_retries` times, then surfaced.
pub(crate) async fn mutate_with_retry<T, F>(
    store: &dyn InventoryStore,
    key: ConfigKey<'_>,
    max_retries: u32,
    now: DateTime<Utc>,
    require_active: bool,
    mut mutate: F,
) -> Result<(AllotmentConfig, T)>
where
    F: FnMut(&mut AllotmentConfig) -> Result<T>,
{
    let mut attempt = 0u32;
    loop {
        let mut config = match key {
            ConfigKey::Id(id) => store.load_by_id(id).await?,
            ConfigKey::RoomType(hotel, room_type) => store.load(hotel, room_type).await?,
        };
        if require_active && !config.is_mutable() {
            return Err(EngineError::validation(
                "status",
                format!("configuration {} is {}", config.id, config.status),
            ));
        }

        let expected = config.version;
        let value = mutate(&mut config)?;
        config.updated_at = now;

        match store.save(&config, expected).await {
            Ok(new_version) => {
                config.version = new_version;
                return Ok((config, value));
            }
            Err(e @ EngineError::VersionConflict { .. }) => {
                attempt += 1;
                if attempt > max_retries {
                    return Err(e);
                }
                tracing::debug!(
                    config_id = %config.id,
                    attempt,
                    max_retries,
                    "version conflict, retrying mutation"
                );
            }
            Err(e) => return Err(e),
        }
    }
}
