//! Daily allotment and change-log handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::middleware::CallerIdentity;
use crate::api::types::AvailabilityQuery;
use crate::domain::{ChangeLogEntry, ChannelId, ConfigId, DailyRecord, LogQuery, RoomTypeId};
use crate::engine::{AvailabilityDay, ChannelAllotmentPatch};
use crate::server::AppState;
use axum::extract::Extension;

use super::with_deadline;

/// PUT /api/v1/configs/:id/days/:date/channels/:channel - Patch one
/// channel's allotment on one date.
pub async fn update_channel_allotment(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path((id, date, channel)): Path<(Uuid, NaiveDate, ChannelId)>,
    Json(patch): Json<ChannelAllotmentPatch>,
) -> Result<Json<DailyRecord>, ApiError> {
    let config_id = ConfigId::from_uuid(id);
    let record = with_deadline(
        state.request_timeout,
        state
            .service
            .update_channel_allotment(&config_id, date, channel, &patch, &caller.actor),
    )
    .await?;
    Ok(Json(record))
}

/// GET /api/v1/availability - Per-date availability for a room type.
pub async fn availability(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<Json<Vec<AvailabilityDay>>, ApiError> {
    let room_type = RoomTypeId::from_uuid(query.room_type);
    let days = with_deadline(
        state.request_timeout,
        state.reservations.availability(
            &caller.hotel_id,
            &room_type,
            query.start,
            query.end,
            query.channel,
        ),
    )
    .await?;
    Ok(Json(days))
}

/// GET /api/v1/configs/:id/changelog - Change-log range query.
pub async fn change_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<ChangeLogEntry>>, ApiError> {
    let config_id = ConfigId::from_uuid(id);
    let entries = with_deadline(
        state.request_timeout,
        state.service.change_log(&config_id, &query),
    )
    .await?;
    Ok(Json(entries))
}
