//! Reserve and release handlers: thin adapters over the reservation engine.

use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::middleware::CallerIdentity;
use crate::api::types::ReserveRequest;
use crate::engine::{ReservationOutcome, StayRequest};
use crate::server::AppState;

use super::with_deadline;

/// POST /api/v1/reservations/reserve - Reserve rooms over a stay.
pub async fn reserve(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(request): Json<ReserveRequest>,
) -> Result<(StatusCode, Json<ReservationOutcome>), ApiError> {
    let stay = StayRequest {
        channel_id: request.channel_id,
        check_in: request.check_in,
        check_out: request.check_out,
        rooms: request.rooms,
    };
    let outcome = with_deadline(
        state.request_timeout,
        state.reservations.reserve(
            &caller.hotel_id,
            &request.room_type(),
            &stay,
            &caller.actor,
        ),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// POST /api/v1/reservations/release - Release previously reserved rooms.
pub async fn release(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(request): Json<ReserveRequest>,
) -> Result<Json<ReservationOutcome>, ApiError> {
    let stay = StayRequest {
        channel_id: request.channel_id,
        check_in: request.check_in,
        check_out: request.check_out,
        rooms: request.rooms,
    };
    let outcome = with_deadline(
        state.request_timeout,
        state.reservations.release(
            &caller.hotel_id,
            &request.room_type(),
            &stay,
            &caller.actor,
            request.reason.as_deref(),
        ),
    )
    .await?;
    Ok(Json(outcome))
}
