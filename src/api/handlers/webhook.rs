//! Channel-manager inbound webhook.

use axum::extract::{Extension, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::middleware::CallerIdentity;
use crate::api::types::{WebhookRequest, WebhookResponse};
use crate::domain::RoomTypeId;
use crate::server::AppState;

use super::with_deadline;

/// POST /api/v1/webhooks/inventory - Apply external per-date channel
/// patches. Privileged path into the daily record manager: bypasses the
/// rule engine, never the invariants.
pub async fn inventory_update(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(request): Json<WebhookRequest>,
) -> Result<Json<WebhookResponse>, ApiError> {
    let room_type = RoomTypeId::from_uuid(request.room_type_id);
    let processed = with_deadline(
        state.request_timeout,
        state.service.apply_external_update(
            &caller.hotel_id,
            &room_type,
            &request.updates,
            &caller.actor,
        ),
    )
    .await?;
    Ok(Json(WebhookResponse { processed }))
}
