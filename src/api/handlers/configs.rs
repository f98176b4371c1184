//! Configuration CRUD handlers.

use axum::extract::{Extension, Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::api::error::{ApiError, ErrorCode};
use crate::api::middleware::CallerIdentity;
use crate::api::types::{
    ConfigListResponse, ConfigSummary, DateRangeQuery, ListConfigsQuery, RangeQuery,
};
use crate::domain::{AllotmentConfig, ConfigId, RoomTypeId};
use crate::engine::{ConfigPatch, CreateConfig};
use crate::infra::ConfigFilter;
use crate::server::AppState;

use super::with_deadline;

/// POST /api/v1/configs - Create a configuration.
pub async fn create_config(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Json(input): Json<CreateConfig>,
) -> Result<(StatusCode, Json<AllotmentConfig>), ApiError> {
    let config = with_deadline(
        state.request_timeout,
        state
            .service
            .create_config(&caller.hotel_id, input, &caller.actor),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(config)))
}

/// PATCH /api/v1/configs/:id - Partially update a configuration.
pub async fn update_config(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ConfigPatch>,
) -> Result<Json<AllotmentConfig>, ApiError> {
    let config_id = ConfigId::from_uuid(id);
    let config = with_deadline(
        state.request_timeout,
        state
            .service
            .update_config(&config_id, patch, &caller.actor),
    )
    .await?;
    Ok(Json(config))
}

/// DELETE /api/v1/configs/:id - Soft delete.
pub async fn delete_config(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let config_id = ConfigId::from_uuid(id);
    with_deadline(
        state.request_timeout,
        state.service.soft_delete(&config_id, &caller.actor),
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/configs - List configurations for the caller's hotel.
pub async fn list_configs(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<ListConfigsQuery>,
) -> Result<Json<ConfigListResponse>, ApiError> {
    let mut filter = ConfigFilter {
        status: query.status,
        room_type: query.room_type.map(RoomTypeId::from_uuid),
        search: query.search,
        ..ConfigFilter::default()
    };
    if let Some(page) = query.page {
        filter.page = page;
    }
    if let Some(per_page) = query.per_page {
        filter.per_page = per_page.min(100);
    }
    if let Some(sort) = query.sort {
        filter.sort = sort;
    }

    let page = with_deadline(
        state.request_timeout,
        state.service.list(&caller.hotel_id, &filter),
    )
    .await?;

    Ok(Json(ConfigListResponse {
        items: page.items.iter().map(ConfigSummary::from).collect(),
        total: page.total,
        page: page.page,
        per_page: page.per_page,
    }))
}

/// GET /api/v1/configs/:id - Fetch a configuration by id.
pub async fn get_config(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<AllotmentConfig>, ApiError> {
    let config_id = ConfigId::from_uuid(id);
    let config = with_deadline(state.request_timeout, state.service.get(&config_id)).await?;
    Ok(Json(config))
}

/// GET /api/v1/room-types/:room_type_id/config - Active configuration for a
/// room type, daily records clipped to the optional range.
pub async fn get_by_room_type(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(room_type_id): Path<Uuid>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<AllotmentConfig>, ApiError> {
    let range = query
        .as_range()
        .map_err(|message| ApiError::new(ErrorCode::InvalidFieldValue, message))?;
    let room_type = RoomTypeId::from_uuid(room_type_id);
    let config = with_deadline(
        state.request_timeout,
        state
            .service
            .get_by_room_type(&caller.hotel_id, &room_type, range),
    )
    .await?;
    Ok(Json(config))
}

/// GET /api/v1/configs/range - Configurations with records in a range,
/// records clipped.
pub async fn range_query(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<AllotmentConfig>>, ApiError> {
    let room_type = query.room_type.map(RoomTypeId::from_uuid);
    let configs = with_deadline(
        state.request_timeout,
        state.service.range_query(
            &caller.hotel_id,
            query.start,
            query.end,
            room_type.as_ref(),
        ),
    )
    .await?;
    Ok(Json(configs))
}
