//! Analytics, recommendation and optimization handlers.

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use uuid::Uuid;

use crate::api::error::{ApiError, ErrorCode};
use crate::api::middleware::CallerIdentity;
use crate::api::types::DateRangeQuery;
use crate::domain::{Analytics, ConfigId, MetricsWindow, Recommendation};
use crate::engine::OptimizeSummary;
use crate::server::AppState;

use super::with_deadline;

/// GET /api/v1/configs/:id/analytics - Metrics over an explicit window.
pub async fn analytics_window(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DateRangeQuery>,
) -> Result<Json<MetricsWindow>, ApiError> {
    let (start, end) = query
        .required()
        .map_err(|message| ApiError::new(ErrorCode::InvalidFieldValue, message))?;
    let config_id = ConfigId::from_uuid(id);
    let window = with_deadline(
        state.request_timeout,
        state.service.analytics_window(&config_id, start, end),
    )
    .await?;
    Ok(Json(window))
}

/// POST /api/v1/configs/:id/analytics/run - Trigger the analytics sweep.
pub async fn run_analytics(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<Analytics>, ApiError> {
    let config_id = ConfigId::from_uuid(id);
    let analytics = with_deadline(
        state.request_timeout,
        state.service.run_analytics(&config_id, &caller.actor),
    )
    .await?;
    Ok(Json(analytics))
}

/// GET /api/v1/configs/:id/recommendations - Latest advisory list.
pub async fn recommendations(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
    let config_id = ConfigId::from_uuid(id);
    let recommendations = with_deadline(
        state.request_timeout,
        state.service.recommendations(&config_id),
    )
    .await?;
    Ok(Json(recommendations))
}

/// POST /api/v1/configs/:id/optimize - Recompute upcoming allocations.
pub async fn optimize(
    State(state): State<AppState>,
    Extension(caller): Extension<CallerIdentity>,
    Path(id): Path<Uuid>,
) -> Result<Json<OptimizeSummary>, ApiError> {
    let config_id = ConfigId::from_uuid(id);
    let summary = with_deadline(
        state.request_timeout,
        state.service.optimize(&config_id, &caller.actor),
    )
    .await?;
    Ok(Json(summary))
}
