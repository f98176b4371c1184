//! Export handlers: configuration documents and audit trail.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::api::error::{ApiError, ErrorCode};
use crate::api::types::{ExportFormat, ExportQuery};
use crate::domain::{ConfigId, LogQuery};
use crate::server::AppState;

use super::with_deadline;

/// GET /api/v1/configs/:id/export - Configuration export as JSON or CSV.
pub async fn export_config(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, ApiError> {
    let config_id = ConfigId::from_uuid(id);
    let range = match (query.start, query.end) {
        (Some(start), Some(end)) => Some((start, end)),
        (None, None) => None,
        _ => {
            return Err(ApiError::new(
                ErrorCode::InvalidFieldValue,
                "start and end must be supplied together",
            ))
        }
    };

    match query.format {
        ExportFormat::Json => {
            let bytes = with_deadline(
                state.request_timeout,
                state.service.export_json(&config_id),
            )
            .await?;
            Ok((
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                bytes,
            )
                .into_response())
        }
        ExportFormat::Csv => {
            let csv = with_deadline(
                state.request_timeout,
                state.service.export_csv(&config_id, range),
            )
            .await?;
            Ok((StatusCode::OK, [(header::CONTENT_TYPE, "text/csv")], csv).into_response())
        }
    }
}

/// GET /api/v1/configs/:id/changelog/export - Audit trail as CSV.
pub async fn export_change_log(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<LogQuery>,
) -> Result<Response, ApiError> {
    let config_id = ConfigId::from_uuid(id);
    let csv = with_deadline(
        state.request_timeout,
        state.service.change_log_csv(&config_id, &query),
    )
    .await?;
    Ok((StatusCode::OK, [(header::CONTENT_TYPE, "text/csv")], csv).into_response())
}
