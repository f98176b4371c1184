//! Health and readiness endpoints.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::infra::ConfigFilter;
use crate::server::AppState;

/// GET /health - Liveness.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "allotment-engine",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /ready - Readiness: the store must answer a trivial query.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let probe = crate::domain::HotelId::from_uuid(uuid::Uuid::nil());
    match state
        .service
        .list(
            &probe,
            &ConfigFilter {
                per_page: 1,
                ..ConfigFilter::default()
            },
        )
        .await
    {
        Ok(_) => Ok(Json(serde_json::json!({
            "status": "ready",
            "store": "connected",
        }))),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            format!("store unavailable: {e}"),
        )),
    }
}
