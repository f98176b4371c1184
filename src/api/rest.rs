//! REST API routes for the allotment engine.

use axum::routing::{get, post, put};
use axum::Router;

use crate::server::AppState;

use super::handlers;

/// Build the `/api` router.
pub fn router() -> Router<AppState> {
    Router::new()
        // Configurations
        .route("/v1/configs", post(handlers::configs::create_config))
        .route("/v1/configs", get(handlers::configs::list_configs))
        .route("/v1/configs/range", get(handlers::configs::range_query))
        .route("/v1/configs/:id", get(handlers::configs::get_config))
        .route(
            "/v1/configs/:id",
            axum::routing::patch(handlers::configs::update_config),
        )
        .route(
            "/v1/configs/:id",
            axum::routing::delete(handlers::configs::delete_config),
        )
        .route(
            "/v1/room-types/:room_type_id/config",
            get(handlers::configs::get_by_room_type),
        )
        // Daily allotments
        .route(
            "/v1/configs/:id/days/:date/channels/:channel",
            put(handlers::allotments::update_channel_allotment),
        )
        .route("/v1/availability", get(handlers::allotments::availability))
        .route(
            "/v1/configs/:id/changelog",
            get(handlers::allotments::change_log),
        )
        .route(
            "/v1/configs/:id/changelog/export",
            get(handlers::export::export_change_log),
        )
        // Rules
        .route(
            "/v1/configs/:id/rules/:rule_id/apply",
            post(handlers::rules::apply_rule),
        )
        // Reservations
        .route(
            "/v1/reservations/reserve",
            post(handlers::reservations::reserve),
        )
        .route(
            "/v1/reservations/release",
            post(handlers::reservations::release),
        )
        // Analytics
        .route(
            "/v1/configs/:id/analytics",
            get(handlers::analytics::analytics_window),
        )
        .route(
            "/v1/configs/:id/analytics/run",
            post(handlers::analytics::run_analytics),
        )
        .route(
            "/v1/configs/:id/recommendations",
            get(handlers::analytics::recommendations),
        )
        .route(
            "/v1/configs/:id/optimize",
            post(handlers::analytics::optimize),
        )
        // Export
        .route("/v1/configs/:id/export", get(handlers::export::export_config))
        // Channel-manager webhook
        .route(
            "/v1/webhooks/inventory",
            post(handlers::webhook::inventory_update),
        )
}
