//! REST API integration tests over the in-memory store.
//!
//! These drive the full router: identity middleware, rate limiting,
//! handlers and the engine underneath.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use allotment_engine::api::{RateLimiter, RateLimits, RequestGuardState};
use allotment_engine::domain::{Channel, ChannelId, DefaultSettings};
use allotment_engine::engine::{AllotmentService, ReservationEngine};
use allotment_engine::infra::InMemoryInventoryStore;
use allotment_engine::server::{build_router, AppState};

use common::*;

fn app_with_limits(limits: RateLimits) -> Router {
    let store = Arc::new(InMemoryInventoryStore::new());
    let clock = test_clock();
    let service = Arc::new(AllotmentService::new(store.clone(), clock.clone()));
    let reservations = Arc::new(ReservationEngine::new(store, clock));
    let state = AppState {
        service,
        reservations,
        request_timeout: Duration::from_secs(5),
    };
    let guard_state = RequestGuardState {
        rate_limiter: Arc::new(RateLimiter::new(limits)),
    };
    build_router(guard_state).unwrap().with_state(state)
}

fn app() -> Router {
    app_with_limits(RateLimits::default())
}

fn request(method: &str, uri: &str, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-hotel-id", test_hotel_id().to_string())
        .header("x-actor", "itest");
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn create_config_body(total_inventory: u32) -> serde_json::Value {
    serde_json::json!({
        "room_type_id": test_room_type_id().0,
        "name": "Standard Double",
        "defaults": serde_json::to_value(DefaultSettings {
            total_inventory,
            ..DefaultSettings::default()
        }).unwrap(),
        "channels": serde_json::to_value(vec![
            Channel::new(ChannelId::Direct, "Direct", 100.0),
            Channel::new(ChannelId::BookingCom, "Booking.com", 110.0),
        ]).unwrap(),
    })
}

async fn create_config(app: &Router, total_inventory: u32) -> String {
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/configs",
            Some(create_config_body(total_inventory)),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn missing_hotel_header_is_rejected() {
    let app = app();
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/v1/configs")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_needs_no_identity() {
    let app = app();
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn config_crud_round_trip() {
    let app = app();
    let id = create_config(&app, 10).await;

    // Duplicate active config for the pair conflicts.
    let response = app
        .clone()
        .oneshot(request("POST", "/api/v1/configs", Some(create_config_body(10))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = app
        .clone()
        .oneshot(request("GET", &format!("/api/v1/configs/{id}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["name"], "Standard Double");
    assert_eq!(body["version"], 1);

    let response = app
        .clone()
        .oneshot(request("GET", "/api/v1/configs?status=active", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["total"], 1);

    let response = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/api/v1/configs/{id}"),
            Some(serde_json::json!({ "description": "city view" })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["version"], 2);

    let response = app
        .clone()
        .oneshot(request("DELETE", &format!("/api/v1/configs/{id}"), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Soft-deleted: still addressable by id, no longer active for the pair.
    let response = app
        .clone()
        .oneshot(request("GET", &format!("/api/v1/configs/{id}"), None))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["status"], "inactive");

    let response = app
        .oneshot(request(
            "GET",
            &format!(
                "/api/v1/room-types/{}/config",
                test_room_type_id()
            ),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn reserve_flow_over_http() {
    let app = app();
    let id = create_config(&app, 10).await;

    // Give direct an allotment on both nights.
    for date in ["2023-06-01", "2023-06-02"] {
        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                &format!("/api/v1/configs/{id}/days/{date}/channels/direct"),
                Some(serde_json::json!({ "allocated": 10 })),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let reserve_body = serde_json::json!({
        "room_type_id": test_room_type_id().0,
        "channel_id": "direct",
        "check_in": "2023-06-01",
        "check_out": "2023-06-03",
        "rooms": 3,
    });
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/reservations/reserve",
            Some(reserve_body.clone()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert_eq!(body["nights"][0]["sold"], 3);
    assert_eq!(body["nights"][0]["available"], 7);

    // Availability reflects the sale.
    let response = app
        .clone()
        .oneshot(request(
            "GET",
            &format!(
                "/api/v1/availability?room_type={}&start=2023-06-01&end=2023-06-02&channel=direct",
                test_room_type_id()
            ),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body[0]["channels"][0]["sold"], 3);

    // Asking for more than remains conflicts with diagnostics.
    let mut too_many = reserve_body;
    too_many["rooms"] = serde_json::json!(8);
    let response = app
        .clone()
        .oneshot(request("POST", "/api/v1/reservations/reserve", Some(too_many)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "INSUFFICIENT_INVENTORY");
    assert_eq!(body["error"]["details"]["date"], "2023-06-01");

    // Release restores the rooms.
    let release_body = serde_json::json!({
        "room_type_id": test_room_type_id().0,
        "channel_id": "direct",
        "check_in": "2023-06-01",
        "check_out": "2023-06-03",
        "rooms": 3,
        "reason": "cancellation",
    });
    let response = app
        .clone()
        .oneshot(request(
            "POST",
            "/api/v1/reservations/release",
            Some(release_body),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["nights"][0]["sold"], 0);
}

#[tokio::test]
async fn export_csv_over_http() {
    let app = app();
    let id = create_config(&app, 10).await;
    let response = app
        .clone()
        .oneshot(request(
            "PUT",
            &format!("/api/v1/configs/{id}/days/2023-06-01/channels/direct"),
            Some(serde_json::json!({ "allocated": 10, "sold": 3 })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(request(
            "GET",
            &format!("/api/v1/configs/{id}/export?format=csv"),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/csv"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(csv.starts_with(
        "Date,Total Inventory,Total Sold,Free Stock,Occupancy Rate,Channel,Allocated,Sold,Available,Blocked"
    ));
    assert!(csv.contains("2023-06-01,10,3,0,30.00,direct,10,3,7,0"));
}

#[tokio::test]
async fn webhook_applies_external_patches() {
    let app = app();
    let _id = create_config(&app, 10).await;

    let body = serde_json::json!({
        "room_type_id": test_room_type_id().0,
        "updates": [
            { "date": "2023-06-01", "channel_id": "booking_com", "allocated": 5 },
            { "date": "2023-06-02", "channel_id": "booking_com", "allocated": 5, "sold": 2 },
        ],
    });
    let response = app
        .clone()
        .oneshot(request("POST", "/api/v1/webhooks/inventory", Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["processed"], 2);
}

#[tokio::test]
async fn booking_rate_limit_applies() {
    let app = app_with_limits(RateLimits {
        booking_per_minute: 1,
        ..RateLimits::default()
    });

    let body = serde_json::json!({
        "room_type_id": test_room_type_id().0,
        "channel_id": "direct",
        "check_in": "2023-06-01",
        "check_out": "2023-06-02",
        "rooms": 1,
    });
    // First request counts (and fails on the missing config), the second is
    // throttled before it reaches the handler.
    let response = app
        .clone()
        .oneshot(request("POST", "/api/v1/reservations/reserve", Some(body.clone())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .oneshot(request("POST", "/api/v1/reservations/reserve", Some(body)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
}
