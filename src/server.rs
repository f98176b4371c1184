//! HTTP server bootstrap for the allotment engine.
//!
//! This module wires together:
//! - configuration from environment variables
//! - the database connection pool and migrations
//! - the engine services (allotment service, reservation engine, sync)
//! - the Axum router with identity and rate-limit middleware

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderValue, Method};
use axum::routing::get;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use crate::api::{RateLimiter, RateLimits, RequestGuardState};
use crate::domain::SystemClock;
use crate::engine::{AllotmentService, ReservationEngine};
use crate::infra::{ChannelSyncService, LoggingSyncPort, PgInventoryStore};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Server listen address.
    pub listen_addr: SocketAddr,
    /// Maximum database connections.
    pub max_connections: u32,
    /// Per-request deadline in seconds.
    pub request_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/allotment_engine".to_string());

        let port: u16 = std::env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        let listen_addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .expect("Invalid listen address");

        let max_connections: u32 = std::env::var("MAX_DB_CONNECTIONS")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(10);

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(30);

        Self {
            database_url,
            listen_addr,
            max_connections,
            request_timeout_secs,
        }
    }
}

fn rate_limits_from_env() -> RateLimits {
    let mut limits = RateLimits::default();
    let overrides: [(&str, &mut u32); 4] = [
        ("RATE_LIMIT_ALLOCATION_PER_MINUTE", &mut limits.allocation_per_minute),
        ("RATE_LIMIT_BOOKING_PER_MINUTE", &mut limits.booking_per_minute),
        ("RATE_LIMIT_ANALYTICS_PER_MINUTE", &mut limits.analytics_per_minute),
        ("RATE_LIMIT_WEBHOOK_PER_MINUTE", &mut limits.webhook_per_minute),
    ];
    for (var, slot) in overrides {
        if let Some(value) = std::env::var(var).ok().and_then(|v| v.parse().ok()) {
            *slot = value;
        }
    }
    limits
}

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AllotmentService>,
    pub reservations: Arc<ReservationEngine>,
    pub request_timeout: Duration,
}

/// Start the HTTP server.
pub async fn run() -> anyhow::Result<()> {
    init_tracing();

    info!("Starting allotment-engine v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env();
    info!("Configuration loaded");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Max connections: {}", config.max_connections);
    info!("  Request timeout: {}s", config.request_timeout_secs);

    info!("Connecting to PostgreSQL...");
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Connected to PostgreSQL");

    let migrate_on_startup = std::env::var("DB_MIGRATE_ON_STARTUP")
        .ok()
        .map(|v| {
            !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off"
            )
        })
        .unwrap_or(true);
    if migrate_on_startup {
        info!("Running database migrations...");
        crate::migrations::run_postgres(&pool).await?;
        info!("Database migrations applied");
    } else {
        info!("DB migrations skipped (DB_MIGRATE_ON_STARTUP=0)");
    }

    // Engine services. The channel-manager port defaults to a logging stub;
    // a real adapter is wired here in deployments that have one.
    let store = Arc::new(PgInventoryStore::new(pool));
    let clock = Arc::new(SystemClock);
    let sync = Arc::new(ChannelSyncService::new(Arc::new(LoggingSyncPort)));
    let service = Arc::new(
        AllotmentService::new(store.clone(), clock.clone()).with_sync(sync),
    );
    let reservations = Arc::new(ReservationEngine::new(store, clock));

    let state = AppState {
        service,
        reservations,
        request_timeout: Duration::from_secs(config.request_timeout_secs),
    };

    let guard_state = RequestGuardState {
        rate_limiter: Arc::new(RateLimiter::new(rate_limits_from_env())),
    };

    let app = build_router(guard_state)?.with_state(state);

    info!("Starting HTTP server on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;

    info!("allotment-engine is ready to accept connections");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .init();
}

/// Build the full router: `/api` behind identity + rate limiting, health
/// endpoints open.
pub fn build_router(guard_state: RequestGuardState) -> anyhow::Result<Router<AppState>> {
    let api = crate::api::router().layer(axum::middleware::from_fn_with_state(
        guard_state,
        crate::api::middleware::request_guard,
    ));

    let mut router = Router::new()
        .nest("/api", api)
        .route("/health", get(crate::api::handlers::health::health_check))
        .route("/ready", get(crate::api::handlers::health::readiness_check))
        .layer(TraceLayer::new_for_http());

    if let Some(cors_layer) = cors_layer_from_env()? {
        router = router.layer(cors_layer);
    }

    Ok(router)
}

fn cors_layer_from_env() -> anyhow::Result<Option<CorsLayer>> {
    let origins = match std::env::var("CORS_ALLOW_ORIGINS") {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let origins = origins.trim();
    if origins.is_empty() {
        return Ok(None);
    }

    let allow_origin = if origins == "*" {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<HeaderValue>()
                    .map_err(|e| anyhow::anyhow!("Invalid CORS origin {s:?}: {e}"))
            })
            .collect::<anyhow::Result<_>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
            .allow_headers([
                axum::http::header::AUTHORIZATION,
                axum::http::header::CONTENT_TYPE,
            ]),
    ))
}
