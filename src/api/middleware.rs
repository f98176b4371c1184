//! Caller identity and per-scope rate limiting.
//!
//! Authentication itself is an upstream collaborator; requests arrive with
//! the caller's hotel identity in headers. Rate limits are enforced here
//! per scope and source, in memory.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

use crate::domain::HotelId;

use super::error::{ApiError, ErrorCode};

/// The authenticated caller, extracted from request headers.
#[derive(Debug, Clone)]
pub struct CallerIdentity {
    pub hotel_id: HotelId,
    pub actor: String,
}

impl CallerIdentity {
    fn from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let hotel_id = headers
            .get("x-hotel-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::new(ErrorCode::InvalidFieldValue, "missing x-hotel-id header")
            })?;
        let hotel_id = hotel_id.parse::<Uuid>().map_err(|_| {
            ApiError::new(ErrorCode::InvalidFieldValue, "x-hotel-id must be a uuid")
        })?;
        let actor = headers
            .get("x-actor")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("anonymous")
            .to_string();
        Ok(Self {
            hotel_id: HotelId::from_uuid(hotel_id),
            actor,
        })
    }
}

/// Engine-imposed per-minute defaults, overridable from the environment.
#[derive(Debug, Clone)]
pub struct RateLimits {
    /// Allocation mutations (config updates, rule application, allotment
    /// patches) per IP.
    pub allocation_per_minute: u32,
    /// Reserve/release per IP.
    pub booking_per_minute: u32,
    /// Analytics reads per IP.
    pub analytics_per_minute: u32,
    /// Webhook ingestion per channel manager.
    pub webhook_per_minute: u32,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            allocation_per_minute: 30,
            booking_per_minute: 100,
            analytics_per_minute: 20,
            webhook_per_minute: 500,
        }
    }
}

/// Fixed-window in-memory counter keyed by (scope, source).
pub struct RateLimiter {
    limits: RateLimits,
    counts: RwLock<HashMap<String, (u32, Instant)>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateScope {
    Allocation,
    Booking,
    Analytics,
    Webhook,
}

impl RateScope {
    fn as_str(&self) -> &'static str {
        match self {
            RateScope::Allocation => "allocation",
            RateScope::Booking => "booking",
            RateScope::Analytics => "analytics",
            RateScope::Webhook => "webhook",
        }
    }

    /// Which scope a request path and method falls under, if any. Nesting
    /// may already have stripped the `/api` prefix when this runs.
    fn classify(method: &axum::http::Method, path: &str) -> Option<Self> {
        let path = path.strip_prefix("/api").unwrap_or(path);
        if path.starts_with("/v1/webhooks") {
            return Some(RateScope::Webhook);
        }
        if path.contains("/reserve") || path.contains("/release") {
            return Some(RateScope::Booking);
        }
        if path.contains("/analytics") || path.contains("/recommendations") {
            return Some(RateScope::Analytics);
        }
        if method != axum::http::Method::GET && path.starts_with("/v1/configs") {
            return Some(RateScope::Allocation);
        }
        None
    }
}

impl RateLimiter {
    pub fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            counts: RwLock::new(HashMap::new()),
        }
    }

    fn limit_for(&self, scope: RateScope) -> u32 {
        match scope {
            RateScope::Allocation => self.limits.allocation_per_minute,
            RateScope::Booking => self.limits.booking_per_minute,
            RateScope::Analytics => self.limits.analytics_per_minute,
            RateScope::Webhook => self.limits.webhook_per_minute,
        }
    }

    /// Count one request against (scope, source); error when over the limit.
    pub fn check(&self, scope: RateScope, source: &str) -> Result<(), ApiError> {
        let limit = self.limit_for(scope);
        if limit == 0 {
            return Ok(());
        }
        let key = format!("{}:{source}", scope.as_str());
        let mut counts = self.counts.write().expect("rate limiter lock poisoned");
        let now = Instant::now();
        let entry = counts.entry(key).or_insert((0, now));
        if now.duration_since(entry.1).as_secs() >= 60 {
            *entry = (0, now);
        }
        if entry.0 >= limit {
            return Err(ApiError::new(
                ErrorCode::RateLimitExceeded,
                format!("{} limit of {limit}/min exceeded", scope.as_str()),
            ));
        }
        entry.0 += 1;
        Ok(())
    }
}

/// State shared by the identity + rate-limit middleware.
#[derive(Clone)]
pub struct RequestGuardState {
    pub rate_limiter: Arc<RateLimiter>,
}

/// Extract the caller identity, apply the scope's rate limit, and stash the
/// identity as a request extension.
pub async fn request_guard(
    State(state): State<RequestGuardState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let caller = CallerIdentity::from_headers(request.headers())?;

    if let Some(scope) = RateScope::classify(request.method(), request.uri().path()) {
        // Webhooks are limited per channel manager, the rest per source IP.
        let source = if scope == RateScope::Webhook {
            request
                .headers()
                .get("x-channel-manager")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("unknown")
                .to_string()
        } else {
            request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.split(',').next().unwrap_or(v).trim().to_string())
                .unwrap_or_else(|| caller.hotel_id.to_string())
        };
        state.rate_limiter.check(scope, &source)?;
    }

    request.extensions_mut().insert(caller);
    Ok(next.run(request).await)
}
