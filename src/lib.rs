//! Allotment Engine Library
//!
//! Per-hotel, per-room-type, per-date inventory and allocation: distributes
//! a finite pool of rooms across sales channels, enforces channel-level
//! restrictions, processes reservations and releases, and produces
//! analytics and recommendations driving allocation decisions.
//!
//! ## Modules
//!
//! - [`domain`] - Core domain types (configurations, daily records,
//!   channels, rules, analytics, change log)
//! - [`engine`] - Services over the domain: daily record manager,
//!   reservation engine, rule engine, analytics, optimizer, export
//! - [`infra`] - Infrastructure (in-memory and PostgreSQL stores, retry,
//!   channel-manager sync)
//! - [`api`] - REST API routes, DTOs and error codes
//! - [`server`] - HTTP server bootstrap

pub mod api;
pub mod domain;
pub mod engine;
pub mod infra;
pub mod migrations;
pub mod server;

// Re-export commonly used types
pub use domain::{
    AllocationRule, AllotmentConfig, ChangeAction, ChangeLogEntry, Channel, ChannelAllotment,
    ChannelId, Clock, ConfigId, ConfigStatus, DailyRecord, DefaultSettings, HotelId, RoomTypeId,
    RuleId, RuleKind, SystemClock,
};

pub use engine::{
    AllotmentService, ChannelAllotmentPatch, DynamicAllocator, ReservationEngine, RuleOutcome,
    StayRequest,
};

pub use infra::{
    ChannelSyncPort, ChannelSyncService, EngineError, InMemoryInventoryStore, InventoryStore,
    PgInventoryStore, Result,
};
