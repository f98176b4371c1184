//! Core domain types for the allotment engine.
//!
//! Plain value structs owned by the engine; behavior lives in the `engine`
//! services and the store handles only (de)serialization.

mod analytics;
mod changelog;
mod channel;
mod clock;
mod config;
mod daily;
mod ids;
mod rule;

pub use analytics::{
    Alert, AlertSeverity, Analytics, CalculationFrequency, ChannelMetrics, MetricsWindow,
    OverallMetrics, Recommendation, RecommendationPriority, RecommendedAction,
};
pub use changelog::{ChangeAction, ChangeLogEntry, LogQuery};
pub use channel::{Channel, ChannelRestrictions, RateModifiers, RestrictionSnapshot};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    AllocationMethod, AllotmentConfig, ConfigStatus, DefaultSettings, IntegrationSettings,
};
pub use daily::{ChannelAllotment, DailyRecord};
pub use ids::{BookingId, ChannelId, ConfigId, HotelId, RoomTypeId, RuleId};
pub use rule::{
    round_share, AdvanceWindow, AllocationRule, FallbackStrategy, PriorityCap, RuleConditions,
    RuleKind,
};
