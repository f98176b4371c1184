//! Infrastructure layer for the allotment engine.
//!
//! Contains the error type, the store and channel-sync ports, their
//! in-memory and PostgreSQL implementations, retry with backoff, and the
//! channel-manager sync service.

mod error;
mod memory;
pub mod postgres;
mod retry;
mod sync;
mod traits;

pub use error::{EngineError, Result};
pub use memory::InMemoryInventoryStore;
pub use postgres::PgInventoryStore;
pub use retry::{is_retryable_db_error, retry_with_context, RetryConfig};
pub use sync::{ChannelSyncService, LoggingSyncPort, SyncKind};
pub use traits::{
    ChannelSyncPort, ConfigFilter, ConfigPage, DateRange, InventoryStore, SortOrder,
};

#[cfg(test)]
pub use traits::{MockChannelSyncPort, MockInventoryStore};
