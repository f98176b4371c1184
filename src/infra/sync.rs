//! Channel-manager synchronization service.
//!
//! Wraps the outbound [`ChannelSyncPort`] with retry and backoff bounded at
//! ten minutes. When a push exhausts its retries the caller marks the
//! configuration `needs_sync` so reads can surface the backlog.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::AllotmentConfig;

use super::error::{EngineError, Result};
use super::retry::{retry_with_context, RetryConfig};
use super::traits::{ChannelSyncPort, DateRange};

/// What is being pushed to the channel manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    Allocation,
    Rate,
    Restrictions,
}

impl SyncKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncKind::Allocation => "allocation",
            SyncKind::Rate => "rate",
            SyncKind::Restrictions => "restrictions",
        }
    }
}

/// Retry-wrapped outbound sync.
pub struct ChannelSyncService {
    port: Arc<dyn ChannelSyncPort>,
    retry: RetryConfig,
}

impl ChannelSyncService {
    pub fn new(port: Arc<dyn ChannelSyncPort>) -> Self {
        Self {
            port,
            retry: RetryConfig::channel_manager(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Push one kind of update for a date range. Every attempt is logged;
    /// the error returned after the retry ceiling means the configuration
    /// should be flagged `needs_sync`.
    pub async fn push(
        &self,
        kind: SyncKind,
        config: &AllotmentConfig,
        range: DateRange,
    ) -> Result<()> {
        let context = format!("sync:{}:{}", kind.as_str(), config.id);
        let result = retry_with_context(
            &self.retry,
            &context,
            |e: &EngineError| e.is_retryable() || matches!(e, EngineError::SyncFailed(_)),
            || async {
                match kind {
                    SyncKind::Allocation => self.port.push_allocation(config, range).await,
                    SyncKind::Rate => self.port.push_rate(config, range).await,
                    SyncKind::Restrictions => self.port.push_restrictions(config, range).await,
                }
            },
        )
        .await;

        match &result {
            Ok(()) => {
                tracing::info!(
                    config_id = %config.id,
                    kind = kind.as_str(),
                    start = %range.start,
                    end = %range.end,
                    "channel sync pushed"
                );
            }
            Err(e) => {
                tracing::error!(
                    config_id = %config.id,
                    kind = kind.as_str(),
                    error = %e,
                    "channel sync failed after retries"
                );
            }
        }
        result
    }
}

/// Default port for deployments without a channel manager: logs each push
/// and succeeds. Keeps auto-sync wiring inert rather than failing.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSyncPort;

#[async_trait]
impl ChannelSyncPort for LoggingSyncPort {
    async fn push_allocation(&self, config: &AllotmentConfig, range: DateRange) -> Result<()> {
        tracing::debug!(config_id = %config.id, start = %range.start, end = %range.end, "push_allocation (noop)");
        Ok(())
    }

    async fn push_rate(&self, config: &AllotmentConfig, range: DateRange) -> Result<()> {
        tracing::debug!(config_id = %config.id, start = %range.start, end = %range.end, "push_rate (noop)");
        Ok(())
    }

    async fn push_restrictions(&self, config: &AllotmentConfig, range: DateRange) -> Result<()> {
        tracing::debug!(config_id = %config.id, start = %range.start, end = %range.end, "push_restrictions (noop)");
        Ok(())
    }
}
