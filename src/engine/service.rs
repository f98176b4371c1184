//! Configuration-level operations behind the REST surface.
//!
//! Thin orchestration over the domain and the daily record manager: every
//! mutation loads under optimistic concurrency, appends exactly one
//! change-log entry and saves with a version check. Channel-manager pushes
//! happen after the save when auto-sync is on.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::domain::{
    AllocationRule, Analytics, AllotmentConfig, CalculationFrequency, ChangeAction,
    ChangeLogEntry, Channel, ChannelId, Clock, ConfigId, ConfigStatus, DailyRecord,
    DefaultSettings, HotelId, IntegrationSettings, LogQuery, MetricsWindow, Recommendation,
    RoomTypeId, RuleId,
};
use crate::infra::{
    ChannelSyncService, ConfigFilter, ConfigPage, DateRange, EngineError, InventoryStore, Result,
    SyncKind,
};

use super::analytics::{compute_window, run_analytics};
use super::daily_manager::{upsert_channel, ChannelAllotmentPatch};
use super::export::{export_change_log_csv, export_csv, export_json};
use super::optimize::{optimize, OptimizeSummary};
use super::rules::{apply_rule, DynamicAllocator, RuleOutcome};
use super::{mutate_with_retry, ConfigKey};

/// Input for configuration creation.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateConfig {
    pub room_type_id: RoomTypeId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub defaults: DefaultSettings,
    #[serde(default)]
    pub channels: Vec<Channel>,
    #[serde(default)]
    pub rules: Vec<AllocationRule>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub utc_offset_minutes: Option<i32>,
    #[serde(default)]
    pub integration: Option<IntegrationSettings>,
    #[serde(default)]
    pub analytics_frequency: Option<CalculationFrequency>,
}

/// Partial update to a configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<ConfigStatus>,
    pub defaults: Option<DefaultSettings>,
    pub channels: Option<Vec<Channel>>,
    pub rules: Option<Vec<AllocationRule>>,
    pub integration: Option<IntegrationSettings>,
}

impl ConfigPatch {
    fn touched_fields(&self) -> Vec<String> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name".to_string());
        }
        if self.description.is_some() {
            fields.push("description".to_string());
        }
        if self.status.is_some() {
            fields.push("status".to_string());
        }
        if self.defaults.is_some() {
            fields.push("defaults".to_string());
        }
        if self.channels.is_some() {
            fields.push("channels".to_string());
        }
        if self.rules.is_some() {
            fields.push("rules".to_string());
        }
        if self.integration.is_some() {
            fields.push("integration".to_string());
        }
        fields
    }

    fn only_touches_status(&self) -> bool {
        self.status.is_some() && self.touched_fields().len() == 1
    }
}

/// One per-date channel patch from the channel-manager webhook.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalPatch {
    pub date: NaiveDate,
    pub channel_id: ChannelId,
    #[serde(flatten)]
    pub patch: ChannelAllotmentPatch,
}

/// Orchestrates configuration CRUD, rule application, analytics and
/// channel-manager synchronization.
pub struct AllotmentService {
    store: Arc<dyn InventoryStore>,
    clock: Arc<dyn Clock>,
    sync: Option<Arc<ChannelSyncService>>,
    dynamic: Option<Arc<dyn DynamicAllocator>>,
    max_retries: u32,
}

impl AllotmentService {
    pub fn new(store: Arc<dyn InventoryStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            sync: None,
            dynamic: None,
            max_retries: 3,
        }
    }

    pub fn with_sync(mut self, sync: Arc<ChannelSyncService>) -> Self {
        self.sync = Some(sync);
        self
    }

    pub fn with_dynamic_allocator(mut self, dynamic: Arc<dyn DynamicAllocator>) -> Self {
        self.dynamic = Some(dynamic);
        self
    }

    pub fn store(&self) -> &Arc<dyn InventoryStore> {
        &self.store
    }

    // ------------------------------------------------------------------
    // Configuration CRUD
    // ------------------------------------------------------------------

    pub async fn create_config(
        &self,
        hotel: &HotelId,
        input: CreateConfig,
        actor: &str,
    ) -> Result<AllotmentConfig> {
        let now = self.clock.now();
        let mut config =
            AllotmentConfig::new(*hotel, input.room_type_id, input.name, input.defaults, now);
        config.description = input.description;
        config.channels = input.channels;
        config.rules = input.rules;
        if let Some(timezone) = input.timezone {
            config.timezone = timezone;
        }
        if let Some(offset) = input.utc_offset_minutes {
            config.utc_offset_minutes = offset;
        }
        if let Some(integration) = input.integration {
            config.integration = integration;
        }
        if let Some(frequency) = input.analytics_frequency {
            config.analytics = Some(Analytics::new(frequency, now));
        }

        config
            .validate()
            .map_err(|message| EngineError::validation("config", message))?;
        config.push_log(
            ChangeLogEntry::new(actor, ChangeAction::Created, now).with_fields(&["config"]),
        );

        self.store.insert(&config).await?;
        tracing::info!(config_id = %config.id, hotel = %hotel, "configuration created");
        Ok(config)
    }

    pub async fn update_config(
        &self,
        config_id: &ConfigId,
        patch: ConfigPatch,
        actor: &str,
    ) -> Result<AllotmentConfig> {
        let now = self.clock.now();
        let fields = patch.touched_fields();
        if fields.is_empty() {
            return Err(EngineError::validation("patch", "no fields to update"));
        }
        let status_only = patch.only_touches_status();

        let (config, _) = mutate_with_retry(
            self.store.as_ref(),
            ConfigKey::Id(config_id),
            self.max_retries,
            now,
            false,
            |config| {
                // Status flips are allowed from any state; everything else
                // needs an active configuration.
                if !status_only && !config.is_mutable() {
                    return Err(EngineError::validation(
                        "status",
                        format!("configuration {} is {}", config.id, config.status),
                    ));
                }
                if let Some(name) = &patch.name {
                    config.name = name.clone();
                }
                if let Some(description) = &patch.description {
                    config.description = Some(description.clone());
                }
                if let Some(status) = patch.status {
                    config.status = status;
                }
                if let Some(defaults) = &patch.defaults {
                    config.defaults = defaults.clone();
                }
                if let Some(channels) = &patch.channels {
                    config.channels = channels.clone();
                }
                if let Some(rules) = &patch.rules {
                    config.rules = rules.clone();
                }
                if let Some(integration) = &patch.integration {
                    config.integration = integration.clone();
                }
                config
                    .validate()
                    .map_err(|message| EngineError::validation("config", message))?;
                config.push_log(
                    ChangeLogEntry::new(actor, ChangeAction::Updated, now)
                        .with_fields(&fields.iter().map(String::as_str).collect::<Vec<_>>()),
                );
                Ok(())
            },
        )
        .await?;
        Ok(config)
    }

    /// Soft delete: the configuration stays addressable by id but stops
    /// being the active one for its (hotel, room type).
    pub async fn soft_delete(&self, config_id: &ConfigId, actor: &str) -> Result<()> {
        let now = self.clock.now();
        mutate_with_retry(
            self.store.as_ref(),
            ConfigKey::Id(config_id),
            self.max_retries,
            now,
            false,
            |config| {
                config.status = ConfigStatus::Inactive;
                config.push_log(
                    ChangeLogEntry::new(actor, ChangeAction::Deleted, now)
                        .with_fields(&["status"]),
                );
                Ok(())
            },
        )
        .await?;
        Ok(())
    }

    pub async fn get(&self, config_id: &ConfigId) -> Result<AllotmentConfig> {
        self.store.load_by_id(config_id).await
    }

    /// Active configuration for a room type, daily records clipped to the
    /// range when one is given.
    pub async fn get_by_room_type(
        &self,
        hotel: &HotelId,
        room_type: &RoomTypeId,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<AllotmentConfig> {
        let mut config = self.store.load(hotel, room_type).await?;
        if let Some((start, end)) = range {
            if end < start {
                return Err(EngineError::validation("end", "must not precede start"));
            }
            let clipped: std::collections::BTreeMap<_, _> = config
                .daily_records
                .range(start..=end)
                .map(|(date, record)| (*date, record.clone()))
                .collect();
            config.daily_records = clipped;
        }
        Ok(config)
    }

    pub async fn list(&self, hotel: &HotelId, filter: &ConfigFilter) -> Result<ConfigPage> {
        self.store.list(hotel, filter).await
    }

    /// All configurations with daily records in the range, records clipped.
    pub async fn range_query(
        &self,
        hotel: &HotelId,
        start: NaiveDate,
        end: NaiveDate,
        room_type: Option<&RoomTypeId>,
    ) -> Result<Vec<AllotmentConfig>> {
        if end < start {
            return Err(EngineError::validation("end", "must not precede start"));
        }
        let mut configs = self.store.range_query(hotel, start, end, room_type).await?;
        for config in &mut configs {
            let clipped: std::collections::BTreeMap<_, _> = config
                .daily_records
                .range(start..=end)
                .map(|(date, record)| (*date, record.clone()))
                .collect();
            config.daily_records = clipped;
        }
        Ok(configs)
    }

    // ------------------------------------------------------------------
    // Daily allotment mutations
    // ------------------------------------------------------------------

    pub async fn update_channel_allotment(
        &self,
        config_id: &ConfigId,
        date: NaiveDate,
        channel_id: ChannelId,
        patch: &ChannelAllotmentPatch,
        actor: &str,
    ) -> Result<DailyRecord> {
        if patch.is_empty() {
            return Err(EngineError::validation("patch", "no fields to update"));
        }
        let now = self.clock.now();
        let fields = patch.touched_fields();

        let (config, record) = mutate_with_retry(
            self.store.as_ref(),
            ConfigKey::Id(config_id),
            self.max_retries,
            now,
            true,
            |config| {
                let record = upsert_channel(config, date, channel_id, patch, now)?;
                config.push_log(
                    ChangeLogEntry::new(actor, ChangeAction::Updated, now)
                        .with_fields(&fields.iter().map(String::as_str).collect::<Vec<_>>())
                        .with_details(serde_json::json!({
                            "date": date,
                            "channel": channel_id,
                        })),
                );
                Ok(record)
            },
        )
        .await?;

        self.maybe_sync(&config, DateRange::new(date, date), actor)
            .await;
        Ok(record)
    }

    /// Apply a stored rule over a date range, returning per-date outcomes.
    pub async fn apply_rule(
        &self,
        config_id: &ConfigId,
        rule_id: &RuleId,
        start: NaiveDate,
        end: NaiveDate,
        actor: &str,
    ) -> Result<Vec<RuleOutcome>> {
        let now = self.clock.now();
        let dynamic = self.dynamic.clone();

        let (config, outcomes) = mutate_with_retry(
            self.store.as_ref(),
            ConfigKey::Id(config_id),
            self.max_retries,
            now,
            true,
            |config| {
                let today = self.clock.today_local(config.utc_offset_minutes);
                let outcomes = apply_rule(
                    config,
                    rule_id,
                    start,
                    end,
                    today,
                    dynamic.as_deref(),
                    now,
                )?;
                config.push_log(
                    ChangeLogEntry::new(actor, ChangeAction::Updated, now)
                        .with_fields(&["allocations"])
                        .with_reason(format!("rule {rule_id} applied {start}..{end}")),
                );
                Ok(outcomes)
            },
        )
        .await?;

        self.maybe_sync(&config, DateRange::new(start, end), actor)
            .await;
        Ok(outcomes)
    }

    // ------------------------------------------------------------------
    // Analytics
    // ------------------------------------------------------------------

    /// Scheduled analytics sweep for one configuration.
    pub async fn run_analytics(&self, config_id: &ConfigId, actor: &str) -> Result<Analytics> {
        let now = self.clock.now();
        let clock = self.clock.clone();
        let (config, _) = mutate_with_retry(
            self.store.as_ref(),
            ConfigKey::Id(config_id),
            self.max_retries,
            now,
            true,
            |config| {
                run_analytics(config, clock.as_ref())?;
                config.push_log(
                    ChangeLogEntry::new(actor, ChangeAction::Updated, now)
                        .with_fields(&["analytics"]),
                );
                Ok(())
            },
        )
        .await?;
        config
            .analytics
            .clone()
            .ok_or_else(|| EngineError::Internal("analytics slot empty after sweep".to_string()))
    }

    /// Ad-hoc analytics over an explicit window, read-only.
    pub async fn analytics_window(
        &self,
        config_id: &ConfigId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<MetricsWindow> {
        let config = self.store.load_by_id(config_id).await?;
        compute_window(&config, start, end)
    }

    pub async fn recommendations(&self, config_id: &ConfigId) -> Result<Vec<Recommendation>> {
        let config = self.store.load_by_id(config_id).await?;
        Ok(config
            .analytics
            .map(|a| a.recommendations)
            .unwrap_or_default())
    }

    /// Recompute upcoming allocations from rules and analytics.
    pub async fn optimize(&self, config_id: &ConfigId, actor: &str) -> Result<OptimizeSummary> {
        let now = self.clock.now();
        let dynamic = self.dynamic.clone();

        let (config, summary) = mutate_with_retry(
            self.store.as_ref(),
            ConfigKey::Id(config_id),
            self.max_retries,
            now,
            true,
            |config| {
                let today = self.clock.today_local(config.utc_offset_minutes);
                let summary = optimize(config, today, dynamic.as_deref(), now)?;
                config.push_log(
                    ChangeLogEntry::new(actor, ChangeAction::Updated, now)
                        .with_fields(&["allocations"])
                        .with_reason("optimization pass"),
                );
                Ok(summary)
            },
        )
        .await?;

        self.maybe_sync(&config, DateRange::new(summary.start, summary.end), actor)
            .await;
        Ok(summary)
    }

    // ------------------------------------------------------------------
    // Export and audit
    // ------------------------------------------------------------------

    pub async fn export_csv(
        &self,
        config_id: &ConfigId,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<String> {
        let config = self.store.load_by_id(config_id).await?;
        Ok(export_csv(&config, range))
    }

    pub async fn export_json(&self, config_id: &ConfigId) -> Result<Vec<u8>> {
        let config = self.store.load_by_id(config_id).await?;
        export_json(&config)
    }

    pub async fn change_log(
        &self,
        config_id: &ConfigId,
        query: &LogQuery,
    ) -> Result<Vec<ChangeLogEntry>> {
        let config = self.store.load_by_id(config_id).await?;
        Ok(config
            .change_log
            .into_iter()
            .filter(|e| query.matches(e))
            .collect())
    }

    pub async fn change_log_csv(&self, config_id: &ConfigId, query: &LogQuery) -> Result<String> {
        let config = self.store.load_by_id(config_id).await?;
        Ok(export_change_log_csv(&config, query))
    }

    // ------------------------------------------------------------------
    // Channel-manager integration
    // ------------------------------------------------------------------

    /// Privileged inbound path from the channel-manager webhook: per-date
    /// channel patches through the daily record manager, bypassing rules
    /// but not invariants. Returns the number of patches applied.
    pub async fn apply_external_update(
        &self,
        hotel: &HotelId,
        room_type: &RoomTypeId,
        patches: &[ExternalPatch],
        actor: &str,
    ) -> Result<usize> {
        if patches.is_empty() {
            return Err(EngineError::validation("updates", "no patches supplied"));
        }
        let now = self.clock.now();

        let (_, applied) = mutate_with_retry(
            self.store.as_ref(),
            ConfigKey::RoomType(hotel, room_type),
            self.max_retries,
            now,
            true,
            |config| {
                // Ascending date order for deterministic serialization.
                let mut ordered: Vec<&ExternalPatch> = patches.iter().collect();
                ordered.sort_by_key(|p| p.date);
                for patch in &ordered {
                    upsert_channel(config, patch.date, patch.channel_id, &patch.patch, now)?;
                }
                config.push_log(
                    ChangeLogEntry::new(actor, ChangeAction::Synced, now)
                        .with_fields(&["daily_records"])
                        .with_reason("channel-manager inventory update")
                        .with_details(serde_json::json!({ "patches": ordered.len() })),
                );
                Ok(ordered.len())
            },
        )
        .await?;

        Ok(applied)
    }

    /// Push allocations to the channel manager when auto-sync is on. A push
    /// that exhausts its retries flags the configuration `needs_sync`; a
    /// successful push clears the flag.
    async fn maybe_sync(&self, config: &AllotmentConfig, range: DateRange, actor: &str) {
        let Some(sync) = &self.sync else { return };
        if !config.integration.auto_sync {
            return;
        }

        let pushed = sync.push(SyncKind::Allocation, config, range).await;
        let target = match &pushed {
            Ok(()) if config.needs_sync => Some((false, "sync backlog cleared".to_string())),
            Ok(()) => None,
            Err(e) => Some((true, format!("sync failed: {e}"))),
        };

        if let Some((needs_sync, reason)) = target {
            let now = self.clock.now();
            let result = mutate_with_retry(
                self.store.as_ref(),
                ConfigKey::Id(&config.id),
                self.max_retries,
                now,
                false,
                |config| {
                    config.needs_sync = needs_sync;
                    config.push_log(
                        ChangeLogEntry::new(actor, ChangeAction::Synced, now)
                            .with_fields(&["needs_sync"])
                            .with_reason(reason.clone()),
                    );
                    Ok(())
                },
            )
            .await;
            if let Err(e) = result {
                tracing::error!(config_id = %config.id, error = %e, "failed to record sync state");
            }
        }
    }
}
