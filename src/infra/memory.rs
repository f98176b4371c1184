//! In-memory inventory store.
//!
//! Backs unit and integration tests and single-process deployments without
//! a database. Implements the same optimistic-concurrency contract as the
//! PostgreSQL store.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use crate::domain::{AllotmentConfig, ConfigId, ConfigStatus, HotelId, RoomTypeId};

use super::error::{EngineError, Result};
use super::traits::{ConfigFilter, ConfigPage, InventoryStore, SortOrder};

/// Hash-map backed store guarded by a single RwLock.
#[derive(Default)]
pub struct InMemoryInventoryStore {
    configs: RwLock<HashMap<ConfigId, AllotmentConfig>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored configurations, for tests.
    pub async fn len(&self) -> usize {
        self.configs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.configs.read().await.is_empty()
    }
}

fn matches_filter(config: &AllotmentConfig, filter: &ConfigFilter) -> bool {
    if let Some(status) = filter.status {
        if config.status != status {
            return false;
        }
    }
    if let Some(room_type) = filter.room_type {
        if config.room_type_id != room_type {
            return false;
        }
    }
    if let Some(search) = &filter.search {
        let needle = search.to_lowercase();
        let in_name = config.name.to_lowercase().contains(&needle);
        let in_description = config
            .description
            .as_deref()
            .map(|d| d.to_lowercase().contains(&needle))
            .unwrap_or(false);
        if !in_name && !in_description {
            return false;
        }
    }
    true
}

#[async_trait]
impl InventoryStore for InMemoryInventoryStore {
    async fn load(&self, hotel: &HotelId, room_type: &RoomTypeId) -> Result<AllotmentConfig> {
        let configs = self.configs.read().await;
        configs
            .values()
            .find(|c| {
                c.hotel_id == *hotel
                    && c.room_type_id == *room_type
                    && c.status == ConfigStatus::Active
            })
            .cloned()
            .ok_or(EngineError::ConfigNotFoundForRoomType {
                hotel: *hotel,
                room_type: *room_type,
            })
    }

    async fn load_by_id(&self, id: &ConfigId) -> Result<AllotmentConfig> {
        let configs = self.configs.read().await;
        configs
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::ConfigNotFound(id.to_string()))
    }

    async fn list(&self, hotel: &HotelId, filter: &ConfigFilter) -> Result<ConfigPage> {
        let configs = self.configs.read().await;
        let mut items: Vec<AllotmentConfig> = configs
            .values()
            .filter(|c| c.hotel_id == *hotel && matches_filter(c, filter))
            .cloned()
            .collect();

        match filter.sort {
            SortOrder::CreatedDesc => {
                items.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.0.cmp(&b.id.0)))
            }
            SortOrder::CreatedAsc => {
                items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.0.cmp(&b.id.0)))
            }
            SortOrder::NameAsc => {
                items.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.0.cmp(&b.id.0)))
            }
        }

        let total = items.len() as u64;
        let per_page = filter.per_page.max(1);
        let page = filter.page.max(1);
        let start = ((page - 1) as usize).saturating_mul(per_page as usize);
        let items = items
            .into_iter()
            .skip(start)
            .take(per_page as usize)
            .collect();

        Ok(ConfigPage {
            items,
            total,
            page,
            per_page,
        })
    }

    async fn insert(&self, config: &AllotmentConfig) -> Result<()> {
        let mut configs = self.configs.write().await;
        if config.status == ConfigStatus::Active {
            let clash = configs.values().any(|c| {
                c.hotel_id == config.hotel_id
                    && c.room_type_id == config.room_type_id
                    && c.status == ConfigStatus::Active
            });
            if clash {
                return Err(EngineError::AlreadyActive {
                    hotel: config.hotel_id,
                    room_type: config.room_type_id,
                });
            }
        }
        configs.insert(config.id, config.clone());
        Ok(())
    }

    async fn save(&self, config: &AllotmentConfig, expected_version: u64) -> Result<u64> {
        let mut configs = self.configs.write().await;
        let stored = configs
            .get_mut(&config.id)
            .ok_or_else(|| EngineError::ConfigNotFound(config.id.to_string()))?;
        if stored.version != expected_version {
            return Err(EngineError::VersionConflict {
                config_id: config.id,
                expected: expected_version,
                actual: stored.version,
            });
        }
        let mut updated = config.clone();
        updated.version = expected_version + 1;
        let new_version = updated.version;
        *stored = updated;
        Ok(new_version)
    }

    async fn range_query<'a>(
        &self,
        hotel: &HotelId,
        start: NaiveDate,
        end: NaiveDate,
        room_type: Option<&'a RoomTypeId>,
    ) -> Result<Vec<AllotmentConfig>> {
        let configs = self.configs.read().await;
        let mut out: Vec<AllotmentConfig> = configs
            .values()
            .filter(|c| c.hotel_id == *hotel)
            .filter(|c| room_type.map(|rt| c.room_type_id == *rt).unwrap_or(true))
            .filter(|c| c.daily_records.range(start..=end).next().is_some())
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.0.cmp(&b.id.0)));
        Ok(out)
    }
}
