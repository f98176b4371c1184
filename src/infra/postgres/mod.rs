//! PostgreSQL inventory store.
//!
//! Each configuration is stored as one JSONB document alongside the columns
//! the listing queries need. Optimistic concurrency is a guarded UPDATE on
//! the version column; the change log rides inside the document, which makes
//! the append atomic with the save.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPool;
use sqlx::Row;

use crate::domain::{AllotmentConfig, ConfigId, ConfigStatus, HotelId, RoomTypeId};

use super::error::{EngineError, Result};
use super::traits::{ConfigFilter, ConfigPage, InventoryStore, SortOrder};

/// PostgreSQL-backed store.
pub struct PgInventoryStore {
    pool: PgPool,
}

impl PgInventoryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn from_url(url: &str) -> Result<Self> {
        let pool = PgPool::connect(url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn decode_document(document: serde_json::Value) -> Result<AllotmentConfig> {
        serde_json::from_value(document)
            .map_err(|e| EngineError::Internal(format!("invalid config document: {e}")))
    }
}

fn status_str(status: ConfigStatus) -> &'static str {
    status.as_str()
}

#[async_trait]
impl InventoryStore for PgInventoryStore {
    async fn load(&self, hotel: &HotelId, room_type: &RoomTypeId) -> Result<AllotmentConfig> {
        let row = sqlx::query(
            r#"
            SELECT document FROM allotment_configs
            WHERE hotel_id = $1 AND room_type_id = $2 AND status = 'active'
            "#,
        )
        .bind(hotel.0)
        .bind(room_type.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Self::decode_document(row.get("document")),
            None => Err(EngineError::ConfigNotFoundForRoomType {
                hotel: *hotel,
                room_type: *room_type,
            }),
        }
    }

    async fn load_by_id(&self, id: &ConfigId) -> Result<AllotmentConfig> {
        let row = sqlx::query("SELECT document FROM allotment_configs WHERE id = $1")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Self::decode_document(row.get("document")),
            None => Err(EngineError::ConfigNotFound(id.to_string())),
        }
    }

    async fn list(&self, hotel: &HotelId, filter: &ConfigFilter) -> Result<ConfigPage> {
        let mut builder = sqlx::QueryBuilder::new(
            "SELECT document, COUNT(*) OVER () AS total FROM allotment_configs WHERE hotel_id = ",
        );
        builder.push_bind(hotel.0);

        if let Some(status) = filter.status {
            builder.push(" AND status = ");
            builder.push_bind(status_str(status));
        }
        if let Some(room_type) = filter.room_type {
            builder.push(" AND room_type_id = ");
            builder.push_bind(room_type.0);
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{search}%");
            builder.push(" AND (name ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" OR description ILIKE ");
            builder.push_bind(pattern);
            builder.push(")");
        }

        builder.push(match filter.sort {
            SortOrder::CreatedDesc => " ORDER BY created_at DESC, id",
            SortOrder::CreatedAsc => " ORDER BY created_at ASC, id",
            SortOrder::NameAsc => " ORDER BY name ASC, id",
        });

        let per_page = filter.per_page.max(1);
        let page = filter.page.max(1);
        builder.push(" LIMIT ");
        builder.push_bind(i64::from(per_page));
        builder.push(" OFFSET ");
        builder.push_bind(i64::from(per_page) * i64::from(page - 1));

        let rows = builder.build().fetch_all(&self.pool).await?;

        let total = rows
            .first()
            .map(|row| row.get::<i64, _>("total") as u64)
            .unwrap_or(0);
        let items = rows
            .into_iter()
            .map(|row| Self::decode_document(row.get("document")))
            .collect::<Result<Vec<_>>>()?;

        Ok(ConfigPage {
            items,
            total,
            page,
            per_page,
        })
    }

    async fn insert(&self, config: &AllotmentConfig) -> Result<()> {
        let document = serde_json::to_value(config)
            .map_err(|e| EngineError::Internal(format!("encode config: {e}")))?;

        let result = sqlx::query(
            r#"
            INSERT INTO allotment_configs (
                id, hotel_id, room_type_id, status, name, description,
                version, document, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(config.id.0)
        .bind(config.hotel_id.0)
        .bind(config.room_type_id.0)
        .bind(status_str(config.status))
        .bind(&config.name)
        .bind(config.description.as_deref())
        .bind(config.version as i64)
        .bind(&document)
        .bind(config.created_at)
        .bind(config.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(EngineError::AlreadyActive {
                    hotel: config.hotel_id,
                    room_type: config.room_type_id,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, config: &AllotmentConfig, expected_version: u64) -> Result<u64> {
        let new_version = expected_version + 1;
        let mut updated = config.clone();
        updated.version = new_version;
        let document = serde_json::to_value(&updated)
            .map_err(|e| EngineError::Internal(format!("encode config: {e}")))?;

        let result = sqlx::query(
            r#"
            UPDATE allotment_configs
            SET status = $3, name = $4, description = $5,
                version = $6, document = $7, updated_at = $8
            WHERE id = $1 AND version = $2
            "#,
        )
        .bind(config.id.0)
        .bind(expected_version as i64)
        .bind(status_str(updated.status))
        .bind(&updated.name)
        .bind(updated.description.as_deref())
        .bind(new_version as i64)
        .bind(&document)
        .bind(updated.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(new_version);
        }

        // Distinguish a missing row from a stale version.
        let row = sqlx::query("SELECT version FROM allotment_configs WHERE id = $1")
            .bind(config.id.0)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Err(EngineError::VersionConflict {
                config_id: config.id,
                expected: expected_version,
                actual: row.get::<i64, _>("version") as u64,
            }),
            None => Err(EngineError::ConfigNotFound(config.id.to_string())),
        }
    }

    async fn range_query<'a>(
        &self,
        hotel: &HotelId,
        start: NaiveDate,
        end: NaiveDate,
        room_type: Option<&'a RoomTypeId>,
    ) -> Result<Vec<AllotmentConfig>> {
        let mut builder = sqlx::QueryBuilder::new(
            "SELECT document FROM allotment_configs WHERE hotel_id = ",
        );
        builder.push_bind(hotel.0);
        if let Some(room_type) = room_type {
            builder.push(" AND room_type_id = ");
            builder.push_bind(room_type.0);
        }
        builder.push(" ORDER BY created_at, id");

        let rows = builder.build().fetch_all(&self.pool).await?;
        let mut out = Vec::new();
        for row in rows {
            let config = Self::decode_document(row.get("document"))?;
            if config.daily_records.range(start..=end).next().is_some() {
                out.push(config);
            }
        }
        Ok(out)
    }
}
