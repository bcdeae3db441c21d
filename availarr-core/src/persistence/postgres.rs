//! Postgres implementations of the storage ports.
//!
//! Tables are created by the migrations shipped with this crate
//! ([`crate::MIGRATOR`]). Status enums are stored as their `snake_case`
//! text form.

use async_trait::async_trait;
use availarr_model::{
    AvailabilityRecord, AvailabilityStatus, AvailabilityView, CanonicalId, MediaKind,
    MediaRequest, RecordId, RequestId, RequestStatus, SeasonRecord, SourceId, Tier,
};
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::ports::{FulfillmentCache, RequestLedger, ScanCheckpointStore, StatusStore};
use crate::error::Result;

#[derive(Debug, FromRow)]
struct RecordRow {
    id: Uuid,
    canonical_id: i64,
    media_kind: String,
    status: String,
    status_high_tier: String,
    source_id: Option<String>,
    source_key: Option<String>,
    last_added_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RecordRow {
    fn into_record(self) -> Result<AvailabilityRecord> {
        Ok(AvailabilityRecord {
            id: RecordId(self.id),
            canonical_id: CanonicalId::new(self.canonical_id)?,
            kind: self.media_kind.parse()?,
            status: self.status.parse()?,
            status_high_tier: self.status_high_tier.parse()?,
            source_id: self.source_id.map(SourceId::new),
            source_key: self.source_key,
            last_added_at: self.last_added_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct SeasonRow {
    record_id: Uuid,
    season_number: i32,
    status: String,
    status_high_tier: String,
    updated_at: DateTime<Utc>,
}

impl SeasonRow {
    fn into_season(self) -> Result<SeasonRecord> {
        Ok(SeasonRecord {
            record_id: RecordId(self.record_id),
            season_number: self.season_number,
            status: self.status.parse()?,
            status_high_tier: self.status_high_tier.parse()?,
            updated_at: self.updated_at,
        })
    }
}

const RECORD_COLUMNS: &str = "id, canonical_id, media_kind, status, status_high_tier, \
     source_id, source_key, last_added_at, created_at, updated_at";

#[derive(Clone, Debug)]
pub struct PostgresStatusStore {
    pool: PgPool,
}

impl PostgresStatusStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatusStore for PostgresStatusStore {
    async fn load(&self, kind: MediaKind, id: CanonicalId) -> Result<Option<AvailabilityView>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM availability_records \
             WHERE canonical_id = $1 AND media_kind = $2"
        );
        let Some(row) = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(id.get())
            .bind(kind.as_str())
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };
        let record = row.into_record()?;

        let seasons = sqlx::query_as::<_, SeasonRow>(
            "SELECT record_id, season_number, status, status_high_tier, updated_at \
             FROM availability_seasons WHERE record_id = $1 ORDER BY season_number",
        )
        .bind(record.id.to_uuid())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(SeasonRow::into_season)
        .collect::<Result<Vec<_>>>()?;

        Ok(Some(AvailabilityView { record, seasons }))
    }

    async fn save(&self, record: &AvailabilityRecord, seasons: &[SeasonRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let record_id: Uuid = sqlx::query_scalar(
            "INSERT INTO availability_records \
               (id, canonical_id, media_kind, status, status_high_tier, source_id, source_key, \
                last_added_at, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (canonical_id, media_kind) DO UPDATE SET \
               status = EXCLUDED.status, \
               status_high_tier = EXCLUDED.status_high_tier, \
               source_id = EXCLUDED.source_id, \
               source_key = EXCLUDED.source_key, \
               last_added_at = EXCLUDED.last_added_at, \
               updated_at = EXCLUDED.updated_at \
             RETURNING id",
        )
        .bind(record.id.to_uuid())
        .bind(record.canonical_id.get())
        .bind(record.kind.as_str())
        .bind(record.status.as_str())
        .bind(record.status_high_tier.as_str())
        .bind(record.source_id.as_ref().map(|s| s.as_str().to_string()))
        .bind(record.source_key.as_deref())
        .bind(record.last_added_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        for season in seasons {
            sqlx::query(
                "INSERT INTO availability_seasons \
                   (record_id, season_number, status, status_high_tier, updated_at) \
                 VALUES ($1, $2, $3, $4, $5) \
                 ON CONFLICT (record_id, season_number) DO UPDATE SET \
                   status = EXCLUDED.status, \
                   status_high_tier = EXCLUDED.status_high_tier, \
                   updated_at = EXCLUDED.updated_at",
            )
            .bind(record_id)
            .bind(season.season_number)
            .bind(season.status.as_str())
            .bind(season.status_high_tier.as_str())
            .bind(season.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_by_status(&self, status: AvailabilityStatus) -> Result<Vec<AvailabilityRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM availability_records \
             WHERE status = $1 OR status_high_tier = $1 ORDER BY updated_at"
        );
        sqlx::query_as::<_, RecordRow>(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(RecordRow::into_record)
            .collect()
    }

    async fn mark_deleted(&self, kind: MediaKind, id: CanonicalId) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE availability_records \
             SET status = 'deleted', status_high_tier = 'deleted', updated_at = NOW() \
             WHERE canonical_id = $1 AND media_kind = $2",
        )
        .bind(id.get())
        .bind(kind.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[derive(Debug, FromRow)]
struct RequestRow {
    id: i64,
    canonical_id: i64,
    media_kind: String,
    is_high_tier: bool,
    seasons: Vec<i32>,
    status: String,
}

impl RequestRow {
    fn into_request(self) -> Result<MediaRequest> {
        Ok(MediaRequest {
            id: RequestId(self.id),
            canonical_id: CanonicalId::new(self.canonical_id)?,
            kind: self.media_kind.parse()?,
            tier: Tier::from_high_flag(self.is_high_tier),
            seasons: self.seasons,
            status: self.status.parse()?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct PostgresRequestLedger {
    pool: PgPool,
}

impl PostgresRequestLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestLedger for PostgresRequestLedger {
    async fn outstanding_for(&self, kind: MediaKind, id: CanonicalId) -> Result<Vec<MediaRequest>> {
        sqlx::query_as::<_, RequestRow>(
            "SELECT id, canonical_id, media_kind, is_high_tier, seasons, status \
             FROM media_requests \
             WHERE canonical_id = $1 AND media_kind = $2 AND status IN ($3, $4) \
             ORDER BY id",
        )
        .bind(id.get())
        .bind(kind.as_str())
        .bind(RequestStatus::Pending.as_str())
        .bind(RequestStatus::Processing.as_str())
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(RequestRow::into_request)
        .collect()
    }

    async fn mark_available(&self, request: RequestId) -> Result<bool> {
        // The status predicate makes the transition happen at most once.
        let result = sqlx::query(
            "UPDATE media_requests SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status IN ($3, $4)",
        )
        .bind(request.0)
        .bind(RequestStatus::Available.as_str())
        .bind(RequestStatus::Pending.as_str())
        .bind(RequestStatus::Processing.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn reopen(&self, request: RequestId, status: RequestStatus) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE media_requests SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status = $3",
        )
        .bind(request.0)
        .bind(status.as_str())
        .bind(RequestStatus::Available.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }
}

#[derive(Clone, Debug)]
pub struct PostgresFulfillmentCache {
    pool: PgPool,
}

impl PostgresFulfillmentCache {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FulfillmentCache for PostgresFulfillmentCache {
    async fn has_complete_file(
        &self,
        kind: MediaKind,
        id: CanonicalId,
        tier: Tier,
    ) -> Result<bool> {
        let found: Option<bool> = sqlx::query_scalar(
            "SELECT has_complete_file FROM fulfillment_cache \
             WHERE canonical_id = $1 AND media_kind = $2 AND is_high_tier = $3",
        )
        .bind(id.get())
        .bind(kind.as_str())
        .bind(tier.is_high())
        .fetch_optional(&self.pool)
        .await?;
        Ok(found.unwrap_or(false))
    }
}

#[derive(Clone, Debug)]
pub struct PostgresCheckpointStore {
    pool: PgPool,
}

impl PostgresCheckpointStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ScanCheckpointStore for PostgresCheckpointStore {
    async fn last_scan(&self, source: &SourceId) -> Result<Option<DateTime<Utc>>> {
        Ok(sqlx::query_scalar(
            "SELECT last_scan_at FROM source_scan_checkpoints WHERE source_id = $1",
        )
        .bind(source.as_str())
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn record_scan(&self, source: &SourceId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            "INSERT INTO source_scan_checkpoints (source_id, last_scan_at) VALUES ($1, $2) \
             ON CONFLICT (source_id) DO UPDATE SET last_scan_at = EXCLUDED.last_scan_at",
        )
        .bind(source.as_str())
        .bind(at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
