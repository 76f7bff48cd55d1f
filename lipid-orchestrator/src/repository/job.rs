//! Job Repository
//!
//! Postgres-backed Job Store. Merges run inside a transaction that holds a
//! row lock, so the lifecycle controller and any number of worker
//! invocations can write the same document concurrently.

use async_trait::async_trait;
use lipid_core::domain::job::{Job, JobId, JobPatch, JobStatus, MergeOutcome, Mode};
use lipid_core::store::{JobStore, StoreError};
use sqlx::PgPool;
use sqlx::types::Json;
use std::collections::BTreeMap;

use super::backend;

pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO jobs (id, status, stage, pct, image_id, mode, result_refs,
                              error, log_tail, created_at, updated_at, finished_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(job.id.as_str())
        .bind(job.status.as_str())
        .bind(&job.stage)
        .bind(i16::from(job.pct))
        .bind(&job.image_id)
        .bind(job.mode.as_str())
        .bind(Json(&job.result_refs))
        .bind(&job.error)
        .bind(&job.log_tail)
        .bind(job.created_at)
        .bind(job.updated_at)
        .bind(job.finished_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists(job.id.clone()));
        }

        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, status, stage, pct, image_id, mode, result_refs,
                   error, log_tail, created_at, updated_at, finished_at
            FROM jobs
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.map(Job::try_from).transpose()
    }

    async fn result_refs(
        &self,
        id: &JobId,
    ) -> Result<Option<BTreeMap<String, String>>, StoreError> {
        let refs: Option<Json<BTreeMap<String, String>>> =
            sqlx::query_scalar("SELECT result_refs FROM jobs WHERE id = $1")
                .bind(id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(backend)?;

        Ok(refs.map(|Json(refs)| refs))
    }

    async fn merge(
        &self,
        id: &JobId,
        patch: JobPatch,
    ) -> Result<Option<MergeOutcome>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row = sqlx::query_as::<_, JobRow>(
            r#"
            SELECT id, status, stage, pct, image_id, mode, result_refs,
                   error, log_tail, created_at, updated_at, finished_at
            FROM jobs
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(backend)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut job = Job::try_from(row)?;
        let outcome = job.apply(patch, chrono::Utc::now());

        if outcome.is_applied() {
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = $1, stage = $2, pct = $3, result_refs = $4, error = $5,
                    log_tail = $6, updated_at = $7, finished_at = $8
                WHERE id = $9
                "#,
            )
            .bind(job.status.as_str())
            .bind(&job.stage)
            .bind(i16::from(job.pct))
            .bind(Json(&job.result_refs))
            .bind(&job.error)
            .bind(&job.log_tail)
            .bind(job.updated_at)
            .bind(job.finished_at)
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;

        Ok(Some(outcome))
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    status: String,
    stage: String,
    pct: i16,
    image_id: String,
    mode: String,
    result_refs: Json<BTreeMap<String, String>>,
    error: Option<String>,
    log_tail: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let corrupt = |what: String| StoreError::Corrupt(format!("job {}: {}", row.id, what));

        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|e| corrupt(e.to_string()))?;
        let mode = row.mode.parse::<Mode>().map_err(|e| corrupt(e.to_string()))?;
        let pct = u8::try_from(row.pct).map_err(|_| corrupt(format!("pct {} out of range", row.pct)))?;

        Ok(Job {
            id: JobId::from(row.id),
            status,
            stage: row.stage,
            pct,
            image_id: row.image_id,
            mode,
            result_refs: row.result_refs.0,
            error: row.error,
            log_tail: row.log_tail,
            created_at: row.created_at,
            updated_at: row.updated_at,
            finished_at: row.finished_at,
        })
    }
}
