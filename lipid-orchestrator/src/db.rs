use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            status VARCHAR(20) NOT NULL,
            stage VARCHAR(64) NOT NULL,
            pct SMALLINT NOT NULL DEFAULT 0,
            image_id TEXT NOT NULL,
            mode VARCHAR(8) NOT NULL,
            result_refs JSONB NOT NULL DEFAULT '{}',
            error TEXT,
            log_tail TEXT,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            finished_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_jobs_image_id ON jobs(image_id)")
        .execute(pool)
        .await?;

    // Images are written by the ingest pipeline; the orchestrator only reads them
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS images (
            id TEXT PRIMARY KEY,
            dzi_base_uri TEXT NOT NULL,
            overlay_refs JSONB NOT NULL DEFAULT '[]',
            legend JSONB NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
