use anyhow::Context;

// Advisory locks are scoped to the Postgres session. Guards against two catalog ingests
// interleaving their upserts.
const CATALOG_INGEST_LOCK_KEY: i64 = 0x524F_424F_5354; // "ROBOST"

pub async fn try_acquire_ingest_lock(pool: &sqlx::PgPool) -> anyhow::Result<bool> {
    let key = CATALOG_INGEST_LOCK_KEY;
    let acquired: (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
        .persistent(false)
        .bind(key)
        .fetch_one(pool)
        .await
        .with_context(|| format!("failed to acquire advisory lock (key={key})"))?;
    Ok(acquired.0)
}

pub async fn release_ingest_lock(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let key = CATALOG_INGEST_LOCK_KEY;
    sqlx::query("SELECT pg_advisory_unlock($1)")
        .persistent(false)
        .bind(key)
        .execute(pool)
        .await
        .with_context(|| format!("failed to release advisory lock (key={key})"))?;
    Ok(())
}
