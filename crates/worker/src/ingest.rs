use anyhow::Context;
use robotadvisor_core::domain::stock::StockRow;
use robotadvisor_core::storage::{lock, stocks};

/// Upserts `rows` into the catalog under the ingest advisory lock and records the run.
/// Returns `None` if another ingest holds the lock.
pub async fn ingest_rows(
    pool: &sqlx::PgPool,
    source: &str,
    rows: &[StockRow],
) -> anyhow::Result<Option<u64>> {
    let acquired = lock::try_acquire_ingest_lock(pool).await?;
    if !acquired {
        tracing::warn!(source, "catalog ingest lock not acquired; another run in progress");
        return Ok(None);
    }

    let result = stocks::upsert_stocks_atomic(pool, rows).await;
    let recorded = match &result {
        Ok(affected) => {
            stocks::record_ingest_run(pool, source, "success", Some(*affected), None).await
        }
        Err(err) => {
            stocks::record_ingest_run(pool, source, "error", None, Some(&format!("{err:#}"))).await
        }
    };

    let _ = lock::release_ingest_lock(pool).await;

    let affected = result.context("catalog upsert failed")?;
    let run_id = recorded?;
    tracing::info!(source, %run_id, affected, "stock catalog ingested");
    Ok(Some(affected))
}
