use crate::domain::stock::{StockMetrics, StockRow};
use crate::storage::{PgStore, StockCatalog};
use anyhow::Context;
use chrono::{DateTime, Utc};
use uuid::Uuid;

type StockTuple = (String, i64, f64, f64, f64, f64, f64);

fn from_tuple(t: StockTuple) -> StockMetrics {
    let (symbol, market_cap, sma200, ps, gross_margin, profit_margin, operating_margin) = t;
    StockMetrics::from_row(StockRow {
        symbol,
        market_cap,
        sma200,
        ps,
        gross_margin,
        profit_margin,
        operating_margin,
    })
}

#[async_trait::async_trait]
impl StockCatalog for PgStore {
    async fn fetch_universe(&self) -> anyhow::Result<Vec<StockMetrics>> {
        let rows = sqlx::query_as::<_, StockTuple>(
            "SELECT symbol, market_cap, sma200, ps, gross_margin, profit_margin, operating_margin \
             FROM stocks \
             ORDER BY symbol ASC",
        )
        .persistent(false)
        .fetch_all(self.pool())
        .await
        .context("select stocks failed")?;

        Ok(rows.into_iter().map(from_tuple).collect())
    }

    async fn fetch_stock(&self, symbol: &str) -> anyhow::Result<Option<StockMetrics>> {
        let row = sqlx::query_as::<_, StockTuple>(
            "SELECT symbol, market_cap, sma200, ps, gross_margin, profit_margin, operating_margin \
             FROM stocks \
             WHERE symbol = $1",
        )
        .persistent(false)
        .bind(symbol)
        .fetch_optional(self.pool())
        .await
        .with_context(|| format!("select stock failed (symbol={symbol})"))?;

        Ok(row.map(from_tuple))
    }
}

pub async fn upsert_stocks_atomic(pool: &sqlx::PgPool, rows: &[StockRow]) -> anyhow::Result<u64> {
    anyhow::ensure!(!rows.is_empty(), "rows must be non-empty");

    let chunk_size: usize = std::env::var("STOCKS_UPSERT_BATCH")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or(200);
    anyhow::ensure!(chunk_size >= 1, "STOCKS_UPSERT_BATCH must be >= 1");

    let normalized: Vec<StockMetrics> = rows.iter().cloned().map(StockMetrics::from_row).collect();

    let mut tx = pool.begin().await.context("begin transaction failed")?;

    let mut affected: u64 = 0;
    for (batch_idx, chunk) in normalized.chunks(chunk_size).enumerate() {
        let t0 = std::time::Instant::now();
        let mut qb = sqlx::QueryBuilder::new(
            "INSERT INTO stocks (symbol, market_cap, sma200, ps, gross_margin, profit_margin, operating_margin) ",
        );
        qb.push_values(chunk, |mut b, s| {
            b.push_bind(s.symbol.clone())
                .push_bind(s.market_cap)
                .push_bind(s.sma200)
                .push_bind(s.ps)
                .push_bind(s.gross_margin)
                .push_bind(s.profit_margin)
                .push_bind(s.operating_margin);
        });
        qb.push(
            " ON CONFLICT (symbol) DO UPDATE \
               SET market_cap = EXCLUDED.market_cap, sma200 = EXCLUDED.sma200, ps = EXCLUDED.ps, \
                   gross_margin = EXCLUDED.gross_margin, profit_margin = EXCLUDED.profit_margin, \
                   operating_margin = EXCLUDED.operating_margin, updated_at = now()",
        );

        let res = qb
            .build()
            .persistent(false)
            .execute(&mut *tx)
            .await
            .context("batch upsert stocks failed")?;
        affected += res.rows_affected();

        tracing::debug!(
            batch_idx,
            batch_size = chunk.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "stocks batch upsert"
        );
    }

    tx.commit().await.context("commit transaction failed")?;
    Ok(affected)
}

pub async fn record_ingest_run(
    pool: &sqlx::PgPool,
    source: &str,
    status: &str,
    rows_affected: Option<u64>,
    error: Option<&str>,
) -> anyhow::Result<Uuid> {
    let id = Uuid::new_v4();
    let generated_at: DateTime<Utc> = Utc::now();

    sqlx::query(
        "INSERT INTO stock_ingest_runs (id, generated_at, source, status, rows_affected, error) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .persistent(false)
    .bind(id)
    .bind(generated_at)
    .bind(source)
    .bind(status)
    .bind(rows_affected.map(|n| n as i64))
    .bind(error)
    .execute(pool)
    .await
    .context("insert stock_ingest_runs failed")?;

    Ok(id)
}
