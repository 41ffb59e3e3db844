use anyhow::Context;
use robotadvisor_core::config::Settings;
use robotadvisor_core::domain::stock::StockRow;
use robotadvisor_core::ingest::types::parse_rows;
use robotadvisor_core::service::AdvisorService;
use robotadvisor_core::storage::{MemoryStore, PgStore};
use std::path::Path;
use std::sync::Arc;

pub async fn read_rows_file(path: &Path) -> anyhow::Result<Vec<StockRow>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_rows(&text).with_context(|| format!("invalid stock metrics file {}", path.display()))
}

pub async fn connect(settings: &Settings) -> anyhow::Result<sqlx::PgPool> {
    let db_url = settings.require_database_url()?;
    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(db_url)
        .await
        .context("connect DATABASE_URL failed")?;
    robotadvisor_core::storage::migrate(&pool).await?;
    Ok(pool)
}

/// Offline service over a metrics file. Portfolios live only for the process.
pub async fn from_file(path: &Path) -> anyhow::Result<AdvisorService> {
    let rows = read_rows_file(path).await?;
    tracing::info!(path = %path.display(), rows = rows.len(), "loaded stock universe from file");
    let store = Arc::new(MemoryStore::with_rows(rows));
    Ok(AdvisorService::new(store.clone(), store))
}

pub async fn from_db(settings: &Settings) -> anyhow::Result<AdvisorService> {
    let store = Arc::new(PgStore::new(connect(settings).await?));
    Ok(AdvisorService::new(store.clone(), store))
}

/// Splits `"AAPL, xom"` into normalized symbols, dropping blanks.
pub fn parse_holdings(s: &str) -> Vec<String> {
    s.split(',')
        .map(robotadvisor_core::domain::stock::normalize_symbol)
        .filter(|s| !s.is_empty())
        .collect()
}
