use crate::domain::portfolio::Portfolio;
use crate::domain::stock::StockMetrics;
use anyhow::Context;
use std::collections::BTreeSet;
use uuid::Uuid;

pub mod lock;
pub mod memory;
pub mod portfolios;
pub mod stocks;

pub use memory::MemoryStore;

pub async fn migrate(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("sqlx migrations failed")?;
    Ok(())
}

/// Read access to the stock catalog. Every call materializes fresh values.
#[async_trait::async_trait]
pub trait StockCatalog: Send + Sync {
    async fn fetch_universe(&self) -> anyhow::Result<Vec<StockMetrics>>;

    async fn fetch_stock(&self, symbol: &str) -> anyhow::Result<Option<StockMetrics>>;
}

/// Portfolio lifecycle and membership. Implementations own id assignment and must
/// serialize concurrent membership writes to the same portfolio.
#[async_trait::async_trait]
pub trait PortfolioStore: Send + Sync {
    async fn create_portfolio(&self, owner: &str, name: &str) -> anyhow::Result<Portfolio>;

    /// Removes the portfolio and its memberships. Returns false if it did not exist.
    async fn delete_portfolio(&self, id: Uuid) -> anyhow::Result<bool>;

    async fn fetch_portfolio(&self, id: Uuid) -> anyhow::Result<Option<Portfolio>>;

    async fn list_portfolios(&self, owner: &str) -> anyhow::Result<Vec<Portfolio>>;

    async fn fetch_portfolio_members(&self, id: Uuid) -> anyhow::Result<BTreeSet<String>>;

    /// Idempotent.
    async fn add_member(&self, id: Uuid, symbol: &str) -> anyhow::Result<()>;

    /// Idempotent.
    async fn remove_member(&self, id: Uuid, symbol: &str) -> anyhow::Result<()>;
}

/// Postgres-backed catalog and portfolio store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: sqlx::PgPool,
}

impl PgStore {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}
