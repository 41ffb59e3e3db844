use crate::domain::portfolio::Portfolio;
use crate::domain::stock::{StockMetrics, StockRow};
use crate::storage::{PortfolioStore, StockCatalog};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-process catalog and portfolio store. Used for offline runs and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    stocks: RwLock<BTreeMap<String, StockMetrics>>,
    portfolios: RwLock<BTreeMap<Uuid, Portfolio>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<StockRow>) -> Self {
        let stocks = rows
            .into_iter()
            .map(StockMetrics::from_row)
            .map(|s| (s.symbol.clone(), s))
            .collect();
        Self {
            stocks: RwLock::new(stocks),
            portfolios: RwLock::default(),
        }
    }

    pub async fn upsert_stocks(&self, rows: Vec<StockRow>) -> usize {
        let mut stocks = self.stocks.write().await;
        let n = rows.len();
        for s in rows.into_iter().map(StockMetrics::from_row) {
            stocks.insert(s.symbol.clone(), s);
        }
        n
    }
}

#[async_trait::async_trait]
impl StockCatalog for MemoryStore {
    async fn fetch_universe(&self) -> anyhow::Result<Vec<StockMetrics>> {
        Ok(self.stocks.read().await.values().cloned().collect())
    }

    async fn fetch_stock(&self, symbol: &str) -> anyhow::Result<Option<StockMetrics>> {
        Ok(self.stocks.read().await.get(symbol).cloned())
    }
}

#[async_trait::async_trait]
impl PortfolioStore for MemoryStore {
    async fn create_portfolio(&self, owner: &str, name: &str) -> anyhow::Result<Portfolio> {
        let portfolio = Portfolio::new(Uuid::new_v4(), owner.trim(), name.trim());
        anyhow::ensure!(!portfolio.owner.is_empty(), "owner must be non-empty");
        anyhow::ensure!(!portfolio.name.is_empty(), "name must be non-empty");

        self.portfolios
            .write()
            .await
            .insert(portfolio.id, portfolio.clone());
        Ok(portfolio)
    }

    async fn delete_portfolio(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.portfolios.write().await.remove(&id).is_some())
    }

    async fn fetch_portfolio(&self, id: Uuid) -> anyhow::Result<Option<Portfolio>> {
        Ok(self.portfolios.read().await.get(&id).cloned())
    }

    async fn list_portfolios(&self, owner: &str) -> anyhow::Result<Vec<Portfolio>> {
        let mut out: Vec<Portfolio> = self
            .portfolios
            .read()
            .await
            .values()
            .filter(|p| p.owner == owner)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn fetch_portfolio_members(&self, id: Uuid) -> anyhow::Result<BTreeSet<String>> {
        Ok(self
            .portfolios
            .read()
            .await
            .get(&id)
            .map(|p| p.members.clone())
            .unwrap_or_default())
    }

    async fn add_member(&self, id: Uuid, symbol: &str) -> anyhow::Result<()> {
        let stock = self.stocks.read().await.get(symbol).cloned();
        let mut portfolios = self.portfolios.write().await;
        let portfolio = portfolios
            .get_mut(&id)
            .ok_or_else(|| anyhow::anyhow!("portfolio {id} does not exist"))?;
        anyhow::ensure!(
            portfolio.add_stock(stock.as_ref()),
            "stock {symbol} does not exist"
        );
        Ok(())
    }

    async fn remove_member(&self, id: Uuid, symbol: &str) -> anyhow::Result<()> {
        if let Some(p) = self.portfolios.write().await.get_mut(&id) {
            p.delete_stock(symbol);
        }
        Ok(())
    }
}
