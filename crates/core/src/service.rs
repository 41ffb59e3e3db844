use crate::domain::filter::FilterSelection;
use crate::domain::portfolio::Portfolio;
use crate::domain::recommendation::RecommendationResult;
use crate::domain::stock::{normalize_symbol, StockMetrics};
use crate::error::{CoreError, CoreResult};
use crate::storage::{PortfolioStore, StockCatalog};
use crate::{recommend, screener};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize)]
pub struct StockDetails {
    #[serde(flatten)]
    pub stock: StockMetrics,
    pub in_portfolio: bool,
}

/// Wires the pure screening and recommendation core to its storage collaborators.
#[derive(Clone)]
pub struct AdvisorService {
    catalog: Arc<dyn StockCatalog>,
    portfolios: Arc<dyn PortfolioStore>,
}

impl AdvisorService {
    pub fn new(catalog: Arc<dyn StockCatalog>, portfolios: Arc<dyn PortfolioStore>) -> Self {
        Self {
            catalog,
            portfolios,
        }
    }

    pub async fn screen(&self, selection: &FilterSelection) -> CoreResult<Vec<StockMetrics>> {
        // Validate before touching storage.
        let filter = selection.compile()?;
        let universe = self.catalog.fetch_universe().await?;
        let matches = screener::apply(&universe, &filter);
        tracing::info!(
            universe_len = universe.len(),
            matches_len = matches.len(),
            active_filters = filter.active().count(),
            "screened stock universe"
        );
        Ok(matches)
    }

    pub async fn stock(&self, symbol: &str) -> CoreResult<StockMetrics> {
        let symbol = normalize_symbol(symbol);
        self.catalog
            .fetch_stock(&symbol)
            .await?
            .ok_or(CoreError::StockNotFound(symbol))
    }

    pub async fn stock_details(&self, portfolio_id: Uuid, symbol: &str) -> CoreResult<StockDetails> {
        let stock = self.stock(symbol).await?;
        let members = self.portfolios.fetch_portfolio_members(portfolio_id).await?;
        Ok(StockDetails {
            in_portfolio: members.contains(&stock.symbol),
            stock,
        })
    }

    pub async fn portfolio(&self, id: Uuid) -> CoreResult<Portfolio> {
        self.portfolios
            .fetch_portfolio(id)
            .await?
            .ok_or(CoreError::PortfolioNotFound(id))
    }

    pub async fn list_portfolios(&self, owner: &str) -> CoreResult<Vec<Portfolio>> {
        Ok(self.portfolios.list_portfolios(owner).await?)
    }

    pub async fn add_portfolio(&self, owner: &str, name: &str) -> CoreResult<Portfolio> {
        let portfolio = self.portfolios.create_portfolio(owner, name).await?;
        tracing::info!(portfolio_id = %portfolio.id, owner, name, "created portfolio");
        Ok(portfolio)
    }

    pub async fn delete_portfolio(&self, id: Uuid) -> CoreResult<()> {
        if !self.portfolios.delete_portfolio(id).await? {
            return Err(CoreError::PortfolioNotFound(id));
        }
        tracing::info!(portfolio_id = %id, "deleted portfolio");
        Ok(())
    }

    /// Returns false when the symbol is not in the catalog. Re-adding a member returns true.
    pub async fn add_stock_to_portfolio(&self, id: Uuid, symbol: &str) -> CoreResult<bool> {
        let portfolio = self.portfolio(id).await?;
        let symbol = normalize_symbol(symbol);
        let Some(stock) = self.catalog.fetch_stock(&symbol).await? else {
            tracing::info!(portfolio_id = %id, %symbol, "stock not in catalog; not added");
            return Ok(false);
        };

        if portfolio.holds(&stock.symbol) {
            return Ok(true);
        }
        self.portfolios.add_member(id, &stock.symbol).await?;
        tracing::info!(portfolio_id = %id, symbol = %stock.symbol, "added stock to portfolio");
        Ok(true)
    }

    /// Removing a symbol the portfolio does not hold is a no-op.
    pub async fn remove_stock_from_portfolio(&self, id: Uuid, symbol: &str) -> CoreResult<()> {
        let portfolio = self.portfolio(id).await?;
        let symbol = normalize_symbol(symbol);
        if !portfolio.holds(&symbol) {
            return Ok(());
        }
        self.portfolios.remove_member(id, &symbol).await?;
        tracing::info!(portfolio_id = %id, %symbol, "removed stock from portfolio");
        Ok(())
    }

    pub async fn recommend(&self, id: Uuid) -> CoreResult<RecommendationResult> {
        let portfolio = self.portfolio(id).await?;
        self.recommend_for(&portfolio).await
    }

    pub async fn recommend_for(&self, portfolio: &Portfolio) -> CoreResult<RecommendationResult> {
        let universe = self.catalog.fetch_universe().await?;
        let result = recommend::recommend(&universe, &portfolio.members);
        tracing::debug!(
            portfolio_id = %portfolio.id,
            holdings = portfolio.members.len(),
            candidates = result.results.len(),
            "ranked recommendations"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::filter::FilterCategory;
    use crate::domain::stock::StockRow;
    use crate::storage::MemoryStore;

    fn row(symbol: &str, market_cap: i64, ps: f64, gross_margin: f64) -> StockRow {
        StockRow {
            symbol: symbol.to_string(),
            market_cap,
            sma200: 0.01,
            ps,
            gross_margin,
            profit_margin: 0.1,
            operating_margin: 0.1,
        }
    }

    fn service() -> AdvisorService {
        let store = Arc::new(MemoryStore::with_rows(vec![
            row("AAPL", 2_500_000_000_000, 25.0, 0.4),
            row("XOM", 400_000_000_000, 1.2, 0.3),
            row("CVX", 300_000_000_000, 1.4, 0.35),
        ]));
        AdvisorService::new(store.clone(), store)
    }

    #[tokio::test]
    async fn screen_reads_the_catalog_and_filters() {
        let svc = service();
        let sel = FilterSelection::default()
            .with(FilterCategory::MarketCap, "Large(>$10bln)")
            .with(FilterCategory::Ps, "High(>10)");
        let out = svc.screen(&sel).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbol, "AAPL");
    }

    #[tokio::test]
    async fn screen_surfaces_invalid_filter_values() {
        let svc = service();
        let sel = FilterSelection::default().with(FilterCategory::MarketCap, "Giant");
        assert!(matches!(
            svc.screen(&sel).await,
            Err(CoreError::InvalidFilterValue { .. })
        ));
    }

    #[tokio::test]
    async fn add_unknown_symbol_returns_false_and_keeps_members() {
        let svc = service();
        let p = svc.add_portfolio("owner-1", "Energy").await.unwrap();
        assert!(svc.add_stock_to_portfolio(p.id, "xom").await.unwrap());

        assert!(!svc.add_stock_to_portfolio(p.id, "NOPE").await.unwrap());
        let members = svc.portfolio(p.id).await.unwrap().members;
        assert_eq!(members.into_iter().collect::<Vec<_>>(), vec!["XOM"]);
    }

    #[tokio::test]
    async fn re_adding_a_member_returns_true_once_stored() {
        let svc = service();
        let p = svc.add_portfolio("owner-1", "Energy").await.unwrap();
        assert!(svc.add_stock_to_portfolio(p.id, "XOM").await.unwrap());
        assert!(svc.add_stock_to_portfolio(p.id, "XOM").await.unwrap());
        assert_eq!(svc.portfolio(p.id).await.unwrap().members.len(), 1);
    }

    #[tokio::test]
    async fn removing_a_non_member_is_a_no_op() {
        let svc = service();
        let p = svc.add_portfolio("owner-1", "Energy").await.unwrap();
        svc.add_stock_to_portfolio(p.id, "XOM").await.unwrap();

        svc.remove_stock_from_portfolio(p.id, "AAPL").await.unwrap();
        assert_eq!(svc.portfolio(p.id).await.unwrap().members.len(), 1);

        svc.remove_stock_from_portfolio(p.id, "xom").await.unwrap();
        assert!(svc.portfolio(p.id).await.unwrap().members.is_empty());
    }

    #[tokio::test]
    async fn recommend_excludes_holdings_and_is_repeatable() {
        let svc = service();
        let p = svc.add_portfolio("owner-1", "Energy").await.unwrap();
        svc.add_stock_to_portfolio(p.id, "XOM").await.unwrap();

        let first = svc.recommend(p.id).await.unwrap();
        let second = svc.recommend(p.id).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.symbols(), vec!["CVX", "AAPL"]);
    }

    #[tokio::test]
    async fn empty_portfolio_recommends_by_market_cap() {
        let svc = service();
        let p = svc.add_portfolio("owner-1", "Empty").await.unwrap();
        let out = svc.recommend(p.id).await.unwrap();
        assert_eq!(out.symbols(), vec!["AAPL", "XOM", "CVX"]);
    }

    #[tokio::test]
    async fn deleting_a_portfolio_drops_it_and_its_members() {
        let svc = service();
        let p = svc.add_portfolio("owner-1", "Energy").await.unwrap();
        svc.add_stock_to_portfolio(p.id, "XOM").await.unwrap();

        svc.delete_portfolio(p.id).await.unwrap();
        assert!(matches!(
            svc.portfolio(p.id).await,
            Err(CoreError::PortfolioNotFound(id)) if id == p.id
        ));
        assert!(matches!(
            svc.delete_portfolio(p.id).await,
            Err(CoreError::PortfolioNotFound(_))
        ));
        assert!(svc.list_portfolios("owner-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_portfolio_is_not_found() {
        let svc = service();
        let id = Uuid::new_v4();
        assert!(matches!(
            svc.recommend(id).await,
            Err(CoreError::PortfolioNotFound(_))
        ));
        assert!(matches!(
            svc.add_stock_to_portfolio(id, "XOM").await,
            Err(CoreError::PortfolioNotFound(_))
        ));
    }

    #[tokio::test]
    async fn stock_details_reports_membership() {
        let svc = service();
        let p = svc.add_portfolio("owner-1", "Energy").await.unwrap();
        svc.add_stock_to_portfolio(p.id, "XOM").await.unwrap();

        assert!(svc.stock_details(p.id, "XOM").await.unwrap().in_portfolio);
        assert!(!svc.stock_details(p.id, "cvx").await.unwrap().in_portfolio);
        assert!(matches!(
            svc.stock_details(p.id, "ZZZZ").await,
            Err(CoreError::StockNotFound(s)) if s == "ZZZZ"
        ));
    }

    #[tokio::test]
    async fn lists_portfolios_per_owner() {
        let svc = service();
        svc.add_portfolio("owner-1", "A").await.unwrap();
        svc.add_portfolio("owner-1", "B").await.unwrap();
        svc.add_portfolio("owner-2", "C").await.unwrap();

        assert_eq!(svc.list_portfolios("owner-1").await.unwrap().len(), 2);
        assert_eq!(svc.list_portfolios("owner-3").await.unwrap().len(), 0);
    }
}
