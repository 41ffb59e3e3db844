use crate::domain::stock::StockMetrics;
use serde::{Deserialize, Serialize};

/// Mean metrics of a portfolio's resolvable holdings. Market cap is averaged in log10 space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetProfile {
    pub holdings: usize,
    pub log_market_cap: f64,
    pub sma200: f64,
    pub ps: f64,
    pub gross_margin: f64,
    pub profit_margin: f64,
    pub operating_margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedStock {
    pub rank: usize,
    #[serde(flatten)]
    pub stock: StockMetrics,
    /// Scaled distance to the target profile. `None` when the portfolio had no profile.
    pub distance: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub profile: Option<TargetProfile>,
    pub results: Vec<RecommendedStock>,
}

impl RecommendationResult {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.results.iter().map(|r| r.stock.symbol.as_str()).collect()
    }

    /// Keeps the first `n` entries.
    pub fn top(mut self, n: usize) -> Self {
        self.results.truncate(n);
        self
    }
}
