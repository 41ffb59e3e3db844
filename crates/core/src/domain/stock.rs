use anyhow::ensure;
use serde::{Deserialize, Serialize};

/// Decimal places kept on every floating-point metric.
pub const METRIC_DECIMALS: i32 = 4;

/// One stock's fundamental metrics, as read from the catalog at query time.
///
/// Values are an immutable snapshot: every screen or recommendation re-reads the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMetrics {
    pub symbol: String,
    pub market_cap: i64,
    /// Signed position of the current price relative to its 200-day moving average.
    pub sma200: f64,
    pub ps: f64,
    pub gross_margin: f64,
    pub profit_margin: f64,
    pub operating_margin: f64,
}

/// A catalog row before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockRow {
    pub symbol: String,
    pub market_cap: i64,
    pub sma200: f64,
    pub ps: f64,
    pub gross_margin: f64,
    pub profit_margin: f64,
    pub operating_margin: f64,
}

impl StockRow {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(!self.symbol.trim().is_empty(), "symbol must be non-empty");
        ensure!(
            self.market_cap >= 0,
            "market_cap must be non-negative (symbol={}, got {})",
            self.symbol,
            self.market_cap
        );
        for (field, v) in [
            ("sma200", self.sma200),
            ("ps", self.ps),
            ("gross_margin", self.gross_margin),
            ("profit_margin", self.profit_margin),
            ("operating_margin", self.operating_margin),
        ] {
            ensure!(
                v.is_finite(),
                "{field} must be finite (symbol={}, got {v})",
                self.symbol
            );
        }
        Ok(())
    }
}

impl StockMetrics {
    /// Normalizes a raw row: trims and upper-cases the symbol, rounds the ratios.
    pub fn from_row(row: StockRow) -> Self {
        Self {
            symbol: normalize_symbol(&row.symbol),
            market_cap: row.market_cap,
            sma200: round_metric(row.sma200),
            ps: round_metric(row.ps),
            gross_margin: round_metric(row.gross_margin),
            profit_margin: round_metric(row.profit_margin),
            operating_margin: round_metric(row.operating_margin),
        }
    }
}

impl From<StockRow> for StockMetrics {
    fn from(row: StockRow) -> Self {
        Self::from_row(row)
    }
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

pub fn round_metric(v: f64) -> f64 {
    let factor = 10f64.powi(METRIC_DECIMALS);
    (v * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> StockRow {
        StockRow {
            symbol: " aapl ".to_string(),
            market_cap: 2_500_000_000_000,
            sma200: 0.123456,
            ps: 25.000049,
            gross_margin: 0.43219,
            profit_margin: 0.25,
            operating_margin: -0.00004,
        }
    }

    #[test]
    fn from_row_rounds_to_four_decimals() {
        let s = StockMetrics::from_row(row());
        assert_eq!(s.symbol, "AAPL");
        assert_eq!(s.market_cap, 2_500_000_000_000);
        assert_eq!(s.sma200, 0.1235);
        assert_eq!(s.ps, 25.0);
        assert_eq!(s.gross_margin, 0.4322);
        assert_eq!(s.profit_margin, 0.25);
        assert_eq!(s.operating_margin, 0.0);
    }

    #[test]
    fn validate_rejects_blank_symbol_and_non_finite_metrics() {
        let mut r = row();
        assert!(r.validate().is_ok());

        r.symbol = "  ".to_string();
        assert!(r.validate().is_err());

        let mut r = row();
        r.ps = f64::NAN;
        assert!(r.validate().is_err());

        let mut r = row();
        r.market_cap = -1;
        assert!(r.validate().is_err());
    }
}
