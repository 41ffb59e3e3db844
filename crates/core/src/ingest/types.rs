use crate::domain::stock::{normalize_symbol, StockRow};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMetricsResponse {
    pub items: Vec<StockRow>,
}

/// Accepts either `{"items": [...]}` or a bare array of rows.
pub fn parse_rows(text: &str) -> anyhow::Result<Vec<StockRow>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Payload {
        Wrapped(StockMetricsResponse),
        Bare(Vec<StockRow>),
    }

    let payload = serde_json::from_str::<Payload>(text)
        .context("stock metrics payload does not match the expected schema")?;
    let rows = match payload {
        Payload::Wrapped(resp) => resp.items,
        Payload::Bare(rows) => rows,
    };
    validate_rows(&rows)?;
    Ok(rows)
}

pub fn validate_rows(rows: &[StockRow]) -> anyhow::Result<()> {
    anyhow::ensure!(!rows.is_empty(), "stock metrics payload has no rows");

    let mut seen = BTreeSet::new();
    for row in rows {
        row.validate()?;
        let symbol = normalize_symbol(&row.symbol);
        anyhow::ensure!(seen.insert(symbol.clone()), "duplicate symbol: {symbol}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(symbol: &str) -> serde_json::Value {
        json!({
            "symbol": symbol,
            "market_cap": 400_000_000_000_i64,
            "sma200": -0.02,
            "ps": 1.2,
            "gross_margin": 0.3,
            "profit_margin": 0.1,
            "operating_margin": 0.12,
        })
    }

    #[test]
    fn accepts_wrapped_and_bare_payloads() {
        let wrapped = json!({"items": [row("XOM")]}).to_string();
        assert_eq!(parse_rows(&wrapped).unwrap().len(), 1);

        let bare = json!([row("XOM"), row("CVX")]).to_string();
        assert_eq!(parse_rows(&bare).unwrap().len(), 2);
    }

    #[test]
    fn rejects_duplicate_symbols_after_normalization() {
        let text = json!([row("xom"), row(" XOM")]).to_string();
        let err = parse_rows(&text).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate symbol"));
    }

    #[test]
    fn rejects_empty_and_malformed_payloads() {
        assert!(parse_rows("[]").is_err());
        assert!(parse_rows(&json!([{"symbol": "XOM"}]).to_string()).is_err());
        assert!(parse_rows(&json!([{"symbol": "XOM", "market_cap": "big"}]).to_string()).is_err());
    }
}
