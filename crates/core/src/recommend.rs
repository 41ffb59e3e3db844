//! Portfolio-relative ranking of the stock universe.
//!
//! Candidates are ordered by scaled Euclidean distance to the mean profile of the
//! portfolio's holdings. Each dimension is divided by its range over the universe so that
//! market cap (log10) and the margin ratios weigh comparably. Ties break on symbol.
//! A portfolio with no resolvable holdings gets the universe by market cap, largest first.

use crate::domain::recommendation::{RecommendationResult, RecommendedStock, TargetProfile};
use crate::domain::stock::StockMetrics;
use std::collections::BTreeSet;

const DIMENSIONS: usize = 6;

type Features = [f64; DIMENSIONS];

fn log_market_cap(market_cap: i64) -> f64 {
    (market_cap.max(1) as f64).log10()
}

fn features(s: &StockMetrics) -> Features {
    [
        log_market_cap(s.market_cap),
        s.sma200,
        s.ps,
        s.gross_margin,
        s.profit_margin,
        s.operating_margin,
    ]
}

impl TargetProfile {
    fn features(&self) -> Features {
        [
            self.log_market_cap,
            self.sma200,
            self.ps,
            self.gross_margin,
            self.profit_margin,
            self.operating_margin,
        ]
    }
}

/// Averages the holdings found in `universe`. Members missing from the universe are skipped.
pub fn target_profile(universe: &[StockMetrics], members: &BTreeSet<String>) -> Option<TargetProfile> {
    let held: Vec<Features> = universe
        .iter()
        .filter(|s| members.contains(&s.symbol))
        .map(features)
        .collect();
    if held.is_empty() {
        return None;
    }

    let n = held.len() as f64;
    let mut sum = [0.0; DIMENSIONS];
    for f in &held {
        for (acc, v) in sum.iter_mut().zip(f) {
            *acc += v;
        }
    }
    let mean = sum.map(|v| v / n);

    Some(TargetProfile {
        holdings: held.len(),
        log_market_cap: mean[0],
        sma200: mean[1],
        ps: mean[2],
        gross_margin: mean[3],
        profit_margin: mean[4],
        operating_margin: mean[5],
    })
}

fn scales(universe: &[StockMetrics]) -> Features {
    let mut min = [f64::INFINITY; DIMENSIONS];
    let mut max = [f64::NEG_INFINITY; DIMENSIONS];
    for f in universe.iter().map(features) {
        for i in 0..DIMENSIONS {
            min[i] = min[i].min(f[i]);
            max[i] = max[i].max(f[i]);
        }
    }

    let mut out = [1.0; DIMENSIONS];
    for i in 0..DIMENSIONS {
        let range = max[i] - min[i];
        if range.is_finite() && range > 0.0 {
            out[i] = range;
        }
    }
    out
}

fn distance(a: &Features, b: &Features, scale: &Features) -> f64 {
    a.iter()
        .zip(b)
        .zip(scale)
        .map(|((x, y), s)| ((x - y) / s).powi(2))
        .sum::<f64>()
        .sqrt()
}

/// Ranks every universe stock not already held. Pure over its inputs.
pub fn recommend(universe: &[StockMetrics], members: &BTreeSet<String>) -> RecommendationResult {
    let profile = target_profile(universe, members);
    let candidates = universe.iter().filter(|s| !members.contains(&s.symbol));

    let mut scored: Vec<(Option<f64>, &StockMetrics)> = match &profile {
        Some(p) => {
            let target = p.features();
            let scale = scales(universe);
            candidates
                .map(|s| (Some(distance(&features(s), &target, &scale)), s))
                .collect()
        }
        None => candidates.map(|s| (None, s)).collect(),
    };

    scored.sort_by(|a, b| {
        let primary = match (a.0, b.0) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            _ => b.1.market_cap.cmp(&a.1.market_cap),
        };
        primary.then_with(|| a.1.symbol.cmp(&b.1.symbol))
    });

    let results = scored
        .into_iter()
        .enumerate()
        .map(|(i, (distance, stock))| RecommendedStock {
            rank: i + 1,
            stock: stock.clone(),
            distance,
        })
        .collect();

    RecommendationResult { profile, results }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(symbol: &str, market_cap: i64, ps: f64, gross_margin: f64) -> StockMetrics {
        StockMetrics {
            symbol: symbol.to_string(),
            market_cap,
            sma200: 0.0,
            ps,
            gross_margin,
            profit_margin: 0.1,
            operating_margin: 0.1,
        }
    }

    fn universe() -> Vec<StockMetrics> {
        vec![
            stock("AAPL", 2_500_000_000_000, 25.0, 0.4),
            stock("MSFT", 2_800_000_000_000, 12.0, 0.7),
            stock("XOM", 400_000_000_000, 1.2, 0.3),
            stock("CVX", 300_000_000_000, 1.4, 0.35),
            stock("TINY", 120_000_000, 0.5, -0.1),
        ]
    }

    fn members(symbols: &[&str]) -> BTreeSet<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn excludes_held_stocks() {
        let held = members(&["AAPL", "XOM"]);
        let out = recommend(&universe(), &held);
        assert_eq!(out.results.len(), 3);
        assert!(out.results.iter().all(|r| !held.contains(&r.stock.symbol)));
    }

    #[test]
    fn ranks_nearest_profile_first() {
        let out = recommend(&universe(), &members(&["XOM"]));
        assert_eq!(out.symbols()[0], "CVX");
        assert_eq!(out.profile.as_ref().map(|p| p.holdings), Some(1));

        let distances: Vec<f64> = out.results.iter().filter_map(|r| r.distance).collect();
        assert_eq!(distances.len(), out.results.len());
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));

        let ranks: Vec<usize> = out.results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn is_deterministic() {
        let u = universe();
        let held = members(&["MSFT"]);
        assert_eq!(recommend(&u, &held), recommend(&u, &held));
    }

    #[test]
    fn ties_break_on_symbol_ascending() {
        let u = vec![
            stock("HELD", 1_000_000_000, 2.0, 0.3),
            stock("ZETA", 1_000_000_000, 3.0, 0.3),
            stock("ALFA", 1_000_000_000, 3.0, 0.3),
            stock("MIKE", 1_000_000_000, 3.0, 0.3),
        ];
        let out = recommend(&u, &members(&["HELD"]));
        assert_eq!(out.symbols(), vec!["ALFA", "MIKE", "ZETA"]);
    }

    #[test]
    fn empty_portfolio_gets_universe_by_market_cap() {
        let out = recommend(&universe(), &BTreeSet::new());
        assert!(out.profile.is_none());
        assert_eq!(out.symbols(), vec!["MSFT", "AAPL", "XOM", "CVX", "TINY"]);
        assert!(out.results.iter().all(|r| r.distance.is_none()));
    }

    #[test]
    fn stale_members_fall_back_to_default_order() {
        let out = recommend(&universe(), &members(&["DELISTED"]));
        assert!(out.profile.is_none());
        assert_eq!(out.results.len(), 5);
        assert_eq!(out.symbols()[0], "MSFT");
    }

    #[test]
    fn profile_averages_market_cap_in_log_space() {
        let u = vec![
            stock("A", 1_000_000_000, 1.0, 0.2),
            stock("B", 100_000_000_000, 3.0, 0.4),
        ];
        let p = target_profile(&u, &members(&["A", "B"])).unwrap();
        assert!((p.log_market_cap - 10.0).abs() < 1e-9);
        assert!((p.ps - 2.0).abs() < 1e-9);
        assert!((p.gross_margin - 0.3).abs() < 1e-9);
    }

    #[test]
    fn top_truncates_without_reordering() {
        let out = recommend(&universe(), &members(&["XOM"])).top(2);
        assert_eq!(out.results.len(), 2);
        assert_eq!(out.results[0].rank, 1);
        assert_eq!(out.symbols()[0], "CVX");
    }
}
