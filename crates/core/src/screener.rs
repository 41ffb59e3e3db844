use crate::domain::filter::{CompiledFilter, FilterSelection};
use crate::domain::stock::StockMetrics;
use crate::error::CoreResult;

/// Returns the universe members passing every selected bucket, in input order.
pub fn screen(universe: &[StockMetrics], selection: &FilterSelection) -> CoreResult<Vec<StockMetrics>> {
    let filter = selection.compile()?;
    Ok(apply(universe, &filter))
}

pub fn apply(universe: &[StockMetrics], filter: &CompiledFilter) -> Vec<StockMetrics> {
    if filter.is_unconstrained() {
        return universe.to_vec();
    }
    universe
        .iter()
        .filter(|s| filter.matches(s))
        .cloned()
        .collect()
}
