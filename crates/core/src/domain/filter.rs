//! Filter categories, their closed bucket vocabularies, and the predicates they compile to.
//!
//! Boundary convention: market cap bands are lower-inclusive and upper-exclusive
//! (`300_000_000` is Small, `2_000_000_000` is Mid, `10_000_000_000` is Large). Every other
//! threshold is strict, so a margin of exactly `0.0` is neither Positive nor Negative.

use crate::domain::stock::StockMetrics;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ANY: &str = "Any";

pub const MICRO_CAP_CEILING: f64 = 300_000_000.0;
pub const SMALL_CAP_CEILING: f64 = 2_000_000_000.0;
pub const MID_CAP_CEILING: f64 = 10_000_000_000.0;

pub const PS_LOW_CEILING: f64 = 1.0;
pub const PS_HIGH_FLOOR: f64 = 10.0;

pub const GROSS_MARGIN_HIGH_FLOOR: f64 = 0.5;
pub const PROFIT_MARGIN_HIGH_FLOOR: f64 = 0.2;
pub const OPERATING_MARGIN_HIGH_FLOOR: f64 = 0.25;
pub const OPERATING_MARGIN_VERY_NEGATIVE_CEILING: f64 = -0.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterCategory {
    MarketCap,
    Sma200,
    Ps,
    GrossMargin,
    ProfitMargin,
    OperatingMargin,
}

/// The comparison a bucket applies to its category's metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Bound {
    Any,
    /// `v < x`
    Below(f64),
    /// `v > x`
    Above(f64),
    /// `v >= x`
    AtLeast(f64),
    /// `min <= v < max`
    Between { min: f64, max: f64 },
}

impl Bound {
    pub fn test(self, v: f64) -> bool {
        match self {
            Bound::Any => true,
            Bound::Below(x) => v < x,
            Bound::Above(x) => v > x,
            Bound::AtLeast(x) => v >= x,
            Bound::Between { min, max } => v >= min && v < max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketDef {
    pub label: &'static str,
    pub bound: Bound,
}

const fn bucket(label: &'static str, bound: Bound) -> BucketDef {
    BucketDef { label, bound }
}

const MARKET_CAP_BUCKETS: &[BucketDef] = &[
    bucket(ANY, Bound::Any),
    bucket("Micro(<$300mln)", Bound::Below(MICRO_CAP_CEILING)),
    bucket(
        "Small($300mln~$2bln)",
        Bound::Between {
            min: MICRO_CAP_CEILING,
            max: SMALL_CAP_CEILING,
        },
    ),
    bucket(
        "Mid($2bln~$10bln)",
        Bound::Between {
            min: SMALL_CAP_CEILING,
            max: MID_CAP_CEILING,
        },
    ),
    bucket("Large(>$10bln)", Bound::AtLeast(MID_CAP_CEILING)),
];

const SMA200_BUCKETS: &[BucketDef] = &[
    bucket(ANY, Bound::Any),
    bucket("Price above SMA200", Bound::Above(0.0)),
    bucket("Price below SMA200", Bound::Below(0.0)),
];

const PS_BUCKETS: &[BucketDef] = &[
    bucket(ANY, Bound::Any),
    bucket("Low(<1)", Bound::Below(PS_LOW_CEILING)),
    bucket("High(>10)", Bound::Above(PS_HIGH_FLOOR)),
    bucket("Under 10", Bound::Below(PS_HIGH_FLOOR)),
];

const GROSS_MARGIN_BUCKETS: &[BucketDef] = &[
    bucket(ANY, Bound::Any),
    bucket("Positive(>0%)", Bound::Above(0.0)),
    bucket("Negative(<0%)", Bound::Below(0.0)),
    bucket("High(>50%)", Bound::Above(GROSS_MARGIN_HIGH_FLOOR)),
];

const PROFIT_MARGIN_BUCKETS: &[BucketDef] = &[
    bucket(ANY, Bound::Any),
    bucket("Positive(>0%)", Bound::Above(0.0)),
    bucket("Negative(<0%)", Bound::Below(0.0)),
    bucket("High(>20%)", Bound::Above(PROFIT_MARGIN_HIGH_FLOOR)),
];

const OPERATING_MARGIN_BUCKETS: &[BucketDef] = &[
    bucket(ANY, Bound::Any),
    bucket("Positive(>0%)", Bound::Above(0.0)),
    bucket("Negative(<0%)", Bound::Below(0.0)),
    bucket("High(>25%)", Bound::Above(OPERATING_MARGIN_HIGH_FLOOR)),
    bucket(
        "Very Negative(<-20%)",
        Bound::Below(OPERATING_MARGIN_VERY_NEGATIVE_CEILING),
    ),
];

impl FilterCategory {
    pub const ALL: [FilterCategory; 6] = [
        FilterCategory::MarketCap,
        FilterCategory::Sma200,
        FilterCategory::Ps,
        FilterCategory::GrossMargin,
        FilterCategory::ProfitMargin,
        FilterCategory::OperatingMargin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilterCategory::MarketCap => "market_cap",
            FilterCategory::Sma200 => "sma200",
            FilterCategory::Ps => "ps",
            FilterCategory::GrossMargin => "gross_margin",
            FilterCategory::ProfitMargin => "profit_margin",
            FilterCategory::OperatingMargin => "operating_margin",
        }
    }

    pub fn buckets(self) -> &'static [BucketDef] {
        match self {
            FilterCategory::MarketCap => MARKET_CAP_BUCKETS,
            FilterCategory::Sma200 => SMA200_BUCKETS,
            FilterCategory::Ps => PS_BUCKETS,
            FilterCategory::GrossMargin => GROSS_MARGIN_BUCKETS,
            FilterCategory::ProfitMargin => PROFIT_MARGIN_BUCKETS,
            FilterCategory::OperatingMargin => OPERATING_MARGIN_BUCKETS,
        }
    }

    pub fn metric(self, stock: &StockMetrics) -> f64 {
        match self {
            FilterCategory::MarketCap => stock.market_cap as f64,
            FilterCategory::Sma200 => stock.sma200,
            FilterCategory::Ps => stock.ps,
            FilterCategory::GrossMargin => stock.gross_margin,
            FilterCategory::ProfitMargin => stock.profit_margin,
            FilterCategory::OperatingMargin => stock.operating_margin,
        }
    }

    /// Resolves a bucket label. The short name before the parenthesis is accepted too
    /// (`"Large"` for `"Large(>$10bln)"`).
    pub fn bucket(self, label: &str) -> CoreResult<&'static BucketDef> {
        let wanted = label.trim();
        self.buckets()
            .iter()
            .find(|b| b.label == wanted || short_name(b.label) == wanted)
            .ok_or_else(|| CoreError::InvalidFilterValue {
                category: self,
                value: label.to_string(),
            })
    }
}

impl fmt::Display for FilterCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn short_name(label: &str) -> &str {
    label.split('(').next().unwrap_or(label).trim()
}

/// A compiled (category, bucket) test over one stock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Predicate {
    pub category: FilterCategory,
    pub label: &'static str,
    pub bound: Bound,
}

impl Predicate {
    pub fn matches(&self, stock: &StockMetrics) -> bool {
        self.bound.test(self.category.metric(stock))
    }

    pub fn is_any(&self) -> bool {
        self.bound == Bound::Any
    }
}

pub fn predicate(category: FilterCategory, label: &str) -> CoreResult<Predicate> {
    let def = category.bucket(label)?;
    Ok(Predicate {
        category,
        label: def.label,
        bound: def.bound,
    })
}

/// The six user-selected bucket labels. Missing fields default to `"Any"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSelection {
    pub market_cap: String,
    pub sma200: String,
    pub ps: String,
    pub gross_margin: String,
    pub profit_margin: String,
    pub operating_margin: String,
}

impl Default for FilterSelection {
    fn default() -> Self {
        Self {
            market_cap: ANY.to_string(),
            sma200: ANY.to_string(),
            ps: ANY.to_string(),
            gross_margin: ANY.to_string(),
            profit_margin: ANY.to_string(),
            operating_margin: ANY.to_string(),
        }
    }
}

impl FilterSelection {
    pub fn get(&self, category: FilterCategory) -> &str {
        match category {
            FilterCategory::MarketCap => &self.market_cap,
            FilterCategory::Sma200 => &self.sma200,
            FilterCategory::Ps => &self.ps,
            FilterCategory::GrossMargin => &self.gross_margin,
            FilterCategory::ProfitMargin => &self.profit_margin,
            FilterCategory::OperatingMargin => &self.operating_margin,
        }
    }

    pub fn with(mut self, category: FilterCategory, label: impl Into<String>) -> Self {
        let label = label.into();
        match category {
            FilterCategory::MarketCap => self.market_cap = label,
            FilterCategory::Sma200 => self.sma200 = label,
            FilterCategory::Ps => self.ps = label,
            FilterCategory::GrossMargin => self.gross_margin = label,
            FilterCategory::ProfitMargin => self.profit_margin = label,
            FilterCategory::OperatingMargin => self.operating_margin = label,
        }
        self
    }

    /// Fails on the first label outside its category's vocabulary.
    pub fn compile(&self) -> CoreResult<CompiledFilter> {
        let mut predicates = Vec::with_capacity(FilterCategory::ALL.len());
        for category in FilterCategory::ALL {
            predicates.push(predicate(category, self.get(category))?);
        }
        Ok(CompiledFilter { predicates })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFilter {
    predicates: Vec<Predicate>,
}

impl CompiledFilter {
    pub fn matches(&self, stock: &StockMetrics) -> bool {
        self.predicates.iter().all(|p| p.matches(stock))
    }

    pub fn is_unconstrained(&self) -> bool {
        self.predicates.iter().all(Predicate::is_any)
    }

    pub fn active(&self) -> impl Iterator<Item = &Predicate> {
        self.predicates.iter().filter(|p| !p.is_any())
    }
}
