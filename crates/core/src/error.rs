use crate::domain::filter::FilterCategory;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid value {value:?} for filter {category}")]
    InvalidFilterValue {
        category: FilterCategory,
        value: String,
    },
    #[error("stock not found: {0}")]
    StockNotFound(String),
    #[error("portfolio not found: {0}")]
    PortfolioNotFound(Uuid),
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
