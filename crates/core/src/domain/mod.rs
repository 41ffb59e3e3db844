pub mod filter;
pub mod portfolio;
pub mod recommendation;
pub mod stock;
