//! Trading module - swap execution with bounded retry

pub mod executor;

pub use executor::TradeExecutor;
