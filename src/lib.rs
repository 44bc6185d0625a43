//! Mint Sniper Library
//!
//! Autonomous trading agent: watches the transaction log stream for
//! newly minted tokens, filters them through staged safety checks, buys
//! through the routing API, and supervises each open position to exit.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod indexer;
pub mod journal;
pub mod position;
pub mod router;
pub mod stream;
pub mod trading;
pub mod wallet;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
