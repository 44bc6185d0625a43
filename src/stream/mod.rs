//! Stream module - live log-event ingestion
//!
//! One persistent WebSocket subscription delivers transaction logs; the
//! extractor pulls candidate mint addresses out of the log lines.

pub mod extract;
pub mod ingestor;

pub use extract::extract_candidate;
pub use ingestor::LogIngestor;
