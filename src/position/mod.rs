//! Position monitoring module

pub mod monitor;

pub use monitor::PositionMonitor;
