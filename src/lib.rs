/// procwatch - host and process resource monitor
///
/// This library samples host and per-process CPU, memory and disk activity,
/// keeps a rolling snapshot log, and sends debounced email alerts when usage
/// stays above its thresholds.
pub mod activity_log;
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod delivery;
pub mod display;
pub mod formatting;
pub mod internal_metrics;
pub mod monitor;
pub mod notification;
pub mod sampling;
pub mod task_manager;
pub mod tree;

// Re-export core types for convenience
pub use core::*;
