//! # Internal Metrics Module
//!
//! procwatch reports its own health through the `metrics` facade. Call sites
//! use the `metrics::counter!` and `metrics::gauge!` macros directly; without
//! an installed recorder they are no-ops.
//!
//! When `metrics.log_metrics` is enabled, a [`LoggingRecorder`] is installed
//! as the global recorder and prints every value at a fixed interval.

pub mod logging_recorder;

pub use logging_recorder::LoggingRecorder;

use crate::config::MetricsConfig;
use anyhow::{Context, Result};
use metrics::Unit;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Registers descriptions for every metric procwatch emits.
pub fn describe_metrics() {
    metrics::describe_counter!("monitor_cycles_total", Unit::Count, "Total number of completed monitor cycles.");
    metrics::describe_counter!("monitor_cycle_errors_total", Unit::Count, "Total number of monitor cycles that failed to sample.");
    metrics::describe_gauge!("system_cpu_percent", Unit::Percent, "Host CPU usage measured in the last cycle.");
    metrics::describe_gauge!("system_ram_percent", Unit::Percent, "Host physical memory usage measured in the last cycle.");
    metrics::describe_gauge!("system_disk_percent", Unit::Percent, "Sum of process disk activity measured in the last cycle.");
    metrics::describe_counter!("alerts_triggered_total", Unit::Count, "Alerts raised, labeled by channel.");
    metrics::describe_counter!("recoveries_total", Unit::Count, "Episodes closed by a confirmed recovery, labeled by channel.");
    metrics::describe_counter!("emails_sent_total", Unit::Count, "Emails accepted by the transport.");
    metrics::describe_counter!("emails_failed_total", Unit::Count, "Emails the transport failed to deliver.");
    metrics::describe_counter!("queue_rejected_total", Unit::Count, "Messages rejected by a full or closed delivery queue, labeled by queue.");
    metrics::describe_counter!("log_write_failures_total", Unit::Count, "Log messages the log sink failed to write, labeled by kind.");
    metrics::describe_counter!("agg.snapshots_logged", Unit::Count, "Snapshot blocks written since the last metrics report.");
    metrics::describe_counter!("agg.emails_queued", Unit::Count, "Emails queued since the last metrics report.");
}

/// Installs the logging recorder if the configuration asks for it.
///
/// Returns the handle of the reporting task, or `None` when metrics logging
/// is disabled.
pub fn install(
    config: &MetricsConfig,
    shutdown_rx: watch::Receiver<bool>,
) -> Result<Option<JoinHandle<()>>> {
    if !config.log_metrics {
        return Ok(None);
    }

    let (recorder, handle) =
        LoggingRecorder::new(Duration::from_secs(config.log_interval_seconds), shutdown_rx);
    if let Err(e) = metrics::set_global_recorder(recorder) {
        handle.abort();
        return Err(anyhow::anyhow!(e.to_string())).context("failed to install logging recorder");
    }
    describe_metrics();
    Ok(Some(handle))
}
