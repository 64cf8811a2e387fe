//! The monitoring loop.
//!
//! Every cycle takes one sample window, aggregates processes into their
//! trees, writes the snapshot block to the process log, feeds each alert
//! channel, and renders the console view. The loop runs until the shutdown
//! signal flips.

use crate::activity_log::ActivityLogger;
use crate::config::MonitorConfig;
use crate::core::{CounterSource, ProcessMetrics, SystemMetrics};
use crate::display::Display;
use crate::formatting::format_snapshot;
use crate::notification::{AlertChannel, EmailNotifier};
use crate::sampling::{DiskScale, SampleError, Sampler};
use crate::tree::aggregate;
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument};

/// Pause after a failed cycle before trying again.
pub const ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Per-channel alert thresholds, in percent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub cpu: f64,
    pub ram: f64,
    pub disk: f64,
}

impl Thresholds {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            cpu: config.cpu_threshold,
            ram: config.ram_threshold,
            disk: config.disk_threshold,
        }
    }

    /// A channel is exceeded only when usage is strictly above its threshold.
    pub fn exceeded(&self, channel: AlertChannel, system: &SystemMetrics) -> bool {
        match channel {
            AlertChannel::Cpu => system.cpu_percent > self.cpu,
            AlertChannel::Ram => system.ram_percent > self.ram,
            AlertChannel::Disk => system.disk_percent > self.disk,
        }
    }
}

/// What one cycle observed.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub system: SystemMetrics,
    /// Aggregated process trees.
    pub processes: Vec<ProcessMetrics>,
    pub exceeded: Vec<AlertChannel>,
    /// Number of alert or recovery emails queued this cycle.
    pub emails_queued: usize,
}

pub struct MonitorLoop<S: CounterSource> {
    sampler: Sampler<S>,
    scale: DiskScale,
    thresholds: Thresholds,
    log_floor: f64,
    interval: Duration,
    logger: Arc<ActivityLogger>,
    notifier: Option<Arc<EmailNotifier>>,
    display: Display,
    cycles: u64,
}

impl<S: CounterSource> MonitorLoop<S> {
    pub fn new(
        config: &MonitorConfig,
        source: S,
        logger: Arc<ActivityLogger>,
        notifier: Option<Arc<EmailNotifier>>,
        display: Display,
    ) -> Self {
        Self {
            sampler: Sampler::new(source, config.settle_delay()),
            scale: DiskScale::new(config.disk_full_scale_bytes_per_sec),
            thresholds: Thresholds::from_config(config),
            log_floor: config.log_threshold_percent,
            interval: config.interval(),
            logger,
            notifier,
            display,
            cycles: 0,
        }
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Runs one full cycle.
    ///
    /// Only a failed sample aborts the cycle; logging, alerting and display
    /// problems are reported by their own components.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, SampleError> {
        let window = self.sampler.sample().await?;
        let snapshot = window.derive(&self.scale);
        let processes = aggregate(&snapshot.processes);
        let system = snapshot.system;
        self.cycles += 1;

        metrics::counter!("monitor_cycles_total").increment(1);
        metrics::gauge!("system_cpu_percent").set(system.cpu_percent);
        metrics::gauge!("system_ram_percent").set(system.ram_percent);
        metrics::gauge!("system_disk_percent").set(system.disk_percent);

        let block = format_snapshot(Local::now(), &system, &processes, self.log_floor);
        self.logger.log_snapshot(block.clone());
        metrics::counter!("agg.snapshots_logged").increment(1);

        let mut exceeded = Vec::new();
        let mut emails_queued = 0;
        for channel in AlertChannel::ALL {
            let over = self.thresholds.exceeded(channel, &system);
            if over {
                exceeded.push(channel);
            }
            if let Some(notifier) = &self.notifier {
                if notifier.check_thresholds(channel, over, &block) {
                    emails_queued += 1;
                }
            }
        }

        if let Err(e) = self.display.render(&system, &processes) {
            debug!(error = %e, "Failed to render console output");
        }

        debug!(
            cycle = self.cycles,
            cpu = system.cpu_percent,
            ram = system.ram_percent,
            disk = system.disk_percent,
            processes = processes.len(),
            "Cycle complete"
        );

        Ok(CycleReport {
            cycle: self.cycles,
            system,
            processes,
            exceeded,
            emails_queued,
        })
    }

    /// Runs cycles until `shutdown_rx` flips to true or its sender is dropped.
    ///
    /// A failed cycle is logged and retried after [`ERROR_PAUSE`].
    #[instrument(skip_all)]
    pub async fn run(mut self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "Monitor loop started");

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let outcome = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                outcome = self.run_cycle() => outcome,
            };

            let pause = match outcome {
                Ok(_) => self.interval,
                Err(e) => {
                    metrics::counter!("monitor_cycle_errors_total").increment(1);
                    error!(error = %e, "Monitor cycle failed");
                    self.logger.debug(format!("Monitor cycle failed: {}", e));
                    ERROR_PAUSE
                }
            };

            tokio::select! {
                biased;
                _ = shutdown_rx.changed() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        info!(cycles = self.cycles, "Monitor loop stopped");
    }
}
