//! Delta-based resource accounting.
//!
//! The `Sampler` takes two raw counter readings a short settle delay apart and
//! turns the differences into percentage rates. System CPU comes from the
//! idle/kernel/user counters, process CPU from each process's consumed CPU
//! time relative to the wall-clock window, and disk activity from the bytes a
//! process moved during the window.

pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use crate::core::{
    CounterSource, CpuTimes, MemoryStatus, ProcessMetrics, RawProcess, Sample, Snapshot,
    SystemMetrics,
};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::debug;

pub use source::SystemCounterSource;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SampleError {
    #[error("OS counter query failed: {0}")]
    Query(String),

    #[error("counter not available on this platform: {0}")]
    Unsupported(&'static str),
}

/// Maps a byte count moved during a window onto a disk activity percentage.
///
/// `full_scale_bytes_per_sec` is the transfer rate reported as 100%.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiskScale {
    pub full_scale_bytes_per_sec: u64,
}

impl DiskScale {
    pub fn new(full_scale_bytes_per_sec: u64) -> Self {
        Self {
            full_scale_bytes_per_sec,
        }
    }

    pub fn percent(&self, bytes: u64, window: Duration) -> f64 {
        let denominator = self.full_scale_bytes_per_sec as f64 * window.as_secs_f64();
        if denominator <= 0.0 {
            return 0.0;
        }
        100.0 * bytes as f64 / denominator
    }
}

/// Two consecutive raw readings.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    pub before: Sample,
    pub after: Sample,
}

impl SampleWindow {
    /// Wall-clock time between the two readings.
    pub fn duration(&self) -> Duration {
        self.after.taken_at.saturating_duration_since(self.before.taken_at)
    }

    /// Derives per-process and system metrics from the two readings.
    ///
    /// System disk usage is the sum of all process disk percentages.
    pub fn derive(&self, scale: &DiskScale) -> Snapshot {
        let window = self.duration();
        let processes = process_metrics(&self.before, &self.after, window, scale);

        let cpu_percent = match (self.before.cpu, self.after.cpu) {
            (Some(before), Some(after)) => system_cpu_percent(&before, &after),
            _ => 0.0,
        };
        let ram_percent = self.after.memory.map(|m| ram_percent(&m)).unwrap_or(0.0);
        let disk_percent = processes.iter().map(|p| p.disk_percent).sum();

        Snapshot {
            system: SystemMetrics {
                cpu_percent,
                ram_percent,
                disk_percent,
            },
            processes,
        }
    }
}

/// Reads raw counters twice and hands back the pair.
pub struct Sampler<S: CounterSource> {
    source: S,
    settle_delay: Duration,
}

impl<S: CounterSource> Sampler<S> {
    pub fn new(source: S, settle_delay: Duration) -> Self {
        Self {
            source,
            settle_delay,
        }
    }

    /// Takes a single reading.
    ///
    /// System time and memory failures are tolerated and recorded as absent
    /// values; a failed process enumeration fails the reading.
    pub fn read(&mut self) -> Result<Sample, SampleError> {
        let cpu = match self.source.system_times() {
            Ok(times) => Some(times),
            Err(e) => {
                debug!(error = %e, "Failed to read system CPU times");
                None
            }
        };
        let memory = match self.source.memory_status() {
            Ok(status) => Some(status),
            Err(e) => {
                debug!(error = %e, "Failed to read memory status");
                None
            }
        };
        let processes = self.source.processes()?;

        Ok(Sample {
            taken_at: Instant::now(),
            cpu,
            memory,
            processes,
        })
    }

    /// Reads, waits for the settle delay, and reads again.
    ///
    /// Calling this more often than the monitor interval makes the deltas
    /// noise-dominated.
    pub async fn sample(&mut self) -> Result<SampleWindow, SampleError> {
        let before = self.read()?;
        tokio::time::sleep(self.settle_delay).await;
        let after = self.read()?;
        Ok(SampleWindow { before, after })
    }
}

/// `100 * (total - idle) / total` over the deltas, where `total = kernel + user`.
///
/// Returns exactly `0.0` when no CPU time elapsed.
pub fn system_cpu_percent(before: &CpuTimes, after: &CpuTimes) -> f64 {
    let idle = after.idle.saturating_sub(before.idle);
    let kernel = after.kernel.saturating_sub(before.kernel);
    let user = after.user.saturating_sub(before.user);
    let total = kernel + user;
    if total == 0 {
        return 0.0;
    }
    100.0 * (total as f64 - idle as f64) / total as f64
}

pub fn ram_percent(memory: &MemoryStatus) -> f64 {
    if memory.total_bytes == 0 {
        return 0.0;
    }
    let used = memory.total_bytes.saturating_sub(memory.available_bytes);
    100.0 * used as f64 / memory.total_bytes as f64
}

/// Derives metrics for every process present in both readings.
fn process_metrics(
    before: &Sample,
    after: &Sample,
    window: Duration,
    scale: &DiskScale,
) -> Vec<ProcessMetrics> {
    let previous: HashMap<u32, &RawProcess> =
        before.processes.iter().map(|p| (p.pid, p)).collect();
    let window_ms = window.as_secs_f64() * 1000.0;
    let total_memory = after.memory.map(|m| m.total_bytes).unwrap_or(0);

    after
        .processes
        .iter()
        .filter_map(|current| {
            let last = previous.get(&current.pid)?;
            // Counters running backwards mean the pid was reused; report no activity.
            let cpu_delta = current.cpu_time_ms.saturating_sub(last.cpu_time_ms);
            let io_delta = current.io_bytes.saturating_sub(last.io_bytes);

            let cpu_percent = if window_ms > 0.0 {
                100.0 * cpu_delta as f64 / window_ms
            } else {
                0.0
            };
            let ram_percent = if total_memory > 0 {
                100.0 * current.memory_bytes as f64 / total_memory as f64
            } else {
                0.0
            };

            Some(ProcessMetrics {
                pid: current.pid,
                ppid: current.ppid,
                name: current.name.clone(),
                cpu_percent,
                ram_percent,
                disk_percent: scale.percent(io_delta, window),
                disk_io_bytes: io_delta,
            })
        })
        .collect()
}
