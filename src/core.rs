//! Core domain types and service traits for procwatch
//!
//! This module defines the raw counter records read from the operating
//! system, the derived per-process and system metrics, the messages that flow
//! through the delivery queues, and the trait contracts at the boundaries the
//! monitoring core depends on (OS counters, email transport, log sink).

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::sampling::SampleError;

/// Cumulative system CPU time counters.
///
/// `kernel` includes idle time, so `kernel + user` is the total elapsed CPU
/// time across all cores and `total - idle` is the busy portion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuTimes {
    pub idle: u64,
    pub kernel: u64,
    pub user: u64,
}

impl CpuTimes {
    pub fn new(idle: u64, kernel: u64, user: u64) -> Self {
        Self { idle, kernel, user }
    }
}

/// Physical memory status at the time of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemoryStatus {
    pub total_bytes: u64,
    pub available_bytes: u64,
}

/// Raw cumulative counters for one live process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawProcess {
    pub pid: u32,
    pub ppid: u32,
    pub name: String,
    /// Kernel + user CPU time consumed since the process started, in milliseconds.
    pub cpu_time_ms: u64,
    /// Private (resident) memory in bytes.
    pub memory_bytes: u64,
    /// Bytes read + written since the process started.
    pub io_bytes: u64,
}

/// One-shot raw counter readings taken at a single point in time.
///
/// A `None` system reading means the OS query failed for this read; the
/// derived metric for it becomes zero.
#[derive(Debug, Clone)]
pub struct Sample {
    pub taken_at: Instant,
    pub cpu: Option<CpuTimes>,
    pub memory: Option<MemoryStatus>,
    pub processes: Vec<RawProcess>,
}

/// Derived resource usage for a single process (or an aggregated subtree).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProcessMetrics {
    pub pid: u32,
    pub ppid: u32,
    pub name: String,
    /// Percent of one core; a process using N cores reports up to N x 100.
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub disk_percent: f64,
    /// Bytes read + written during the sampling window.
    pub disk_io_bytes: u64,
}

impl ProcessMetrics {
    /// Returns true if any metric is above `floor` percent.
    pub fn is_significant(&self, floor: f64) -> bool {
        self.cpu_percent > floor || self.ram_percent > floor || self.disk_percent > floor
    }
}

/// Host-wide resource usage for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemMetrics {
    pub cpu_percent: f64,
    pub ram_percent: f64,
    pub disk_percent: f64,
}

/// The metrics derived from one sampling window.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub system: SystemMetrics,
    pub processes: Vec<ProcessMetrics>,
}

/// A queued email notification. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
    pub recipients: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub is_html: bool,
}

impl EmailMessage {
    pub fn new(
        subject: impl Into<String>,
        body: impl Into<String>,
        recipients: Vec<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
            recipients,
            created_at: Utc::now(),
            is_html: false,
        }
    }

    pub fn html(mut self) -> Self {
        self.is_html = true;
        self
    }
}

/// A message for the file-logging worker.
#[derive(Debug, Clone, PartialEq)]
pub enum LogMessage {
    /// A single diagnostic line for the debug log.
    Debug(String),
    /// A pre-formatted process snapshot block for the process log.
    Snapshot(String),
}

// =============================================================================
// Service Traits
// =============================================================================

/// Reads raw cumulative counters from the operating system.
///
/// This is the only platform-specific seam of the monitoring core; the
/// sampler, tree aggregation and alerting logic are written against it.
pub trait CounterSource: Send {
    /// Reads cumulative system CPU times.
    fn system_times(&mut self) -> Result<CpuTimes, SampleError>;

    /// Reads total and available physical memory.
    fn memory_status(&mut self) -> Result<MemoryStatus, SampleError>;

    /// Enumerates live processes with their cumulative counters.
    ///
    /// Processes that vanish while being enumerated are left out.
    fn processes(&mut self) -> Result<Vec<RawProcess>, SampleError>;
}

impl<T: CounterSource + ?Sized> CounterSource for Box<T> {
    fn system_times(&mut self) -> Result<CpuTimes, SampleError> {
        (**self).system_times()
    }

    fn memory_status(&mut self) -> Result<MemoryStatus, SampleError> {
        (**self).memory_status()
    }

    fn processes(&mut self) -> Result<Vec<RawProcess>, SampleError> {
        (**self).processes()
    }
}

/// Delivers an email message.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// A short name for logging (e.g., "smtp", "outbox").
    fn name(&self) -> &str;

    /// Attempts to deliver a single message. Failed sends are not retried.
    async fn send(&self, message: &EmailMessage) -> Result<()>;

    /// Checks that the transport can reach its endpoint.
    async fn test_connection(&self) -> Result<()>;
}

/// Persists log messages.
///
/// Implementations own the files they write to; the consumer worker is the
/// only caller, so no internal locking is required.
pub trait LogSink: Send {
    /// Appends a snapshot block to the process log. Returns false on failure.
    fn write_snapshot(&mut self, block: &str) -> bool;

    /// Appends one line to the debug log. Returns false on failure.
    fn write_debug(&mut self, line: &str) -> bool;
}

impl<T: LogSink + ?Sized> LogSink for Box<T> {
    fn write_snapshot(&mut self, block: &str) -> bool {
        (**self).write_snapshot(block)
    }

    fn write_debug(&mut self, line: &str) -> bool {
        (**self).write_debug(line)
    }
}
