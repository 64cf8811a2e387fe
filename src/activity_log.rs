//! # Activity Log
//!
//! `ActivityLogger` is the handle the monitor loop and the notifier use to
//! persist snapshot blocks and debug lines. It is constructed once at startup
//! and shared by `Arc`; all file I/O happens on the log delivery worker, which
//! hands each message to a [`LogSink`].
//!
//! `LogFileWriter` is the production sink: it appends to the process log and
//! the debug log next to it, rotating the process log by size, by day, or
//! both.

use crate::core::{LogMessage, LogSink};
use crate::delivery::{Deliver, DeliveryQueue, QueueError};
use crate::formatting::format_debug_line;
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// How the process log is rotated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RotationPolicy {
    None,
    #[default]
    Size,
    Daily,
    Combined,
}

impl RotationPolicy {
    fn by_size(self) -> bool {
        matches!(self, RotationPolicy::Size | RotationPolicy::Combined)
    }

    fn by_day(self) -> bool {
        matches!(self, RotationPolicy::Daily | RotationPolicy::Combined)
    }
}

/// Injected logging facade over the log delivery queue.
pub struct ActivityLogger {
    queue: DeliveryQueue<LogMessage>,
}

impl ActivityLogger {
    /// Starts the log worker writing into `sink`.
    pub fn start<S: LogSink + 'static>(sink: S, queue_capacity: usize) -> Self {
        Self {
            queue: DeliveryQueue::start("log", queue_capacity, SinkWorker { sink }),
        }
    }

    /// Queues a snapshot block for the process log.
    ///
    /// When the queue is saturated the block is printed to stdout instead.
    pub fn log_snapshot(&self, block: String) {
        if let Err(e) = self.queue.push(LogMessage::Snapshot(block)) {
            self.fall_back(e);
        }
    }

    /// Emits a debug event and queues a timestamped line for the debug log.
    pub fn debug(&self, text: impl Into<String>) {
        let text = text.into();
        debug!(target: "procwatch::activity", "{}", text);
        let line = format_debug_line(Local::now(), &text);
        if let Err(e) = self.queue.push(LogMessage::Debug(line)) {
            self.fall_back(e);
        }
    }

    fn fall_back(&self, err: QueueError<LogMessage>) {
        let reason = err.to_string();
        let text = match err.into_inner() {
            LogMessage::Snapshot(block) => block,
            LogMessage::Debug(line) => line,
        };
        warn!(reason = %reason, "Log queue rejected a message; writing to console");
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{}", text.trim_end());
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Drains queued messages and stops the worker.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }
}

struct SinkWorker<S> {
    sink: S,
}

#[async_trait]
impl<S: LogSink + 'static> Deliver<LogMessage> for SinkWorker<S> {
    async fn deliver(&mut self, message: LogMessage) {
        let (kind, ok) = match &message {
            LogMessage::Snapshot(block) => ("snapshot", self.sink.write_snapshot(block)),
            LogMessage::Debug(line) => ("debug", self.sink.write_debug(line)),
        };
        if !ok {
            metrics::counter!("log_write_failures_total", "kind" => kind).increment(1);
            error!(kind, "Failed to write log message; dropping it");
        }
    }
}

/// Returns `<dir>/<stem>_debug.log` for a process log path.
pub fn debug_log_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "procwatch".to_string());
    path.with_file_name(format!("{}_debug.log", stem))
}

/// Appends log messages to files on disk.
pub struct LogFileWriter {
    path: PathBuf,
    debug_path: PathBuf,
    rotation: RotationPolicy,
    max_file_size_bytes: u64,
    max_backup_files: usize,
    /// Local date the current process log file belongs to.
    file_date: Option<NaiveDate>,
}

impl LogFileWriter {
    pub fn new(
        path: impl Into<PathBuf>,
        rotation: RotationPolicy,
        max_file_size_mb: u64,
        max_backup_files: usize,
    ) -> Self {
        let path = path.into();
        let debug_path = debug_log_path(&path);
        let file_date = fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .map(|modified| DateTime::<Local>::from(modified).date_naive());
        Self {
            path,
            debug_path,
            rotation,
            max_file_size_bytes: max_file_size_mb.saturating_mul(1024 * 1024),
            max_backup_files,
            file_date,
        }
    }

    fn write_snapshot_on(&mut self, block: &str, today: NaiveDate) -> std::io::Result<()> {
        let incoming = block.len() as u64 + 1;
        if self.rotation.by_day() {
            self.rotate_daily(today)?;
        }
        if self.rotation.by_size() {
            self.rotate_by_size(incoming)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(block.as_bytes())?;
        if !block.ends_with('\n') {
            file.write_all(b"\n")?;
        }
        file.write_all(b"\n")?;
        self.file_date = Some(today);
        Ok(())
    }

    fn rotate_daily(&mut self, today: NaiveDate) -> std::io::Result<()> {
        let Some(file_date) = self.file_date else {
            return Ok(());
        };
        if file_date == today || !self.path.exists() {
            return Ok(());
        }
        let target = self.dated_path(file_date);
        debug!(from = %self.path.display(), to = %target.display(), "Rotating log by date");
        fs::rename(&self.path, target)
    }

    fn rotate_by_size(&mut self, incoming: u64) -> std::io::Result<()> {
        let current = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(()),
        };
        if current == 0 || current + incoming <= self.max_file_size_bytes {
            return Ok(());
        }
        debug!(path = %self.path.display(), size = current, "Rotating log by size");

        if self.max_backup_files == 0 {
            return fs::remove_file(&self.path);
        }
        let oldest = self.backup_path(self.max_backup_files);
        if oldest.exists() {
            fs::remove_file(&oldest)?;
        }
        for index in (1..self.max_backup_files).rev() {
            let from = self.backup_path(index);
            if from.exists() {
                fs::rename(&from, self.backup_path(index + 1))?;
            }
        }
        fs::rename(&self.path, self.backup_path(1))
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn dated_path(&self, date: NaiveDate) -> PathBuf {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match self.path.extension() {
            Some(ext) => format!("{}_{}.{}", stem, date.format("%Y-%m-%d"), ext.to_string_lossy()),
            None => format!("{}_{}", stem, date.format("%Y-%m-%d")),
        };
        self.path.with_file_name(name)
    }
}

impl LogSink for LogFileWriter {
    fn write_snapshot(&mut self, block: &str) -> bool {
        let today = Local::now().date_naive();
        match self.write_snapshot_on(block, today) {
            Ok(()) => true,
            Err(e) => {
                error!(path = %self.path.display(), error = %e, "Failed to write process log");
                false
            }
        }
    }

    fn write_debug(&mut self, line: &str) -> bool {
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.debug_path)
            .and_then(|mut file| writeln!(file, "{}", line));
        match result {
            Ok(()) => true,
            Err(e) => {
                error!(path = %self.debug_path.display(), error = %e, "Failed to write debug log");
                false
            }
        }
    }
}
