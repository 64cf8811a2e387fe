//! Configuration management for procwatch
//!
//! This module defines the main `Config` struct and its sections. Settings are
//! layered with `figment`: built-in defaults, then the `procwatch.toml` file
//! (or the file given with `--config`), then `PROCWATCH_` environment
//! variables, then command-line flags.

use crate::activity_log::RotationPolicy;
use crate::cli::Cli;
use crate::display::{DisplayMode, SortColumn};
use anyhow::{Context, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Config file read when `--config` is not given. It may be absent.
pub const DEFAULT_CONFIG_FILE: &str = "procwatch.toml";

/// Upper bound on values replaced by defaults in one load.
const MAX_FALLBACKS: usize = 64;

/// Shortest allowed monitor interval.
pub const MIN_INTERVAL_MS: u64 = 1000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{name} threshold must be between 0 and 100, got {value}")]
    ThresholdOutOfRange { name: &'static str, value: f64 },

    #[error("monitor interval must be at least 1000ms, got {0}ms")]
    IntervalTooShort(u64),
}

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for diagnostics (`RUST_LOG` takes precedence).
    pub log_level: String,
    /// Forces debug-level diagnostics.
    #[serde(default)]
    pub debug: bool,
    pub monitor: MonitorConfig,
    pub log: LogConfig,
    pub display: DisplayConfig,
    pub email: EmailConfig,
    pub metrics: MetricsConfig,
}

/// Sampling and threshold settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MonitorConfig {
    pub cpu_threshold: f64,
    pub ram_threshold: f64,
    pub disk_threshold: f64,
    /// Time between cycles, in milliseconds.
    pub interval_ms: u64,
    /// Gap between the two counter reads of one sample, in milliseconds.
    pub settle_delay_ms: u64,
    /// I/O rate reported as 100% disk activity.
    pub disk_full_scale_bytes_per_sec: u64,
    /// A process is written to the log only if one of its metrics is above this.
    pub log_threshold_percent: f64,
}

impl MonitorConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Process log settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LogConfig {
    pub path: PathBuf,
    pub queue_capacity: usize,
    pub rotation: RotationPolicy,
    pub max_file_size_mb: u64,
    pub max_backup_files: usize,
}

/// Console display settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DisplayConfig {
    pub mode: DisplayMode,
    pub sort: SortColumn,
    /// Number of processes shown per cycle.
    pub top: usize,
}

/// How the SMTP connection is secured.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum EmailSecurity {
    None,
    StartTls,
    Tls,
}

/// Email alerting settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub security: EmailSecurity,
    pub sender_email: String,
    pub sender_password: String,
    pub sender_name: String,
    pub recipients: Vec<String>,
    pub timeout_seconds: u64,
    pub alert_duration_seconds: u64,
    pub cooldown_minutes: u64,
    pub send_recovery_alerts: bool,
    pub recovery_duration_seconds: u64,
    pub subject_alert: String,
    pub subject_recovery: String,
    pub queue_capacity: usize,
    /// When set, emails are written here as JSON files instead of sent.
    pub outbox_dir: Option<PathBuf>,
}

impl EmailConfig {
    /// True when there is enough information to deliver mail.
    pub fn is_valid(&self) -> bool {
        let has_outbox = self.outbox_dir.is_some();
        !self.sender_email.is_empty()
            && (has_outbox || !self.sender_password.is_empty())
            && !self.recipients.is_empty()
            && (has_outbox || !self.smtp_server.is_empty())
    }

    /// Alerting runs only when it is switched on and usable.
    pub fn is_active(&self) -> bool {
        self.enabled && self.is_valid()
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            security: EmailSecurity::StartTls,
            sender_email: String::new(),
            sender_password: String::new(),
            sender_name: "SystemMonitor".to_string(),
            recipients: vec![],
            timeout_seconds: 30,
            alert_duration_seconds: 300,
            cooldown_minutes: 60,
            send_recovery_alerts: true,
            recovery_duration_seconds: 120,
            subject_alert: "SystemMonitor Alert: Resource Thresholds Exceeded".to_string(),
            subject_recovery: "SystemMonitor Recovery: All Systems Normal".to_string(),
            queue_capacity: 64,
            outbox_dir: None,
        }
    }
}

/// Internal metrics settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetricsConfig {
    /// Periodically log internal counters and gauges.
    pub log_metrics: bool,
    pub log_interval_seconds: u64,
}

impl Config {
    /// Loads the application configuration.
    ///
    /// Layers are merged in order, so later ones win: defaults, the TOML
    /// file, environment variables (e.g. `PROCWATCH_MONITOR__INTERVAL_MS`),
    /// then CLI flags. A value that cannot be parsed, or that is out of
    /// its allowed range, is replaced by its default.
    ///
    /// Returns the configuration with one notice per replaced value. Notices
    /// are returned rather than logged so the caller can report them once
    /// diagnostics are set up.
    pub fn load(cli: &Cli) -> Result<(Self, Vec<String>)> {
        let path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        if cli.config.is_some() && !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("PROCWATCH_").split("__"))
            .merge(cli.clone());
        let (mut config, mut notices) = extract_with_fallbacks(figment)?;
        notices.extend(config.sanitize());
        Ok((config, notices))
    }

    /// Replaces individually malformed values with their defaults and
    /// returns a notice for each one.
    pub fn sanitize(&mut self) -> Vec<String> {
        let defaults = Config::default();
        let mut notices = Vec::new();
        let mut reset = |key: &str| {
            notices.push(format!("{} must be positive; using the default", key));
        };

        if self.monitor.settle_delay_ms == 0 {
            reset("monitor.settle_delay_ms");
            self.monitor.settle_delay_ms = defaults.monitor.settle_delay_ms;
        }
        if self.monitor.disk_full_scale_bytes_per_sec == 0 {
            reset("monitor.disk_full_scale_bytes_per_sec");
            self.monitor.disk_full_scale_bytes_per_sec =
                defaults.monitor.disk_full_scale_bytes_per_sec;
        }
        if self.log.queue_capacity == 0 {
            reset("log.queue_capacity");
            self.log.queue_capacity = defaults.log.queue_capacity;
        }
        if self.log.max_file_size_mb == 0 {
            reset("log.max_file_size_mb");
            self.log.max_file_size_mb = defaults.log.max_file_size_mb;
        }
        if self.display.top == 0 {
            reset("display.top");
            self.display.top = defaults.display.top;
        }
        if self.email.smtp_port == 0 {
            reset("email.smtp_port");
            self.email.smtp_port = defaults.email.smtp_port;
        }
        if self.email.timeout_seconds == 0 {
            reset("email.timeout_seconds");
            self.email.timeout_seconds = defaults.email.timeout_seconds;
        }
        if self.email.queue_capacity == 0 {
            reset("email.queue_capacity");
            self.email.queue_capacity = defaults.email.queue_capacity;
        }
        if self.metrics.log_interval_seconds == 0 {
            reset("metrics.log_interval_seconds");
            self.metrics.log_interval_seconds = defaults.metrics.log_interval_seconds;
        }
        let floor = self.monitor.log_threshold_percent;
        if !floor.is_finite() || floor < 0.0 {
            notices.push("monitor.log_threshold_percent is invalid; using the default".to_string());
            self.monitor.log_threshold_percent = defaults.monitor.log_threshold_percent;
        }
        if self.email.outbox_dir.as_ref().is_some_and(|p| p.as_os_str().is_empty()) {
            self.email.outbox_dir = None;
        }
        notices
    }

    /// Checks the values that startup cannot recover from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("CPU", self.monitor.cpu_threshold),
            ("RAM", self.monitor.ram_threshold),
            ("Disk", self.monitor.disk_threshold),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }
        if self.monitor.interval_ms < MIN_INTERVAL_MS {
            return Err(ConfigError::IntervalTooShort(self.monitor.interval_ms));
        }
        Ok(())
    }

    /// The effective diagnostics filter.
    pub fn effective_log_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.log_level
        }
    }
}

/// Extracts a `Config`, swapping each key that fails to deserialize for its
/// default value.
fn extract_with_fallbacks(mut figment: Figment) -> Result<(Config, Vec<String>)> {
    let defaults = Figment::from(Serialized::defaults(Config::default()));
    let mut notices = Vec::new();
    loop {
        let err = match figment.extract::<Config>() {
            Ok(config) => return Ok((config, notices)),
            Err(err) => err,
        };
        if err.path.is_empty() || notices.len() >= MAX_FALLBACKS {
            return Err(err.into());
        }
        let key = err.path.join(".");
        let fallback = defaults
            .find_value(&key)
            .with_context(|| format!("invalid value for {}: {}", key, err.kind))?;
        notices.push(format!("{} is malformed ({}); using the default", key, err.kind));
        figment = figment.merge(Serialized::default(&key, fallback));
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            debug: false,
            monitor: MonitorConfig {
                cpu_threshold: 80.0,
                ram_threshold: 80.0,
                disk_threshold: 80.0,
                interval_ms: 5000,
                settle_delay_ms: 100,
                disk_full_scale_bytes_per_sec: 100 * 1024 * 1024,
                log_threshold_percent: 0.1,
            },
            log: LogConfig {
                path: PathBuf::from("SystemMonitor.log"),
                queue_capacity: 1000,
                rotation: RotationPolicy::Size,
                max_file_size_mb: 10,
                max_backup_files: 5,
            },
            display: DisplayConfig {
                mode: DisplayMode::Compact,
                sort: SortColumn::Cpu,
                top: 15,
            },
            email: EmailConfig::default(),
            metrics: MetricsConfig {
                log_metrics: false,
                log_interval_seconds: 60,
            },
        }
    }
}
