//! Alert and recovery state machine for one alert channel.
//!
//! An episode moves through these states:
//!
//! - **Normal**: nothing exceeded, nothing sent.
//! - **Exceeded, pending alert**: the threshold has been exceeded since
//!   `exceeded_start`; log lines accumulate until the alert duration is met.
//! - **Alert sent, waiting for recovery**: `alert_sent` is set; once usage
//!   drops back, log lines accumulate in the recovery buffer.
//! - **Recovery confirmation**: normal since `normal_start`; once the
//!   recovery duration is met the episode closes and the history resets.
//!
//! A relapse during recovery confirmation restarts the exceeded timer and
//! cancels the pending recovery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// A resource tracked by its own state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertChannel {
    Cpu,
    Ram,
    Disk,
}

impl AlertChannel {
    pub const ALL: [AlertChannel; 3] = [AlertChannel::Cpu, AlertChannel::Ram, AlertChannel::Disk];

    pub fn label(&self) -> &'static str {
        match self {
            AlertChannel::Cpu => "CPU",
            AlertChannel::Ram => "RAM",
            AlertChannel::Disk => "Disk",
        }
    }
}

impl fmt::Display for AlertChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Timing rules for alerts and recoveries.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertPolicy {
    /// How long a threshold must stay exceeded before alerting.
    pub alert_duration: Duration,
    /// Minimum whole minutes between two alerts of one channel.
    pub cooldown_minutes: u64,
    /// How long usage must stay normal before declaring recovery.
    pub recovery_duration: Duration,
    /// Whether recovery notifications are emailed.
    pub send_recovery_alerts: bool,
    /// Time covered by one observation.
    pub sample_interval: Duration,
}

/// Mutable state of one channel's episode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlertHistory {
    pub is_exceeded: bool,
    pub exceeded_start: Option<DateTime<Utc>>,
    pub normal_start: Option<DateTime<Utc>>,
    pub alert_sent: bool,
    pub last_alert: Option<DateTime<Utc>>,
    pub waiting_for_recovery: bool,
    pub logs_during_alert: Vec<String>,
    pub logs_during_recovery: Vec<String>,
}

/// A notification the tracker decided to emit.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertEvent {
    Alert {
        logs: Vec<String>,
    },
    /// Closes the episode. The history has already been reset.
    Recovery {
        alert_logs: Vec<String>,
        recovery_logs: Vec<String>,
    },
}

/// Debounce, cooldown and recovery-confirmation logic for one channel.
#[derive(Debug, Clone)]
pub struct AlertTracker {
    policy: AlertPolicy,
    history: AlertHistory,
}

impl AlertTracker {
    pub fn new(policy: AlertPolicy) -> Self {
        Self {
            policy,
            history: AlertHistory::default(),
        }
    }

    pub fn history(&self) -> &AlertHistory {
        &self.history
    }

    /// True while the last alert of the episode is more recent than the
    /// cooldown.
    pub fn is_in_cooldown(&self, now: DateTime<Utc>) -> bool {
        match (self.history.alert_sent, self.history.last_alert) {
            (true, Some(last)) => minutes_between(last, now) < self.policy.cooldown_minutes,
            _ => false,
        }
    }

    /// The first alert of an episode is always allowed. A repeat within the
    /// same episode needs a non-zero cooldown that has run out.
    fn may_alert(&self, now: DateTime<Utc>) -> bool {
        if !self.history.alert_sent {
            return true;
        }
        self.policy.cooldown_minutes > 0 && !self.is_in_cooldown(now)
    }

    /// Feeds one cycle's result into the state machine.
    ///
    /// Each observation covers one sample interval, so a condition seen on
    /// `n` consecutive cycles has lasted `n` intervals.
    pub fn observe(
        &mut self,
        exceeded: bool,
        log_line: &str,
        now: DateTime<Utc>,
    ) -> Option<AlertEvent> {
        if exceeded {
            self.observe_exceeded(log_line, now)
        } else {
            self.observe_normal(log_line, now)
        }
    }

    fn observe_exceeded(&mut self, log_line: &str, now: DateTime<Utc>) -> Option<AlertEvent> {
        let h = &mut self.history;
        if !h.is_exceeded {
            h.is_exceeded = true;
            h.exceeded_start = Some(now);
            h.normal_start = None;
            h.logs_during_alert.clear();
            h.waiting_for_recovery = false;
            h.logs_during_recovery.clear();
        }
        if !log_line.is_empty() {
            h.logs_during_alert.push(log_line.to_string());
        }

        let start = h.exceeded_start.unwrap_or(now);
        let elapsed = self.covered(start, now);
        if elapsed < self.policy.alert_duration || !self.may_alert(now) {
            return None;
        }

        let h = &mut self.history;
        h.alert_sent = true;
        h.last_alert = Some(now);
        h.waiting_for_recovery = true;
        Some(AlertEvent::Alert {
            logs: h.logs_during_alert.clone(),
        })
    }

    fn observe_normal(&mut self, log_line: &str, now: DateTime<Utc>) -> Option<AlertEvent> {
        let h = &mut self.history;
        if h.is_exceeded {
            h.is_exceeded = false;
            h.normal_start = Some(now);
            if h.alert_sent {
                h.waiting_for_recovery = true;
                h.logs_during_recovery.clear();
            }
        }
        if !h.waiting_for_recovery {
            return None;
        }
        if !log_line.is_empty() {
            h.logs_during_recovery.push(log_line.to_string());
        }

        let start = h.normal_start.unwrap_or(now);
        if self.covered(start, now) < self.policy.recovery_duration {
            return None;
        }

        let closed = std::mem::take(&mut self.history);
        Some(AlertEvent::Recovery {
            alert_logs: closed.logs_during_alert,
            recovery_logs: closed.logs_during_recovery,
        })
    }

    fn covered(&self, start: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
        let since = (now - start).to_std().unwrap_or_default();
        since + self.policy.sample_interval
    }
}

fn minutes_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> u64 {
    (later - earlier).num_minutes().max(0) as u64
}
