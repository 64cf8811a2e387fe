//! The email notifier turns per-channel threshold observations into queued
//! alert and recovery emails.

use crate::activity_log::ActivityLogger;
use crate::config::EmailConfig;
use crate::core::{EmailMessage, EmailTransport};
use crate::delivery::{Deliver, DeliveryQueue};
use crate::formatting::{alert_email_body, recovery_email_body, EmailContext};
use crate::notification::alert_state::{
    AlertChannel, AlertEvent, AlertHistory, AlertPolicy, AlertTracker,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{error, info, warn};

/// Per-channel alert tracking plus the email delivery queue.
pub struct EmailNotifier {
    config: EmailConfig,
    context: EmailContext,
    trackers: Mutex<HashMap<AlertChannel, AlertTracker>>,
    queue: DeliveryQueue<EmailMessage>,
    transport: Arc<dyn EmailTransport>,
    logger: Option<Arc<ActivityLogger>>,
}

impl EmailNotifier {
    /// Creates the notifier and starts its delivery worker.
    ///
    /// `sample_interval` is the time one threshold observation stands for.
    pub fn start(
        config: EmailConfig,
        sample_interval: Duration,
        transport: Arc<dyn EmailTransport>,
        logger: Option<Arc<ActivityLogger>>,
    ) -> Self {
        let policy = AlertPolicy {
            alert_duration: Duration::from_secs(config.alert_duration_seconds),
            cooldown_minutes: config.cooldown_minutes,
            recovery_duration: Duration::from_secs(config.recovery_duration_seconds),
            send_recovery_alerts: config.send_recovery_alerts,
            sample_interval,
        };
        let trackers = AlertChannel::ALL
            .iter()
            .map(|channel| (*channel, AlertTracker::new(policy.clone())))
            .collect();

        let context = EmailContext {
            host: sysinfo::System::host_name().unwrap_or_else(|| "unknown host".to_string()),
            alert_duration_seconds: config.alert_duration_seconds,
            cooldown_minutes: config.cooldown_minutes,
            recovery_duration_seconds: config.recovery_duration_seconds,
        };

        let worker = TransportWorker {
            transport: transport.clone(),
            logger: logger.clone(),
        };
        let queue = DeliveryQueue::start("email", config.queue_capacity, worker);
        info!(
            transport = transport.name(),
            recipients = config.recipients.len(),
            "Email notifier started"
        );

        Self {
            config,
            context,
            trackers: Mutex::new(trackers),
            queue,
            transport,
            logger,
        }
    }

    /// Records one cycle's result for `channel` using the wall clock.
    pub fn check_thresholds(&self, channel: AlertChannel, exceeded: bool, log_line: &str) -> bool {
        self.check_thresholds_at(channel, exceeded, log_line, Utc::now())
    }

    /// Records one cycle's result at `now`. Returns true if an email was queued.
    ///
    /// An alert counts as sent once it is queued; a later delivery failure
    /// does not roll the state back.
    pub fn check_thresholds_at(
        &self,
        channel: AlertChannel,
        exceeded: bool,
        log_line: &str,
        now: DateTime<Utc>,
    ) -> bool {
        let event = {
            let mut trackers = self.trackers();
            match trackers.get_mut(&channel) {
                Some(tracker) => tracker.observe(exceeded, log_line, now),
                None => None,
            }
        };

        match event {
            Some(AlertEvent::Alert { logs }) => {
                info!(
                    %channel,
                    log_entries = logs.len(),
                    "Threshold exceeded long enough; queuing alert"
                );
                metrics::counter!("alerts_triggered_total", "channel" => channel.label())
                    .increment(1);
                let body = alert_email_body(&self.context, channel.label(), &logs, Local::now());
                let subject = format!("{} [{}]", self.config.subject_alert, channel);
                let recipients = self.config.recipients.clone();
                self.enqueue(EmailMessage::new(subject, body, recipients).html())
            }
            Some(AlertEvent::Recovery {
                alert_logs,
                recovery_logs,
            }) => {
                info!(%channel, "Usage back to normal; episode closed");
                metrics::counter!("recoveries_total", "channel" => channel.label()).increment(1);
                if !self.config.send_recovery_alerts {
                    return false;
                }
                let body = recovery_email_body(
                    &self.context,
                    channel.label(),
                    &alert_logs,
                    &recovery_logs,
                    Local::now(),
                );
                let subject = format!("{} [{}]", self.config.subject_recovery, channel);
                let recipients = self.config.recipients.clone();
                self.enqueue(EmailMessage::new(subject, body, recipients).html())
            }
            None => false,
        }
    }

    /// Queues a plain-text message to the configured recipients.
    pub fn send_immediate(&self, subject: &str, body: &str) -> bool {
        self.enqueue(EmailMessage::new(subject, body, self.config.recipients.clone()))
    }

    /// Checks that the transport endpoint is reachable.
    pub async fn test_connection(&self) -> Result<()> {
        self.transport.test_connection().await
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_in_cooldown(&self, channel: AlertChannel) -> bool {
        let now = Utc::now();
        self.trackers()
            .get(&channel)
            .map(|t| t.is_in_cooldown(now))
            .unwrap_or(false)
    }

    pub fn last_alert_time(&self, channel: AlertChannel) -> Option<DateTime<Utc>> {
        self.trackers()
            .get(&channel)
            .and_then(|t| t.history().last_alert)
    }

    /// A copy of one channel's current history.
    pub fn history(&self, channel: AlertChannel) -> AlertHistory {
        self.trackers()
            .get(&channel)
            .map(|t| t.history().clone())
            .unwrap_or_default()
    }

    /// Delivers queued emails and stops the worker.
    pub async fn shutdown(&self) {
        self.queue.shutdown().await;
    }

    fn trackers(&self) -> MutexGuard<'_, HashMap<AlertChannel, AlertTracker>> {
        self.trackers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enqueue(&self, message: EmailMessage) -> bool {
        match self.queue.push(message) {
            Ok(()) => {
                metrics::counter!("agg.emails_queued").increment(1);
                true
            }
            Err(e) => {
                let reason = e.to_string();
                let dropped = e.into_inner();
                warn!(
                    subject = %dropped.subject,
                    reason = %reason,
                    "Email dropped before delivery"
                );
                if let Some(logger) = &self.logger {
                    logger.debug(format!("Email '{}' dropped: {}", dropped.subject, reason));
                }
                false
            }
        }
    }
}

struct TransportWorker {
    transport: Arc<dyn EmailTransport>,
    logger: Option<Arc<ActivityLogger>>,
}

#[async_trait]
impl Deliver<EmailMessage> for TransportWorker {
    async fn deliver(&mut self, message: EmailMessage) {
        match self.transport.send(&message).await {
            Ok(()) => {
                metrics::counter!("emails_sent_total").increment(1);
                info!(subject = %message.subject, transport = self.transport.name(), "Email sent");
            }
            Err(e) => {
                metrics::counter!("emails_failed_total").increment(1);
                error!(subject = %message.subject, error = %e, "Failed to send email; dropping it");
                if let Some(logger) = &self.logger {
                    logger.debug(format!("Failed to send email '{}': {}", message.subject, e));
                }
            }
        }
    }
}
