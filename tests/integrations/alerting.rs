//! End-to-end behaviour of the email notifier: debounce, cooldown, recovery
//! confirmation and delivery through a transport.

#[path = "../helpers/mod.rs"]
mod helpers;

use chrono::{DateTime, TimeZone, Utc};
use helpers::mock_transport::RecordingTransport;
use procwatch::config::EmailConfig;
use procwatch::notification::{AlertChannel, EmailNotifier};
use std::sync::Arc;
use std::time::Duration;

const INTERVAL: Duration = Duration::from_secs(1);

fn email_config(alert_secs: u64, cooldown_minutes: u64, recovery_secs: u64) -> EmailConfig {
    EmailConfig {
        enabled: true,
        sender_email: "monitor@example.com".to_string(),
        sender_password: "secret".to_string(),
        recipients: vec!["ops@example.com".to_string(), "dev@example.com".to_string()],
        alert_duration_seconds: alert_secs,
        cooldown_minutes,
        recovery_duration_seconds: recovery_secs,
        ..EmailConfig::default()
    }
}

fn at(seconds: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 8, 0, 0).unwrap() + chrono::Duration::seconds(seconds)
}

#[tokio::test]
async fn test_sustained_overload_alerts_then_recovers() {
    let transport = RecordingTransport::new();
    let notifier = EmailNotifier::start(
        email_config(5, 60, 3),
        INTERVAL,
        Arc::new(transport.clone()),
        None,
    );

    // Five exceeded ticks satisfy a 5 s alert duration on the fifth.
    for t in 0..4 {
        assert!(!notifier.check_thresholds_at(AlertChannel::Cpu, true, &format!("hot-{t}"), at(t)));
    }
    assert!(notifier.check_thresholds_at(AlertChannel::Cpu, true, "hot-4", at(4)));
    assert_eq!(notifier.last_alert_time(AlertChannel::Cpu), Some(at(4)));

    // Three normal ticks confirm recovery on the third.
    assert!(!notifier.check_thresholds_at(AlertChannel::Cpu, false, "cool-0", at(5)));
    assert!(!notifier.check_thresholds_at(AlertChannel::Cpu, false, "cool-1", at(6)));
    assert!(notifier.check_thresholds_at(AlertChannel::Cpu, false, "cool-2", at(7)));

    let history = notifier.history(AlertChannel::Cpu);
    assert!(!history.alert_sent);
    assert!(history.logs_during_alert.is_empty());

    notifier.shutdown().await;
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);

    let alert = &sent[0];
    assert_eq!(
        alert.subject,
        "SystemMonitor Alert: Resource Thresholds Exceeded [CPU]"
    );
    assert!(alert.is_html);
    assert_eq!(alert.recipients.len(), 2);
    for t in 0..5 {
        assert!(alert.body.contains(&format!("hot-{t}")));
    }

    let recovery = &sent[1];
    assert_eq!(
        recovery.subject,
        "SystemMonitor Recovery: All Systems Normal [CPU]"
    );
    assert!(recovery.body.contains("hot-0"));
    assert!(recovery.body.contains("cool-2"));
}

#[tokio::test]
async fn test_brief_spikes_never_alert() {
    let transport = RecordingTransport::new();
    let notifier = EmailNotifier::start(
        email_config(3, 60, 2),
        INTERVAL,
        Arc::new(transport.clone()),
        None,
    );

    // Two-tick spikes separated by a normal tick never reach three ticks.
    let pattern = [true, true, false, true, true, false, true, true, false];
    for (t, exceeded) in pattern.iter().enumerate() {
        assert!(!notifier.check_thresholds_at(AlertChannel::Ram, *exceeded, "spike", at(t as i64)));
    }

    notifier.shutdown().await;
    assert!(transport.sent().is_empty());
    assert_eq!(notifier.last_alert_time(AlertChannel::Ram), None);
}

#[tokio::test]
async fn test_cooldown_suppresses_repeat_alerts() {
    let transport = RecordingTransport::new();
    let notifier = EmailNotifier::start(
        email_config(1, 2, 600),
        INTERVAL,
        Arc::new(transport.clone()),
        None,
    );

    assert!(notifier.check_thresholds_at(AlertChannel::Disk, true, "d", at(0)));
    // Still exceeded, but within the two-minute cooldown.
    for t in 1..119 {
        assert!(!notifier.check_thresholds_at(AlertChannel::Disk, true, "d", at(t)));
    }
    // Two whole minutes after the first alert a reminder goes out.
    assert!(notifier.check_thresholds_at(AlertChannel::Disk, true, "d", at(120)));

    notifier.shutdown().await;
    assert_eq!(transport.sent().len(), 2);
    assert_eq!(notifier.last_alert_time(AlertChannel::Disk), Some(at(120)));
}

#[tokio::test]
async fn test_relapse_during_recovery_restarts_the_episode() {
    let transport = RecordingTransport::new();
    let notifier = EmailNotifier::start(
        email_config(2, 0, 3),
        INTERVAL,
        Arc::new(transport.clone()),
        None,
    );

    notifier.check_thresholds_at(AlertChannel::Cpu, true, "a", at(0));
    assert!(notifier.check_thresholds_at(AlertChannel::Cpu, true, "b", at(1)));
    notifier.check_thresholds_at(AlertChannel::Cpu, false, "c", at(2));
    notifier.check_thresholds_at(AlertChannel::Cpu, false, "d", at(3));
    // Relapse before the third normal tick.
    assert!(!notifier.check_thresholds_at(AlertChannel::Cpu, true, "e", at(4)));

    let history = notifier.history(AlertChannel::Cpu);
    assert!(history.is_exceeded);
    assert_eq!(history.exceeded_start, Some(at(4)));
    assert_eq!(history.logs_during_alert, vec!["e".to_string()]);
    assert!(history.logs_during_recovery.is_empty());

    notifier.shutdown().await;
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn test_failed_delivery_keeps_alert_state() {
    let transport = RecordingTransport::new();
    transport.set_fail(true);
    let notifier = EmailNotifier::start(
        email_config(1, 60, 1),
        INTERVAL,
        Arc::new(transport.clone()),
        None,
    );

    assert!(notifier.check_thresholds_at(AlertChannel::Cpu, true, "x", at(0)));
    notifier.shutdown().await;

    assert!(transport.sent().is_empty());
    assert!(notifier.history(AlertChannel::Cpu).alert_sent);
}

#[tokio::test]
async fn test_zero_cooldown_alerts_once_per_outage() {
    let transport = RecordingTransport::new();
    let notifier = EmailNotifier::start(
        email_config(5, 0, 3),
        INTERVAL,
        Arc::new(transport.clone()),
        None,
    );

    let queued = (0..10)
        .filter(|&t| notifier.check_thresholds_at(AlertChannel::Cpu, true, "busy", at(t)))
        .count();
    assert_eq!(queued, 1);
    assert_eq!(notifier.last_alert_time(AlertChannel::Cpu), Some(at(4)));

    notifier.shutdown().await;
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn test_cooldown_is_reported_per_channel() {
    let transport = RecordingTransport::new();
    let notifier = EmailNotifier::start(
        email_config(1, 60, 3),
        INTERVAL,
        Arc::new(transport.clone()),
        None,
    );

    // A one-second debounce is met by the first observation.
    assert!(notifier.check_thresholds(AlertChannel::Cpu, true, "hot"));
    assert!(notifier.is_in_cooldown(AlertChannel::Cpu));
    assert!(!notifier.is_in_cooldown(AlertChannel::Ram));

    notifier.shutdown().await;
    assert_eq!(transport.sent().len(), 1);
}
