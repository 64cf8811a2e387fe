//! Full application runs against scripted OS counters.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::{app::TestAppBuilder, sample_tree, scripted_source};
use procwatch::monitor::MonitorLoop;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_sustained_cpu_load_sends_one_alert() {
    let source = scripted_source(&[90; 20], sample_tree());
    let app = TestAppBuilder::new(source)
        .with_config_modifier(|c| {
            c.email.alert_duration_seconds = 1;
            c.email.cooldown_minutes = 60;
        })
        .spawn()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let transport = app.transport.clone();
    let sink = app.sink.clone();
    app.shutdown(Duration::from_secs(5)).await.unwrap();

    let subjects = transport.subjects();
    assert_eq!(
        subjects,
        vec!["SystemMonitor Alert: Resource Thresholds Exceeded [CPU]".to_string()]
    );

    let snapshots = sink.snapshots();
    assert!(snapshots.len() >= 3, "got {} snapshots", snapshots.len());
    let first = &snapshots[0];
    assert!(first.contains("[System CPU 90.00%]"));
    // Children are folded into their tree root.
    assert!(first.contains(", bash, 100, [CPU 0.00%] [RAM 60.00%]"));
    assert!(first.contains(", sshd, 200,"));
    assert!(!first.contains(", make, 101,"));
    assert!(!first.contains(", cc, 102,"));
}

#[tokio::test(start_paused = true)]
async fn test_recovery_email_follows_alert() {
    let source = scripted_source(&[95, 95, 10, 10], sample_tree());
    let app = TestAppBuilder::new(source)
        .with_config_modifier(|c| {
            c.email.alert_duration_seconds = 1;
            c.email.recovery_duration_seconds = 1;
        })
        .spawn()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(6500)).await;
    let transport = app.transport.clone();
    app.shutdown(Duration::from_secs(5)).await.unwrap();

    assert_eq!(
        transport.subjects(),
        vec![
            "SystemMonitor Alert: Resource Thresholds Exceeded [CPU]".to_string(),
            "SystemMonitor Recovery: All Systems Normal [CPU]".to_string(),
        ]
    );
    let recovery = &transport.sent()[1];
    assert!(recovery.body.contains("[System CPU 95.00%]"));
    assert!(recovery.body.contains("[System CPU 10.00%]"));
}

#[tokio::test(start_paused = true)]
async fn test_no_emails_when_alerting_is_disabled() {
    let source = scripted_source(&[99; 10], sample_tree());
    let app = TestAppBuilder::new(source)
        .with_config_modifier(|c| {
            c.email.enabled = false;
            c.email.alert_duration_seconds = 1;
        })
        .spawn()
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2500)).await;
    let transport = app.transport.clone();
    let sink = app.sink.clone();
    app.shutdown(Duration::from_secs(5)).await.unwrap();

    assert!(transport.sent().is_empty());
    assert!(!sink.snapshots().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cycle_report_marks_exceeded_channels() {
    use procwatch::activity_log::ActivityLogger;
    use procwatch::config::Config;
    use procwatch::display::{Display, DisplayMode, SortColumn};
    use procwatch::notification::AlertChannel;
    use std::sync::Arc;

    let sink = helpers::recording_sink::RecordingSink::new();
    let logger = Arc::new(ActivityLogger::start(sink.clone(), 8));
    let mut config = Config::default().monitor;
    config.ram_threshold = 40.0;

    let mut monitor = MonitorLoop::new(
        &config,
        scripted_source(&[20, 85], sample_tree()),
        logger.clone(),
        None,
        Display::new(DisplayMode::Silent, SortColumn::Cpu, 5),
    );

    let first = monitor.run_cycle().await.unwrap();
    assert_eq!(first.exceeded, vec![AlertChannel::Ram]);
    let second = monitor.run_cycle().await.unwrap();
    assert_eq!(second.exceeded, vec![AlertChannel::Cpu, AlertChannel::Ram]);
    assert_eq!(second.emails_queued, 0);
    assert_eq!(monitor.cycles(), 2);

    logger.shutdown().await;
    assert_eq!(sink.snapshots().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_test_email_checks_the_connection_first() {
    let source = scripted_source(&[10; 4], sample_tree());
    let (test_app, app) = TestAppBuilder::new(source).start().await.unwrap();

    test_app.transport.set_refuse_connection(true);
    let err = app.send_test_email().await.unwrap_err();
    assert!(format!("{:#}", err).contains("connection test failed"));

    test_app.transport.set_refuse_connection(false);
    app.send_test_email().await.unwrap();

    let handle = tokio::spawn(app.run());
    test_app.shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
    assert_eq!(
        test_app.transport.subjects(),
        vec!["SystemMonitor Test Email".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_test_email_needs_active_alerting() {
    let source = scripted_source(&[10; 4], sample_tree());
    let (test_app, app) = TestAppBuilder::new(source)
        .with_config_modifier(|c| c.email.enabled = false)
        .start()
        .await
        .unwrap();

    assert!(app.send_test_email().await.is_err());

    let handle = tokio::spawn(app.run());
    test_app.shutdown_tx.send(true).unwrap();
    handle.await.unwrap().unwrap();
    assert!(test_app.transport.sent().is_empty());
}
