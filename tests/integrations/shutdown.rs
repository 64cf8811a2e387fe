//! Graceful shutdown drains both delivery queues.

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::{app::TestAppBuilder, sample_tree, scripted_source};
use std::time::Duration;
use tokio::time::timeout;

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_loop_and_drains_queues() {
    let source = scripted_source(&[90; 10], sample_tree());
    let (test_app, app) = TestAppBuilder::new(source)
        .with_config_modifier(|c| c.email.alert_duration_seconds = 1)
        .start()
        .await
        .unwrap();
    app.send_test_email().await.unwrap();
    let logger = app.logger();
    let handle = tokio::spawn(app.run());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    test_app.shutdown_tx.send(true).unwrap();
    timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();

    // Nothing is left behind in either queue.
    assert_eq!(logger.queue_len(), 0);
    let subjects = test_app.transport.subjects();
    assert_eq!(subjects.len(), 2);
    assert_eq!(subjects[0], "SystemMonitor Test Email");
    assert!(subjects[1].ends_with("[CPU]"));

    let snapshots = test_app.sink.snapshots();
    let cycles = snapshots.len();
    assert!(cycles >= 1);

    // No cycle runs after shutdown.
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(test_app.sink.snapshots().len(), cycles);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_sender_also_stops_the_app() {
    let source = scripted_source(&[10; 4], sample_tree());
    let app = TestAppBuilder::new(source).spawn().await.unwrap();
    let helpers::app::TestApp {
        shutdown_tx,
        app_handle,
        ..
    } = app;

    tokio::time::sleep(Duration::from_millis(1200)).await;
    drop(shutdown_tx);
    let handle = app_handle.unwrap();
    timeout(Duration::from_secs(5), handle).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn test_logging_after_shutdown_falls_back_to_console() {
    let sink = helpers::recording_sink::RecordingSink::new();
    let logger = procwatch::activity_log::ActivityLogger::start(sink.clone(), 4);
    logger.shutdown().await;
    // Shutting down twice is harmless.
    logger.shutdown().await;

    logger.log_snapshot("late block\n".to_string());
    assert!(sink.snapshots().is_empty());
}
