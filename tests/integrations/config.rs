use procwatch::activity_log::RotationPolicy;
use procwatch::cli::Cli;
use procwatch::config::{Config, ConfigError, EmailSecurity};
use procwatch::display::{DisplayMode, SortColumn};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn write_config(toml_content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();
    file
}

fn cli_for(file: &NamedTempFile) -> Cli {
    Cli {
        config: Some(file.path().to_path_buf()),
        ..Cli::default()
    }
}

#[test]
fn test_load_full_valid_config() {
    let file = write_config(
        r#"
        log_level = "warn"
        [monitor]
        cpu_threshold = 75.0
        ram_threshold = 85.5
        disk_threshold = 60.0
        interval_ms = 2000
        [log]
        path = "/var/log/procwatch/monitor.log"
        rotation = "Combined"
        max_backup_files = 3
        [display]
        mode = "Line"
        sort = "Ram"
        top = 20
        [email]
        enabled = true
        smtp_server = "mail.example.com"
        smtp_port = 465
        security = "Tls"
        sender_email = "monitor@example.com"
        sender_password = "pw"
        recipients = ["ops@example.com", "dev@example.com"]
        alert_duration_seconds = 120
        cooldown_minutes = 15
        send_recovery_alerts = false
        "#,
    );

    let (config, _) = Config::load(&cli_for(&file)).unwrap();
    assert_eq!(config.log_level, "warn");
    assert_eq!(config.monitor.cpu_threshold, 75.0);
    assert_eq!(config.monitor.ram_threshold, 85.5);
    assert_eq!(config.monitor.interval_ms, 2000);
    // Unset keys keep their defaults.
    assert_eq!(config.monitor.settle_delay_ms, 100);
    assert_eq!(config.log.path, PathBuf::from("/var/log/procwatch/monitor.log"));
    assert_eq!(config.log.rotation, RotationPolicy::Combined);
    assert_eq!(config.log.max_file_size_mb, 10);
    assert_eq!(config.display.mode, DisplayMode::Line);
    assert_eq!(config.display.sort, SortColumn::Ram);
    assert_eq!(config.email.security, EmailSecurity::Tls);
    assert_eq!(config.email.smtp_port, 465);
    assert_eq!(config.email.recipients.len(), 2);
    assert!(!config.email.send_recovery_alerts);
    assert!(config.email.is_active());
    assert!(config.validate().is_ok());
}

#[test]
fn test_cli_flags_override_file() {
    let file = write_config(
        r#"
        debug = true
        [monitor]
        cpu_threshold = 75.0
        interval_ms = 2000
        [display]
        mode = "Line"
        "#,
    );

    let cli = Cli {
        cpu: Some(95.0),
        interval: Some(3000),
        display: Some(DisplayMode::Silent),
        log_path: Some(PathBuf::from("custom.log")),
        ..cli_for(&file)
    };
    let (config, _) = Config::load(&cli).unwrap();
    assert_eq!(config.monitor.cpu_threshold, 95.0);
    assert_eq!(config.monitor.interval_ms, 3000);
    assert_eq!(config.display.mode, DisplayMode::Silent);
    assert_eq!(config.log.path, PathBuf::from("custom.log"));
    // An absent --debug flag leaves the file's value alone.
    assert!(config.debug);
    assert_eq!(config.effective_log_level(), "debug");
}

#[test]
fn test_out_of_range_values_fail_validation() {
    let file = write_config(
        r#"
        [monitor]
        disk_threshold = 120.0
        "#,
    );
    let (config, _) = Config::load(&cli_for(&file)).unwrap();
    assert_eq!(
        config.validate(),
        Err(ConfigError::ThresholdOutOfRange {
            name: "Disk",
            value: 120.0
        })
    );

    let file = write_config(
        r#"
        [monitor]
        interval_ms = 500
        "#,
    );
    let (config, _) = Config::load(&cli_for(&file)).unwrap();
    assert_eq!(config.validate(), Err(ConfigError::IntervalTooShort(500)));
}

#[test]
fn test_malformed_sub_values_fall_back_to_defaults() {
    let file = write_config(
        r#"
        [log]
        queue_capacity = 0
        [email]
        smtp_port = 0
        timeout_seconds = 0
        outbox_dir = ""
        "#,
    );
    let (config, notices) = Config::load(&cli_for(&file)).unwrap();
    let defaults = Config::default();
    assert_eq!(config.log.queue_capacity, defaults.log.queue_capacity);
    assert_eq!(config.email.smtp_port, defaults.email.smtp_port);
    assert_eq!(config.email.timeout_seconds, defaults.email.timeout_seconds);
    assert_eq!(config.email.outbox_dir, None);
    assert_eq!(
        notices,
        vec![
            "log.queue_capacity must be positive; using the default".to_string(),
            "email.smtp_port must be positive; using the default".to_string(),
            "email.timeout_seconds must be positive; using the default".to_string(),
        ]
    );
}

#[test]
fn test_unparsable_values_fall_back_to_defaults() {
    let file = write_config(
        r#"
        [monitor]
        cpu_threshold = "high"
        ram_threshold = 70.0
        interval_ms = -5
        [log]
        rotation = "Weekly"
        "#,
    );
    let (config, notices) = Config::load(&cli_for(&file)).unwrap();
    let defaults = Config::default();
    assert_eq!(config.monitor.cpu_threshold, defaults.monitor.cpu_threshold);
    assert_eq!(config.monitor.interval_ms, defaults.monitor.interval_ms);
    assert_eq!(config.log.rotation, defaults.log.rotation);
    // Well-formed neighbours are kept.
    assert_eq!(config.monitor.ram_threshold, 70.0);
    assert_eq!(config.validate(), Ok(()));

    assert_eq!(notices.len(), 3);
    for key in ["monitor.cpu_threshold", "monitor.interval_ms", "log.rotation"] {
        assert!(
            notices.iter().any(|n| n.starts_with(key) && n.contains("malformed")),
            "no notice for {key}: {notices:?}"
        );
    }
}

#[test]
fn test_missing_explicit_config_file_is_an_error() {
    let cli = Cli {
        config: Some(PathBuf::from("/nonexistent/procwatch.toml")),
        ..Cli::default()
    };
    let err = Config::load(&cli).unwrap_err();
    assert!(err.to_string().contains("config file not found"));
}

#[test]
fn test_incomplete_email_config_is_inactive() {
    let file = write_config(
        r#"
        [email]
        enabled = true
        sender_email = "monitor@example.com"
        "#,
    );
    let (config, _) = Config::load(&cli_for(&file)).unwrap();
    assert!(config.email.enabled);
    assert!(!config.email.is_active());
}
