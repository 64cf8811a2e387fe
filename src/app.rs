//! The main application logic, decoupled from the entry point.

use crate::{
    activity_log::{ActivityLogger, LogFileWriter},
    config::Config,
    core::{CounterSource, EmailTransport, LogSink},
    display::Display,
    monitor::MonitorLoop,
    notification::{EmailNotifier, OutboxTransport, SmtpTransport},
    sampling::SystemCounterSource,
    task_manager::TaskManager,
};
use anyhow::{Context, Result};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

const TEST_EMAIL_SUBJECT: &str = "SystemMonitor Test Email";

/// A handle to the running application.
pub struct App {
    task_manager: TaskManager,
    logger: Arc<ActivityLogger>,
    notifier: Option<Arc<EmailNotifier>>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    pub fn logger(&self) -> Arc<ActivityLogger> {
        self.logger.clone()
    }

    /// The email notifier, present only when email alerting is active.
    pub fn notifier(&self) -> Option<Arc<EmailNotifier>> {
        self.notifier.clone()
    }

    /// Tests the email connection, then queues a plain test message.
    ///
    /// Fails when email is not active, the connection test fails, or the
    /// queue rejects the message.
    pub async fn send_test_email(&self) -> Result<()> {
        let Some(notifier) = &self.notifier else {
            anyhow::bail!("email alerting is not active");
        };
        notifier
            .test_connection()
            .await
            .context("email connection test failed")?;
        self.logger.debug("Email connection test succeeded");

        let body = format!(
            "This is a test message from SystemMonitor on {}.\n\nIf you received it, email alerts are configured correctly.",
            sysinfo::System::host_name().unwrap_or_else(|| "unknown host".to_string())
        );
        if !notifier.send_immediate(TEST_EMAIL_SUBJECT, &body) {
            anyhow::bail!("test email could not be queued");
        }
        Ok(())
    }

    /// Waits for the shutdown signal, stops the monitor loop, then drains
    /// the email and log queues in that order.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.task_manager.get_shutdown_rx();
        while !*shutdown_rx.borrow() {
            if shutdown_rx.changed().await.is_err() {
                break;
            }
        }
        info!("Shutdown signal received. Waiting for tasks to complete...");

        self.task_manager.shutdown().await;

        if let Some(notifier) = &self.notifier {
            debug!(pending = notifier.queue_len(), "Draining email queue");
            notifier.shutdown().await;
        }
        debug!(pending = self.logger.queue_len(), "Draining log queue");
        self.logger.shutdown().await;

        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Separates constructing the components from running them, and lets tests
/// replace the OS counters, the email transport, the log sink and the
/// console writer.
pub struct AppBuilder {
    config: Config,
    source_override: Option<Box<dyn CounterSource>>,
    transport_override: Option<Arc<dyn EmailTransport>>,
    log_sink_override: Option<Box<dyn LogSink>>,
    display_writer_override: Option<Box<dyn Write + Send>>,
}

impl AppBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            source_override: None,
            transport_override: None,
            log_sink_override: None,
            display_writer_override: None,
        }
    }

    /// Overrides the OS counter source for testing.
    pub fn source_override(mut self, source: Box<dyn CounterSource>) -> Self {
        self.source_override = Some(source);
        self
    }

    /// Overrides the email transport for testing.
    pub fn transport_override(mut self, transport: Arc<dyn EmailTransport>) -> Self {
        self.transport_override = Some(transport);
        self
    }

    /// Overrides the log sink for testing.
    pub fn log_sink_override(mut self, sink: Box<dyn LogSink>) -> Self {
        self.log_sink_override = Some(sink);
        self
    }

    /// Sends console output to `writer` instead of stdout.
    pub fn display_writer(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.display_writer_override = Some(writer);
        self
    }

    /// Builds all components and spawns the monitor loop.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new(shutdown_rx);

        // =========================================================================
        // 1. Activity log
        // =========================================================================
        let sink: Box<dyn LogSink> = match self.log_sink_override {
            Some(sink) => sink,
            None => {
                if let Some(dir) = config.log.path.parent().filter(|d| !d.as_os_str().is_empty()) {
                    std::fs::create_dir_all(dir).with_context(|| {
                        format!("failed to create log directory {}", dir.display())
                    })?;
                }
                debug!(
                    path = %config.log.path.display(),
                    rotation = ?config.log.rotation,
                    "Initializing log file writer"
                );
                Box::new(LogFileWriter::new(
                    config.log.path.clone(),
                    config.log.rotation,
                    config.log.max_file_size_mb,
                    config.log.max_backup_files,
                ))
            }
        };
        let logger = Arc::new(ActivityLogger::start(sink, config.log.queue_capacity));

        // =========================================================================
        // 2. Email notifier
        // =========================================================================
        let notifier = if config.email.is_active() {
            let transport: Arc<dyn EmailTransport> = match self.transport_override {
                Some(transport) => transport,
                None => match &config.email.outbox_dir {
                    Some(dir) => Arc::new(OutboxTransport::new(dir.clone())),
                    None => Arc::new(
                        SmtpTransport::from_config(&config.email)
                            .context("failed to configure SMTP transport")?,
                    ),
                },
            };
            Some(Arc::new(EmailNotifier::start(
                config.email.clone(),
                config.monitor.interval(),
                transport,
                Some(logger.clone()),
            )))
        } else {
            if config.email.enabled {
                warn!("Email alerting is enabled but incomplete (sender, password, recipients or server missing); continuing without alerts");
                logger.debug("Email configuration invalid; alerts disabled");
            }
            None
        };

        // =========================================================================
        // 3. Monitor loop
        // =========================================================================
        let source: Box<dyn CounterSource> = match self.source_override {
            Some(source) => source,
            None => Box::new(SystemCounterSource::new()),
        };
        let display = match self.display_writer_override {
            Some(writer) => Display::with_writer(
                config.display.mode,
                config.display.sort,
                config.display.top,
                writer,
            ),
            None => Display::new(config.display.mode, config.display.sort, config.display.top),
        };
        let monitor = MonitorLoop::new(
            &config.monitor,
            source,
            logger.clone(),
            notifier.clone(),
            display,
        );
        task_manager.spawn("MonitorLoop", monitor.run(task_manager.get_shutdown_rx()));

        logger.debug(format!(
            "Monitoring started: CPU>{}% RAM>{}% Disk>{}% every {}ms",
            config.monitor.cpu_threshold,
            config.monitor.ram_threshold,
            config.monitor.disk_threshold,
            config.monitor.interval_ms
        ));

        Ok(App {
            task_manager,
            logger,
            notifier,
        })
    }
}
