#![allow(dead_code)]
use async_trait::async_trait;
use procwatch::core::{EmailMessage, EmailTransport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// An `EmailTransport` that records every message it is asked to send.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub sent: Arc<Mutex<Vec<EmailMessage>>>,
    pub notifier: Arc<Notify>,
    fail: Arc<AtomicBool>,
    refuse_connection: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Makes `test_connection` fail while sends keep working.
    pub fn set_refuse_connection(&self, refuse: bool) {
        self.refuse_connection.store(refuse, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.sent().into_iter().map(|m| m.subject).collect()
    }

    pub async fn wait_for_count(&self, target: usize, timeout_duration: Duration) {
        let wait = async {
            while self.sent.lock().unwrap().len() < target {
                self.notifier.notified().await;
            }
        };
        tokio::time::timeout(timeout_duration, wait)
            .await
            .expect("Timed out waiting for emails");
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    fn name(&self) -> &str {
        "recording_mock"
    }

    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("mock transport failure");
        }
        self.sent.lock().unwrap().push(message.clone());
        self.notifier.notify_one();
        Ok(())
    }

    async fn test_connection(&self) -> anyhow::Result<()> {
        if self.refuse_connection.load(Ordering::SeqCst) {
            anyhow::bail!("mock connection refused");
        }
        Ok(())
    }
}
