use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{EmailMessage, NotifyError, Result};

/// Delivers rendered emails.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Logs messages instead of sending them. Used when SMTP is not configured.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "SMTP not configured, email logged instead of sent"
        );
        tracing::debug!(body = %message.text, "email body");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RecordingState {
    sent: Vec<EmailMessage>,
    attempts: u32,
    failures_remaining: u32,
}

/// Notifier for testing. Keeps every delivered message in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    state: Arc<Mutex<RecordingState>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose first `failures` sends fail with a transport error.
    pub fn failing_first(failures: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(RecordingState {
                failures_remaining: failures,
                ..Default::default()
            })),
        }
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.state.lock().await.sent.clone()
    }

    /// Number of send calls, successful or not.
    pub async fn attempts(&self) -> u32 {
        self.state.lock().await.attempts
    }

    /// Waits until at least `count` messages are delivered, or `timeout` passes.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<EmailMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let sent = self.sent().await;
            if sent.len() >= count || tokio::time::Instant::now() >= deadline {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let mut state = self.state.lock().await;
        state.attempts += 1;
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(NotifyError::Transport("connection refused".to_string()));
        }
        state.sent.push(message.clone());
        Ok(())
    }
}
