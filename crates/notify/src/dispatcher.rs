use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::templates::{Branding, render};
use crate::{EmailMessage, Notification, Notifier};

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Notifications waiting for the worker beyond this are dropped.
    pub queue_capacity: usize,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub branding: Branding,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
            branding: Branding::default(),
        }
    }
}

/// What the worker got through before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub sent: u64,
    pub failed: u64,
}

/// Post-commit outbox for notifications.
///
/// [`Dispatcher::dispatch`] never blocks and never fails the caller. A single
/// worker task renders and delivers queued notifications, retrying transport
/// failures with exponential backoff. The worker exits once every
/// `Dispatcher` clone is dropped and the queue is drained.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    sender: mpsc::Sender<Notification>,
}

impl Dispatcher {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        config: DispatcherConfig,
    ) -> (Self, JoinHandle<DeliveryReport>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let worker = tokio::spawn(run_worker(receiver, notifier, config));
        (Self { sender }, worker)
    }

    /// Queues a notification. Returns `false` if it was dropped.
    pub fn dispatch(&self, notification: Notification) -> bool {
        let kind = notification.kind();
        match self.sender.try_send(notification) {
            Ok(()) => {
                debug!(kind, "notification queued");
                true
            }
            Err(TrySendError::Full(notification)) => {
                warn!(kind, to = %notification.recipient(), "notification queue full, dropping");
                metrics::counter!("notifications_total", "outcome" => "dropped").increment(1);
                false
            }
            Err(TrySendError::Closed(notification)) => {
                warn!(
                    kind,
                    to = %notification.recipient(),
                    "notification worker stopped, dropping"
                );
                metrics::counter!("notifications_total", "outcome" => "dropped").increment(1);
                false
            }
        }
    }
}

async fn run_worker(
    mut receiver: mpsc::Receiver<Notification>,
    notifier: Arc<dyn Notifier>,
    config: DispatcherConfig,
) -> DeliveryReport {
    let mut report = DeliveryReport::default();
    while let Some(notification) = receiver.recv().await {
        let message = render(&notification, &config.branding);
        if deliver(notifier.as_ref(), notification.kind(), &message, &config).await {
            report.sent += 1;
        } else {
            report.failed += 1;
        }
    }
    debug!(sent = report.sent, failed = report.failed, "notification worker stopped");
    report
}

async fn deliver(
    notifier: &dyn Notifier,
    kind: &'static str,
    message: &EmailMessage,
    config: &DispatcherConfig,
) -> bool {
    let max_attempts = config.max_attempts.max(1);
    let mut backoff = config.initial_backoff;

    for attempt in 1..=max_attempts {
        match notifier.send(message).await {
            Ok(()) => {
                debug!(kind, to = %message.to, attempt, "notification sent");
                metrics::counter!("notifications_total", "outcome" => "sent").increment(1);
                return true;
            }
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!(
                    kind,
                    to = %message.to,
                    attempt,
                    error = %e,
                    "notification send failed, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(config.max_backoff);
            }
            Err(e) => {
                error!(kind, to = %message.to, attempt, error = %e, "notification abandoned");
                break;
            }
        }
    }

    metrics::counter!("notifications_total", "outcome" => "failed").increment(1);
    false
}
