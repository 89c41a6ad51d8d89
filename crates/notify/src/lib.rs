//! Customer notifications.
//!
//! Services hand a [`Notification`] to the [`Dispatcher`] after their
//! transaction commits. Rendering and delivery happen on a background worker,
//! so a slow or failing mail server never affects the request that caused
//! the notification.

pub mod dispatcher;
pub mod error;
pub mod message;
pub mod notifier;
pub mod smtp;
pub mod templates;

pub use dispatcher::{DeliveryReport, Dispatcher, DispatcherConfig};
pub use error::{NotifyError, Result};
pub use message::{EmailMessage, Notification};
pub use notifier::{LogNotifier, Notifier, RecordingNotifier};
pub use smtp::{SmtpConfig, SmtpNotifier};
pub use templates::{Branding, render};
