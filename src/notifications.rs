//! Notifications
//!
//! Post-commit side effects. Each [`Notifier`] runs in its own task so one
//! failing or slow collaborator never affects another, and callers never wait
//! on delivery.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::civil::DateTime;
use mockall::automock;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::{
    bookings::models::{BookingType, BookingUuid},
    checkout::orders::OrderUuid,
    money::Price,
};

/// Errors raised by a notifier.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The delivery channel rejected or failed the message.
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The notifier is misconfigured.
    #[error("notifier unavailable: {0}")]
    Unavailable(String),
}

/// An event worth telling someone about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    OrderPlaced {
        order: OrderUuid,
        total: Price,
        email: String,
    },

    BookingConfirmed {
        booking: BookingUuid,
        starts_at: DateTime,
        kind: BookingType,
        party_size: u32,
        email: String,
    },
}

/// A delivery channel, such as email or a chat webhook.
#[automock]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Deliver a notification.
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Notifier that writes notifications to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        match notification {
            Notification::OrderPlaced { order, total, .. } => {
                info!(order = %order, total = %total, "order placed");
            }
            Notification::BookingConfirmed {
                booking,
                starts_at,
                party_size,
                ..
            } => {
                info!(booking = %booking, starts_at = %starts_at, party_size, "booking confirmed");
            }
        }

        Ok(())
    }
}

/// Fans a notification out to every registered notifier.
#[derive(Clone, Default)]
pub struct NotificationDispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field(
                "notifiers",
                &self.notifiers.iter().map(|n| n.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl NotificationDispatcher {
    /// Dispatcher with no notifiers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a notifier.
    #[must_use]
    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    /// Number of registered notifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    /// Whether no notifiers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }

    /// Spawn one delivery task per notifier. Failures are logged, never
    /// returned. Must be called from within a tokio runtime.
    pub fn dispatch(&self, notification: Notification) -> Dispatched {
        let notification = Arc::new(notification);

        let handles = self
            .notifiers
            .iter()
            .map(|notifier| {
                let notifier = Arc::clone(notifier);
                let notification = Arc::clone(&notification);

                tokio::spawn(async move {
                    if let Err(err) = notifier.notify(&notification).await {
                        error!(notifier = notifier.name(), error = %err, "notification failed");
                    }
                })
            })
            .collect();

        Dispatched { handles }
    }
}

/// Handles of in-flight deliveries. Dropping detaches them.
#[derive(Debug)]
pub struct Dispatched {
    handles: Vec<JoinHandle<()>>,
}

impl Dispatched {
    /// Wait for every delivery to finish.
    pub async fn finished(self) {
        for handle in self.handles {
            if let Err(err) = handle.await {
                error!(error = %err, "notification task panicked");
            }
        }
    }
}
