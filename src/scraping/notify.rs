//! Notification sink for user-visible errors.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scraping::error::ScrapeError;

/// A human-readable message keyed by a generated identifier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique id of this notification.
    pub id: Uuid,
    /// Short title.
    pub title: String,
    /// Message body, including the suggested remedy.
    pub message: String,
}

impl Notification {
    /// Create a notification with a fresh id.
    #[must_use]
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            message: message.into(),
        }
    }

    /// Describe a failed operation and how to recover from it.
    #[must_use]
    pub fn from_error(context: &str, err: &ScrapeError) -> Self {
        let remedy = err.remedy();
        let message = if remedy.is_empty() {
            format!("{context}: {err}.")
        } else {
            format!("{context}: {err}. {remedy}")
        };
        Self::new(err.title(), message)
    }
}

/// Receives notifications raised by the scraper.
pub trait Notifier: Send + Sync {
    /// Deliver a notification.
    fn notify(&self, notification: Notification);
}

/// Notifier that only writes to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        tracing::error!(
            id = %notification.id,
            title = %notification.title,
            "{}",
            notification.message
        );
    }
}

/// Notifier that keeps every notification in memory.
#[derive(Debug, Default)]
pub struct CollectingNotifier {
    received: Mutex<Vec<Notification>>,
}

impl CollectingNotifier {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Notifications received so far.
    #[must_use]
    pub fn received(&self) -> Vec<Notification> {
        self.received
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notification: Notification) {
        if let Ok(mut guard) = self.received.lock() {
            guard.push(notification);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_from_error() {
        let note = Notification::from_error("Failed to scrape 123", &ScrapeError::GuardPersists);
        assert_eq!(note.title, "Bot Protection Detected");
        assert!(note.message.starts_with("Failed to scrape 123"));
        assert!(note.message.contains("different network"));
    }

    #[test]
    fn test_notification_ids_are_unique() {
        let a = Notification::new("a", "b");
        let b = Notification::new("a", "b");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_collecting_notifier() {
        let notifier = CollectingNotifier::new();
        notifier.notify(Notification::new("t", "m"));
        notifier.notify(Notification::new("t2", "m2"));
        let received = notifier.received();
        assert_eq!(received.len(), 2);
        assert_eq!(received[1].title, "t2");
    }
}
