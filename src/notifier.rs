//! Transient toast notifications.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{info, warn};

/// How long a toast stays up unless dismissed.
pub const TOAST_LIFETIME: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub level: Level,
    pub message: String,
    pub raised_at: Instant,
}

#[derive(Debug)]
pub struct Notifier {
    active: VecDeque<Notification>,
    next_id: u64,
    lifetime: Duration,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(TOAST_LIFETIME)
    }
}

impl Notifier {
    pub fn new(lifetime: Duration) -> Self {
        Self {
            active: VecDeque::new(),
            next_id: 0,
            lifetime,
        }
    }

    pub fn notify(&mut self, level: Level, message: impl Into<String>) -> Notification {
        self.notify_at(level, message, Instant::now())
    }

    pub fn notify_at(
        &mut self,
        level: Level,
        message: impl Into<String>,
        now: Instant,
    ) -> Notification {
        let message = message.into();
        match level {
            Level::Error => warn!(%message, "notification"),
            Level::Info | Level::Success => info!(%message, "notification"),
        }

        self.next_id += 1;
        let notification = Notification {
            id: self.next_id,
            level,
            message,
            raised_at: now,
        };
        self.active.push_back(notification.clone());
        notification
    }

    /// Drop toasts that outlived their lifetime. Returns how many were removed.
    pub fn expire(&mut self, now: Instant) -> usize {
        let before = self.active.len();
        let lifetime = self.lifetime;
        self.active
            .retain(|n| now.saturating_duration_since(n.raised_at) < lifetime);
        before - self.active.len()
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.active.len();
        self.active.retain(|n| n.id != id);
        before != self.active.len()
    }

    pub fn active(&self) -> impl Iterator<Item = &Notification> {
        self.active.iter()
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
