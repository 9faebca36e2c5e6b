//! Transient messages for the status line

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// How long a message stays visible
pub const STATUS_TTL: Duration = Duration::from_secs(5);

const MAX_MESSAGES: usize = 16;

#[derive(Debug, Clone)]
pub struct StatusLog {
    enabled: bool,
    messages: VecDeque<(Instant, String)>,
}

impl StatusLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            messages: VecDeque::with_capacity(MAX_MESSAGES),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn push(&mut self, message: impl Into<String>) {
        self.push_at(Instant::now(), message);
    }

    pub fn push_at(&mut self, now: Instant, message: impl Into<String>) {
        if !self.enabled {
            return;
        }
        if self.messages.len() >= MAX_MESSAGES {
            self.messages.pop_front();
        }
        self.messages.push_back((now, message.into()));
    }

    /// Newest message younger than [`STATUS_TTL`]
    pub fn current(&self, now: Instant) -> Option<&str> {
        self.messages
            .back()
            .filter(|(at, _)| now.saturating_duration_since(*at) < STATUS_TTL)
            .map(|(_, message)| message.as_str())
    }

    /// Every retained message, oldest first
    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(|(_, message)| message.as_str())
    }

    pub fn count(&self, message: &str) -> usize {
        self.messages().filter(|m| *m == message).count()
    }
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::new(false)
    }
}
