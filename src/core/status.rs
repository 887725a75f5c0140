use std::time::{Duration, Instant};

const DEFAULT_TTL: Duration = Duration::from_secs(4);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A transient message shown in the browser's status bar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub level: MessageLevel,
    shown_at: Instant,
    ttl: Duration,
}

impl StatusMessage {
    pub fn new(level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            level,
            shown_at: Instant::now(),
            // Errors stay up longer so they can be read
            ttl: match level {
                MessageLevel::Error => DEFAULT_TTL * 2,
                _ => DEFAULT_TTL,
            },
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(MessageLevel::Info, text)
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(MessageLevel::Success, text)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(MessageLevel::Warning, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(MessageLevel::Error, text)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.shown_at) >= self.ttl
    }
}
