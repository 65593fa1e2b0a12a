//! Alert delivery for reachability transitions.

mod discord;
mod webhook;

pub use discord::*;
pub use webhook::*;

use crate::monitor::Target;

use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use std::time::Duration;
use thiserror::Error;

/// Notification delivery errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("webhook status {0}")]
    Status(u16),
}

/// What happened to the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertKind {
    Down { error: String, trace: String },
    Up { downtime: Duration },
}

/// One transition, ready to be rendered and sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertEvent {
    pub target: Target,
    pub at: DateTime<Tz>,
    pub interval: Duration,
    pub timeout: Duration,
    pub kind: AlertKind,
}

impl AlertEvent {
    /// `DOWN` or `UP`.
    pub fn status(&self) -> &'static str {
        match self.kind {
            AlertKind::Down { .. } => "DOWN",
            AlertKind::Up { .. } => "UP",
        }
    }
}

/// Delivers alerts to an external endpoint.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError>;
}
