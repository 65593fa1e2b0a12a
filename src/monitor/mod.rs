//! Per-target monitoring state machine.
//!
//! Each target is `Up` until a probe fails, then `Down` until a probe
//! succeeds. Only the edges produce side effects: a log line, an optional
//! route trace (timeouts only) and one alert.

mod models;

#[cfg(test)]
pub(crate) mod fakes;

pub use models::*;

use crate::clock::{format_duration, round_to_seconds, Clock};
use crate::notify::{AlertEvent, AlertKind, Notifier};
use crate::probe::{ProbeError, Prober};
use crate::trace::{self, Tracer};

use chrono::DateTime;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Text sent in place of a trace when the failure was not a timeout.
pub const NO_TRACE_PLACEHOLDER: &str = "no mtr (non-timeout error)";

/// Settings shared by every monitor loop.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub interval: Duration,
    pub timeout: Duration,
    pub trace_dir: PathBuf,
    pub clock: Clock,
}

/// Settings plus the collaborators a monitor drives.
pub struct MonitorContext {
    pub settings: MonitorSettings,
    pub prober: Arc<dyn Prober>,
    pub tracer: Arc<dyn Tracer>,
    pub notifier: Arc<dyn Notifier>,
}

/// Edge taken by one check cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentDown,
    Recovered { downtime: Duration },
}

/// Owns one target and its state for the lifetime of its loop.
pub struct TargetMonitor {
    target: Target,
    state: TargetState,
    context: Arc<MonitorContext>,
}

impl TargetMonitor {
    pub fn new(target: Target, context: Arc<MonitorContext>) -> Self {
        Self {
            target,
            state: TargetState::Up,
            context,
        }
    }

    pub fn state(&self) -> &TargetState {
        &self.state
    }

    /// Probe once and apply the transition rule.
    pub async fn check(&mut self) -> Option<Transition> {
        let settings = &self.context.settings;
        let now = settings.clock.now();
        let result = self.context.prober.probe(&self.target, settings.timeout).await;

        match (self.state, result) {
            (TargetState::Up, Ok(())) | (TargetState::Down { .. }, Err(_)) => None,
            (TargetState::Up, Err(e)) => {
                self.went_down(e, now).await;
                Some(Transition::WentDown)
            }
            (TargetState::Down { since }, Ok(())) => {
                let downtime = self.recovered(since, now).await;
                Some(Transition::Recovered { downtime })
            }
        }
    }

    async fn went_down(&mut self, error: ProbeError, now: DateTime<Tz>) {
        self.state = TargetState::Down { since: now };
        tracing::warn!("DOWN {} error={}", self.target, error);

        let trace = if error.is_timeout() {
            self.capture_trace(now).await
        } else {
            NO_TRACE_PLACEHOLDER.to_string()
        };

        self.send(
            now,
            AlertKind::Down {
                error: error.to_string(),
                trace,
            },
        )
        .await;
    }

    async fn recovered(&mut self, since: DateTime<Tz>, now: DateTime<Tz>) -> Duration {
        let downtime = round_to_seconds(now.signed_duration_since(since));
        self.state = TargetState::Up;
        tracing::info!("UP {} after {}", self.target, format_duration(downtime));

        self.send(now, AlertKind::Up { downtime }).await;
        downtime
    }

    async fn capture_trace(&self, now: DateTime<Tz>) -> String {
        let report = self.context.tracer.capture(&self.target.address).await;
        if let Some(e) = &report.error {
            tracing::warn!("mtr error for {}: {}", self.target.address, e);
        }

        if !report.output.is_empty() {
            let dir = &self.context.settings.trace_dir;
            match trace::persist(dir, &report.output, &now, &self.target).await {
                Ok(path) => tracing::info!("saved mtr for {} to {}", self.target, path.display()),
                Err(e) => tracing::error!("{}", e),
            }
        }

        report.output
    }

    async fn send(&self, now: DateTime<Tz>, kind: AlertKind) {
        let settings = &self.context.settings;
        let event = AlertEvent {
            target: self.target.clone(),
            at: now,
            interval: settings.interval,
            timeout: settings.timeout,
            kind,
        };

        if let Err(e) = self.context.notifier.notify(&event).await {
            tracing::error!("error sending {} alert for {}: {}", event.status(), self.target, e);
        }
    }

    /// Check, wait the interval, repeat until `stop` fires.
    pub async fn run(mut self, mut stop: broadcast::Receiver<()>) {
        // Stagger loop starts so targets are not probed in lockstep
        let jitter = rand::random::<u64>() % 100;
        tokio::time::sleep(Duration::from_millis(jitter)).await;

        let interval = self.context.settings.interval;

        loop {
            tokio::select! {
                _ = stop.recv() => break,
                _ = self.check() => {}
            }
            tokio::select! {
                _ = stop.recv() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        tracing::debug!("monitor for {} stopped", self.target);
    }
}
