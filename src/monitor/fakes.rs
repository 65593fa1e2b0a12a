//! Scripted collaborators for driving monitors in tests.

use super::*;
use crate::notify::NotifyError;
use crate::trace::{TraceError, TraceReport};

use async_trait::async_trait;
use chrono::{TimeDelta, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;

pub const FAKE_TRACE: &str = "HOST: fake  Loss%  Snt\n  1.|-- 192.0.2.1  100.0  10\n";

/// Returns scripted outcomes in order, repeating the last one once exhausted.
pub struct ScriptedProber {
    outcomes: Mutex<VecDeque<Result<(), ProbeError>>>,
    last: Mutex<Result<(), ProbeError>>,
}

impl ScriptedProber {
    pub fn new(outcomes: Vec<Result<(), ProbeError>>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            last: Mutex::new(Ok(())),
        }
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, _target: &Target, _timeout: Duration) -> Result<(), ProbeError> {
        let next = self.outcomes.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        if let Some(outcome) = next {
            *last = outcome;
        }
        last.clone()
    }
}

/// Fixed outcome per address family.
pub struct FamilyProber {
    pub outcomes: HashMap<AddressFamily, Result<(), ProbeError>>,
}

#[async_trait]
impl Prober for FamilyProber {
    async fn probe(&self, target: &Target, _timeout: Duration) -> Result<(), ProbeError> {
        self.outcomes.get(&target.family).cloned().unwrap_or(Ok(()))
    }
}

/// Records the addresses it was asked to trace.
#[derive(Default)]
pub struct RecordingTracer {
    calls: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl RecordingTracer {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_with(&self, output: &str) {
        *self.failure.lock().unwrap() = Some(output.to_string());
    }
}

#[async_trait]
impl Tracer for RecordingTracer {
    async fn capture(&self, address: &str) -> TraceReport {
        self.calls.lock().unwrap().push(address.to_string());
        match self.failure.lock().unwrap().clone() {
            Some(output) => TraceReport {
                output,
                error: Some(TraceError::Spawn {
                    program: "mtr".into(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
                }),
            },
            None => TraceReport {
                output: FAKE_TRACE.to_string(),
                error: None,
            },
        }
    }
}

/// Keeps every event it is handed, optionally reporting failure.
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<AlertEvent>>,
    fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn fail_all(&self) {
        *self.fail.lock().unwrap() = true;
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        if *self.fail.lock().unwrap() {
            return Err(NotifyError::Status(500));
        }
        Ok(())
    }
}

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
    clock: Clock,
}

impl ManualClock {
    pub fn new() -> Self {
        let now = Arc::new(Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()));
        let source = now.clone();
        let clock = Clock::with_source(chrono_tz::Europe::Berlin, move || *source.lock().unwrap());
        Self { now, clock }
    }

    pub fn advance(&self, by: TimeDelta) {
        *self.now.lock().unwrap() += by;
    }

    pub fn now(&self) -> DateTime<Tz> {
        self.clock.now()
    }

    pub fn clock(&self) -> Clock {
        self.clock.clone()
    }
}

/// Fake collaborators wired into a shared context.
pub struct Harness {
    pub clock: ManualClock,
    pub tracer: Arc<RecordingTracer>,
    pub notifier: Arc<RecordingNotifier>,
    pub context: Arc<MonitorContext>,
    _tmp: tempfile::TempDir,
}

impl Harness {
    pub fn new(outcomes: Vec<Result<(), ProbeError>>) -> Self {
        Self::with_prober(Arc::new(ScriptedProber::new(outcomes)))
    }

    pub fn with_prober(prober: Arc<dyn Prober>) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let clock = ManualClock::new();
        let tracer = Arc::new(RecordingTracer::default());
        let notifier = Arc::new(RecordingNotifier::default());

        let context = Arc::new(MonitorContext {
            settings: MonitorSettings {
                interval: Duration::from_secs(30),
                timeout: Duration::from_secs(2),
                trace_dir: tmp.path().join("mtr"),
                clock: clock.clock(),
            },
            prober,
            tracer: tracer.clone(),
            notifier: notifier.clone(),
        });

        Self {
            clock,
            tracer,
            notifier,
            context,
            _tmp: tmp,
        }
    }

    /// Same fakes with a different probe interval.
    pub fn with_interval(self, interval: Duration) -> Self {
        let old = &self.context;
        let context = Arc::new(MonitorContext {
            settings: MonitorSettings {
                interval,
                ..old.settings.clone()
            },
            prober: old.prober.clone(),
            tracer: old.tracer.clone(),
            notifier: old.notifier.clone(),
        });
        Self { context, ..self }
    }

    pub fn monitor(&self, target: Target) -> TargetMonitor {
        TargetMonitor::new(target, self.context.clone())
    }

    pub fn trace_dir(&self) -> &Path {
        &self.context.settings.trace_dir
    }
}
