//! Activity log: stdout plus the rotating log file, stamped in the configured zone.

mod rotating;

pub use rotating::*;

use crate::clock::Clock;

use std::fmt;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default location of the activity log.
pub const DEFAULT_LOG_PATH: &str = "portwatch.log";

/// Log line timestamps rendered through the shared [`Clock`].
#[derive(Debug, Clone)]
pub struct ZonedTimer {
    clock: Clock,
}

impl ZonedTimer {
    pub fn new(clock: Clock) -> Self {
        Self { clock }
    }
}

impl FormatTime for ZonedTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", self.clock.now().format("%Y/%m/%d %H:%M:%S"))
    }
}

/// Install the global subscriber writing to stdout and to `sink`.
pub fn init(sink: LogSink, clock: Clock) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let timer = ZonedTimer::new(clock);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("portwatch=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_timer(timer.clone()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_timer(timer)
                .with_writer(sink),
        )
        .try_init()?;

    Ok(())
}
