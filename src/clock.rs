//! Timezone-aware time source.
//!
//! Every component that stamps an event (log timer, alert builder, state
//! machine) receives a [`Clock`] explicitly instead of reading a process-wide
//! zone.

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Zone used when the configuration does not name one.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Berlin;

/// Source of the current time, rendered in a fixed zone.
#[derive(Clone)]
pub struct Clock {
    zone: Tz,
    source: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl Clock {
    /// Wall clock in the given zone.
    pub fn new(zone: Tz) -> Self {
        Self {
            zone,
            source: Arc::new(Utc::now),
        }
    }

    /// Clock driven by a custom source, e.g. a manually advanced instant.
    #[cfg(test)]
    pub fn with_source<F>(zone: Tz, source: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self {
            zone,
            source: Arc::new(source),
        }
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    pub fn now(&self) -> DateTime<Tz> {
        (self.source)().with_timezone(&self.zone)
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clock").field("zone", &self.zone).finish()
    }
}

/// Round an elapsed span to whole seconds, half away from zero.
///
/// Negative spans (clock stepped backwards) clamp to zero.
pub fn round_to_seconds(elapsed: TimeDelta) -> Duration {
    let millis = elapsed.num_milliseconds();
    if millis <= 0 {
        return Duration::ZERO;
    }
    Duration::from_secs(((millis + 500) / 1000) as u64)
}

/// Render a whole-second duration as `1h2m3s`, `2m5s` or `45s`.
pub fn format_duration(d: Duration) -> String {
    let total = d.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
