//! Process-wide daily batch counter.
//!
//! Counts batches (not alerts, not parts) relayed since the start of the
//! current day. The reset is lazy: every `observe` checks whether 24 hours
//! have passed since the window began, so there is no timer task racing
//! with concurrent increments.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Length of one accounting window.
pub const WINDOW_HOURS: i64 = 24;

/// Counter values for one batch, used to render the part headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Batches relayed in the current window, this one included.
    pub count: u64,
    /// Number of alerts in this batch.
    pub alerts: usize,
}

/// Read-only view for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterStatus {
    pub count: u64,
    pub window_start: DateTime<Tz>,
}

#[derive(Debug)]
struct CounterState {
    count: u64,
    window_start: DateTime<Tz>,
}

/// Daily counter shared by all request tasks.
///
/// The read-check-reset-increment sequence runs under a single mutex.
/// The lock is never held across an await point.
#[derive(Debug)]
pub struct DailyCounter {
    state: Mutex<CounterState>,
    timezone: Tz,
}

impl DailyCounter {
    /// Create a counter whose first window starts today in `timezone`.
    pub fn new(timezone: Tz) -> Self {
        Self::starting_at(timezone, Utc::now())
    }

    /// Create a counter whose first window starts on the day of `now`.
    pub fn starting_at(timezone: Tz, now: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(CounterState {
                count: 0,
                window_start: start_of_day(now, timezone),
            }),
            timezone,
        }
    }

    /// Record one batch of `alerts` alerts at the current time.
    pub fn observe(&self, alerts: usize) -> CounterSnapshot {
        self.observe_at(Utc::now(), alerts)
    }

    /// Record one batch at `now`.
    ///
    /// Resets the count first if `now` is at least 24 hours past the window
    /// start, moving the window to the start of `now`'s day.
    pub fn observe_at(&self, now: DateTime<Utc>, alerts: usize) -> CounterSnapshot {
        let mut state = self.lock();

        if now >= state.window_start + TimeDelta::hours(WINDOW_HOURS) {
            tracing::info!(
                previous_count = state.count,
                window_start = %state.window_start,
                "Daily counter window elapsed, resetting"
            );
            state.count = 0;
            state.window_start = start_of_day(now, self.timezone);
        }

        state.count += 1;
        let count = state.count;
        drop(state);

        metrics::gauge!("g2ww_daily_count").set(count as f64);

        CounterSnapshot { count, alerts }
    }

    /// Count and window as they stand now.
    pub fn status(&self) -> CounterStatus {
        self.status_at(Utc::now())
    }

    /// Count and window as seen at `now`, without mutating anything.
    ///
    /// An elapsed window reads as zero batches since `now`'s local midnight;
    /// the stored state only moves on the next `observe`.
    pub fn status_at(&self, now: DateTime<Utc>) -> CounterStatus {
        let state = self.lock();
        if now >= state.window_start + TimeDelta::hours(WINDOW_HOURS) {
            CounterStatus {
                count: 0,
                window_start: start_of_day(now, self.timezone),
            }
        } else {
            CounterStatus {
                count: state.count,
                window_start: state.window_start,
            }
        }
    }

    /// Batches counted in the current window.
    pub fn current(&self) -> u64 {
        self.status().count
    }

    /// Start of the current window.
    pub fn window_start(&self) -> DateTime<Tz> {
        self.status().window_start
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    fn lock(&self) -> MutexGuard<'_, CounterState> {
        // Nothing panics between the two field writes.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Midnight of `now`'s date in `timezone`.
///
/// Falls back to `now` itself on days where local midnight does not exist.
fn start_of_day(now: DateTime<Utc>, timezone: Tz) -> DateTime<Tz> {
    let local = now.with_timezone(&timezone);
    local
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| timezone.from_local_datetime(&midnight).earliest())
        .unwrap_or(local)
}
