//! Time utilities for petlog
//!
//! Every time-sensitive computation reads the current instant through a
//! [`Clock`] so it can be pinned in tests. [`SystemClock`] is the wall clock
//! used in production; [`ManualClock`] is set and advanced by hand.
//!
//! Debug builds read `PETLOG_MOCK_TIME` (`YYYY-MM-DD HH:MM:SS`) once at
//! startup; [`now`] then runs from that instant at the normal rate:
//!
//! ```bash
//! PETLOG_MOCK_TIME="2025-10-31 09:38:00" petlog status
//! ```

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, TimeZone};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "PETLOG_MOCK_TIME";

/// Format accepted by `PETLOG_MOCK_TIME`
pub const MOCK_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shift applied to the wall clock, fixed on first use
static MOCK_SHIFT: OnceLock<Option<TimeDelta>> = OnceLock::new();

/// Parse a `PETLOG_MOCK_TIME` value as a local instant.
pub fn parse_mock_time(raw: &str) -> Option<DateTime<Local>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), MOCK_TIME_FORMAT).ok()?;
    Local.from_local_datetime(&naive).single()
}

fn mock_shift() -> Option<TimeDelta> {
    *MOCK_SHIFT.get_or_init(|| {
        if !cfg!(debug_assertions) {
            return None;
        }
        let raw = std::env::var(MOCK_TIME_ENV_VAR).ok()?;
        match parse_mock_time(&raw) {
            Some(start) => {
                let shift = start.signed_duration_since(Local::now());
                tracing::info!(mock_time = %raw, shift_secs = shift.num_seconds(), "Mock time enabled");
                Some(shift)
            }
            None => {
                tracing::warn!(
                    mock_time = %raw,
                    expected_format = MOCK_TIME_FORMAT,
                    "Ignoring unparsable mock time"
                );
                None
            }
        }
    })
}

/// Whether `PETLOG_MOCK_TIME` is in effect
pub fn is_mock_time_active() -> bool {
    mock_shift().is_some()
}

/// Current local time, shifted by the mock time in debug builds
pub fn now() -> DateTime<Local> {
    let wall = Local::now();
    mock_shift()
        .and_then(|shift| wall.checked_add_signed(shift))
        .unwrap_or(wall)
}

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Wall clock (honours `PETLOG_MOCK_TIME` in debug builds)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        now()
    }
}

/// Hand-driven clock for tests and previews
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Local>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Local>) {
        *self.lock() = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.lock();
        // Durations beyond chrono's range saturate instead of panicking
        let step = chrono::Duration::from_std(by).unwrap_or(chrono::Duration::MAX);
        if let Some(next) = current.checked_add_signed(step) {
            *current = next;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, DateTime<Local>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.lock()
    }
}

/// Format a DateTime as a wall-clock time, e.g. `14:30`.
pub fn format_clock_time(dt: &DateTime<Local>) -> String {
    dt.format("%H:%M").to_string()
}

/// Format a duration as whole hours and two-digit minutes, e.g. `3시간 05분`.
///
/// Hours never roll over into days; seconds are truncated.
pub fn format_hours_minutes(d: Duration) -> String {
    let total_secs = d.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;

    format!("{}시간 {:02}분", hours, minutes)
}
