//! Activity schedule engine
//!
//! Turns a recurring activity's last occurrence and cycle length into a
//! status for "now". Classification works on durations only; the display
//! strings are produced separately by [`describe_status`].

use chrono::{DateTime, Local, TimeDelta};
use petlog_api::{ActivityKind, ActivitySchedule};
use petlog_util::format_hours_minutes;
use std::time::Duration;

/// Window after the due time during which an activity is `Due` rather than `Overdue`
pub const GRACE_WINDOW: Duration = Duration::from_secs(3600);

/// Derived status of a scheduled activity; never stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityStatus {
    /// The next occurrence is still ahead
    Upcoming { remaining: Duration },
    /// Due now, or less than [`GRACE_WINDOW`] past due
    Due,
    /// More than [`GRACE_WINDOW`] past due
    Overdue { elapsed: Duration },
}

impl ActivityStatus {
    /// Due or overdue
    pub fn needs_attention(&self) -> bool {
        !matches!(self, ActivityStatus::Upcoming { .. })
    }
}

/// Signed time until the activity is due (negative once past due).
///
/// Saturates instead of overflowing for extreme timestamps or cycles.
pub fn time_until_due(schedule: &ActivitySchedule, now: DateTime<Local>) -> TimeDelta {
    let since_now = schedule.last_event_time.signed_duration_since(now);
    TimeDelta::try_hours(i64::from(schedule.cycle_hours))
        .and_then(|cycle| since_now.checked_add(&cycle))
        .unwrap_or(TimeDelta::MAX)
}

/// Classify a schedule at `now`.
pub fn derive_status(schedule: &ActivitySchedule, now: DateTime<Local>) -> ActivityStatus {
    let delta = time_until_due(schedule, now);
    let grace = TimeDelta::seconds(GRACE_WINDOW.as_secs() as i64);

    if delta > TimeDelta::zero() {
        ActivityStatus::Upcoming {
            remaining: to_std(delta),
        }
    } else if delta > -grace {
        ActivityStatus::Due
    } else {
        ActivityStatus::Overdue {
            elapsed: to_std(delta.abs()),
        }
    }
}

/// Like [`derive_status`], but a just-completed activity reports a full cycle ahead.
pub fn derive_status_with_override(
    schedule: &ActivitySchedule,
    now: DateTime<Local>,
    just_completed: bool,
) -> ActivityStatus {
    if just_completed {
        return ActivityStatus::Upcoming {
            remaining: cycle_duration(schedule.cycle_hours),
        };
    }
    derive_status(schedule, now)
}

pub fn cycle_duration(cycle_hours: u32) -> Duration {
    Duration::from_secs(u64::from(cycle_hours) * 3600)
}

fn to_std(delta: TimeDelta) -> Duration {
    delta.to_std().unwrap_or(Duration::ZERO)
}

/// Card headline for a scheduled activity, e.g. `다음 밥 시간까지 3시간 05분 남았어요`.
///
/// `pet_name` is used by the feeding reminder.
pub fn describe_status(kind: ActivityKind, status: &ActivityStatus, pet_name: &str) -> String {
    match (kind, status) {
        (ActivityKind::Feeding, ActivityStatus::Upcoming { remaining }) => {
            format!("다음 밥 시간까지 {} 남았어요", format_hours_minutes(*remaining))
        }
        (ActivityKind::Feeding, ActivityStatus::Due) => format!("{} 밥을 챙겨주세요", pet_name),
        (ActivityKind::Feeding, ActivityStatus::Overdue { elapsed }) => {
            format!("급여 시간부터 {} 지났어요", format_hours_minutes(*elapsed))
        }
        (_, ActivityStatus::Upcoming { remaining }) => {
            format!("다음 물 교체까지 {} 남았어요", format_hours_minutes(*remaining))
        }
        (_, ActivityStatus::Due) => "물을 교체 할 시간이에요".to_string(),
        (_, ActivityStatus::Overdue { elapsed }) => {
            format!("교체 시간부터 {} 지났어요", format_hours_minutes(*elapsed))
        }
    }
}

/// Card headline for the elimination tally
pub fn describe_elimination(count_today: u32) -> String {
    format!("배변 횟수: {}번", count_today)
}
