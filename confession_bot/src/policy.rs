//! Pure decision logic over a [`Submitter`]'s state. Nothing in here touches
//! the database; callers fetch the state atomically and write back the results.
//!
//! [`Submitter`]: crate::types::Submitter

use std::fmt::Display;

use chrono::{DateTime, TimeDelta, Utc};

/// Length of the submission quota window, in days.
pub const QUOTA_WINDOW_DAYS: i64 = 7;

fn quota_window() -> TimeDelta {
    TimeDelta::days(QUOTA_WINDOW_DAYS)
}

/// Division of a positive duration by a unit, rounding up. Zero or negative
/// durations yield zero.
fn ceil_div(duration: TimeDelta, unit: TimeDelta) -> u32 {
    let (duration, unit) = (duration.num_milliseconds(), unit.num_milliseconds());
    if duration <= 0 {
        return 0;
    }
    u32::try_from((duration + unit - 1) / unit).unwrap_or(u32::MAX)
}

/// State of a submitter's temporary block at some moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// No block set.
    Clear,
    /// Blocked, with this many whole hours left, rounded up.
    Active { remaining_hours: u32 },
    /// A block is set but has run out, and should be cleared.
    Expired,
}

impl BlockState {
    pub fn of(blocked_until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match blocked_until {
            None => BlockState::Clear,
            Some(until) if until > now => BlockState::Active {
                remaining_hours: ceil_div(until - now, TimeDelta::hours(1)).max(1),
            },
            Some(_) => BlockState::Expired,
        }
    }
}

/// True if the quota window that started at `window_start` is over, or if
/// there's no window yet.
pub fn quota_window_expired(window_start: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    window_start.map_or(true, |start| now - start >= quota_window())
}

/// Whole days, rounded up, until the window that started at `window_start`
/// is over.
pub fn days_until_reset(window_start: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    ceil_div(window_start + quota_window() - now, TimeDelta::days(1))
}

/// Consequence of a rejection, decided by the strike count after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrikeTier {
    /// Just the rejection notice.
    Notice,
    /// Rejection notice with a warning about upcoming blocks.
    Warning,
    /// Temporary block for this many hours.
    Blocked { hours: u32 },
    /// Permanent ban.
    Banned,
}

impl StrikeTier {
    pub fn for_strike_count(strike_count: u32) -> Self {
        match strike_count {
            0..=2 => StrikeTier::Notice,
            3..=4 => StrikeTier::Warning,
            5 => StrikeTier::Blocked { hours: 24 },
            6 => StrikeTier::Blocked { hours: 48 },
            7..=9 => StrikeTier::Blocked { hours: 72 },
            _ => StrikeTier::Banned,
        }
    }

    /// When a block of this tier, applied at `now`, runs out.
    pub fn block_until(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            StrikeTier::Blocked { hours } => Some(now + TimeDelta::hours(hours.into())),
            _ => None,
        }
    }
}

impl Display for StrikeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrikeTier::Notice => write!(f, "notice only"),
            StrikeTier::Warning => write!(f, "warning"),
            StrikeTier::Blocked { hours } => write!(f, "blocked for {hours}h"),
            StrikeTier::Banned => write!(f, "permanently banned"),
        }
    }
}
