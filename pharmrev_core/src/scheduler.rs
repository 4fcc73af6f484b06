//! SM-2 style review scheduler.
//!
//! Maps a card's current scheduling state and a rating to the next state:
//! - Ease moves by the SM-2 easiness update, floored at 1.3
//! - A failing rating resets the streak and the interval to one day
//! - Passing ratings step through 1 day, 6 days, then `interval × ease`
//!
//! The scheduler holds no state and does no I/O beyond reading the clock.

use crate::{Rating, Result, SchedulingState};
use chrono::{DateTime, Days, Utc};

/// Lowest ease a card can reach
pub const MIN_EASE: f64 = 1.3;

/// Longest interval the scheduler will hand out (about a century)
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Grade a card now, validating the raw rating first
///
/// Ratings outside 1..=4 are rejected with `Error::InvalidRating` before
/// any computation happens.
pub fn review(state: &SchedulingState, rating: u8) -> Result<SchedulingState> {
    let rating = Rating::try_from(rating)?;
    Ok(review_at(state, rating, Utc::now()))
}

/// Grade a card as of `now`
///
/// Intervals are capped at `MAX_INTERVAL_DAYS` (36 500 days), so a long run
/// of Easy grades eventually stops growing instead of overflowing `due_at`.
pub fn review_at(state: &SchedulingState, rating: Rating, now: DateTime<Utc>) -> SchedulingState {
    let q = f64::from(rating.quality());

    let ease = next_ease(state.ease, q);

    // Repetitions first: the interval branch depends on the new streak
    let repetitions = if rating.is_failing() {
        0
    } else {
        state.repetitions.saturating_add(1)
    };

    let interval = if rating.is_failing() {
        1
    } else {
        match repetitions {
            0 | 1 => 1,
            2 => 6,
            _ => grown_interval(state.interval, ease),
        }
    };

    let due_at = add_calendar_days(now, interval);

    tracing::trace!(
        "review {:?}: ease {:.2} -> {:.2}, reps {} -> {}, interval {} -> {}",
        rating,
        state.ease,
        ease,
        state.repetitions,
        repetitions,
        state.interval,
        interval
    );

    SchedulingState {
        ease,
        interval,
        repetitions,
        due_at,
    }
}

/// SM-2 easiness update
fn next_ease(ease: f64, q: f64) -> f64 {
    let miss = 5.0 - q;
    (ease + (0.1 - miss * (0.08 + miss * 0.02))).max(MIN_EASE)
}

/// `round(previous_interval × ease)`, kept within 1..=MAX_INTERVAL_DAYS
fn grown_interval(previous: u32, ease: f64) -> u32 {
    let grown = (f64::from(previous) * ease).round();
    grown.clamp(1.0, f64::from(MAX_INTERVAL_DAYS)) as u32
}

/// Add whole days on the calendar, keeping the time of day
fn add_calendar_days(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    now.checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
