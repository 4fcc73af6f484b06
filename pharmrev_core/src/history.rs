//! Study history over a recent window.
//!
//! Loads review events from both the live log and the CSV archive and
//! summarizes them per owner.

use crate::rollup::ReviewRow;
use crate::{Error, Rating, Result, ReviewEvent};
use chrono::{DateTime, TimeDelta, Utc};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::path::Path;

/// Aggregate of an owner's reviews
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StudySummary {
    pub total: usize,
    pub again: usize,
    pub hard: usize,
    pub good: usize,
    pub easy: usize,
    pub time_spent_seconds: u64,
    pub distinct_cards: usize,
}

impl StudySummary {
    /// Share of reviews that were not graded Again
    pub fn retention(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some((self.total - self.again) as f64 / self.total as f64)
        }
    }
}

/// Start of a `days`-long window ending at `now`
///
/// Non-positive windows and windows reaching past chrono's range are
/// rejected with `Error::Config`.
pub fn window_start(now: DateTime<Utc>, days: i64) -> Result<DateTime<Utc>> {
    if days <= 0 {
        return Err(Error::Config(format!(
            "history window must be at least 1 day, got {}",
            days
        )));
    }
    TimeDelta::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .ok_or_else(|| Error::Config(format!("history window of {} days is out of range", days)))
}

/// Load `owner`'s reviews from the last `days` days, newest first
///
/// Reviews present in both the log and the archive are counted once.
pub fn load_recent_reviews(
    log_path: &Path,
    csv_path: &Path,
    owner: &str,
    days: i64,
    now: DateTime<Utc>,
) -> Result<Vec<ReviewEvent>> {
    let cutoff = window_start(now, days)?;
    let mut events = Vec::new();
    let mut seen_ids = HashSet::new();

    let live = crate::review_log::read_reviews(log_path)?;
    let archived = if csv_path.exists() {
        load_reviews_from_csv(csv_path)?
    } else {
        Vec::new()
    };

    for event in live.into_iter().chain(archived) {
        if event.owner == owner && event.reviewed_at >= cutoff && seen_ids.insert(event.id) {
            events.push(event);
        }
    }

    events.sort_by(|a, b| b.reviewed_at.cmp(&a.reviewed_at));

    tracing::debug!(
        "Loaded {} reviews for {} from last {} days",
        events.len(),
        owner,
        days
    );

    Ok(events)
}

fn load_reviews_from_csv(path: &Path) -> Result<Vec<ReviewEvent>> {
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;

    let mut events = Vec::new();
    for result in reader.deserialize::<ReviewRow>() {
        match result {
            Ok(row) => match ReviewEvent::try_from(row) {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!("Failed to parse archived review: {}", e),
            },
            Err(e) => tracing::warn!("Failed to deserialize CSV row: {}", e),
        }
    }

    Ok(events)
}

/// Count reviews by rating, time spent and cards touched
pub fn summarize(events: &[ReviewEvent]) -> StudySummary {
    let mut summary = StudySummary::default();
    let mut cards = HashSet::new();

    for event in events {
        summary.total += 1;
        summary.time_spent_seconds += u64::from(event.time_spent_seconds);
        match event.rating {
            Rating::Again => summary.again += 1,
            Rating::Hard => summary.hard += 1,
            Rating::Good => summary.good += 1,
            Rating::Easy => summary.easy += 1,
        }
        cards.insert(event.card_id);
    }

    summary.distinct_cards = cards.len();
    summary
}
