//! CSV archive of the review log.
//!
//! Rolling up appends every logged review to `reviews.csv`, syncs it, and
//! renames the log to a timestamped `.processed` file next to it. The
//! store's snapshot is brought up to date first, so archived reviews never
//! need replaying.

use crate::review_log::read_reviews;
use crate::{CardStore, Error, Rating, Result, ReviewEvent, SchedulingState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// A row in the CSV archive
#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewRow {
    id: String,
    card_id: String,
    owner: String,
    rating: u8,
    time_spent_seconds: u32,
    reviewed_at: String,
    card_version: u64,
    ease: f64,
    interval: u32,
    repetitions: u32,
    due_at: String,
}

impl From<&ReviewEvent> for ReviewRow {
    fn from(event: &ReviewEvent) -> Self {
        ReviewRow {
            id: event.id.to_string(),
            card_id: event.card_id.to_string(),
            owner: event.owner.clone(),
            rating: event.rating.into(),
            time_spent_seconds: event.time_spent_seconds,
            reviewed_at: event.reviewed_at.to_rfc3339(),
            card_version: event.card_version,
            ease: event.after.ease,
            interval: event.after.interval,
            repetitions: event.after.repetitions,
            due_at: event.after.due_at.to_rfc3339(),
        }
    }
}

impl TryFrom<ReviewRow> for ReviewEvent {
    type Error = Error;

    fn try_from(row: ReviewRow) -> Result<Self> {
        let id = parse_uuid(&row.id)?;
        let card_id = parse_uuid(&row.card_id)?;

        Ok(ReviewEvent {
            id,
            card_id,
            owner: row.owner,
            rating: Rating::try_from(row.rating)?,
            time_spent_seconds: row.time_spent_seconds,
            reviewed_at: parse_time(&row.reviewed_at)?,
            card_version: row.card_version,
            after: SchedulingState {
                ease: row.ease,
                interval: row.interval,
                repetitions: row.repetitions,
                due_at: parse_time(&row.due_at)?,
            },
        })
    }
}

fn parse_uuid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Other(format!("Invalid UUID {:?}: {}", s, e)))
}

fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Other(format!("Invalid date {:?}: {}", s, e)))
}

/// Bring the store's snapshot up to date, then archive its review log
///
/// Runs under the store's exclusive lock so no grading can append while
/// the log is being moved.
pub fn archive_store_reviews(store: &CardStore) -> Result<usize> {
    let _lock = store.lock_exclusive()?;
    store.sync_locked()?;

    let log_path = store.log_path();
    if !log_path.exists() {
        tracing::info!("No review log at {:?}, nothing to roll up", log_path);
        return Ok(0);
    }
    reviews_to_csv_and_archive(&log_path, &store.archive_path())
}

/// Roll up logged reviews into CSV and archive the log
///
/// - CSV is fsynced before the log is renamed
/// - The log is renamed (not deleted) to allow manual recovery; every
///   rollup gets its own `.processed` file
pub fn reviews_to_csv_and_archive(log_path: &Path, csv_path: &Path) -> Result<usize> {
    let events = read_reviews(log_path)?;

    if events.is_empty() {
        tracing::info!("No reviews in log to roll up");
        return Ok(0);
    }

    if let Some(parent) = csv_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(csv_path)?;

    // Only a brand-new file gets a header row
    let needs_headers = file.metadata()?.len() == 0;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_headers)
        .from_writer(file);

    for event in &events {
        writer.serialize(ReviewRow::from(event))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    file.sync_all()?;

    tracing::info!("Wrote {} reviews to CSV", events.len());

    let archived_path = processed_path(log_path, Utc::now());
    std::fs::rename(log_path, &archived_path)?;

    tracing::info!("Archived review log to {:?}", archived_path);

    Ok(events.len())
}

/// `reviews.wal` -> `reviews.wal.<timestamp>.processed`, skipping names in use
fn processed_path(log_path: &Path, now: DateTime<Utc>) -> PathBuf {
    let name = log_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "reviews.wal".into());
    let stamp = now.format("%Y%m%dT%H%M%S%6f").to_string();

    let mut candidate = log_path.with_file_name(format!("{}.{}.processed", name, stamp));
    let mut suffix = 1;
    while candidate.exists() {
        candidate = log_path.with_file_name(format!("{}.{}-{}.processed", name, stamp, suffix));
        suffix += 1;
    }
    candidate
}

/// Remove archived `.processed` logs from `dir`
pub fn cleanup_processed_logs(dir: &Path) -> Result<usize> {
    if !dir.exists() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().is_some_and(|ext| ext == "processed") {
            std::fs::remove_file(&path)?;
            tracing::debug!("Removed processed log: {:?}", path);
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Cleaned up {} processed review logs", count);
    }

    Ok(count)
}
