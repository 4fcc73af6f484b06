//! Append-only review log.
//!
//! Review events are appended to a JSONL (JSON Lines) file with file
//! locking to ensure safe concurrent access. A line reaching disk is the
//! commit point of a grading action.

use crate::{Result, ReviewEvent};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Review sink trait for persisting review events
pub trait ReviewSink {
    fn append(&mut self, event: &ReviewEvent) -> Result<()>;
}

/// JSONL-based review log with file locking
pub struct JsonlReviewLog {
    path: PathBuf,
}

impl JsonlReviewLog {
    /// Create a new JSONL review log for the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl ReviewSink for JsonlReviewLog {
    fn append(&mut self, event: &ReviewEvent) -> Result<()> {
        self.ensure_parent_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        // Serialize before writing so a failed encode leaves no partial line
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let write_result = (|| -> Result<()> {
            let mut writer = std::io::BufWriter::new(&file);
            writer.write_all(line.as_bytes())?;
            writer.flush()?;
            drop(writer);
            file.sync_data()?;
            Ok(())
        })();

        file.unlock()?;
        write_result?;

        tracing::debug!("Appended review {} for card {}", event.id, event.card_id);
        Ok(())
    }
}

/// Read all review events from a log file
pub fn read_reviews(path: &Path) -> Result<Vec<ReviewEvent>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    file.lock_shared()?;

    let reader = BufReader::new(&file);
    let mut events = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<ReviewEvent>(&line) {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::warn!("Failed to parse review at line {}: {}", line_num + 1, e);
            }
        }
    }

    file.unlock()?;
    tracing::debug!("Read {} reviews from {:?}", events.len(), path);
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Rating, SchedulingState};
    use chrono::Utc;
    use uuid::Uuid;

    fn create_test_event(rating: Rating) -> ReviewEvent {
        ReviewEvent {
            id: Uuid::new_v4(),
            card_id: Uuid::new_v4(),
            owner: "demo".into(),
            rating,
            time_spent_seconds: 12,
            reviewed_at: Utc::now(),
            card_version: 1,
            after: SchedulingState::new(2.5, Utc::now()),
        }
    }

    #[test]
    fn test_append_and_read_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("wal").join("reviews.wal");

        let event = create_test_event(Rating::Hard);
        let mut log = JsonlReviewLog::new(&log_path);
        log.append(&event).unwrap();
        log.append(&create_test_event(Rating::Easy)).unwrap();

        let events = read_reviews(&log_path).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], event);
        assert_eq!(events[1].rating, Rating::Easy);
    }

    #[test]
    fn test_rating_serialized_as_number() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("reviews.wal");

        JsonlReviewLog::new(&log_path)
            .append(&create_test_event(Rating::Good))
            .unwrap();

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("\"rating\":3"));
    }

    #[test]
    fn test_skips_corrupt_lines() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("reviews.wal");

        let mut log = JsonlReviewLog::new(&log_path);
        log.append(&create_test_event(Rating::Again)).unwrap();
        {
            let mut file = OpenOptions::new().append(true).open(&log_path).unwrap();
            file.write_all(b"{\"id\": \"truncated").unwrap();
            file.write_all(b"\n").unwrap();
        }
        log.append(&create_test_event(Rating::Good)).unwrap();

        let events = read_reviews(&log_path).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_rejects_out_of_range_rating_on_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let log_path = temp_dir.path().join("reviews.wal");

        let mut line = serde_json::to_string(&create_test_event(Rating::Good)).unwrap();
        line = line.replace("\"rating\":3", "\"rating\":9");
        std::fs::write(&log_path, format!("{}\n", line)).unwrap();

        assert!(read_reviews(&log_path).unwrap().is_empty());
    }

    #[test]
    fn test_read_missing_log() {
        let temp_dir = tempfile::tempdir().unwrap();
        let events = read_reviews(&temp_dir.path().join("nonexistent.wal")).unwrap();
        assert!(events.is_empty());
    }
}
