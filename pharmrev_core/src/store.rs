//! File-backed card store with locking and roll-forward recovery.
//!
//! Layout under the data directory:
//! - `cards.json`: snapshot of every card, replaced atomically
//! - `wal/reviews.wal`: append-only review log (see `review_log`)
//! - `reviews.csv`: archived review events (see `rollup`)
//! - `store.lock`: exclusive for mutations, shared for reads
//!
//! The review log is written before the snapshot. Loading replays any logged
//! review whose `card_version` is ahead of the snapshot, so a grading action
//! whose snapshot write never landed is still applied.

use crate::review_log::{read_reviews, JsonlReviewLog};
use crate::selection::select_due;
use crate::{Card, Error, NewCard, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

const CARDS_FILE: &str = "cards.json";
const LOG_DIR: &str = "wal";
const LOG_FILE: &str = "reviews.wal";
const ARCHIVE_FILE: &str = "reviews.csv";
const LOCK_FILE: &str = "store.lock";

/// On-disk snapshot format
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    cards: Vec<Card>,
}

/// Per-deck counts for one owner
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeckSummary {
    pub deck: String,
    pub total: usize,
    pub due: usize,
    pub hidden: usize,
}

/// Held store lock; released on drop
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!("Failed to release store lock: {}", e);
        }
    }
}

/// Card persistence rooted at a data directory
#[derive(Clone, Debug)]
pub struct CardStore {
    data_dir: PathBuf,
    initial_ease: f64,
}

impl CardStore {
    /// Open (creating if needed) a store in `data_dir`
    pub fn open(data_dir: impl Into<PathBuf>, initial_ease: f64) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(data_dir.join(LOG_DIR))?;
        tracing::debug!("Opened card store at {:?}", data_dir);
        Ok(Self {
            data_dir,
            initial_ease,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cards_path(&self) -> PathBuf {
        self.data_dir.join(CARDS_FILE)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR)
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_dir().join(LOG_FILE)
    }

    pub fn archive_path(&self) -> PathBuf {
        self.data_dir.join(ARCHIVE_FILE)
    }

    pub fn initial_ease(&self) -> f64 {
        self.initial_ease
    }

    /// Review log writer for this store
    pub fn review_log(&self) -> JsonlReviewLog {
        JsonlReviewLog::new(self.log_path())
    }

    // ------------------------------------------------------------------------
    // Locking
    // ------------------------------------------------------------------------

    fn open_lock_file(&self) -> Result<File> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.data_dir.join(LOCK_FILE))?;
        Ok(file)
    }

    /// Block until no other reader or writer holds the store
    pub fn lock_exclusive(&self) -> Result<StoreLock> {
        let file = self.open_lock_file()?;
        file.lock_exclusive()?;
        Ok(StoreLock { file })
    }

    /// Block until no writer holds the store
    pub fn lock_shared(&self) -> Result<StoreLock> {
        let file = self.open_lock_file()?;
        file.lock_shared()?;
        Ok(StoreLock { file })
    }

    // ------------------------------------------------------------------------
    // Snapshot I/O (callers hold the lock)
    // ------------------------------------------------------------------------

    fn read_snapshot(&self) -> Result<Vec<Card>> {
        let path = self.cards_path();
        if !path.exists() {
            tracing::debug!("No card snapshot at {:?}, starting empty", path);
            return Ok(Vec::new());
        }

        let contents = std::fs::read_to_string(&path)?;
        let snapshot: Snapshot = serde_json::from_str(&contents).map_err(|e| {
            Error::Store(format!("corrupt card snapshot {:?}: {}", path, e))
        })?;
        Ok(snapshot.cards)
    }

    /// Atomically replace the snapshot (temp file, fsync, rename)
    pub(crate) fn write_snapshot(&self, cards: &[Card]) -> Result<()> {
        let path = self.cards_path();
        let mut temp = NamedTempFile::new_in(&self.data_dir)?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file_mut());
            serde_json::to_writer(&mut writer, &SnapshotRef { cards })?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved {} cards to {:?}", cards.len(), path);
        Ok(())
    }

    /// Snapshot plus every logged review it has not seen yet
    ///
    /// Returns the cards and the number of reviews replayed.
    pub(crate) fn load_locked(&self) -> Result<(Vec<Card>, usize)> {
        let mut cards = self.read_snapshot()?;
        let events = read_reviews(&self.log_path())?;
        if events.is_empty() {
            return Ok((cards, 0));
        }

        let mut index: BTreeMap<Uuid, usize> = BTreeMap::new();
        for (i, card) in cards.iter().enumerate() {
            index.insert(card.id, i);
        }

        let mut replayed = 0;
        for event in events {
            let Some(&i) = index.get(&event.card_id) else {
                tracing::warn!(
                    "Review {} refers to unknown card {}, ignoring",
                    event.id,
                    event.card_id
                );
                continue;
            };
            let card = &mut cards[i];
            if event.card_version > card.version {
                card.schedule = event.after;
                card.version = event.card_version;
                replayed += 1;
            }
        }

        if replayed > 0 {
            tracing::info!("Rolled {} logged reviews forward into the snapshot", replayed);
        }
        Ok((cards, replayed))
    }

    // ------------------------------------------------------------------------
    // Public operations
    // ------------------------------------------------------------------------

    /// All cards, including reviews not yet folded into the snapshot
    pub fn load(&self) -> Result<Vec<Card>> {
        let _lock = self.lock_shared()?;
        let (cards, _) = self.load_locked()?;
        Ok(cards)
    }

    /// Load, modify and save the cards under the exclusive lock
    pub fn update<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Vec<Card>) -> Result<T>,
    {
        let _lock = self.lock_exclusive()?;
        let (mut cards, _) = self.load_locked()?;
        let out = f(&mut cards)?;
        self.write_snapshot(&cards)?;
        Ok(out)
    }

    /// Fold any pending logged reviews into the snapshot
    ///
    /// Returns the number of reviews replayed.
    pub fn sync(&self) -> Result<usize> {
        let _lock = self.lock_exclusive()?;
        self.sync_locked()
    }

    pub(crate) fn sync_locked(&self) -> Result<usize> {
        let (cards, replayed) = self.load_locked()?;
        if replayed > 0 {
            self.write_snapshot(&cards)?;
        }
        Ok(replayed)
    }

    /// Create a card with a fresh scheduling state, due immediately
    pub fn add_card(&self, new: NewCard, now: DateTime<Utc>) -> Result<Card> {
        validate_new_card(&new)?;
        let card = Card::create(new, self.initial_ease, now);
        let added = card.clone();

        self.update(move |cards| {
            cards.push(card);
            Ok(())
        })?;

        tracing::info!("Added card {} to deck {:?}", added.id, added.deck);
        Ok(added)
    }

    /// Fetch one of `owner`'s cards
    pub fn get_card(&self, id: Uuid, owner: &str) -> Result<Card> {
        self.load()?
            .into_iter()
            .find(|c| c.id == id && c.owner == owner)
            .ok_or(Error::CardNotFound(id))
    }

    /// `owner`'s cards, optionally limited to one deck, by deck then age
    pub fn list_cards(&self, owner: &str, deck: Option<&str>) -> Result<Vec<Card>> {
        let mut cards: Vec<Card> = self
            .load()?
            .into_iter()
            .filter(|c| c.owner == owner && deck.map_or(true, |d| c.deck == d))
            .collect();
        cards.sort_by(|a, b| {
            a.deck
                .cmp(&b.deck)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(cards)
    }

    /// Hide a card from (or restore it to) study sessions
    pub fn set_hidden(&self, id: Uuid, owner: &str, hidden: bool) -> Result<Card> {
        let card = self.update(|cards| {
            let card = cards
                .iter_mut()
                .find(|c| c.id == id && c.owner == owner)
                .ok_or(Error::CardNotFound(id))?;
            card.hidden = hidden;
            Ok(card.clone())
        })?;

        tracing::info!("Set hidden={} on card {}", hidden, id);
        Ok(card)
    }

    /// Cards to study now, earliest due first
    pub fn due_cards(&self, owner: &str, now: DateTime<Utc>, limit: usize) -> Result<Vec<Card>> {
        let cards = self.load()?;
        Ok(select_due(&cards, owner, now, limit)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Per-deck totals for `owner`, sorted by deck name
    pub fn decks(&self, owner: &str, now: DateTime<Utc>) -> Result<Vec<DeckSummary>> {
        let mut decks: BTreeMap<String, DeckSummary> = BTreeMap::new();
        for card in self.load()?.iter().filter(|c| c.owner == owner) {
            let entry = decks
                .entry(card.deck.clone())
                .or_insert_with(|| DeckSummary {
                    deck: card.deck.clone(),
                    total: 0,
                    due: 0,
                    hidden: 0,
                });
            entry.total += 1;
            if card.hidden {
                entry.hidden += 1;
            } else if card.schedule.is_due(now) {
                entry.due += 1;
            }
        }
        Ok(decks.into_values().collect())
    }
}

/// Borrowing twin of `Snapshot` so saving does not clone every card
#[derive(Serialize)]
struct SnapshotRef<'a> {
    cards: &'a [Card],
}

fn validate_new_card(new: &NewCard) -> Result<()> {
    let fields = [
        ("owner", &new.owner),
        ("deck", &new.deck),
        ("front", &new.front),
        ("back", &new.back),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(Error::InvalidCard(format!("{} must not be empty", name)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review_log::ReviewSink;
    use crate::{Rating, ReviewEvent, SchedulingState};
    use chrono::Duration;

    fn new_card(owner: &str, deck: &str, front: &str) -> NewCard {
        NewCard {
            owner: owner.into(),
            deck: deck.into(),
            front: front.into(),
            back: "back".into(),
        }
    }

    fn open_store(dir: &Path) -> CardStore {
        CardStore::open(dir, 2.5).unwrap()
    }

    #[test]
    fn test_add_and_get_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path());
        let now = Utc::now();

        let card = store
            .add_card(new_card("demo", "Antibiotics", "Vancomycin class?"), now)
            .unwrap();

        assert_eq!(card.schedule.interval, 0);
        assert_eq!(card.schedule.repetitions, 0);
        assert_eq!(card.schedule.due_at, now);
        assert_eq!(card.version, 0);

        let loaded = store.get_card(card.id, "demo").unwrap();
        assert_eq!(loaded, card);
    }

    #[test]
    fn test_new_card_uses_configured_ease() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = CardStore::open(temp_dir.path(), 2.1).unwrap();
        let card = store
            .add_card(new_card("demo", "Renal", "Loop diuretic site?"), Utc::now())
            .unwrap();
        assert!((card.schedule.ease - 2.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rejects_blank_card_fields() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path());
        let result = store.add_card(new_card("demo", "  ", "front"), Utc::now());
        assert!(matches!(result, Err(Error::InvalidCard(_))));
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn test_get_card_checks_owner() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path());
        let card = store
            .add_card(new_card("ana", "CNS", "SSRI example?"), Utc::now())
            .unwrap();

        let result = store.get_card(card.id, "ben");
        assert!(matches!(result, Err(Error::CardNotFound(id)) if id == card.id));
    }

    #[test]
    fn test_hidden_cards_are_not_due() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path());
        let now = Utc::now();
        let a = store.add_card(new_card("demo", "CNS", "a"), now).unwrap();
        store.add_card(new_card("demo", "CNS", "b"), now).unwrap();

        store.set_hidden(a.id, "demo", true).unwrap();
        let due = store.due_cards("demo", now, 10).unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].front, "b");

        store.set_hidden(a.id, "demo", false).unwrap();
        assert_eq!(store.due_cards("demo", now, 10).unwrap().len(), 2);
    }

    #[test]
    fn test_deck_summaries() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path());
        let now = Utc::now();
        store.add_card(new_card("demo", "Renal", "a"), now).unwrap();
        let hidden = store.add_card(new_card("demo", "Renal", "b"), now).unwrap();
        store.add_card(new_card("demo", "Cardio", "c"), now).unwrap();
        store.add_card(new_card("other", "Cardio", "d"), now).unwrap();
        store.set_hidden(hidden.id, "demo", true).unwrap();

        let decks = store.decks("demo", now).unwrap();
        assert_eq!(
            decks,
            vec![
                DeckSummary { deck: "Cardio".into(), total: 1, due: 1, hidden: 0 },
                DeckSummary { deck: "Renal".into(), total: 2, due: 1, hidden: 1 },
            ]
        );
    }

    #[test]
    fn test_list_cards_filters_by_deck() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path());
        let now = Utc::now();
        store.add_card(new_card("demo", "Renal", "a"), now).unwrap();
        store.add_card(new_card("demo", "Cardio", "b"), now).unwrap();

        assert_eq!(store.list_cards("demo", None).unwrap().len(), 2);
        let renal = store.list_cards("demo", Some("Renal")).unwrap();
        assert_eq!(renal.len(), 1);
        assert_eq!(renal[0].front, "a");
    }

    #[test]
    fn test_corrupt_snapshot_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path());
        std::fs::write(store.cards_path(), "{ not json").unwrap();

        assert!(matches!(store.load(), Err(Error::Store(_))));
        // Adding must not overwrite the unreadable snapshot
        assert!(store.add_card(new_card("demo", "CNS", "a"), Utc::now()).is_err());
        assert_eq!(std::fs::read_to_string(store.cards_path()).unwrap(), "{ not json");
    }

    #[test]
    fn test_logged_review_rolls_forward() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path());
        let now = Utc::now();
        let card = store.add_card(new_card("demo", "CNS", "a"), now).unwrap();

        // A committed review whose snapshot write never happened
        let after = SchedulingState {
            ease: 2.5,
            interval: 1,
            repetitions: 1,
            due_at: now + Duration::days(1),
        };
        store
            .review_log()
            .append(&ReviewEvent {
                id: Uuid::new_v4(),
                card_id: card.id,
                owner: "demo".into(),
                rating: Rating::Good,
                time_spent_seconds: 4,
                reviewed_at: now,
                card_version: 1,
                after: after.clone(),
            })
            .unwrap();

        let loaded = store.get_card(card.id, "demo").unwrap();
        assert_eq!(loaded.schedule, after);
        assert_eq!(loaded.version, 1);

        assert_eq!(store.sync().unwrap(), 1);
        assert_eq!(store.sync().unwrap(), 0);
    }

    #[test]
    fn test_stale_logged_review_is_not_reapplied() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path());
        let now = Utc::now();
        let card = store.add_card(new_card("demo", "CNS", "a"), now).unwrap();

        store
            .update(|cards| {
                cards[0].version = 3;
                cards[0].schedule.repetitions = 3;
                Ok(())
            })
            .unwrap();

        store
            .review_log()
            .append(&ReviewEvent {
                id: Uuid::new_v4(),
                card_id: card.id,
                owner: "demo".into(),
                rating: Rating::Again,
                time_spent_seconds: 4,
                reviewed_at: now,
                card_version: 2,
                after: SchedulingState::new(2.5, now),
            })
            .unwrap();

        let loaded = store.get_card(card.id, "demo").unwrap();
        assert_eq!(loaded.version, 3);
        assert_eq!(loaded.schedule.repetitions, 3);
    }

    #[test]
    fn test_snapshot_write_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path());
        store.add_card(new_card("demo", "CNS", "a"), Utc::now()).unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| !matches!(name.as_str(), "cards.json" | "store.lock" | "wal"))
            .collect();
        assert!(extras.is_empty(), "unexpected files: {:?}", extras);
    }
}
