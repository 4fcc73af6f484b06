//! Core domain types for the pharmrev study system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Ratings a learner gives when grading a card
//! - Per-card scheduling state
//! - Cards and decks
//! - Immutable review events

use crate::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Rating
// ============================================================================

/// Recall-quality judgment supplied when grading a card
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "u8", into = "u8")]
pub enum Rating {
    Again = 1,
    Hard = 2,
    Good = 3,
    Easy = 4,
}

impl Rating {
    pub const ALL: [Rating; 4] = [Rating::Again, Rating::Hard, Rating::Good, Rating::Easy];

    /// SM-2 quality score on the 0–5 scale
    pub fn quality(self) -> u8 {
        match self {
            Rating::Again => 1,
            Rating::Hard => 3,
            Rating::Good => 4,
            Rating::Easy => 5,
        }
    }

    /// Whether this rating breaks the learning streak
    pub fn is_failing(self) -> bool {
        self.quality() < 3
    }

    pub fn name(self) -> &'static str {
        match self {
            Rating::Again => "Again",
            Rating::Hard => "Hard",
            Rating::Good => "Good",
            Rating::Easy => "Easy",
        }
    }
}

impl TryFrom<u8> for Rating {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Rating::Again),
            2 => Ok(Rating::Hard),
            3 => Ok(Rating::Good),
            4 => Ok(Rating::Easy),
            other => Err(Error::InvalidRating(other)),
        }
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating as u8
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Scheduling State
// ============================================================================

/// Ease assigned to new cards unless configured otherwise
pub const DEFAULT_INITIAL_EASE: f64 = 2.5;

/// Per-card spaced-repetition state
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SchedulingState {
    pub ease: f64,
    pub interval: u32,
    pub repetitions: u32,
    pub due_at: DateTime<Utc>,
}

impl SchedulingState {
    /// State for a freshly created card: due immediately, never reviewed
    pub fn new(initial_ease: f64, now: DateTime<Utc>) -> Self {
        Self {
            ease: initial_ease,
            interval: 0,
            repetitions: 0,
            due_at: now,
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.due_at <= now
    }
}

// ============================================================================
// Cards
// ============================================================================

/// A flashcard together with its scheduling state
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Card {
    pub id: Uuid,
    pub owner: String,
    pub deck: String,
    pub front: String,
    pub back: String,
    #[serde(default)]
    pub hidden: bool,
    pub created_at: DateTime<Utc>,
    pub schedule: SchedulingState,
    /// Number of grading actions applied to this card
    #[serde(default)]
    pub version: u64,
}

/// Input for creating a card
#[derive(Clone, Debug)]
pub struct NewCard {
    pub owner: String,
    pub deck: String,
    pub front: String,
    pub back: String,
}

impl Card {
    pub fn create(new: NewCard, initial_ease: f64, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: new.owner,
            deck: new.deck,
            front: new.front,
            back: new.back,
            hidden: false,
            created_at: now,
            schedule: SchedulingState::new(initial_ease, now),
            version: 0,
        }
    }
}

// ============================================================================
// Review Events
// ============================================================================

/// One grading action, appended to the review log and never changed
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ReviewEvent {
    pub id: Uuid,
    pub card_id: Uuid,
    pub owner: String,
    pub rating: Rating,
    pub time_spent_seconds: u32,
    pub reviewed_at: DateTime<Utc>,
    /// Card version after this review was applied
    pub card_version: u64,
    /// Scheduling state produced by this review
    pub after: SchedulingState,
}
