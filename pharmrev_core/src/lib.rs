#![forbid(unsafe_code)]

//! Core domain model and business logic for the pharmrev study system.
//!
//! This crate provides:
//! - Domain types (ratings, scheduling state, cards, review events)
//! - The SM-2 style review scheduler
//! - Due-card selection and the grade operation
//! - Persistence (card snapshot, review log, CSV archive)
//! - Study history and demo fixtures

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod scheduler;
pub mod selection;
pub mod review_log;
pub mod store;
pub mod grading;
pub mod history;
pub mod rollup;
pub mod fixtures;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use scheduler::{review, review_at};
pub use selection::select_due;
pub use review_log::{JsonlReviewLog, ReviewSink};
pub use store::{CardStore, DeckSummary};
pub use grading::{grade_card, GradeRequest};
pub use history::{load_recent_reviews, summarize, window_start, StudySummary};
pub use fixtures::load_demo_fixtures;
