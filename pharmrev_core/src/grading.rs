//! The grade operation: score a card, log the review, persist the new state.
//!
//! Ordering:
//! 1. Validate the rating (nothing is touched on failure)
//! 2. Take the store's exclusive lock so only one grading runs at a time
//! 3. Load the card, run the scheduler
//! 4. Append the review event (commit point)
//! 5. Rewrite the snapshot
//!
//! If step 5 fails the review is already durable in the log and the next
//! load rolls it forward, so the updated card is still returned.

use crate::review_log::ReviewSink;
use crate::scheduler::review_at;
use crate::{Card, CardStore, Error, Rating, Result, ReviewEvent};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// One grading action requested by a user
#[derive(Clone, Debug)]
pub struct GradeRequest {
    pub card_id: Uuid,
    pub owner: String,
    /// Raw rating, 1 (Again) to 4 (Easy)
    pub rating: u8,
    pub time_spent_seconds: u32,
}

/// Grade a card, writing the review to the store's own log
pub fn grade_card(store: &CardStore, request: &GradeRequest, now: DateTime<Utc>) -> Result<Card> {
    let mut log = store.review_log();
    grade_card_with(store, &mut log, request, now)
}

/// Grade a card, writing the review through `sink`
///
/// `sink` must feed the same log the store replays from.
pub fn grade_card_with<S>(
    store: &CardStore,
    sink: &mut S,
    request: &GradeRequest,
    now: DateTime<Utc>,
) -> Result<Card>
where
    S: ReviewSink + ?Sized,
{
    let rating = Rating::try_from(request.rating)?;

    let _lock = store.lock_exclusive()?;
    let (mut cards, _) = store.load_locked()?;

    let card = cards
        .iter_mut()
        .find(|c| c.id == request.card_id && c.owner == request.owner)
        .ok_or(Error::CardNotFound(request.card_id))?;

    let next = review_at(&card.schedule, rating, now);
    let event = ReviewEvent {
        id: Uuid::new_v4(),
        card_id: card.id,
        owner: request.owner.clone(),
        rating,
        time_spent_seconds: request.time_spent_seconds,
        reviewed_at: now,
        card_version: card.version + 1,
        after: next.clone(),
    };

    sink.append(&event)?;

    card.schedule = next;
    card.version = event.card_version;
    let updated = card.clone();

    if let Err(e) = store.write_snapshot(&cards) {
        tracing::warn!(
            "Review {} is logged but the snapshot write failed ({}); it will be replayed on next load",
            event.id,
            e
        );
    }

    tracing::info!(
        "Graded card {} as {}: interval {}d, ease {:.2}, due {}",
        updated.id,
        rating,
        updated.schedule.interval,
        updated.schedule.ease,
        updated.schedule.due_at
    );

    Ok(updated)
}
