//! Due-card selection.
//!
//! Picks the cards a study session should show next: the owner's visible
//! cards whose due timestamp has passed, earliest-due first.

use crate::Card;
use chrono::{DateTime, Utc};

/// Select up to `limit` due cards for `owner`, ordered by due timestamp
///
/// Ties on the due timestamp fall back to creation time and then id so the
/// order is stable across calls.
pub fn select_due<'a, I>(cards: I, owner: &str, now: DateTime<Utc>, limit: usize) -> Vec<&'a Card>
where
    I: IntoIterator<Item = &'a Card>,
{
    let mut due: Vec<&Card> = cards
        .into_iter()
        .filter(|c| c.owner == owner && !c.hidden && c.schedule.is_due(now))
        .collect();

    due.sort_by(|a, b| {
        a.schedule
            .due_at
            .cmp(&b.schedule.due_at)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
    due.truncate(limit);

    tracing::debug!("Selected {} due cards for {}", due.len(), owner);
    due
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NewCard, DEFAULT_INITIAL_EASE};
    use chrono::Duration;

    fn card(owner: &str, front: &str, due_offset_hours: i64, now: DateTime<Utc>) -> Card {
        let mut card = Card::create(
            NewCard {
                owner: owner.into(),
                deck: "Cardiology".into(),
                front: front.into(),
                back: "answer".into(),
            },
            DEFAULT_INITIAL_EASE,
            now - Duration::days(30),
        );
        card.schedule.due_at = now + Duration::hours(due_offset_hours);
        card
    }

    #[test]
    fn test_orders_earliest_due_first() {
        let now = Utc::now();
        let cards = vec![
            card("ana", "b", -1, now),
            card("ana", "a", -48, now),
            card("ana", "c", -5, now),
        ];

        let due = select_due(&cards, "ana", now, 10);
        let fronts: Vec<_> = due.iter().map(|c| c.front.as_str()).collect();
        assert_eq!(fronts, vec!["a", "c", "b"]);
    }

    #[test]
    fn test_excludes_future_hidden_and_foreign_cards() {
        let now = Utc::now();
        let mut hidden = card("ana", "hidden", -3, now);
        hidden.hidden = true;
        let cards = vec![
            card("ana", "future", 2, now),
            hidden,
            card("ben", "other owner", -3, now),
            card("ana", "exactly now", 0, now),
        ];

        let due = select_due(&cards, "ana", now, 10);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].front, "exactly now");
    }

    #[test]
    fn test_truncates_to_limit() {
        let now = Utc::now();
        let cards: Vec<_> = (0..8)
            .map(|i| card("ana", &format!("card {}", i), -(i as i64) - 1, now))
            .collect();

        let due = select_due(&cards, "ana", now, 3);
        assert_eq!(due.len(), 3);
        assert_eq!(due[0].front, "card 7");
        assert_eq!(due[2].front, "card 5");
    }

    #[test]
    fn test_zero_limit_selects_nothing() {
        let now = Utc::now();
        let cards = vec![card("ana", "a", -1, now)];
        assert!(select_due(&cards, "ana", now, 0).is_empty());
    }
}
