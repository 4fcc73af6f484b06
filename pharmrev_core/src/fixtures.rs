//! Demo deck for trying the system out.
//!
//! Loading is idempotent: a card is only inserted when the owner has no
//! card with the same deck and front text.

use crate::{Card, CardStore, NewCard, Result};
use chrono::{DateTime, Utc};

const DEMO_DECK: &str = "Pharmacology Basics";

const DEMO_CARDS: &[(&str, &str)] = &[
    (
        "Antidote for warfarin over-anticoagulation?",
        "Vitamin K (phytonadione); add prothrombin complex concentrate if bleeding",
    ),
    (
        "Antidote for heparin?",
        "Protamine sulfate",
    ),
    (
        "Antidote for acetaminophen overdose?",
        "N-acetylcysteine",
    ),
    (
        "Mechanism of action of ACE inhibitors?",
        "Block conversion of angiotensin I to angiotensin II",
    ),
    (
        "Classic dry-cough adverse effect is seen with which antihypertensive class?",
        "ACE inhibitors (bradykinin accumulation)",
    ),
    (
        "Therapeutic range for serum lithium (maintenance)?",
        "0.6 to 1.2 mEq/L",
    ),
    (
        "Which antibiotic class carries a boxed warning for tendon rupture?",
        "Fluoroquinolones",
    ),
    (
        "First-line oral agent for type 2 diabetes?",
        "Metformin",
    ),
];

/// Insert the demo deck for `owner`, returning how many cards were added
pub fn load_demo_fixtures(store: &CardStore, owner: &str, now: DateTime<Utc>) -> Result<usize> {
    let initial_ease = store.initial_ease();

    let inserted = store.update(|cards| {
        let mut inserted = 0;
        for (front, back) in DEMO_CARDS {
            let exists = cards
                .iter()
                .any(|c| c.owner == owner && c.deck == DEMO_DECK && c.front == *front);
            if exists {
                continue;
            }

            cards.push(Card::create(
                NewCard {
                    owner: owner.to_string(),
                    deck: DEMO_DECK.to_string(),
                    front: front.to_string(),
                    back: back.to_string(),
                },
                initial_ease,
                now,
            ));
            inserted += 1;
        }
        Ok(inserted)
    })?;

    tracing::info!("Loaded {} demo cards for {}", inserted, owner);
    Ok(inserted)
}
