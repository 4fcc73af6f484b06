use chrono::Utc;
use clap::{Parser, Subcommand};
use pharmrev_core::rollup::{archive_store_reviews, cleanup_processed_logs};
use pharmrev_core::*;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "pharmrev")]
#[command(about = "Spaced-repetition flashcards for pharmacy study", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Study as this user instead of the configured owner
    #[arg(long, global = true)]
    owner: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the demo pharmacology deck (safe to repeat)
    Seed,

    /// Add a card
    Add {
        #[arg(long)]
        deck: String,
        #[arg(long)]
        front: String,
        #[arg(long)]
        back: String,
    },

    /// List cards
    List {
        /// Only show this deck
        #[arg(long)]
        deck: Option<String>,
    },

    /// Show per-deck counts
    Decks,

    /// Show cards due now, earliest first
    Due {
        /// Maximum number of cards (defaults to study.due_limit)
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Grade a card: 1 = Again, 2 = Hard, 3 = Good, 4 = Easy
    Grade {
        card_id: Uuid,
        rating: u8,

        /// Seconds spent on the card
        #[arg(long, default_value_t = 0)]
        time_spent: u32,
    },

    /// Hide a card from study sessions
    Hide {
        card_id: Uuid,

        /// Make a hidden card visible again
        #[arg(long)]
        unhide: bool,
    },

    /// Summarize recent reviews
    History {
        /// Window in days (defaults to study.history_days)
        #[arg(long)]
        days: Option<i64>,
    },

    /// Roll up the review log to CSV
    Rollup {
        /// Clean up processed logs after rollup
        #[arg(long)]
        cleanup: bool,
    },
}

fn main() -> Result<()> {
    pharmrev_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    config.validate()?;
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| config.data.data_dir.clone());
    let owner = cli.owner.unwrap_or_else(|| config.study.owner.clone());

    let store = CardStore::open(data_dir, config.scheduler.initial_ease)?;

    match cli.command {
        Commands::Seed => cmd_seed(&store, &owner),
        Commands::Add { deck, front, back } => cmd_add(&store, &owner, deck, front, back),
        Commands::List { deck } => cmd_list(&store, &owner, deck.as_deref()),
        Commands::Decks => cmd_decks(&store, &owner),
        Commands::Due { limit } => {
            cmd_due(&store, &owner, limit.unwrap_or(config.study.due_limit))
        }
        Commands::Grade {
            card_id,
            rating,
            time_spent,
        } => cmd_grade(&store, &owner, card_id, rating, time_spent),
        Commands::Hide { card_id, unhide } => cmd_hide(&store, &owner, card_id, !unhide),
        Commands::History { days } => {
            cmd_history(&store, &owner, days.unwrap_or(config.study.history_days))
        }
        Commands::Rollup { cleanup } => cmd_rollup(&store, cleanup),
    }
}

fn cmd_seed(store: &CardStore, owner: &str) -> Result<()> {
    let added = load_demo_fixtures(store, owner, Utc::now())?;
    if added == 0 {
        println!("Demo deck already loaded for {}", owner);
    } else {
        println!("✓ Loaded {} demo cards for {}", added, owner);
    }
    Ok(())
}

fn cmd_add(store: &CardStore, owner: &str, deck: String, front: String, back: String) -> Result<()> {
    let card = store.add_card(
        NewCard {
            owner: owner.to_string(),
            deck,
            front,
            back,
        },
        Utc::now(),
    )?;
    println!("✓ Added card {}", card.id);
    Ok(())
}

fn cmd_list(store: &CardStore, owner: &str, deck: Option<&str>) -> Result<()> {
    let cards = store.list_cards(owner, deck)?;
    if cards.is_empty() {
        println!("No cards.");
        return Ok(());
    }

    for card in &cards {
        let marker = if card.hidden { " (hidden)" } else { "" };
        println!("{}  [{}] {}{}", card.id, card.deck, card.front, marker);
        println!(
            "    ease {:.2}, interval {}d, streak {}, due {}",
            card.schedule.ease,
            card.schedule.interval,
            card.schedule.repetitions,
            card.schedule.due_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn cmd_decks(store: &CardStore, owner: &str) -> Result<()> {
    let decks = store.decks(owner, Utc::now())?;
    if decks.is_empty() {
        println!("No decks.");
        return Ok(());
    }

    for deck in decks {
        println!(
            "{}: {} cards, {} due, {} hidden",
            deck.deck, deck.total, deck.due, deck.hidden
        );
    }
    Ok(())
}

fn cmd_due(store: &CardStore, owner: &str, limit: usize) -> Result<()> {
    let due = store.due_cards(owner, Utc::now(), limit)?;
    if due.is_empty() {
        println!("Nothing due. Come back later!");
        return Ok(());
    }

    println!("{} card(s) due:", due.len());
    for card in due {
        println!("{}  [{}] {}", card.id, card.deck, card.front);
    }
    Ok(())
}

fn cmd_grade(
    store: &CardStore,
    owner: &str,
    card_id: Uuid,
    rating: u8,
    time_spent: u32,
) -> Result<()> {
    let request = GradeRequest {
        card_id,
        owner: owner.to_string(),
        rating,
        time_spent_seconds: time_spent,
    };
    let card = grade_card(store, &request, Utc::now())?;

    println!("✓ Graded: {}", card.front);
    println!("  Answer: {}", card.back);
    println!(
        "  Next review in {} day(s) ({}), ease {:.2}, streak {}",
        card.schedule.interval,
        card.schedule.due_at.format("%Y-%m-%d"),
        card.schedule.ease,
        card.schedule.repetitions
    );
    Ok(())
}

fn cmd_hide(store: &CardStore, owner: &str, card_id: Uuid, hidden: bool) -> Result<()> {
    let card = store.set_hidden(card_id, owner, hidden)?;
    if hidden {
        println!("✓ Hid card {}", card.id);
    } else {
        println!("✓ Restored card {}", card.id);
    }
    Ok(())
}

fn cmd_history(store: &CardStore, owner: &str, days: i64) -> Result<()> {
    if days <= 0 {
        return Err(Error::Config(format!(
            "--days must be a positive number of days, got {}",
            days
        )));
    }

    // Keep a rollup from moving the log while it is read
    let _lock = store.lock_shared()?;
    let events = load_recent_reviews(
        &store.log_path(),
        &store.archive_path(),
        owner,
        days,
        Utc::now(),
    )?;
    let summary = summarize(&events);

    println!("Last {} days for {}:", days, owner);
    println!(
        "  {} reviews across {} cards ({} min)",
        summary.total,
        summary.distinct_cards,
        summary.time_spent_seconds / 60
    );
    println!(
        "  Again {} / Hard {} / Good {} / Easy {}",
        summary.again, summary.hard, summary.good, summary.easy
    );
    if let Some(retention) = summary.retention() {
        println!("  Retention: {:.0}%", retention * 100.0);
    }
    Ok(())
}

fn cmd_rollup(store: &CardStore, cleanup: bool) -> Result<()> {
    let count = archive_store_reviews(store)?;
    if count == 0 {
        println!("No reviews to roll up.");
    } else {
        println!("✓ Rolled up {} reviews to CSV", count);
        println!("  CSV: {}", store.archive_path().display());
    }

    if cleanup {
        let cleaned = cleanup_processed_logs(&store.log_dir())?;
        if cleaned > 0 {
            println!("✓ Cleaned up {} processed review logs", cleaned);
        }
    }
    Ok(())
}
