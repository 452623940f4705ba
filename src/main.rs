//! Party Matcher - Demo Binary
//!
//! Runs one guild through a full match lifecycle and prints the events the
//! transport layer would receive.
//!
//! ```text
//! RUST_LOG=party_matcher=debug cargo run -- [config.toml]
//! ```

use party_matcher::engine::{ArrivalOutcome, ConfirmOutcome, MatchEvent};
use party_matcher::types::{GuildId, KeyBracket, KeyRange, ParticipantId, QueueEntry, Role};
use party_matcher::{EngineResult, MatchConfig, Matchmaker};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> EngineResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,party_matcher=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => MatchConfig::load(path)?,
        None => MatchConfig::default(),
    };
    let bounds = config.key_levels;
    let range = KeyBracket::High
        .to_range(&bounds)
        .unwrap_or(KeyRange::new(bounds.min, bounds.max));
    let engine = Matchmaker::new(config)?;
    let guild = GuildId(1);

    println!("===========================================");
    println!("  Party Matcher");
    println!("===========================================");
    println!("Party size: {}, bracket: {range}", engine.config().target_size());
    println!();

    let roster = [
        (1, "Thrall", Role::Tank),
        (2, "Jaina", Role::Healer),
        (3, "Sylvanas", Role::Dps),
        (4, "Valeera", Role::Dps),
        (5, "Rexxar", Role::Dps),
    ];

    let mut match_id = None;
    for (now, (id, name, role)) in (0u64..).zip(roster) {
        let entry = QueueEntry::solo(ParticipantId(id), name, role, range).with_keystone(id == 1);
        let applied = engine.arrive(guild, entry, now * 1_000)?;
        println!("{name:>10} ({role}) -> {:?}", applied.outcome);
        print_events(&applied.events);
        if applied.outcome != ArrivalOutcome::Waiting {
            match_id = applied.outcome.match_id();
        }
    }

    let Some(match_id) = match_id else {
        println!("No match formed.");
        return Ok(());
    };

    println!();
    println!("Confirming {match_id}...");
    for (id, name, _) in roster {
        let applied = engine.confirm(guild, match_id, ParticipantId(id), 10_000);
        print_events(&applied.events);
        if let ConfirmOutcome::Completed(receipt) = applied.outcome {
            println!("{name} completed the party");
            println!("  Key level:   +{}", receipt.key_level);
            println!("  Roster root: {}", receipt.roster_root_hex());
            match ssz_rs::serialize(&receipt) {
                Ok(bytes) => println!("  Receipt:     {} bytes (SSZ)", bytes.len()),
                Err(e) => println!("  ERROR: failed to serialize receipt: {e:?}"),
            }
        }
    }

    println!();
    println!("Queue after confirmation: {:?}", engine.snapshot(guild));
    Ok(())
}

fn print_events(events: &[MatchEvent]) {
    for event in events {
        match serde_json::to_string(event) {
            Ok(json) => println!("    event: {json}"),
            Err(e) => println!("    event {} (unserializable: {e})", event.kind()),
        }
    }
}
