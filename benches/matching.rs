//! Benchmarks for the party matching engine.
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run specific benchmark
//! cargo bench -- arrival
//! ```
//!
//! Results are saved to `target/criterion/` with HTML reports.

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use party_matcher::config::MatchConfig;
use party_matcher::engine::{ArrivalOutcome, ConfirmOutcome, GuildQueue};
use party_matcher::types::{GuildId, KeyRange, ParticipantId, QueueEntry, Role};

// ============================================================================
// HELPER FUNCTIONS - Deterministic entry generation
// ============================================================================

fn new_guild() -> GuildQueue {
    GuildQueue::new(GuildId(1), Arc::new(MatchConfig::default()))
}

fn solo(id: u64, role: Role, range: KeyRange) -> QueueEntry {
    QueueEntry::solo(ParticipantId(id), "bench", role, range)
}

/// A guild holding `count` tanks that can never pair with each other.
fn tank_queue(count: usize) -> GuildQueue {
    let mut guild = new_guild();
    for i in 0..count as u64 {
        let _ = guild.arrive(solo(i + 1, Role::Tank, KeyRange::new(2, 20)), i);
    }
    guild
}

/// Random solo entries with a realistic role mix and mostly narrow ranges.
fn generate_entry_batch(count: usize, seed: u64) -> Vec<QueueEntry> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    (0..count as u64)
        .map(|i| {
            let role = match rng.gen_range(0..5) {
                0 => Role::Tank,
                1 => Role::Healer,
                _ => Role::Dps,
            };
            let min = rng.gen_range(2..=18);
            let max = rng.gen_range(min..=(min + 4).min(20));
            solo(i + 1, role, KeyRange::new(min, max))
        })
        .collect()
}

// ============================================================================
// BENCHMARK: Arrival Latency
// ============================================================================

fn bench_arrival(c: &mut Criterion) {
    let mut group = c.benchmark_group("arrival");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("waits_in_empty_queue", |b| {
        b.iter_batched(
            new_guild,
            |mut guild| black_box(guild.arrive(solo(1, Role::Tank, KeyRange::new(10, 15)), 0)),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("forms_pair", |b| {
        b.iter_batched(
            || {
                let mut guild = new_guild();
                let _ = guild.arrive(solo(1, Role::Tank, KeyRange::new(10, 15)), 0);
                guild
            },
            |mut guild| black_box(guild.arrive(solo(2, Role::Healer, KeyRange::new(10, 15)), 1)),
            BatchSize::SmallInput,
        );
    });

    group.bench_function("grows_to_full_party", |b| {
        b.iter_batched(
            || {
                let mut guild = new_guild();
                let roles = [Role::Tank, Role::Healer, Role::Dps, Role::Dps];
                for (i, role) in roles.into_iter().enumerate() {
                    let _ = guild.arrive(solo(i as u64 + 1, role, KeyRange::new(10, 15)), i as u64);
                }
                guild
            },
            |mut guild| black_box(guild.arrive(solo(5, Role::Dps, KeyRange::new(10, 15)), 5)),
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

// ============================================================================
// BENCHMARK: Full Lifecycle
// ============================================================================

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");
    group.measurement_time(Duration::from_secs(5));

    group.bench_function("form_confirm_party", |b| {
        b.iter_batched(
            new_guild,
            |mut guild| {
                let roles = [Role::Tank, Role::Healer, Role::Dps, Role::Dps, Role::Dps];
                let mut match_id = None;
                for (i, role) in roles.into_iter().enumerate() {
                    if let Ok(applied) = guild.arrive(solo(i as u64 + 1, role, KeyRange::new(10, 15)), i as u64) {
                        match_id = applied.outcome.match_id().or(match_id);
                    }
                }
                let Some(match_id) = match_id else {
                    return None;
                };
                let entries = guild.get_match(match_id).map(|m| m.entries.clone()).unwrap_or_default();
                let mut receipt = None;
                for entry in entries {
                    if let ConfirmOutcome::Completed(r) = guild.confirm(match_id, entry, 10).outcome {
                        receipt = Some(r);
                    }
                }
                black_box(receipt)
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("reject_and_rescan", |b| {
        b.iter_batched(
            || {
                let mut guild = new_guild();
                for (i, role) in [Role::Tank, Role::Healer, Role::Dps].into_iter().enumerate() {
                    let _ = guild.arrive(solo(i as u64 + 1, role, KeyRange::new(10, 15)), i as u64);
                }
                let _ = guild.arrive(solo(4, Role::Healer, KeyRange::new(10, 15)), 4);
                guild
            },
            |mut guild| {
                let match_id = guild.entry(ParticipantId(1)).and_then(|e| e.locked_to());
                if let Some(match_id) = match_id {
                    black_box(guild.reject(match_id, ParticipantId(2)));
                }
                black_box(guild.rescan(5))
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

// ============================================================================
// BENCHMARK: Throughput
// ============================================================================

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("throughput");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(30);

    for batch_size in [1_000, 10_000] {
        group.throughput(Throughput::Elements(batch_size as u64));

        group.bench_with_input(BenchmarkId::new("arrivals", batch_size), &batch_size, |b, &size| {
            let entries = generate_entry_batch(size, 42);

            b.iter_batched(
                || entries.clone(),
                |entries| {
                    let mut guild = new_guild();
                    let mut formed = 0usize;
                    for (tick, entry) in entries.into_iter().enumerate() {
                        if let Ok(applied) = guild.arrive(entry, tick as u64) {
                            if matches!(applied.outcome, ArrivalOutcome::FormedNewMatch(_)) {
                                formed += 1;
                            }
                        }
                    }
                    black_box((guild.store().len(), formed))
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

// ============================================================================
// BENCHMARK: Large Queue
// ============================================================================

fn bench_large_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("large_queue");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(30);

    for waiting in [1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("healer_meets_oldest_tank", waiting), &waiting, |b, &size| {
            let guild = tank_queue(size);

            b.iter_batched(
                || guild.clone(),
                |mut guild| black_box(guild.arrive(solo(u64::MAX, Role::Healer, KeyRange::new(2, 20)), size as u64)),
                BatchSize::LargeInput,
            );
        });

        group.bench_with_input(BenchmarkId::new("unmatched_arrival", waiting), &waiting, |b, &size| {
            let guild = tank_queue(size);

            b.iter_batched(
                || guild.clone(),
                |mut guild| black_box(guild.arrive(solo(u64::MAX, Role::Tank, KeyRange::new(2, 20)), size as u64)),
                BatchSize::LargeInput,
            );
        });
    }

    group.bench_function("state_root_10k", |b| {
        let guild = tank_queue(10_000);
        b.iter(|| black_box(guild.state_root()));
    });

    group.finish();
}

// ============================================================================
// CRITERION ENTRY POINT
// ============================================================================

criterion_group!(benches, bench_arrival, bench_lifecycle, bench_throughput, bench_large_queue);

criterion_main!(benches);
