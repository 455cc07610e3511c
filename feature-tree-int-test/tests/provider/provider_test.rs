//! A provider reloading its index from disk and from source data.

use feature_tree::{BoundingBox, Heuristic, IndexProvider};
use feature_tree_int_test::test_util::{
    brute_force, cleanup, create_seeded_test_context, random_box, random_entries, run_test,
};
use std::collections::HashSet;
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

#[test]
fn test_cached_index_survives_restart() {
    run_test(
        || create_seeded_test_context(31),
        |ctx| {
            let mut rng = ctx.rng();
            let entries = random_entries(&mut rng, 2_500, 500.0, 20.0);
            let path = ctx.index_path("roads");

            let first = IndexProvider::new(Heuristic::default());
            first.load_or_rebuild(&path, entries.clone())?;
            assert!(first.save_to_path(&path)?);

            // A fresh process: source data is never consulted
            let second = IndexProvider::new(Heuristic::default());
            second.load_or_rebuild(&path, Vec::new())?;
            assert_eq!(
                second.snapshot().expect("loaded").root(),
                first.snapshot().expect("built").root()
            );

            let query = random_box(&mut rng, 500.0, 100.0);
            let found: HashSet<_> = second.search(&query).into_iter().collect();
            assert_eq!(found, brute_force(&entries, &query));
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_stale_cache_triggers_rebuild() {
    run_test(
        || create_seeded_test_context(32),
        |ctx| {
            let mut rng = ctx.rng();
            let entries = random_entries(&mut rng, 400, 100.0, 5.0);
            let path = ctx.index_path("parcels");

            let mut bytes = 3.0f64.to_le_bytes().to_vec();
            bytes.extend_from_slice(&[0u8; 64]);
            fs::write(&path, bytes)?;

            let provider = IndexProvider::new(Heuristic::default());
            provider.load_or_rebuild(&path, entries.clone())?;
            assert_eq!(provider.snapshot().expect("rebuilt").len(), entries.len());

            // Rewrite the cache so the next start loads it directly
            assert!(provider.save_to_path(&path)?);
            let reloaded = IndexProvider::new(Heuristic::default());
            reloaded.load_from_path(&path)?;
            assert_eq!(reloaded.snapshot().expect("loaded").len(), entries.len());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_readers_see_whole_snapshots_during_reloads() {
    run_test(
        || create_seeded_test_context(33),
        |ctx| {
            let mut rng = ctx.rng();
            let west = random_entries(&mut rng, 1_000, 100.0, 5.0);
            let east: Vec<_> = west
                .iter()
                .map(|entry| {
                    let b = entry.bbox;
                    feature_tree::IndexEntry::new(
                        BoundingBox::new(b.min_x + 10_000.0, b.min_y, b.max_x + 10_000.0, b.max_y),
                        entry.id,
                    )
                })
                .collect();
            let west_query = BoundingBox::new(-200.0, -200.0, 200.0, 200.0);
            let all_ids: HashSet<_> = west.iter().map(|entry| entry.id).collect();

            let provider = IndexProvider::new(Heuristic::default());
            provider.rebuild(west.clone())?;

            let done = Arc::new(AtomicBool::new(false));
            let readers: Vec<_> = (0..4)
                .map(|_| {
                    let provider = provider.clone();
                    let done = Arc::clone(&done);
                    let all_ids = all_ids.clone();
                    thread::spawn(move || {
                        while !done.load(Ordering::Acquire) {
                            let found: HashSet<_> =
                                provider.search(&west_query).into_iter().collect();
                            // Never a mix of the two layouts
                            assert!(found.is_empty() || found == all_ids);
                        }
                    })
                })
                .collect();

            for round in 0..10 {
                let entries = if round % 2 == 0 { east.clone() } else { west.clone() };
                provider.rebuild(entries)?;
            }
            done.store(true, Ordering::Release);

            for reader in readers {
                reader.join().expect("reader panicked");
            }
            assert_eq!(provider.generation(), 11);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_save_without_index_writes_nothing() {
    run_test(
        || create_seeded_test_context(34),
        |ctx| {
            let path = ctx.index_path("empty");
            let provider = IndexProvider::new(Heuristic::default());
            provider.rebuild(Vec::new())?;

            assert!(!provider.save_to_path(&path)?);
            assert!(!path.exists());
            Ok(())
        },
        cleanup,
    )
}
