//! Search results checked against a linear scan.

use feature_tree::{build_index, BoundingBox, Heuristic, IndexEntry, SpatialIndex};
use feature_tree_int_test::test_util::{
    brute_force, cleanup, create_seeded_test_context, create_test_context, random_box,
    random_entries, run_test,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

fn scenario_index() -> SpatialIndex {
    let entries = vec![
        IndexEntry::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 1),
        IndexEntry::new(BoundingBox::new(20.0, 20.0, 30.0, 30.0), 2),
        IndexEntry::new(BoundingBox::new(5.0, 5.0, 15.0, 15.0), 3),
    ];
    build_index(entries, &Heuristic::new(10, 1, 1, 0.0))
        .unwrap()
        .unwrap()
}

#[test]
fn test_overlapping_features_scenario() {
    run_test(
        create_test_context,
        |_ctx| {
            let index = scenario_index();
            assert!(!index.root().is_leaf());

            let hits: HashSet<_> = index
                .search(&BoundingBox::new(0.0, 0.0, 12.0, 12.0))
                .into_iter()
                .collect();
            assert_eq!(hits, HashSet::from([1, 3]));

            assert!(index
                .search(&BoundingBox::new(100.0, 100.0, 200.0, 200.0))
                .is_empty());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_search_matches_linear_scan() {
    run_test(
        || create_seeded_test_context(42),
        |ctx| {
            let mut rng = ctx.rng();
            let entries = random_entries(&mut rng, 3_000, 1_000.0, 40.0);
            let heuristics = [
                Heuristic::default(),
                Heuristic::new(16, 1, 1, 0.0),
                Heuristic::new(8, 4, 32, 10.0).retry_secondary_axis(true),
            ];

            for heuristic in &heuristics {
                let index = build_index(entries.clone(), heuristic)?.expect("entries were given");
                for _ in 0..200 {
                    let query = random_box(&mut rng, 1_100.0, 300.0);
                    let expected = brute_force(&entries, &query);

                    let hits = index.search(&query);
                    let found: HashSet<_> = hits.iter().copied().collect();
                    assert_eq!(hits.len(), found.len(), "duplicate ids for {}", query);
                    assert_eq!(found, expected, "query {}", query);

                    let lazy: Vec<_> = index.search_iter(query).collect();
                    assert_eq!(lazy, hits);

                    let candidates: HashSet<_> =
                        index.search_candidates(&query).into_iter().collect();
                    assert!(candidates.is_superset(&found));
                }
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_search_touching_edges() {
    run_test(
        create_test_context,
        |_ctx| {
            let entries: Vec<_> = (0..100u32)
                .map(|i| {
                    let x = (i % 10) as f64 * 10.0;
                    let y = (i / 10) as f64 * 10.0;
                    IndexEntry::new(BoundingBox::new(x, y, x + 10.0, y + 10.0), i)
                })
                .collect();
            let index = build_index(entries, &Heuristic::new(16, 1, 2, 0.0))?
                .expect("entries were given");

            // A corner point is shared by four cells
            let mut hits = index.search(&BoundingBox::point(50.0, 50.0));
            hits.sort();
            assert_eq!(hits, vec![44, 45, 54, 55]);

            let mut outer = index.search(&BoundingBox::point(0.0, 0.0));
            outer.sort();
            assert_eq!(outer, vec![0]);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_full_extent_query_returns_everything() {
    run_test(
        || create_seeded_test_context(7),
        |ctx| {
            let mut rng = ctx.rng();
            let entries = random_entries(&mut rng, 1_000, 300.0, 15.0);
            let index = build_index(entries.clone(), &Heuristic::default())?
                .expect("entries were given");

            let mut hits = index.search(index.bounds());
            hits.sort();
            let all: Vec<_> = entries.iter().map(|entry| entry.id).collect();
            assert_eq!(hits, all);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_concurrent_searches_share_one_tree() {
    run_test(
        || create_seeded_test_context(99),
        |ctx| {
            let mut rng = ctx.rng();
            let entries = random_entries(&mut rng, 5_000, 2_000.0, 30.0);
            let queries: Vec<_> = (0..64).map(|_| random_box(&mut rng, 2_000.0, 200.0)).collect();
            let index = Arc::new(
                build_index(entries.clone(), &Heuristic::default())?.expect("entries were given"),
            );
            let entries = Arc::new(entries);
            let queries = Arc::new(queries);

            let handles: Vec<_> = (0..8)
                .map(|worker| {
                    let index = Arc::clone(&index);
                    let entries = Arc::clone(&entries);
                    let queries = Arc::clone(&queries);
                    thread::spawn(move || {
                        for query in queries.iter().skip(worker).step_by(8) {
                            let found: HashSet<_> = index.search(query).into_iter().collect();
                            assert_eq!(found, brute_force(&entries, query));
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().expect("search thread panicked");
            }
            Ok(())
        },
        cleanup,
    )
}
