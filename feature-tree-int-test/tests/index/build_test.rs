//! Construction over generated feature sets.

use feature_tree::{build_index, BoundingBox, Heuristic, IndexEntry, IndexError};
use feature_tree_int_test::test_util::{
    assert_tree_shape, cleanup, collinear_points, create_seeded_test_context, create_test_context,
    random_entries, run_test,
};
use std::collections::HashSet;

#[test]
fn test_build_keeps_every_entry() {
    run_test(
        create_test_context,
        |ctx| {
            let mut rng = ctx.rng();
            let entries = random_entries(&mut rng, 2_000, 500.0, 20.0);
            let index = build_index(entries.clone(), &Heuristic::default())?
                .expect("entries were given");

            assert_eq!(index.len(), entries.len());
            let mut stored: Vec<_> = index.root().collect_entries();
            stored.sort_by_key(|entry| entry.id);
            assert_eq!(stored, entries);

            let ids: HashSet<_> = stored.iter().map(|entry| entry.id).collect();
            assert_eq!(ids.len(), entries.len());
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_build_shape_across_heuristics() {
    run_test(
        || create_seeded_test_context(11),
        |ctx| {
            let mut rng = ctx.rng();
            let entries = random_entries(&mut rng, 1_500, 1_000.0, 50.0);
            let heuristics = [
                Heuristic::default(),
                Heuristic::new(4, 1, 1, 0.0),
                Heuristic::new(64, 2, 2, 0.0),
                Heuristic::new(32, 16, 64, 1_000_000.0),
                Heuristic::default().retry_secondary_axis(true),
            ];

            for heuristic in &heuristics {
                let index = build_index(entries.clone(), heuristic)?.expect("entries were given");
                assert_tree_shape(index.root());

                let stats = index.stats();
                assert!(stats.depth <= heuristic.max_depth);
                assert_eq!(stats.entry_count, entries.len() as u64);
                assert_eq!(stats.node_count, 2 * stats.leaf_count - 1);
                assert!(index.root().check_integrity().is_valid);
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_build_bounds_cover_input() {
    run_test(
        || create_seeded_test_context(23),
        |ctx| {
            let mut rng = ctx.rng();
            let entries = random_entries(&mut rng, 800, 250.0, 10.0);
            let expected = BoundingBox::join_all(entries.iter().map(|e| &e.bbox));

            let index = build_index(entries, &Heuristic::default())?.expect("entries were given");
            assert_eq!(Some(*index.bounds()), expected);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_build_degenerate_inputs_terminate() {
    run_test(
        create_test_context,
        |_ctx| {
            let heuristic = Heuristic::new(32, 1, 1, 0.0);

            let same_point: Vec<_> = (0..500)
                .map(|i| IndexEntry::new(BoundingBox::point(3.0, 3.0), i))
                .collect();
            let index = build_index(same_point, &heuristic)?.expect("entries were given");
            assert!(index.root().is_leaf());
            assert_eq!(index.len(), 500);

            let line = build_index(collinear_points(500), &heuristic)?.expect("entries were given");
            assert_tree_shape(line.root());
            assert!(line.stats().depth <= heuristic.max_depth);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_build_rejects_bad_entry_anywhere() {
    run_test(
        create_test_context,
        |ctx| {
            let mut rng = ctx.rng();
            let mut entries = random_entries(&mut rng, 300, 100.0, 5.0);
            entries[150] = IndexEntry::new(BoundingBox::new(10.0, 0.0, 5.0, 1.0), 150);

            match build_index(entries, &Heuristic::default()) {
                Err(IndexError::InvalidBounds { id, .. }) => assert_eq!(id, 150),
                other => panic!("expected invalid bounds, got {:?}", other),
            }
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_build_empty_input() {
    run_test(
        create_test_context,
        |_ctx| {
            assert!(build_index(Vec::new(), &Heuristic::default())?.is_none());
            Ok(())
        },
        cleanup,
    )
}
