use feature_tree::{BoundingBox, FeatureId, IndexEntry, IndexResult, TreeNode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::backtrace::Backtrace;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use std::{env, fs, thread};

/// Runs a test with retry logic and error handling.
/// Retries only cover transient file system failures in `before`/`after`;
/// the test body itself is deterministic for a given seed.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> IndexResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> IndexResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> IndexResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 2;
    let mut last_error: Option<String> = None;
    let mut last_backtrace: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => after(ctx)
                        .map_err(|e| (format!("After run failed: {:?}", e), backtrace.to_string())),
                    Err(e) => {
                        let _ = after(ctx);
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();

        match result {
            Ok(Ok(_)) => return,
            Ok(Err((e, bt))) => {
                last_error = Some(e);
                last_backtrace = Some(bt);
            }
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };
                last_error = Some(format!("Panic: {}", err_msg));
                last_backtrace = Some(Backtrace::capture().to_string());
            }
        }

        if attempt < MAX_RETRIES {
            eprintln!(
                "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                attempt, MAX_RETRIES, elapsed
            );
            eprintln!("{}", last_error.as_deref().unwrap_or("Unknown"));
            thread::sleep(Duration::from_millis(50 * attempt as u64));
        }
    }

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    if let Some(bt) = &last_backtrace {
        if !bt.is_empty() && !bt.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", bt);
        }
    }
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

#[derive(Clone, Debug)]
pub struct TestContext {
    dir: PathBuf,
    seed: u64,
}

impl TestContext {
    pub fn new(dir: PathBuf, seed: u64) -> Self {
        Self { dir, seed }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of an index file inside this context's scratch directory.
    pub fn index_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.idx", name))
    }

    /// Fresh generator; every call replays the same sequence.
    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }
}

pub fn random_path() -> PathBuf {
    let id = uuid::Uuid::new_v4();
    env::temp_dir().join(format!("feature_tree_{}", id))
}

pub fn create_test_context() -> IndexResult<TestContext> {
    create_seeded_test_context(0x5EED)
}

pub fn create_seeded_test_context(seed: u64) -> IndexResult<TestContext> {
    let dir = random_path();
    fs::create_dir_all(&dir)?;
    Ok(TestContext::new(dir, seed))
}

pub fn cleanup(ctx: TestContext) -> IndexResult<()> {
    match fs::remove_dir_all(ctx.dir()) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            // temp files are left for the OS to reclaim
            log::warn!("Failed to remove test directory {:?}: {:?}", ctx.dir(), e);
            Ok(())
        }
    }
}

/// Random boxes with corners in `[-extent, extent)` and sides below `max_size`.
pub fn random_entries(
    rng: &mut StdRng,
    count: usize,
    extent: f64,
    max_size: f64,
) -> Vec<IndexEntry> {
    (0..count)
        .map(|i| {
            let bbox = random_box(rng, extent, max_size);
            IndexEntry::from((bbox, i as FeatureId))
        })
        .collect()
}

pub fn random_box(rng: &mut StdRng, extent: f64, max_size: f64) -> BoundingBox {
    let x = rng.gen_range(-extent..extent);
    let y = rng.gen_range(-extent..extent);
    let w = rng.gen_range(0.0..max_size);
    let h = rng.gen_range(0.0..max_size);
    BoundingBox::new(x, y, x + w, y + h)
}

/// Point features on a horizontal line, one per id.
pub fn collinear_points(count: usize) -> Vec<IndexEntry> {
    (0..count)
        .map(|i| IndexEntry::new(BoundingBox::point(i as f64 * 0.5, 7.0), i as FeatureId))
        .collect()
}

/// Linear scan oracle.
pub fn brute_force(entries: &[IndexEntry], query: &BoundingBox) -> HashSet<FeatureId> {
    entries
        .iter()
        .filter(|entry| entry.bbox.intersects(query))
        .map(|entry| entry.id)
        .collect()
}

/// Asserts every internal node has two non-empty children and that every
/// node's bounds are the exact join of what lies beneath it.
pub fn assert_tree_shape(node: &TreeNode) {
    match node {
        TreeNode::Leaf { bounds, entries } => {
            assert!(!entries.is_empty(), "empty leaf");
            let expected = BoundingBox::join_all(entries.iter().map(|e| &e.bbox));
            assert_eq!(Some(*bounds), expected);
        }
        TreeNode::Internal { bounds, left, right } => {
            assert!(!left.is_empty() && !right.is_empty(), "empty child");
            assert_eq!(*bounds, left.bounds().join(right.bounds()));
            assert_tree_shape(left);
            assert_tree_shape(right);
        }
    }
}
