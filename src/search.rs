//! Partitions a candidate index range across worker threads under a
//! wall-clock deadline, scores each candidate with an injected predicate,
//! and aggregates results in deterministic (partition, construction) order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::dictionary::SearchResultLow;

/// How often (in candidates scored) a worker re-checks the deadline inside
/// its inner loop, independent of the "once per result" check.
const DEADLINE_POLL_STRIDE: usize = 256;

/// Runs `score` over `[0, candidate_count)`, split into up to `worker_count`
/// half-open ranges, one thread per range, joined before returning. `score`
/// receives the candidate's position within `[0, candidate_count)` and
/// returns `Some(result)` for a kept match. Results are returned with
/// worker 0's matches first, in ascending candidate order within each
/// worker, matching the partition order (deterministic for fixed inputs).
pub fn run_workers<F>(
	candidate_count: usize,
	worker_count: usize,
	timeout: Duration,
	score: F,
) -> Vec<SearchResultLow>
where
	F: Fn(usize) -> Option<SearchResultLow> + Sync,
{
	if candidate_count == 0 {
		return Vec::new();
	}
	let deadline = Instant::now() + timeout;
	let stop = Arc::new(AtomicBool::new(false));

	let effective_workers = worker_count.min(candidate_count).max(1);
	if effective_workers <= 1 {
		return run_range(0, candidate_count, deadline, &stop, &score);
	}

	let mut ranges = Vec::with_capacity(effective_workers);
	for worker in 0..effective_workers {
		let start = worker * candidate_count / effective_workers;
		let end = (worker + 1) * candidate_count / effective_workers;
		ranges.push((start, end));
	}

	let mut results = Vec::with_capacity(effective_workers);
	std::thread::scope(|scope| {
		let handles: Vec<_> = ranges
			.into_iter()
			.map(|(start, end)| {
				let stop = Arc::clone(&stop);
				let score = &score;
				scope.spawn(move || run_range(start, end, deadline, &stop, score))
			})
			.collect();
		for handle in handles {
			results.push(handle.join().expect("search worker panicked"));
		}
	});

	results.into_iter().flatten().collect()
}

fn run_range<F>(
	start: usize,
	end: usize,
	deadline: Instant,
	stop: &AtomicBool,
	score: &F,
) -> Vec<SearchResultLow>
where
	F: Fn(usize) -> Option<SearchResultLow>,
{
	let mut results = Vec::new();
	for (step, candidate) in (start..end).enumerate() {
		if stop.load(Ordering::Relaxed) {
			break;
		}
		if step % DEADLINE_POLL_STRIDE == 0 && Instant::now() >= deadline {
			stop.store(true, Ordering::Relaxed);
			break;
		}
		if let Some(result) = score(candidate) {
			results.push(result);
			if Instant::now() >= deadline {
				stop.store(true, Ordering::Relaxed);
				break;
			}
		}
	}
	results
}

/// Trims surrounding whitespace and ASCII-lowercases a query, the
/// normalization every search strategy applies before resolving a bucket.
pub fn normalize_query(query: &str) -> String {
	query.trim().to_lowercase()
}

/// The first rune of a normalized query, or `None` for an empty query —
/// the "invalid query" condition callers must check before bucket lookup.
pub fn first_rune(query: &str) -> Option<char> {
	query.chars().next()
}
