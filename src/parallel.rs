//! Batch execution helpers: a process-wide serial/parallel toggle, per-task RNG
//! streams and cancellation checks at join barriers.
//!
//! Every helper returns results in index order regardless of scheduling, so the
//! byte layout of anything assembled from them is position-indexed.

use std::sync::atomic::{AtomicBool, Ordering};

use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;

use crate::error::{ProofError, ProofResult};

const LOG_TARGET: &str = "drynx_proofs::parallel";

static PARALLELIZE: AtomicBool = AtomicBool::new(true);

/// Forces serial execution when `false`. Results are identical either way.
pub fn set_parallel(enabled: bool) {
    PARALLELIZE.store(enabled, Ordering::SeqCst);
}

pub fn is_parallel() -> bool {
    PARALLELIZE.load(Ordering::SeqCst)
}

pub fn map_indexed<T, F>(count: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    if is_parallel() {
        (0..count).into_par_iter().map(f).collect()
    } else {
        (0..count).map(f).collect()
    }
}

pub fn try_map_indexed<T, F>(count: usize, f: F) -> ProofResult<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> ProofResult<T> + Sync + Send,
{
    if is_parallel() {
        (0..count).into_par_iter().map(f).collect()
    } else {
        (0..count).map(f).collect()
    }
}

/// Conjunction over `count` independent checks.
pub fn all_indexed<F>(count: usize, f: F) -> bool
where
    F: Fn(usize) -> bool + Sync + Send,
{
    if is_parallel() {
        (0..count).into_par_iter().all(f)
    } else {
        (0..count).all(f)
    }
}

/// Derives `count` independent RNG streams from the caller's generator.
pub fn rng_streams<R: Rng>(rng: &mut R, count: usize) -> Vec<StdRng> {
    (0..count)
        .map(|_| StdRng::from_seed(rng.gen::<[u8; 32]>()))
        .collect()
}

/// Like [`map_indexed`], handing each task its own RNG sub-stream.
pub fn map_with_rng<T, F, R>(rng: &mut R, count: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize, &mut StdRng) -> T + Sync + Send,
    R: Rng,
{
    let streams = rng_streams(rng, count);
    if is_parallel() {
        streams
            .into_par_iter()
            .enumerate()
            .map(|(i, mut stream)| f(i, &mut stream))
            .collect()
    } else {
        streams
            .into_iter()
            .enumerate()
            .map(|(i, mut stream)| f(i, &mut stream))
            .collect()
    }
}

pub fn try_map_with_rng<T, F, R>(rng: &mut R, count: usize, f: F) -> ProofResult<Vec<T>>
where
    T: Send,
    F: Fn(usize, &mut StdRng) -> ProofResult<T> + Sync + Send,
    R: Rng,
{
    map_with_rng(rng, count, f).into_iter().collect()
}

/// Join barrier between batch phases.
pub fn barrier(cancel: Option<&CancellationToken>, phase: &'static str) -> ProofResult<()> {
    match cancel {
        Some(token) if token.is_cancelled() => {
            tracing::debug!(target: LOG_TARGET, phase, "batch cancelled at barrier");
            Err(ProofError::Cancelled(phase))
        }
        _ => Ok(()),
    }
}

/// Number of items a sampling ratio in `[0, 1]` selects out of `total`.
pub fn sample_count(ratio: f64, total: usize) -> usize {
    let ratio = if ratio.is_nan() { 0.0 } else { ratio.clamp(0.0, 1.0) };
    ((ratio * total as f64).ceil() as usize).min(total)
}
