//! Verifiable shuffle of encrypted records.
//!
//! Each record is compressed to one ciphertext with per-slot tags derived from
//! the first input record and a seed point, and the compressed lists are
//! proven to be a rerandomized permutation of one another with Neff's pair
//! shuffle.

mod neff;
mod simple;
mod tags;

use ark_ec::CurveGroup;
use ark_ff::UniformRand;
use ark_std::rand::Rng;
use rand::seq::SliceRandom;
use tokio_util::sync::CancellationToken;

pub use neff::{check_permutation, PairShuffleProof, PairShuffleStatement, PAIR_SHUFFLE_TAG};
pub use simple::{SimpleShuffleProof, SimpleShuffleWitness};
pub use tags::{
    cipher_vector_tag, compress_beta, compress_list_process_response, compress_process_response,
    compute_e,
};

use crate::elgamal::{
    list_shape, read_process_responses, write_process_responses, Ciphertext, ProcessResponse,
    RerandomizationPool,
};
use crate::error::{ProofError, ProofResult};
use crate::parallel::{all_indexed, barrier, map_with_rng, sample_count, try_map_indexed};
use crate::suite::{marshal_into, write_bytes, WireReader};

const LOG_TARGET: &str = "drynx_proofs::proofs::shuffle";

/// A shuffle together with everything needed to check it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedShufflingProof<C: CurveGroup> {
    pub original_list: Vec<ProcessResponse<C>>,
    pub shuffled_list: Vec<ProcessResponse<C>>,
    pub g: C,
    pub h: C,
    /// Encoded [`PairShuffleProof`].
    pub proof: Vec<u8>,
}

/// Permutes `input` and rerandomizes every slot under `(g, h)`.
///
/// Returns `(out, π, β)` with `out[i] = in[π(i)] + (β[π(i)] g, β[π(i)] h)`.
/// With a pool, each record draws a random precomputed entry instead of fresh
/// scalars.
pub fn shuffle_sequence<C: CurveGroup, R: Rng>(
    input: &[ProcessResponse<C>],
    g: C,
    h: C,
    pool: Option<&RerandomizationPool<C>>,
    rng: &mut R,
) -> ProofResult<(Vec<ProcessResponse<C>>, Vec<usize>, Vec<Vec<C::ScalarField>>)> {
    let shape = list_shape(input)?;
    let width = shape.0 + shape.1 + shape.2;

    let mut pi: Vec<usize> = (0..input.len()).collect();
    pi.shuffle(rng);

    let draws: Vec<(Vec<C::ScalarField>, Option<Vec<Ciphertext<C>>>)> = match pool {
        Some(pool) if !pool.is_empty() => {
            if pool.width() < width {
                return Err(ProofError::LengthMismatch {
                    expected: width,
                    actual: pool.width(),
                });
            }
            (0..input.len())
                .map(|_| {
                    let entry = pool
                        .pick(rng)
                        .ok_or_else(|| ProofError::InvalidInput("empty rerandomization pool".into()))?;
                    Ok((
                        entry.scalars[..width].to_vec(),
                        Some(entry.ciphers[..width].to_vec()),
                    ))
                })
                .collect::<ProofResult<_>>()?
        }
        _ => map_with_rng(rng, input.len(), |_, stream| {
            let betas = (0..width).map(|_| C::ScalarField::rand(stream)).collect();
            (betas, None)
        }),
    };

    let output = try_map_indexed(input.len(), |i| {
        let source = pi[i];
        match &draws[source] {
            (_, Some(zeros)) => {
                let slots = input[source]
                    .slots()
                    .zip(zeros)
                    .map(|(ct, zero)| ct + zero)
                    .collect();
                ProcessResponse::from_slots(slots, shape)
            }
            (betas, None) => input[source].rerandomize_with(betas, g, h),
        }
    })?;
    let beta = draws.into_iter().map(|(betas, _)| betas).collect();
    tracing::debug!(target: LOG_TARGET, records = input.len(), precomputed = pool.is_some(), "shuffled sequence");
    Ok((output, pi, beta))
}

/// Builds the pair-shuffle proof bytes for `output = shuffle(input)`, with
/// tags seeded by `h`.
#[allow(clippy::too_many_arguments)]
pub fn shuffle_proof<C: CurveGroup, R: Rng>(
    input: &[ProcessResponse<C>],
    output: &[ProcessResponse<C>],
    g: C,
    h: C,
    beta: &[Vec<C::ScalarField>],
    pi: &[usize],
    rng: &mut R,
    cancel: Option<&CancellationToken>,
) -> ProofResult<Vec<u8>> {
    let first = input
        .first()
        .ok_or_else(|| ProofError::InvalidInput("shuffle of an empty list".into()))?;
    if output.len() != input.len() || beta.len() != input.len() {
        return Err(ProofError::LengthMismatch {
            expected: input.len(),
            actual: output.len().min(beta.len()),
        });
    }
    let e = cipher_vector_tag(first, h)?;
    barrier(cancel, "shuffle tags")?;

    let (x, y) = compress_list_process_response(input, &e)?;
    let (x_bar, y_bar) = compress_list_process_response(output, &e)?;
    let beta_hat = compress_beta::<C>(beta, &e)?;
    barrier(cancel, "shuffle compression")?;

    let statement = PairShuffleStatement {
        g,
        h,
        x: &x,
        y: &y,
        x_bar: &x_bar,
        y_bar: &y_bar,
    };
    neff::prove(&statement, pi, &beta_hat, rng)?.to_bytes()
}

/// [`shuffle_proof`] wrapped with the lists and bases it speaks about.
#[allow(clippy::too_many_arguments)]
pub fn shuffling_proof_creation<C: CurveGroup, R: Rng>(
    original_list: &[ProcessResponse<C>],
    shuffled_list: &[ProcessResponse<C>],
    g: C,
    h: C,
    beta: &[Vec<C::ScalarField>],
    pi: &[usize],
    rng: &mut R,
    cancel: Option<&CancellationToken>,
) -> ProofResult<PublishedShufflingProof<C>> {
    let proof = shuffle_proof(original_list, shuffled_list, g, h, beta, pi, rng, cancel)?;
    Ok(PublishedShufflingProof {
        original_list: original_list.to_vec(),
        shuffled_list: shuffled_list.to_vec(),
        g,
        h,
        proof,
    })
}

/// Checks a published shuffle, deriving the tags from `seed`.
pub fn shuffling_proof_verification<C: CurveGroup>(
    published: &PublishedShufflingProof<C>,
    seed: C,
) -> bool {
    match try_verify(published, seed) {
        Ok(result) => result,
        Err(err) => {
            tracing::debug!(target: LOG_TARGET, error = %err, "shuffle proof rejected");
            false
        }
    }
}

fn try_verify<C: CurveGroup>(published: &PublishedShufflingProof<C>, seed: C) -> ProofResult<bool> {
    let k = published.original_list.len();
    let Some(first) = published.original_list.first() else {
        return Ok(false);
    };
    if published.shuffled_list.len() != k {
        return Ok(false);
    }
    let e = cipher_vector_tag(first, seed)?;
    let (x, y) = compress_list_process_response(&published.original_list, &e)?;
    let (x_bar, y_bar) = compress_list_process_response(&published.shuffled_list, &e)?;
    let proof = PairShuffleProof::from_bytes(&published.proof, k)?;
    let statement = PairShuffleStatement {
        g: published.g,
        h: published.h,
        x: &x,
        y: &y,
        x_bar: &x_bar,
        y_bar: &y_bar,
    };
    Ok(neff::verify(&statement, &proof))
}

/// Verifies the first `⌈sample · N⌉` published shuffles.
pub fn shuffling_list_proof_verification<C: CurveGroup>(
    proofs: &[PublishedShufflingProof<C>],
    seed: C,
    sample: f64,
) -> bool {
    let count = sample_count(sample, proofs.len());
    let result = all_indexed(count, |i| shuffling_proof_verification(&proofs[i], seed));
    tracing::debug!(target: LOG_TARGET, count, total = proofs.len(), result, "verified shuffle list");
    result
}

impl<C: CurveGroup> PublishedShufflingProof<C> {
    /// Original list, shuffled list (each with `[L1][L2][L3]` and a count),
    /// then `g`, `h` and the length-prefixed proof.
    pub fn to_bytes(&self) -> ProofResult<Vec<u8>> {
        let mut out = Vec::new();
        write_process_responses(&self.original_list, &mut out)?;
        write_process_responses(&self.shuffled_list, &mut out)?;
        marshal_into(&self.g, &mut out)?;
        marshal_into(&self.h, &mut out)?;
        write_bytes(&mut out, &self.proof)?;
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> ProofResult<Self> {
        let mut reader = WireReader::new(bytes);
        let published = Self {
            original_list: read_process_responses(&mut reader)?,
            shuffled_list: read_process_responses(&mut reader)?,
            g: reader.read()?,
            h: reader.read()?,
            proof: reader.read_bytes()?.to_vec(),
        };
        reader.finish()?;
        Ok(published)
    }
}
