//! Per-slot compression tags. A record of `NQ` ciphertexts collapses to the
//! single ciphertext `Σ e_j · ct_j`, so a shuffle of records reduces to a
//! shuffle of pairs.

use ark_ec::CurveGroup;

use crate::elgamal::{Ciphertext, ProcessResponse};
use crate::error::{ProofError, ProofResult};
use crate::parallel::{map_indexed, try_map_indexed};
use crate::proofs::transcript::stream_scalar;
use crate::suite::marshal;

/// `e = H_stream(seed ‖ C ‖ K)` for one slot.
pub fn compute_e<C: CurveGroup>(slot: &Ciphertext<C>, seed: &[u8]) -> ProofResult<C::ScalarField> {
    let c = marshal(&slot.c)?;
    let k = marshal(&slot.k)?;
    Ok(stream_scalar(&[seed, &c, &k]))
}

/// Tags for every slot of `record`, in group-by, where, aggregating order,
/// seeded with the encoding of `seed_point`.
pub fn cipher_vector_tag<C: CurveGroup>(
    record: &ProcessResponse<C>,
    seed_point: C,
) -> ProofResult<Vec<C::ScalarField>> {
    let seed = marshal(&seed_point)?;
    let slots = record.flatten();
    try_map_indexed(slots.len(), |j| compute_e(&slots[j], &seed))
}

pub fn compress_process_response<C: CurveGroup>(
    record: &ProcessResponse<C>,
    e: &[C::ScalarField],
) -> ProofResult<Ciphertext<C>> {
    if record.len() != e.len() {
        return Err(ProofError::LengthMismatch {
            expected: e.len(),
            actual: record.len(),
        });
    }
    Ok(record
        .slots()
        .zip(e)
        .map(|(ct, tag)| ct.mul_by_scalar(*tag))
        .sum())
}

/// Compresses every record, returning the `K` and `C` halves separately.
pub fn compress_list_process_response<C: CurveGroup>(
    list: &[ProcessResponse<C>],
    e: &[C::ScalarField],
) -> ProofResult<(Vec<C>, Vec<C>)> {
    let compressed = try_map_indexed(list.len(), |i| compress_process_response(&list[i], e))?;
    Ok(compressed.into_iter().map(|ct| (ct.k, ct.c)).unzip())
}

/// `β̂_i = Σ_j β_{i,j} e_j` for every record's rerandomization scalars.
pub fn compress_beta<C: CurveGroup>(
    beta: &[Vec<C::ScalarField>],
    e: &[C::ScalarField],
) -> ProofResult<Vec<C::ScalarField>> {
    if let Some(row) = beta.iter().find(|row| row.len() != e.len()) {
        return Err(ProofError::LengthMismatch {
            expected: e.len(),
            actual: row.len(),
        });
    }
    Ok(map_indexed(beta.len(), |i| {
        beta[i].iter().zip(e).map(|(b, tag)| *b * tag).sum()
    }))
}
