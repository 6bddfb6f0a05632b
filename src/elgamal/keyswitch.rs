//! Re-encryption of ciphertexts from the collective key to a querier's key.
//!
//! Each computing node `i` holding share `k_i` of the collective secret
//! publishes `(v_i B, -k_i K + v_i Q)` for every ciphertext `(K, C)`. Summing
//! the shares of all nodes onto `C` yields an encryption under `Q`.

use ark_ec::CurveGroup;
use ark_ff::UniformRand;
use ark_std::rand::Rng;

use super::{CipherVector, Ciphertext};
use crate::error::{ProofError, ProofResult};
use crate::parallel::map_with_rng;

const LOG_TARGET: &str = "drynx_proofs::elgamal::keyswitch";

/// One node's contribution for one ciphertext.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySwitchShare<C: CurveGroup> {
    /// `v_i B`
    pub vi_b: C,
    /// `-k_i K + v_i Q`
    pub ks2: C,
}

/// Share of the node holding `server_secret`, with the fresh `v` it used.
pub fn key_switch_share<C: CurveGroup, R: Rng>(
    ct: &Ciphertext<C>,
    server_secret: C::ScalarField,
    target: C,
    rng: &mut R,
) -> (KeySwitchShare<C>, C::ScalarField) {
    let v = C::ScalarField::rand(rng);
    let share = KeySwitchShare {
        vi_b: C::generator() * v,
        ks2: target * v - ct.k * server_secret,
    };
    (share, v)
}

/// Shares for every slot of a vector; returns the per-slot `v` as well.
pub fn key_switch_share_vector<C: CurveGroup, R: Rng>(
    vector: &CipherVector<C>,
    server_secret: C::ScalarField,
    target: C,
    rng: &mut R,
) -> (Vec<KeySwitchShare<C>>, Vec<C::ScalarField>) {
    map_with_rng(rng, vector.len(), |i, stream| {
        key_switch_share(&vector.0[i], server_secret, target, stream)
    })
    .into_iter()
    .unzip()
}

/// Folds the shares of all nodes into the switched ciphertext `(Σ v_i B, C + Σ ks2_i)`.
pub fn combine_shares<C: CurveGroup>(
    original: &Ciphertext<C>,
    shares: &[KeySwitchShare<C>],
) -> Ciphertext<C> {
    shares.iter().fold(
        Ciphertext::new(C::zero(), original.c),
        |acc, share| Ciphertext::new(acc.k + share.vi_b, acc.c + share.ks2),
    )
}

/// Combines per-node share vectors, indexed `[node][slot]`.
pub fn combine_share_vectors<C: CurveGroup>(
    original: &CipherVector<C>,
    shares: &[Vec<KeySwitchShare<C>>],
) -> ProofResult<CipherVector<C>> {
    if let Some(bad) = shares.iter().find(|row| row.len() != original.len()) {
        return Err(ProofError::LengthMismatch {
            expected: original.len(),
            actual: bad.len(),
        });
    }
    tracing::debug!(
        target: LOG_TARGET,
        nodes = shares.len(),
        slots = original.len(),
        "combining key switch shares"
    );
    Ok(original
        .iter()
        .enumerate()
        .map(|(slot, ct)| {
            let column: Vec<_> = shares.iter().map(|row| row[slot].clone()).collect();
            combine_shares(ct, &column)
        })
        .collect::<Vec<_>>()
        .into())
}

/// Switch by a single holder of the whole secret. Returns the new ciphertext
/// and the `v` used.
pub fn key_switch<C: CurveGroup, R: Rng>(
    ct: &Ciphertext<C>,
    secret: C::ScalarField,
    target: C,
    rng: &mut R,
) -> (Ciphertext<C>, C::ScalarField) {
    let (share, v) = key_switch_share(ct, secret, target, rng);
    (combine_shares(ct, std::slice::from_ref(&share)), v)
}

pub fn key_switch_vector<C: CurveGroup, R: Rng>(
    vector: &CipherVector<C>,
    secret: C::ScalarField,
    target: C,
    rng: &mut R,
) -> (CipherVector<C>, Vec<C::ScalarField>) {
    let (shares, vs) = key_switch_share_vector(vector, secret, target, rng);
    let switched = vector
        .iter()
        .zip(&shares)
        .map(|(ct, share)| combine_shares(ct, std::slice::from_ref(share)))
        .collect::<Vec<_>>();
    (switched.into(), vs)
}
