use ark_ec::pairing::Pairing;
use ark_ec::CurveGroup;
use ark_ff::{UniformRand, Zero};
use rand::Rng;

use super::{encrypt_slots, EncodedResponse, RangeInputs};
use crate::elgamal::Ciphertext;
use crate::error::ProofResult;

/// Encryption of a uniformly random non-zero scalar, or of zero.
fn blinded_bit<C: CurveGroup, R: Rng>(nonzero: bool, public_key: C, rng: &mut R) -> Ciphertext<C> {
    let mut message = C::ScalarField::zero();
    if nonzero {
        while message.is_zero() {
            message = C::ScalarField::rand(rng);
        }
    }
    Ciphertext::encrypt_scalar(message, C::ScalarField::rand(rng), public_key)
}

/// One slot whose plaintext is non-zero iff `input` is true.
///
/// Without range credentials a true bit is a random non-zero scalar, so the
/// homomorphic sum over providers stays non-zero with overwhelming
/// probability. With credentials the slot holds exactly `0` or `1`.
pub fn encode_bit_or<E: Pairing, R: Rng>(
    input: bool,
    public_key: E::G1,
    range: Option<&RangeInputs<'_, E>>,
    rng: &mut R,
) -> ProofResult<EncodedResponse<E>> {
    encode_indicators(&[input], public_key, range, rng)
}

/// One slot whose plaintext is zero iff `input` is true.
pub fn encode_bit_and<E: Pairing, R: Rng>(
    input: bool,
    public_key: E::G1,
    range: Option<&RangeInputs<'_, E>>,
    rng: &mut R,
) -> ProofResult<EncodedResponse<E>> {
    encode_indicators(&[!input], public_key, range, rng)
}

/// One slot per entry, non-zero where `nonzero` holds.
pub(crate) fn encode_indicators<E: Pairing, R: Rng>(
    nonzero: &[bool],
    public_key: E::G1,
    range: Option<&RangeInputs<'_, E>>,
    rng: &mut R,
) -> ProofResult<EncodedResponse<E>> {
    let values: Vec<i64> = nonzero.iter().map(|bit| i64::from(*bit)).collect();
    match range {
        Some(_) => encrypt_slots(&values, public_key, range, rng),
        None => Ok(EncodedResponse {
            ciphers: nonzero
                .iter()
                .map(|bit| blinded_bit(*bit, public_key, rng))
                .collect(),
            clear: values,
            proofs: Vec::new(),
        }),
    }
}

pub fn decode_bit_or<C: CurveGroup>(cipher: &Ciphertext<C>, secret: C::ScalarField) -> bool {
    !cipher.decrypt_check_zero(secret)
}

pub fn decode_bit_and<C: CurveGroup>(cipher: &Ciphertext<C>, secret: C::ScalarField) -> bool {
    cipher.decrypt_check_zero(secret)
}

pub fn local_result_or(input: &[bool]) -> bool {
    input.iter().any(|bit| *bit)
}

pub fn local_result_and(input: &[bool]) -> bool {
    input.iter().all(|bit| *bit)
}
