use ark_ec::pairing::Pairing;
use ark_ec::CurveGroup;
use rand::Rng;

use super::{decrypt_slots, encrypt_slots, expect_slots, EncodedResponse, RangeInputs};
use crate::elgamal::{Ciphertext, DiscreteLogTable};
use crate::error::{ProofError, ProofResult};

/// One slot: `Σ x`.
pub fn encode_sum<E: Pairing, R: Rng>(
    input: &[i64],
    public_key: E::G1,
    range: Option<&RangeInputs<'_, E>>,
    rng: &mut R,
) -> ProofResult<EncodedResponse<E>> {
    encrypt_slots(&[input.iter().sum::<i64>()], public_key, range, rng)
}

pub fn decode_sum<C: CurveGroup>(
    ciphers: &[Ciphertext<C>],
    secret: C::ScalarField,
    table: &DiscreteLogTable,
) -> ProofResult<i64> {
    expect_slots(ciphers, 1)?;
    table.decrypt(secret, &ciphers[0])
}

/// `[Σ x, N]`.
pub fn encode_mean<E: Pairing, R: Rng>(
    input: &[i64],
    public_key: E::G1,
    range: Option<&RangeInputs<'_, E>>,
    rng: &mut R,
) -> ProofResult<EncodedResponse<E>> {
    let values = [input.iter().sum::<i64>(), input.len() as i64];
    encrypt_slots(&values, public_key, range, rng)
}

fn ratio(numerator: i64, count: i64) -> ProofResult<f64> {
    if count == 0 {
        return Err(ProofError::InvalidInput("statistic over zero records".into()));
    }
    Ok(numerator as f64 / count as f64)
}

pub fn decode_mean<C: CurveGroup>(
    ciphers: &[Ciphertext<C>],
    secret: C::ScalarField,
    table: &DiscreteLogTable,
) -> ProofResult<f64> {
    expect_slots(ciphers, 2)?;
    let clear = decrypt_slots(ciphers, secret, table)?;
    ratio(clear[0], clear[1])
}

/// `[Σ x, N, Σ x²]`.
pub fn encode_variance<E: Pairing, R: Rng>(
    input: &[i64],
    public_key: E::G1,
    range: Option<&RangeInputs<'_, E>>,
    rng: &mut R,
) -> ProofResult<EncodedResponse<E>> {
    let values: [i64; 3] = [
        input.iter().sum(),
        input.len() as i64,
        input.iter().map(|x| x * x).sum(),
    ];
    encrypt_slots(&values, public_key, range, rng)
}

/// Population variance `E[x²] - E[x]²`.
pub fn decode_variance<C: CurveGroup>(
    ciphers: &[Ciphertext<C>],
    secret: C::ScalarField,
    table: &DiscreteLogTable,
) -> ProofResult<f64> {
    expect_slots(ciphers, 3)?;
    let clear = decrypt_slots(ciphers, secret, table)?;
    let mean = ratio(clear[0], clear[1])?;
    Ok(ratio(clear[2], clear[1])? - mean * mean)
}

/// `[Σ a, Σ b, Σ a², Σ b², Σ ab]` over paired observations.
pub fn encode_cosim<E: Pairing, R: Rng>(
    a: &[i64],
    b: &[i64],
    public_key: E::G1,
    range: Option<&RangeInputs<'_, E>>,
    rng: &mut R,
) -> ProofResult<EncodedResponse<E>> {
    if a.len() != b.len() {
        return Err(ProofError::LengthMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let values: [i64; 5] = [
        a.iter().sum(),
        b.iter().sum(),
        a.iter().map(|x| x * x).sum(),
        b.iter().map(|x| x * x).sum(),
        a.iter().zip(b).map(|(x, y)| x * y).sum(),
    ];
    encrypt_slots(&values, public_key, range, rng)
}

/// `Σ ab / (√Σa² · √Σb²)`.
pub fn decode_cosim<C: CurveGroup>(
    ciphers: &[Ciphertext<C>],
    secret: C::ScalarField,
    table: &DiscreteLogTable,
) -> ProofResult<f64> {
    expect_slots(ciphers, 5)?;
    let clear = decrypt_slots(ciphers, secret, table)?;
    let norm = (clear[2] as f64).sqrt() * (clear[3] as f64).sqrt();
    if norm == 0.0 {
        return Err(ProofError::InvalidInput("cosine similarity of a zero vector".into()));
    }
    Ok(clear[4] as f64 / norm)
}
