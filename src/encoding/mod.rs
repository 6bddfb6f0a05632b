//! Per-operation encoding of a data provider's values into ciphertext slots,
//! and decoding of the aggregated slots back into the statistic.
//!
//! Every encoder optionally prepares one [`CreateProof`] per slot so the
//! provider can prove each encrypted value lies in its published range.

mod bits;
mod linear_regression;
mod sets;
mod stats;

use ark_ec::pairing::Pairing;
use ark_ec::CurveGroup;
use rand::Rng;

pub use bits::{
    decode_bit_and, decode_bit_or, encode_bit_and, encode_bit_or, local_result_and,
    local_result_or,
};
pub use linear_regression::{decode_linear_regression, encode_linear_regression, solve_linear_system};
pub use sets::{
    decode_frequency_count, decode_inter, decode_max, decode_min, decode_union,
    encode_frequency_count, encode_inter, encode_max, encode_min, encode_union,
};
pub use stats::{
    decode_cosim, decode_mean, decode_sum, decode_variance, encode_cosim, encode_mean,
    encode_sum, encode_variance,
};

use crate::elgamal::{Ciphertext, DiscreteLogTable};
use crate::error::{ProofError, ProofResult};
use crate::parallel::{map_with_rng, try_map_indexed};
use crate::proofs::{CreateProof, PublishSignature, RangeBounds};
use crate::query::{Operation, OperationKind};

const LOG_TARGET: &str = "drynx_proofs::encoding";

/// Range credentials the encoded slots are proven against.
#[derive(Clone, Copy, Debug)]
pub struct RangeInputs<'a, E: Pairing> {
    /// `sigs[v][i]`: verifier `v`'s credential set for slot `i`.
    pub sigs: &'a [Vec<PublishSignature<E>>],
    pub ranges: &'a [RangeBounds],
}

impl<'a, E: Pairing> RangeInputs<'a, E> {
    pub fn new(sigs: &'a [Vec<PublishSignature<E>>], ranges: &'a [RangeBounds]) -> Self {
        Self { sigs, ranges }
    }

    /// Every verifier's credential for `slot`.
    pub fn column(&self, slot: usize) -> ProofResult<Vec<PublishSignature<E>>> {
        self.sigs
            .iter()
            .map(|row| {
                row.get(slot).cloned().ok_or(ProofError::LengthMismatch {
                    expected: slot + 1,
                    actual: row.len(),
                })
            })
            .collect()
    }

    pub fn bounds(&self, slot: usize) -> ProofResult<RangeBounds> {
        self.ranges
            .get(slot)
            .copied()
            .ok_or(ProofError::LengthMismatch {
                expected: slot + 1,
                actual: self.ranges.len(),
            })
    }
}

/// Ciphertext slots of one provider, their cleartexts and, when credentials
/// were given, the inputs of one range proof per slot.
#[derive(Clone, Debug)]
pub struct EncodedResponse<E: Pairing> {
    pub ciphers: Vec<Ciphertext<E::G1>>,
    pub clear: Vec<i64>,
    pub proofs: Vec<CreateProof<E>>,
}

impl<E: Pairing> EncodedResponse<E> {
    pub fn len(&self) -> usize {
        self.ciphers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ciphers.is_empty()
    }

    /// Repeats the slots, cleartexts and range proof inputs back to back so the
    /// response fills an operation whose outputs were multiplied by
    /// `cutting_factor`. Copy `j` of slot `i` lands at `j * len + i` and is
    /// proven against slot `i`'s bounds. A factor of 0 or 1 changes nothing.
    pub fn replicate(mut self, cutting_factor: usize) -> Self {
        if cutting_factor > 1 {
            self.ciphers = repeated(&self.ciphers, cutting_factor);
            self.clear = repeated(&self.clear, cutting_factor);
            self.proofs = repeated(&self.proofs, cutting_factor);
        }
        self
    }
}

fn repeated<T: Clone>(items: &[T], times: usize) -> Vec<T> {
    (0..times).flat_map(|_| items.iter().cloned()).collect()
}

/// First copy of a response replicated `cutting_factor` times; inverse of
/// [`EncodedResponse::replicate`] on aggregated slots.
pub fn uncut<T>(slots: &[T], cutting_factor: usize) -> ProofResult<&[T]> {
    if cutting_factor <= 1 {
        return Ok(slots);
    }
    if slots.len() % cutting_factor != 0 {
        return Err(ProofError::InvalidInput(format!(
            "{} slots do not split into {cutting_factor} copies",
            slots.len()
        )));
    }
    Ok(&slots[..slots.len() / cutting_factor])
}

/// Encrypts `values` slot by slot, attaching range proof inputs when asked.
pub(crate) fn encrypt_slots<E: Pairing, R: Rng>(
    values: &[i64],
    public_key: E::G1,
    range: Option<&RangeInputs<'_, E>>,
    rng: &mut R,
) -> ProofResult<EncodedResponse<E>> {
    let encrypted = map_with_rng(rng, values.len(), |i, stream| {
        Ciphertext::encrypt_int_get_r(public_key, values[i], stream)
    });
    let proofs = match range {
        Some(range) => encrypted
            .iter()
            .enumerate()
            .map(|(i, (cipher, r))| {
                let (u, l) = range.bounds(i)?;
                Ok(CreateProof {
                    sigs: range.column(i)?,
                    u,
                    l,
                    secret: values[i],
                    r: *r,
                    ca_pub: public_key,
                    cipher: cipher.clone(),
                })
            })
            .collect::<ProofResult<Vec<_>>>()?,
        None => Vec::new(),
    };
    Ok(EncodedResponse {
        ciphers: encrypted.into_iter().map(|(cipher, _)| cipher).collect(),
        clear: values.to_vec(),
        proofs,
    })
}

pub(crate) fn decrypt_slots<C: CurveGroup>(
    ciphers: &[Ciphertext<C>],
    secret: C::ScalarField,
    table: &DiscreteLogTable,
) -> ProofResult<Vec<i64>> {
    try_map_indexed(ciphers.len(), |i| table.decrypt(secret, &ciphers[i]))
}

pub(crate) fn expect_slots<T>(slots: &[T], expected: usize) -> ProofResult<()> {
    if slots.len() != expected {
        return Err(ProofError::LengthMismatch {
            expected,
            actual: slots.len(),
        });
    }
    Ok(())
}

fn input_row<'d>(data: &'d [Vec<i64>], row: usize) -> ProofResult<&'d [i64]> {
    data.get(row)
        .map(Vec::as_slice)
        .ok_or(ProofError::LengthMismatch {
            expected: row + 1,
            actual: data.len(),
        })
}

/// Encodes a provider's input rows for `operation`. `data` holds
/// `operation.nbr_input` rows; linear regression takes the features first and
/// the label last.
pub fn encode<E: Pairing, R: Rng>(
    data: &[Vec<i64>],
    public_key: E::G1,
    operation: &Operation,
    range: Option<RangeInputs<'_, E>>,
    rng: &mut R,
) -> ProofResult<EncodedResponse<E>> {
    let range = range.filter(|r| !r.ranges.is_empty() && !r.sigs.is_empty());
    let range = range.as_ref();
    let (min, max) = (operation.query_min, operation.query_max);
    let encoded = match operation.name_op {
        OperationKind::Sum => encode_sum(input_row(data, 0)?, public_key, range, rng)?,
        OperationKind::Mean => encode_mean(input_row(data, 0)?, public_key, range, rng)?,
        OperationKind::Variance => encode_variance(input_row(data, 0)?, public_key, range, rng)?,
        OperationKind::Cosim => encode_cosim(
            input_row(data, 0)?,
            input_row(data, 1)?,
            public_key,
            range,
            rng,
        )?,
        OperationKind::FrequencyCount => {
            encode_frequency_count(input_row(data, 0)?, min, max, public_key, range, rng)?
        }
        OperationKind::Min => encode_min(input_row(data, 0)?, min, max, public_key, range, rng)?,
        OperationKind::Max => encode_max(input_row(data, 0)?, min, max, public_key, range, rng)?,
        OperationKind::Union => encode_union(input_row(data, 0)?, min, max, public_key, range, rng)?,
        OperationKind::Inter => encode_inter(input_row(data, 0)?, min, max, public_key, range, rng)?,
        OperationKind::BoolOr => {
            let bit = input_row(data, 0)?.first() == Some(&1);
            encode_bit_or(bit, public_key, range, rng)?
        }
        OperationKind::BoolAnd => {
            let bit = input_row(data, 0)?.first() == Some(&1);
            encode_bit_and(bit, public_key, range, rng)?
        }
        OperationKind::LinReg => {
            let (label, features) = data.split_last().ok_or(ProofError::LengthMismatch {
                expected: operation.nbr_input,
                actual: 0,
            })?;
            let records = transpose(features, label.len())?;
            encode_linear_regression(&records, label, public_key, range, rng)?
        }
        OperationKind::LogReg => {
            return Err(ProofError::InvalidInput(
                "logistic regression has no slot encoding".into(),
            ))
        }
    };
    tracing::debug!(
        target: LOG_TARGET,
        operation = %operation.name_op,
        slots = encoded.len(),
        proofs = encoded.proofs.len(),
        "encoded provider response"
    );
    Ok(encoded)
}

/// Column-major feature rows to one record per observation.
fn transpose(features: &[Vec<i64>], records: usize) -> ProofResult<Vec<Vec<i64>>> {
    if let Some(row) = features.iter().find(|row| row.len() != records) {
        return Err(ProofError::LengthMismatch {
            expected: records,
            actual: row.len(),
        });
    }
    Ok((0..records)
        .map(|i| features.iter().map(|row| row[i]).collect())
        .collect())
}

/// Decodes aggregated slots into the statistic's value(s).
pub fn decode<C: CurveGroup>(
    ciphers: &[Ciphertext<C>],
    secret: C::ScalarField,
    operation: &Operation,
    table: &DiscreteLogTable,
) -> ProofResult<Vec<f64>> {
    let bit = |value: bool| if value { 1.0 } else { 0.0 };
    let ints = |values: Vec<i64>| -> Vec<f64> { values.into_iter().map(|v| v as f64).collect() };
    Ok(match operation.name_op {
        OperationKind::Sum => vec![decode_sum(ciphers, secret, table)? as f64],
        OperationKind::Mean => vec![decode_mean(ciphers, secret, table)?],
        OperationKind::Variance => vec![decode_variance(ciphers, secret, table)?],
        OperationKind::Cosim => vec![decode_cosim(ciphers, secret, table)?],
        OperationKind::FrequencyCount => ints(decode_frequency_count(ciphers, secret, table)?),
        OperationKind::Min => vec![decode_min(ciphers, operation.query_min, secret)? as f64],
        OperationKind::Max => vec![decode_max(ciphers, operation.query_min, secret)? as f64],
        OperationKind::Union => ints(decode_union(ciphers, secret)),
        OperationKind::Inter => ints(decode_inter(ciphers, secret)),
        OperationKind::BoolOr => {
            expect_slots(ciphers, 1)?;
            vec![bit(decode_bit_or(&ciphers[0], secret))]
        }
        OperationKind::BoolAnd => {
            expect_slots(ciphers, 1)?;
            vec![bit(decode_bit_and(&ciphers[0], secret))]
        }
        OperationKind::LinReg => decode_linear_regression(ciphers, secret, table)?,
        OperationKind::LogReg => ints(decrypt_slots(ciphers, secret, table)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::KeyPair;
    use crate::proofs::{
        create_predicate_range_proof_list, init_range_proof_signature_deterministic,
        range_proof_list_verification, RangeProofList,
    };
    use crate::query::choose_operation;
    use crate::suite::Suite;
    use ark_bn254::{Bn254, G1Projective};
    use ark_std::test_rng;

    type E = Bn254;
    type Curve = G1Projective;

    fn round_trip(operation: &Operation, data: &[Vec<i64>]) -> Vec<f64> {
        let mut rng = test_rng();
        let keys = KeyPair::<Curve>::random(&mut rng);
        let encoded = encode::<E, _>(data, keys.public_key, operation, None, &mut rng).unwrap();
        assert_eq!(encoded.len(), operation.nbr_output);
        assert!(encoded.proofs.is_empty());
        let table = DiscreteLogTable::global::<Curve>(10_000);
        decode(&encoded.ciphers, keys.secret_key, operation, &table).unwrap()
    }

    #[test]
    fn dispatch_matches_operation_arity() {
        let op = choose_operation("sum", 0, 10, 0, 0).unwrap();
        assert_eq!(round_trip(&op, &[vec![1, 2, 3]]), vec![6.0]);

        let op = choose_operation("frequencyCount", 0, 3, 0, 0).unwrap();
        assert_eq!(round_trip(&op, &[vec![0, 3, 3, 1]]), vec![1.0, 1.0, 0.0, 2.0]);

        let op = choose_operation("bool_AND", 0, 1, 0, 0).unwrap();
        assert_eq!(round_trip(&op, &[vec![1]]), vec![1.0]);

        let op = choose_operation("lin_reg", 0, 10, 1, 0).unwrap();
        let coeffs = round_trip(&op, &[vec![1, 2, 3, 4], vec![3, 5, 7, 9]]);
        assert!((coeffs[0] - 1.0).abs() < 1e-9 && (coeffs[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn missing_rows_and_logreg_are_rejected() {
        let mut rng = test_rng();
        let keys = KeyPair::<Curve>::random(&mut rng);
        let op = choose_operation("cosim", 0, 10, 0, 0).unwrap();
        assert!(encode::<E, _>(&[vec![1]], keys.public_key, &op, None, &mut rng).is_err());

        let op = Operation {
            name_op: OperationKind::LogReg,
            ..Default::default()
        };
        assert!(encode::<E, _>(&[vec![1]], keys.public_key, &op, None, &mut rng).is_err());
    }

    #[test]
    fn range_inputs_yield_verifiable_proofs() {
        let mut rng = test_rng();
        let suite = Suite::<E>::new();
        let keys = KeyPair::<Curve>::random(&mut rng);
        let op = choose_operation("mean", 0, 10, 0, 0).unwrap();
        let cred = init_range_proof_signature_deterministic(&suite, 4)
            .unwrap()
            .to_signature()
            .unwrap();
        let sigs = vec![vec![cred.clone(), cred]];
        let ranges = vec![(4, 3), (4, 2)];

        let encoded = encode(
            &[vec![5, 6, 7]],
            keys.public_key,
            &op,
            Some(RangeInputs::new(&sigs, &ranges)),
            &mut rng,
        )
        .unwrap();
        assert_eq!(encoded.clear, vec![18, 3]);
        assert_eq!(encoded.proofs.len(), 2);

        let list: RangeProofList<E> =
            create_predicate_range_proof_list(&suite, &encoded.proofs, &mut rng, None).unwrap();
        let published = vec![sigs[0].iter().map(|s| s.to_bytes().unwrap()).collect::<Vec<_>>()];
        assert!(range_proof_list_verification(
            &suite,
            &list,
            &ranges,
            &published,
            keys.public_key,
            1.0
        ));
    }

    #[test]
    fn cutting_factor_replicates_and_uncuts() {
        let mut rng = test_rng();
        let suite = Suite::<E>::new();
        let keys = KeyPair::<Curve>::random(&mut rng);
        let op = choose_operation("mean", 0, 10, 0, 3).unwrap();
        assert_eq!(op.nbr_output, 6);
        let cred = init_range_proof_signature_deterministic(&suite, 4)
            .unwrap()
            .to_signature()
            .unwrap();
        let sigs = vec![vec![cred; op.nbr_output]];
        let ranges = vec![(4, 3); op.nbr_output];

        let encoded = encode(
            &[vec![2, 4]],
            keys.public_key,
            &op,
            Some(RangeInputs::new(&sigs, &ranges)),
            &mut rng,
        )
        .unwrap()
        .replicate(3);
        assert_eq!(encoded.len(), op.nbr_output);
        assert_eq!(encoded.clear, vec![6, 2, 6, 2, 6, 2]);
        assert_eq!(encoded.ciphers[1], encoded.ciphers[3]);
        assert_eq!(encoded.proofs.len(), op.nbr_output);

        let list: RangeProofList<E> =
            create_predicate_range_proof_list(&suite, &encoded.proofs, &mut rng, None).unwrap();
        let published = vec![sigs[0].iter().map(|s| s.to_bytes().unwrap()).collect::<Vec<_>>()];
        assert!(range_proof_list_verification(
            &suite,
            &list,
            &ranges,
            &published,
            keys.public_key,
            1.0
        ));

        let table = DiscreteLogTable::global::<Curve>(1_000);
        let first = uncut(&encoded.ciphers, 3).unwrap();
        let base = choose_operation("mean", 0, 10, 0, 0).unwrap();
        assert_eq!(decode(first, keys.secret_key, &base, &table).unwrap(), vec![3.0]);
        assert_eq!(uncut(&encoded.ciphers, 0).unwrap().len(), 6);
        assert!(uncut(&encoded.ciphers[..5], 3).is_err());
    }

    #[test]
    fn missing_credentials_are_length_errors() {
        let mut rng = test_rng();
        let keys = KeyPair::<Curve>::random(&mut rng);
        let suite = Suite::<E>::new();
        let cred = init_range_proof_signature_deterministic(&suite, 2)
            .unwrap()
            .to_signature()
            .unwrap();
        let sigs = vec![vec![cred]];
        let ranges = vec![(2, 1), (2, 1)];
        let op = choose_operation("mean", 0, 10, 0, 0).unwrap();
        let err = encode(
            &[vec![1]],
            keys.public_key,
            &op,
            Some(RangeInputs::new(&sigs, &ranges)),
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, ProofError::LengthMismatch { .. }));
    }
}
