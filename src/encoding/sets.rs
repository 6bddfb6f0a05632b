use ark_ec::pairing::Pairing;
use ark_ec::CurveGroup;
use rand::Rng;

use super::bits::encode_indicators;
use super::{decrypt_slots, encrypt_slots, EncodedResponse, RangeInputs};
use crate::elgamal::{Ciphertext, DiscreteLogTable};
use crate::error::{ProofError, ProofResult};
use crate::parallel::map_indexed;

/// Number of slots covering `[min, max]`.
fn domain_size(min: i64, max: i64) -> ProofResult<usize> {
    if max < min {
        return Err(ProofError::InvalidInput(format!(
            "empty value domain [{min}, {max}]"
        )));
    }
    usize::try_from(max - min + 1)
        .map_err(|_| ProofError::InvalidInput(format!("value domain [{min}, {max}] too large")))
}

fn slot_of(value: i64, min: i64, size: usize) -> ProofResult<usize> {
    usize::try_from(value - min)
        .ok()
        .filter(|slot| *slot < size)
        .ok_or_else(|| {
            ProofError::InvalidInput(format!(
                "value {value} outside [{min}, {}]",
                min + size as i64 - 1
            ))
        })
}

/// Presence bit of every value of `[min, max]` in `input`.
fn presence(input: &[i64], min: i64, max: i64) -> ProofResult<Vec<bool>> {
    let size = domain_size(min, max)?;
    let mut present = vec![false; size];
    for value in input {
        present[slot_of(*value, min, size)?] = true;
    }
    Ok(present)
}

/// Slot `i` counts the occurrences of `min + i`.
pub fn encode_frequency_count<E: Pairing, R: Rng>(
    input: &[i64],
    min: i64,
    max: i64,
    public_key: E::G1,
    range: Option<&RangeInputs<'_, E>>,
    rng: &mut R,
) -> ProofResult<EncodedResponse<E>> {
    let size = domain_size(min, max)?;
    let mut counts = vec![0i64; size];
    for value in input {
        counts[slot_of(*value, min, size)?] += 1;
    }
    encrypt_slots(&counts, public_key, range, rng)
}

pub fn decode_frequency_count<C: CurveGroup>(
    ciphers: &[Ciphertext<C>],
    secret: C::ScalarField,
    table: &DiscreteLogTable,
) -> ProofResult<Vec<i64>> {
    decrypt_slots(ciphers, secret, table)
}

/// OR-bits `min + i >= local_min`: the first set slot after aggregation is
/// the global minimum.
pub fn encode_min<E: Pairing, R: Rng>(
    input: &[i64],
    min: i64,
    max: i64,
    public_key: E::G1,
    range: Option<&RangeInputs<'_, E>>,
    rng: &mut R,
) -> ProofResult<EncodedResponse<E>> {
    let local = input
        .iter()
        .copied()
        .min()
        .ok_or_else(|| ProofError::InvalidInput("minimum of an empty input".into()))?;
    let size = domain_size(min, max)?;
    let bits: Vec<bool> = (0..size as i64).map(|i| min + i >= local).collect();
    encode_indicators(&bits, public_key, range, rng)
}

/// AND-bits `min + i >= local_max`: the first slot every provider set is the
/// global maximum.
pub fn encode_max<E: Pairing, R: Rng>(
    input: &[i64],
    min: i64,
    max: i64,
    public_key: E::G1,
    range: Option<&RangeInputs<'_, E>>,
    rng: &mut R,
) -> ProofResult<EncodedResponse<E>> {
    let local = input
        .iter()
        .copied()
        .max()
        .ok_or_else(|| ProofError::InvalidInput("maximum of an empty input".into()))?;
    let size = domain_size(min, max)?;
    let bits: Vec<bool> = (0..size as i64).map(|i| min + i < local).collect();
    encode_indicators(&bits, public_key, range, rng)
}

fn first_set(bits: &[bool], query_min: i64) -> ProofResult<i64> {
    bits.iter()
        .position(|bit| *bit)
        .map(|i| query_min + i as i64)
        .ok_or_else(|| ProofError::InvalidInput("no slot set in aggregated bit vector".into()))
}

fn or_bits<C: CurveGroup>(ciphers: &[Ciphertext<C>], secret: C::ScalarField) -> Vec<bool> {
    map_indexed(ciphers.len(), |i| !ciphers[i].decrypt_check_zero(secret))
}

fn and_bits<C: CurveGroup>(ciphers: &[Ciphertext<C>], secret: C::ScalarField) -> Vec<bool> {
    or_bits(ciphers, secret).into_iter().map(|bit| !bit).collect()
}

pub fn decode_min<C: CurveGroup>(
    ciphers: &[Ciphertext<C>],
    query_min: i64,
    secret: C::ScalarField,
) -> ProofResult<i64> {
    first_set(&or_bits(ciphers, secret), query_min)
}

pub fn decode_max<C: CurveGroup>(
    ciphers: &[Ciphertext<C>],
    query_min: i64,
    secret: C::ScalarField,
) -> ProofResult<i64> {
    first_set(&and_bits(ciphers, secret), query_min)
}

/// OR-bit per value of `[min, max]` present in `input`.
pub fn encode_union<E: Pairing, R: Rng>(
    input: &[i64],
    min: i64,
    max: i64,
    public_key: E::G1,
    range: Option<&RangeInputs<'_, E>>,
    rng: &mut R,
) -> ProofResult<EncodedResponse<E>> {
    encode_indicators(&presence(input, min, max)?, public_key, range, rng)
}

/// AND-bit per value of `[min, max]` present in `input`.
pub fn encode_inter<E: Pairing, R: Rng>(
    input: &[i64],
    min: i64,
    max: i64,
    public_key: E::G1,
    range: Option<&RangeInputs<'_, E>>,
    rng: &mut R,
) -> ProofResult<EncodedResponse<E>> {
    let absent: Vec<bool> = presence(input, min, max)?
        .into_iter()
        .map(|bit| !bit)
        .collect();
    encode_indicators(&absent, public_key, range, rng)
}

/// Membership vector of the global union, `1` where some provider holds the value.
pub fn decode_union<C: CurveGroup>(ciphers: &[Ciphertext<C>], secret: C::ScalarField) -> Vec<i64> {
    or_bits(ciphers, secret).into_iter().map(i64::from).collect()
}

/// Membership vector of the global intersection.
pub fn decode_inter<C: CurveGroup>(ciphers: &[Ciphertext<C>], secret: C::ScalarField) -> Vec<i64> {
    and_bits(ciphers, secret).into_iter().map(i64::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::KeyPair;
    use ark_bn254::{Bn254, G1Projective};
    use ark_std::rand::rngs::StdRng;
    use ark_std::rand::SeedableRng;
    use ark_std::test_rng;

    type E = Bn254;
    type Curve = G1Projective;

    type Encoder = fn(
        &[i64],
        i64,
        i64,
        Curve,
        Option<&RangeInputs<'_, E>>,
        &mut StdRng,
    ) -> ProofResult<EncodedResponse<E>>;

    /// Encodes each provider and adds the slots homomorphically.
    fn aggregate(encoder: Encoder, inputs: &[&[i64]], keys: &KeyPair<Curve>) -> Vec<Ciphertext<Curve>> {
        let mut rng = StdRng::seed_from_u64(11);
        let mut total: Option<Vec<Ciphertext<Curve>>> = None;
        for input in inputs {
            let encoded = encoder(input, 0, 9, keys.public_key, None, &mut rng).unwrap();
            assert_eq!(encoded.len(), 10);
            total = Some(match total {
                None => encoded.ciphers,
                Some(acc) => acc.iter().zip(&encoded.ciphers).map(|(a, b)| a + b).collect(),
            });
        }
        total.unwrap()
    }

    #[test]
    fn global_min_and_max() {
        let keys = KeyPair::<Curve>::random(&mut test_rng());
        let inputs: [&[i64]; 3] = [&[4, 7], &[6, 3, 8], &[5]];
        let mins = aggregate(encode_min::<E, _>, &inputs, &keys);
        assert_eq!(decode_min(&mins, 0, keys.secret_key).unwrap(), 3);
        let maxs = aggregate(encode_max::<E, _>, &inputs, &keys);
        assert_eq!(decode_max(&maxs, 0, keys.secret_key).unwrap(), 8);
    }

    #[test]
    fn union_and_intersection() {
        let keys = KeyPair::<Curve>::random(&mut test_rng());
        let inputs: [&[i64]; 2] = [&[1, 2, 2, 5], &[2, 5, 9]];
        let union = aggregate(encode_union::<E, _>, &inputs, &keys);
        assert_eq!(
            decode_union(&union, keys.secret_key),
            vec![0, 1, 1, 0, 0, 1, 0, 0, 0, 1]
        );
        let inter = aggregate(encode_inter::<E, _>, &inputs, &keys);
        assert_eq!(
            decode_inter(&inter, keys.secret_key),
            vec![0, 0, 1, 0, 0, 1, 0, 0, 0, 0]
        );
    }

    #[test]
    fn frequency_count_adds_up() {
        let keys = KeyPair::<Curve>::random(&mut test_rng());
        let table = DiscreteLogTable::global::<Curve>(10_000);
        let inputs: [&[i64]; 2] = [&[0, 0, 9], &[9, 4]];
        let counts = aggregate(encode_frequency_count::<E, _>, &inputs, &keys);
        assert_eq!(
            decode_frequency_count(&counts, keys.secret_key, &table).unwrap(),
            vec![2, 0, 0, 0, 1, 0, 0, 0, 0, 2]
        );
    }

    #[test]
    fn out_of_domain_and_empty_inputs_fail() {
        let mut rng = test_rng();
        let keys = KeyPair::<Curve>::random(&mut rng);
        assert!(encode_frequency_count::<E, _>(&[10], 0, 9, keys.public_key, None, &mut rng).is_err());
        assert!(encode_union::<E, _>(&[-1], 0, 9, keys.public_key, None, &mut rng).is_err());
        assert!(encode_min::<E, _>(&[], 0, 9, keys.public_key, None, &mut rng).is_err());
        assert!(encode_max::<E, _>(&[1], 5, 4, keys.public_key, None, &mut rng).is_err());
        assert!(decode_min::<Curve>(&[Ciphertext::zero()], 0, keys.secret_key).is_err());
    }
}
