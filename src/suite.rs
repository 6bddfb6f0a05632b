//! Pairing suite shared by every proof: generators, pairing access and the
//! fixed-width byte encodings of scalars and group elements.

use ark_ec::pairing::{Pairing, PairingOutput};
use ark_ec::PrimeGroup;
use ark_ff::{PrimeField, UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::Rng;
use sha3::{Digest, Sha3_512};

use crate::error::{ProofError, ProofResult};

/// Bilinear group suite. `b1` is the ElGamal base point, `b2` is only used inside
/// range proofs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Suite<E: Pairing> {
    pub b1: E::G1,
    pub b2: E::G2,
}

impl<E: Pairing> Default for Suite<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Pairing> Suite<E> {
    pub fn new() -> Self {
        Self {
            b1: E::G1::generator(),
            b2: E::G2::generator(),
        }
    }

    /// e: G1 x G2 -> GT, written additively.
    pub fn pair(&self, p: E::G1, q: E::G2) -> PairingOutput<E> {
        E::pairing(p, q)
    }

    pub fn point_len_g1() -> usize {
        width::<E::G1>()
    }

    pub fn point_len_g2() -> usize {
        width::<E::G2>()
    }

    pub fn point_len_gt() -> usize {
        width::<PairingOutput<E>>()
    }

    pub fn scalar_len() -> usize {
        width::<E::ScalarField>()
    }
}

/// Compressed width of a scalar or group element. Constant per type.
pub fn width<T: CanonicalSerialize + Zero>() -> usize {
    T::zero().compressed_size()
}

/// Appends the compressed encoding of `value` to `out`.
pub fn marshal_into<T: CanonicalSerialize>(value: &T, out: &mut Vec<u8>) -> ProofResult<()> {
    value
        .serialize_compressed(out)
        .map_err(|err| ProofError::Serialization(err.to_string()))
}

pub fn marshal<T: CanonicalSerialize>(value: &T) -> ProofResult<Vec<u8>> {
    let mut buf = Vec::with_capacity(value.compressed_size());
    marshal_into(value, &mut buf)?;
    Ok(buf)
}

/// Decodes a compressed value, validating curve and subgroup membership.
pub fn unmarshal<T: CanonicalDeserialize>(bytes: &[u8]) -> ProofResult<T> {
    T::deserialize_compressed(&mut &bytes[..]).map_err(|err| ProofError::Malformed(err.to_string()))
}

pub fn marshal_all<T: CanonicalSerialize>(values: &[T], out: &mut Vec<u8>) -> ProofResult<()> {
    for value in values {
        marshal_into(value, out)?;
    }
    Ok(())
}

/// Cursor over a position-indexed byte layout.
pub struct WireReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn take(&mut self, len: usize) -> ProofResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or(ProofError::LengthMismatch {
                expected: self.pos.saturating_add(len),
                actual: self.bytes.len(),
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read<T>(&mut self) -> ProofResult<T>
    where
        T: CanonicalSerialize + CanonicalDeserialize + Zero,
    {
        let slice = self.take(width::<T>())?;
        unmarshal(slice)
    }

    pub fn read_vec<T>(&mut self, count: usize) -> ProofResult<Vec<T>>
    where
        T: CanonicalSerialize + CanonicalDeserialize + Zero,
    {
        (0..count).map(|_| self.read()).collect()
    }

    pub fn read_u8(&mut self) -> ProofResult<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u32(&mut self) -> ProofResult<u32> {
        let slice = self.take(4)?;
        let mut buf = [0u8; 4];
        buf.copy_from_slice(slice);
        Ok(u32::from_be_bytes(buf))
    }

    /// Length-prefixed (u32) byte string.
    pub fn read_bytes(&mut self) -> ProofResult<&'a [u8]> {
        let len = self.read_u32()? as usize;
        self.take(len)
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// Rejects a count prefix announcing more items of `item_len` bytes than
    /// remain. Items of zero width admit no nonzero count.
    pub fn check_count(&self, count: usize, item_len: usize) -> ProofResult<()> {
        let fits = match item_len {
            0 => count == 0,
            len => count <= self.remaining() / len,
        };
        if !fits {
            return Err(ProofError::Malformed(format!(
                "count {count} of {item_len}-byte items exceeds {} remaining bytes",
                self.remaining()
            )));
        }
        Ok(())
    }

    /// Rejects trailing bytes.
    pub fn finish(self) -> ProofResult<()> {
        if self.remaining() != 0 {
            return Err(ProofError::LengthMismatch {
                expected: self.pos,
                actual: self.bytes.len(),
            });
        }
        Ok(())
    }
}

pub fn write_u32(out: &mut Vec<u8>, value: usize) -> ProofResult<()> {
    let value = u32::try_from(value)
        .map_err(|_| ProofError::InvalidInput(format!("length {value} exceeds u32")))?;
    out.extend_from_slice(&value.to_be_bytes());
    Ok(())
}

pub fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) -> ProofResult<()> {
    write_u32(out, bytes.len())?;
    out.extend_from_slice(bytes);
    Ok(())
}

/// Maps a signed integer into the scalar field, negatives as `-|m|`.
pub fn scalar_from_i64<F: PrimeField>(value: i64) -> F {
    let magnitude = F::from(value.unsigned_abs());
    if value < 0 {
        -magnitude
    } else {
        magnitude
    }
}

/// SHA3-512 over the concatenated parts, read big-endian modulo the group order.
pub fn hash_to_scalar<F: PrimeField>(parts: &[&[u8]]) -> F {
    let mut hasher = Sha3_512::new();
    for part in parts {
        hasher.update(part);
    }
    F::from_be_bytes_mod_order(&hasher.finalize())
}

pub fn random_scalars<F: UniformRand, R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<F> {
    (0..count).map(|_| F::rand(rng)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bls12_381::Bls12_381;
    use ark_bn254::{Bn254, Fr, G1Projective};
    use ark_ec::pairing::Pairing;
    use ark_std::test_rng;

    #[test]
    fn widths_match_serialized_elements() {
        let mut rng = test_rng();
        let suite = Suite::<Bn254>::new();
        let p = suite.b1 * Fr::rand(&mut rng);
        let gt = suite.pair(p, suite.b2);

        assert_eq!(marshal(&p).unwrap().len(), Suite::<Bn254>::point_len_g1());
        assert_eq!(marshal(&suite.b2).unwrap().len(), Suite::<Bn254>::point_len_g2());
        assert_eq!(marshal(&gt).unwrap().len(), Suite::<Bn254>::point_len_gt());
        assert_eq!(marshal(&Fr::from(3u64)).unwrap().len(), Suite::<Bn254>::scalar_len());
        assert!(Suite::<Bls12_381>::point_len_g1() > Suite::<Bn254>::point_len_g1());
    }

    #[test]
    fn pairing_is_bilinear() {
        let suite = Suite::<Bn254>::new();
        let a = Fr::from(6u64);
        let b = Fr::from(7u64);
        let lhs = suite.pair(suite.b1 * a, suite.b2 * b);
        let rhs = suite.pair(suite.b1, suite.b2) * (a * b);
        assert_eq!(lhs, rhs);
        let sum = suite.pair(suite.b1 * a, suite.b2) + suite.pair(suite.b1 * b, suite.b2);
        assert_eq!(sum, suite.pair(suite.b1 * (a + b), suite.b2));
    }

    #[test]
    fn reader_walks_fixed_width_layout() {
        let mut rng = test_rng();
        let points: Vec<G1Projective> = (0..3)
            .map(|_| G1Projective::generator() * Fr::rand(&mut rng))
            .collect();
        let scalar = Fr::rand(&mut rng);
        let mut bytes = Vec::new();
        marshal_all(&points, &mut bytes).unwrap();
        marshal_into(&scalar, &mut bytes).unwrap();
        write_bytes(&mut bytes, b"tail").unwrap();

        let mut reader = WireReader::new(&bytes);
        assert_eq!(reader.read_vec::<G1Projective>(3).unwrap(), points);
        assert_eq!(reader.read::<Fr>().unwrap(), scalar);
        assert_eq!(reader.read_bytes().unwrap(), b"tail");
        reader.finish().unwrap();
    }

    #[test]
    fn reader_rejects_truncated_and_garbage_input() {
        let mut reader = WireReader::new(&[1u8, 2, 3]);
        assert!(matches!(
            reader.read::<G1Projective>(),
            Err(ProofError::LengthMismatch { .. })
        ));

        let garbage = vec![0xffu8; Suite::<Bn254>::point_len_g1()];
        assert!(matches!(
            unmarshal::<<Bn254 as Pairing>::G1>(&garbage),
            Err(ProofError::Malformed(_))
        ));
    }

    #[test]
    fn signed_integers_map_to_field() {
        assert_eq!(scalar_from_i64::<Fr>(-5) + Fr::from(5u64), Fr::zero());
        assert_eq!(scalar_from_i64::<Fr>(9), Fr::from(9u64));
        assert_eq!(scalar_from_i64::<Fr>(i64::MIN), -Fr::from(1u64 << 63));
    }

    #[test]
    fn hash_to_scalar_is_deterministic() {
        let a: Fr = hash_to_scalar(&[b"abc", b"def"]);
        let b: Fr = hash_to_scalar(&[b"abcdef"]);
        let c: Fr = hash_to_scalar(&[b"abcdeg"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
