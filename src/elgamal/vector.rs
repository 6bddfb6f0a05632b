use ark_ec::CurveGroup;
use ark_ff::UniformRand;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::Rng;
use serde::{Deserialize, Serialize};

use super::Ciphertext;
use crate::error::{ProofError, ProofResult};
use crate::parallel::{map_indexed, map_with_rng};
use crate::signing::{Signable, TranscriptBuilder};
use crate::suite::{width, write_u32, WireReader};

/// Ordered sequence of ciphertexts with componentwise operations.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(
    transparent,
    bound(
        serialize = "C: CanonicalSerialize",
        deserialize = "C: CanonicalDeserialize"
    )
)]
pub struct CipherVector<C: CurveGroup>(pub Vec<Ciphertext<C>>);

impl<C: CurveGroup> Default for CipherVector<C> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<C: CurveGroup> From<Vec<Ciphertext<C>>> for CipherVector<C> {
    fn from(items: Vec<Ciphertext<C>>) -> Self {
        Self(items)
    }
}

fn ensure_same_len(expected: usize, actual: usize) -> ProofResult<()> {
    if expected != actual {
        return Err(ProofError::LengthMismatch { expected, actual });
    }
    Ok(())
}

impl<C: CurveGroup> CipherVector<C> {
    /// `len` encryptions of zero with zero randomness.
    pub fn zeros(len: usize) -> Self {
        Self(vec![Ciphertext::zero(); len])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Ciphertext<C>> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Ciphertext<C>] {
        &self.0
    }

    pub fn encrypt<R: Rng>(public_key: C, values: &[i64], rng: &mut R) -> Self {
        Self::encrypt_get_r(public_key, values, rng).0
    }

    pub fn encrypt_get_r<R: Rng>(
        public_key: C,
        values: &[i64],
        rng: &mut R,
    ) -> (Self, Vec<C::ScalarField>) {
        let pairs = map_with_rng(rng, values.len(), |i, stream| {
            Ciphertext::encrypt_int_get_r(public_key, values[i], stream)
        });
        let (cts, rs) = pairs.into_iter().unzip();
        (Self(cts), rs)
    }

    pub fn add(&self, other: &Self) -> ProofResult<Self> {
        ensure_same_len(self.len(), other.len())?;
        Ok(Self(map_indexed(self.len(), |i| &self.0[i] + &other.0[i])))
    }

    pub fn sub(&self, other: &Self) -> ProofResult<Self> {
        ensure_same_len(self.len(), other.len())?;
        Ok(Self(map_indexed(self.len(), |i| &self.0[i] - &other.0[i])))
    }

    pub fn mul_by_scalar(&self, scalar: C::ScalarField) -> Self {
        Self(map_indexed(self.len(), |i| self.0[i].mul_by_scalar(scalar)))
    }

    /// Adds a fresh encryption of zero to every slot.
    pub fn rerandomize<R: Rng>(&self, public_key: C, rng: &mut R) -> (Self, Vec<C::ScalarField>) {
        let betas: Vec<C::ScalarField> = (0..self.len())
            .map(|_| C::ScalarField::rand(rng))
            .collect();
        let out = Self(map_indexed(self.len(), |i| {
            self.0[i].add_encryption_layer(betas[i], public_key)
        }));
        (out, betas)
    }

    /// Slot `i` becomes `(K_i + β_i g, C_i + β_i h)`.
    pub fn rerandomize_with(&self, betas: &[C::ScalarField], g: C, h: C) -> ProofResult<Self> {
        ensure_same_len(self.len(), betas.len())?;
        Ok(Self(map_indexed(self.len(), |i| {
            self.0[i].rerandomize_with_bases(betas[i], g, h)
        })))
    }

    /// Adds precomputed encryptions of zero slot by slot.
    pub fn rerandomize_precomputed(&self, zeros: &[Ciphertext<C>]) -> ProofResult<Self> {
        if zeros.len() < self.len() {
            return Err(ProofError::LengthMismatch {
                expected: self.len(),
                actual: zeros.len(),
            });
        }
        Ok(Self(map_indexed(self.len(), |i| &self.0[i] + &zeros[i])))
    }

    pub fn decrypt_points(&self, secret: C::ScalarField) -> Vec<C> {
        map_indexed(self.len(), |i| self.0[i].decrypt_point(secret))
    }

    /// Count-prefixed concatenation of `(K, C)` pairs.
    pub fn write_bytes(&self, out: &mut Vec<u8>) -> ProofResult<()> {
        write_u32(out, self.len())?;
        self.write_slots(out)
    }

    /// Bare concatenation, for layouts where the arity is carried elsewhere.
    pub fn write_slots(&self, out: &mut Vec<u8>) -> ProofResult<()> {
        for ct in &self.0 {
            ct.write_bytes(out)?;
        }
        Ok(())
    }

    pub fn read(reader: &mut WireReader<'_>) -> ProofResult<Self> {
        let len = reader.read_u32()? as usize;
        reader.check_count(len, 2 * width::<C>())?;
        Self::read_slots(reader, len)
    }

    pub fn read_slots(reader: &mut WireReader<'_>, len: usize) -> ProofResult<Self> {
        (0..len)
            .map(|_| Ciphertext::read(reader))
            .collect::<ProofResult<Vec<_>>>()
            .map(Self)
    }

    pub fn to_bytes(&self) -> ProofResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_bytes(&mut out)?;
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> ProofResult<Self> {
        let mut reader = WireReader::new(bytes);
        let vector = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(vector)
    }
}

impl<C: CurveGroup> Signable for CipherVector<C> {
    fn domain_kind(&self) -> &'static str {
        "elgamal/cipher_vector_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        builder.append_u64(self.len() as u64);
        for ct in &self.0 {
            ct.write_transcript(builder);
        }
    }
}

/// One precomputed rerandomization vector: scalars `s_j` and the matching
/// encryptions of zero `(s_j g, s_j h)`.
#[derive(Clone, Debug)]
pub struct PrecomputedZeros<C: CurveGroup> {
    pub scalars: Vec<C::ScalarField>,
    pub ciphers: Vec<Ciphertext<C>>,
}

/// Pool of precomputed encryptions of zero, drawn from at random during shuffles.
#[derive(Clone, Debug)]
pub struct RerandomizationPool<C: CurveGroup> {
    entries: Vec<PrecomputedZeros<C>>,
}

impl<C: CurveGroup> RerandomizationPool<C> {
    pub fn generate<R: Rng>(g: C, h: C, width: usize, count: usize, rng: &mut R) -> Self {
        let entries = map_with_rng(rng, count, |_, stream| {
            let scalars: Vec<C::ScalarField> =
                (0..width).map(|_| C::ScalarField::rand(stream)).collect();
            let ciphers = scalars
                .iter()
                .map(|s| Ciphertext::new(g * s, h * s))
                .collect();
            PrecomputedZeros { scalars, ciphers }
        });
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Slots available in every entry.
    pub fn width(&self) -> usize {
        self.entries
            .iter()
            .map(|entry| entry.scalars.len())
            .min()
            .unwrap_or(0)
    }

    pub fn pick<R: Rng>(&self, rng: &mut R) -> Option<&PrecomputedZeros<C>> {
        if self.entries.is_empty() {
            return None;
        }
        self.entries.get(rng.gen_range(0..self.entries.len()))
    }
}
