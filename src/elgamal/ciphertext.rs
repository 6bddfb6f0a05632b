use std::ops::{Add, Neg, Sub};

use ark_ec::CurveGroup;
use ark_ff::{UniformRand, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ProofResult;
use crate::signing::{Signable, TranscriptBuilder};
use crate::suite::{marshal_into, scalar_from_i64, WireReader};

/// Additive ElGamal ciphertext `(K, C) = (rB, mB + rP)`.
#[derive(
    Clone, Debug, PartialEq, Eq, Serialize, Deserialize, CanonicalSerialize, CanonicalDeserialize,
)]
#[serde(bound(
    serialize = "C: CanonicalSerialize",
    deserialize = "C: CanonicalDeserialize"
))]
pub struct Ciphertext<C: CurveGroup> {
    #[serde(with = "crate::crypto_serde::curve")]
    pub k: C,
    #[serde(with = "crate::crypto_serde::curve")]
    pub c: C,
}

impl<C: CurveGroup> Default for Ciphertext<C> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<C: CurveGroup> Ciphertext<C> {
    pub fn new(k: C, c: C) -> Self {
        Self { k, c }
    }

    /// `(0, 0)`, the neutral element of ciphertext addition.
    pub fn zero() -> Self {
        Self::new(C::zero(), C::zero())
    }

    /// Encrypt a message point: `(rB, M + rP)`.
    pub fn encrypt(message: C, randomness: C::ScalarField, public_key: C) -> Self {
        Self::new(C::zero(), message).add_encryption_layer(randomness, public_key)
    }

    /// Encrypt a scalar message by first mapping it to `mB`.
    pub fn encrypt_scalar(message: C::ScalarField, randomness: C::ScalarField, public_key: C) -> Self {
        Self::encrypt(C::generator() * message, randomness, public_key)
    }

    pub fn encrypt_int<R: Rng>(public_key: C, message: i64, rng: &mut R) -> Self {
        Self::encrypt_int_get_r(public_key, message, rng).0
    }

    /// Encrypts `message` and returns the randomness used, for proofs over it.
    pub fn encrypt_int_get_r<R: Rng>(
        public_key: C,
        message: i64,
        rng: &mut R,
    ) -> (Self, C::ScalarField) {
        let r = C::ScalarField::rand(rng);
        (
            Self::encrypt_scalar(scalar_from_i64(message), r, public_key),
            r,
        )
    }

    /// Adds `(rB, rP)`, an encryption of zero under `public_key`.
    pub fn add_encryption_layer(&self, randomness: C::ScalarField, public_key: C) -> Self {
        let generator = C::generator();
        Self {
            k: self.k + generator * randomness,
            c: self.c + public_key * randomness,
        }
    }

    /// Rerandomizes with fresh randomness, returning it.
    pub fn rerandomize<R: Rng>(&self, public_key: C, rng: &mut R) -> (Self, C::ScalarField) {
        let r = C::ScalarField::rand(rng);
        (self.add_encryption_layer(r, public_key), r)
    }

    /// Rerandomizes with explicit bases: `(K + βg, C + βh)`.
    pub fn rerandomize_with_bases(&self, beta: C::ScalarField, g: C, h: C) -> Self {
        Self {
            k: self.k + g * beta,
            c: self.c + h * beta,
        }
    }

    pub fn mul_by_scalar(&self, scalar: C::ScalarField) -> Self {
        Self {
            k: self.k * scalar,
            c: self.c * scalar,
        }
    }

    /// Recovers the message point `C - sK`.
    pub fn decrypt_point(&self, secret: C::ScalarField) -> C {
        self.c - self.k * secret
    }

    /// True when the plaintext is zero.
    pub fn decrypt_check_zero(&self, secret: C::ScalarField) -> bool {
        self.decrypt_point(secret).is_zero()
    }

    pub fn write_bytes(&self, out: &mut Vec<u8>) -> ProofResult<()> {
        marshal_into(&self.k, out)?;
        marshal_into(&self.c, out)
    }

    pub fn to_bytes(&self) -> ProofResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_bytes(&mut out)?;
        Ok(out)
    }

    pub fn read(reader: &mut WireReader<'_>) -> ProofResult<Self> {
        Ok(Self {
            k: reader.read()?,
            c: reader.read()?,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> ProofResult<Self> {
        let mut reader = WireReader::new(bytes);
        let ct = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(ct)
    }
}

impl<C: CurveGroup> Add for Ciphertext<C> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.k + other.k, self.c + other.c)
    }
}

impl<'a, C: CurveGroup> Add<&'a Ciphertext<C>> for &'a Ciphertext<C> {
    type Output = Ciphertext<C>;

    fn add(self, other: &'a Ciphertext<C>) -> Ciphertext<C> {
        Ciphertext::new(self.k + other.k, self.c + other.c)
    }
}

impl<C: CurveGroup> Sub for Ciphertext<C> {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.k - other.k, self.c - other.c)
    }
}

impl<'a, C: CurveGroup> Sub<&'a Ciphertext<C>> for &'a Ciphertext<C> {
    type Output = Ciphertext<C>;

    fn sub(self, other: &'a Ciphertext<C>) -> Ciphertext<C> {
        Ciphertext::new(self.k - other.k, self.c - other.c)
    }
}

impl<C: CurveGroup> Neg for Ciphertext<C> {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.k, -self.c)
    }
}

impl<C: CurveGroup> std::iter::Sum for Ciphertext<C> {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), |acc, ct| acc + ct)
    }
}

impl<C: CurveGroup> Signable for Ciphertext<C> {
    fn domain_kind(&self) -> &'static str {
        "elgamal/ciphertext_v1"
    }

    fn write_transcript(&self, builder: &mut TranscriptBuilder) {
        builder.append_curve(&self.k);
        builder.append_curve(&self.c);
    }
}
