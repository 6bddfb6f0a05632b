//! Fiat-Shamir transcript over SHA3-512.

use ark_ff::PrimeField;
use ark_serialize::CanonicalSerialize;
use sha3::digest::{ExtendableOutput, Update, XofReader};
use sha3::{Digest, Sha3_512, Shake256};

use crate::error::ProofResult;
use crate::suite::marshal;

/// Running hash of everything a prover has committed to so far. Challenges are
/// squeezed from the current state and fed back, so later challenges depend on
/// earlier ones.
#[derive(Clone)]
pub struct ProofTranscript {
    hasher: Sha3_512,
}

impl ProofTranscript {
    /// Create a new transcript with domain separation.
    pub fn new(domain: &[u8]) -> Self {
        let mut transcript = Self {
            hasher: Sha3_512::new(),
        };
        transcript.append_message(b"domain", domain);
        transcript
    }

    pub fn append_message(&mut self, label: &[u8], message: &[u8]) {
        Digest::update(&mut self.hasher, (label.len() as u32).to_be_bytes());
        Digest::update(&mut self.hasher, label);
        Digest::update(&mut self.hasher, (message.len() as u64).to_be_bytes());
        Digest::update(&mut self.hasher, message);
    }

    /// Append a point or scalar in its compressed encoding.
    pub fn append_element<T: CanonicalSerialize>(
        &mut self,
        label: &[u8],
        value: &T,
    ) -> ProofResult<()> {
        let bytes = marshal(value)?;
        self.append_message(label, &bytes);
        Ok(())
    }

    pub fn append_elements<T: CanonicalSerialize>(
        &mut self,
        label: &[u8],
        values: &[T],
    ) -> ProofResult<()> {
        self.append_message(label, &(values.len() as u64).to_be_bytes());
        for value in values {
            self.append_element(label, value)?;
        }
        Ok(())
    }

    pub fn challenge_scalar<F: PrimeField>(&mut self, label: &[u8]) -> F {
        self.append_message(b"challenge", label);
        let digest = self.hasher.clone().finalize();
        Digest::update(&mut self.hasher, &digest);
        F::from_be_bytes_mod_order(&digest)
    }

    pub fn challenge_scalars<F: PrimeField>(&mut self, label: &[u8], count: usize) -> Vec<F> {
        (0..count).map(|_| self.challenge_scalar(label)).collect()
    }
}

/// Scalar drawn from a SHAKE256 stream over `parts`.
pub fn stream_scalar<F: PrimeField>(parts: &[&[u8]]) -> F {
    let mut shake = Shake256::default();
    for part in parts {
        shake.update(part);
    }
    let mut reader = shake.finalize_xof();
    let mut out = [0u8; 64];
    reader.read(&mut out);
    F::from_be_bytes_mod_order(&out)
}
