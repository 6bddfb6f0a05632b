//! Non-interactive proofs of knowledge of a representation.
//!
//! A statement is a system of equations `P_k = Σ_s x_s B_{k,s}` sharing the
//! secrets `x_s`. The prover commits `T_k = Σ_s w_s B_{k,s}`, derives `c` from
//! the transcript and answers `z_s = w_s - c x_s`. The verifier accepts iff
//! `T_k == Σ_s z_s B_{k,s} + c P_k` for every equation.

use ark_ec::CurveGroup;
use ark_ff::UniformRand;
use ark_std::rand::Rng;

use super::transcript::ProofTranscript;
use crate::error::{ProofError, ProofResult};
use crate::suite::{marshal_all, WireReader};

const LOG_TARGET: &str = "drynx_proofs::proofs::sigma";

/// Fiat-Shamir tag shared by the obfuscation and key-switch predicates.
pub const PROOF_TAG: &[u8] = b"proofTest";

/// Public part of a representation statement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Representation<C: CurveGroup> {
    /// `bases[k][s]` multiplies secret `s` in equation `k`.
    bases: Vec<Vec<C>>,
    publics: Vec<C>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigmaProof<C: CurveGroup> {
    pub commitments: Vec<C>,
    pub responses: Vec<C::ScalarField>,
}

fn combine<C: CurveGroup>(bases: &[C], scalars: &[C::ScalarField]) -> C {
    bases
        .iter()
        .zip(scalars)
        .fold(C::zero(), |acc, (base, scalar)| acc + *base * scalar)
}

impl<C: CurveGroup> Representation<C> {
    pub fn new(bases: Vec<Vec<C>>, publics: Vec<C>) -> ProofResult<Self> {
        if bases.len() != publics.len() {
            return Err(ProofError::LengthMismatch {
                expected: publics.len(),
                actual: bases.len(),
            });
        }
        let width = bases.first().map(Vec::len).unwrap_or(0);
        if let Some(row) = bases.iter().find(|row| row.len() != width) {
            return Err(ProofError::LengthMismatch {
                expected: width,
                actual: row.len(),
            });
        }
        Ok(Self { bases, publics })
    }

    pub fn equations(&self) -> usize {
        self.publics.len()
    }

    pub fn secrets(&self) -> usize {
        self.bases.first().map(Vec::len).unwrap_or(0)
    }

    /// True when `secrets` satisfy every equation.
    pub fn holds(&self, secrets: &[C::ScalarField]) -> bool {
        secrets.len() == self.secrets()
            && self
                .bases
                .iter()
                .zip(&self.publics)
                .all(|(row, public)| combine(row, secrets) == *public)
    }

    fn challenge(&self, tag: &[u8], commitments: &[C]) -> ProofResult<C::ScalarField> {
        let mut transcript = ProofTranscript::new(tag);
        for row in &self.bases {
            transcript.append_elements(b"bases", row)?;
        }
        transcript.append_elements(b"publics", &self.publics)?;
        transcript.append_elements(b"commitments", commitments)?;
        Ok(transcript.challenge_scalar(b"c"))
    }

    /// Proves knowledge of `secrets`. A witness that does not satisfy the
    /// statement still yields a proof, which then fails verification.
    pub fn prove<R: Rng>(
        &self,
        secrets: &[C::ScalarField],
        tag: &[u8],
        rng: &mut R,
    ) -> ProofResult<SigmaProof<C>> {
        if secrets.len() != self.secrets() {
            return Err(ProofError::LengthMismatch {
                expected: self.secrets(),
                actual: secrets.len(),
            });
        }
        if !self.holds(secrets) {
            tracing::debug!(target: LOG_TARGET, "witness does not satisfy the statement");
        }

        let blinds: Vec<C::ScalarField> = (0..secrets.len())
            .map(|_| C::ScalarField::rand(rng))
            .collect();
        let commitments: Vec<C> = self.bases.iter().map(|row| combine(row, &blinds)).collect();
        let c = self.challenge(tag, &commitments)?;
        tracing::debug!(target: LOG_TARGET, equations = self.equations(), "derived challenge");

        let responses = blinds
            .iter()
            .zip(secrets)
            .map(|(w, x)| *w - c * x)
            .collect();
        Ok(SigmaProof {
            commitments,
            responses,
        })
    }

    pub fn verify(&self, proof: &SigmaProof<C>, tag: &[u8]) -> bool {
        if proof.commitments.len() != self.equations() || proof.responses.len() != self.secrets() {
            tracing::debug!(target: LOG_TARGET, "proof shape does not match the statement");
            return false;
        }
        let c = match self.challenge(tag, &proof.commitments) {
            Ok(c) => c,
            Err(err) => {
                tracing::debug!(target: LOG_TARGET, %err, "challenge derivation failed");
                return false;
            }
        };
        let result = self
            .bases
            .iter()
            .zip(&self.publics)
            .zip(&proof.commitments)
            .all(|((row, public), commitment)| {
                combine(row, &proof.responses) + *public * c == *commitment
            });
        tracing::debug!(target: LOG_TARGET, result, "representation verification");
        result
    }
}

impl<C: CurveGroup> SigmaProof<C> {
    /// Commitments then responses, fixed width each.
    pub fn to_bytes(&self) -> ProofResult<Vec<u8>> {
        let mut out = Vec::new();
        marshal_all(&self.commitments, &mut out)?;
        marshal_all(&self.responses, &mut out)?;
        Ok(out)
    }

    pub fn read(reader: &mut WireReader<'_>, equations: usize, secrets: usize) -> ProofResult<Self> {
        Ok(Self {
            commitments: reader.read_vec(equations)?,
            responses: reader.read_vec(secrets)?,
        })
    }

    pub fn from_bytes(bytes: &[u8], equations: usize, secrets: usize) -> ProofResult<Self> {
        let mut reader = WireReader::new(bytes);
        let proof = Self::read(&mut reader, equations, secrets)?;
        reader.finish()?;
        Ok(proof)
    }
}
