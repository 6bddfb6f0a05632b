//! Proof that `co = s · c` for one secret scalar `s`.

use ark_ec::CurveGroup;
use ark_std::rand::Rng;
use tokio_util::sync::CancellationToken;

use super::sigma::{Representation, SigmaProof, PROOF_TAG};
use crate::elgamal::Ciphertext;
use crate::error::{ProofError, ProofResult};
use crate::parallel::{all_indexed, barrier, sample_count, try_map_with_rng};
use crate::suite::{write_u32, WireReader};

const LOG_TARGET: &str = "drynx_proofs::proofs::obfuscation";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedObfuscationProof<C: CurveGroup> {
    pub c: Ciphertext<C>,
    pub co: Ciphertext<C>,
    pub proof: SigmaProof<C>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedListObfuscationProof<C: CurveGroup> {
    pub proofs: Vec<PublishedObfuscationProof<C>>,
}

fn statement<C: CurveGroup>(c: &Ciphertext<C>, co: &Ciphertext<C>) -> ProofResult<Representation<C>> {
    Representation::new(vec![vec![c.k], vec![c.c]], vec![co.k, co.c])
}

pub fn obfuscation_proof_creation<C: CurveGroup, R: Rng>(
    c: &Ciphertext<C>,
    co: &Ciphertext<C>,
    s: C::ScalarField,
    rng: &mut R,
) -> ProofResult<PublishedObfuscationProof<C>> {
    let proof = statement(c, co)?.prove(&[s], PROOF_TAG, rng)?;
    Ok(PublishedObfuscationProof {
        c: c.clone(),
        co: co.clone(),
        proof,
    })
}

/// One proof per pair, each with its own scalar.
pub fn obfuscation_list_proof_creation<C: CurveGroup, R: Rng>(
    cs: &[Ciphertext<C>],
    cos: &[Ciphertext<C>],
    scalars: &[C::ScalarField],
    rng: &mut R,
    cancel: Option<&CancellationToken>,
) -> ProofResult<PublishedListObfuscationProof<C>> {
    if cs.len() != cos.len() || cs.len() != scalars.len() {
        return Err(ProofError::LengthMismatch {
            expected: cs.len(),
            actual: cos.len().min(scalars.len()),
        });
    }
    barrier(cancel, "obfuscation proofs")?;
    let proofs = try_map_with_rng(rng, cs.len(), |i, stream| {
        obfuscation_proof_creation(&cs[i], &cos[i], scalars[i], stream)
    })?;
    barrier(cancel, "obfuscation publication")?;
    Ok(PublishedListObfuscationProof { proofs })
}

pub fn obfuscation_proof_verification<C: CurveGroup>(published: &PublishedObfuscationProof<C>) -> bool {
    match statement(&published.c, &published.co) {
        Ok(statement) => statement.verify(&published.proof, PROOF_TAG),
        Err(_) => false,
    }
}

/// Verifies the first `⌈sample · N⌉` proofs.
pub fn obfuscation_list_proof_verification<C: CurveGroup>(
    list: &PublishedListObfuscationProof<C>,
    sample: f64,
) -> bool {
    let count = sample_count(sample, list.proofs.len());
    let result = all_indexed(count, |i| obfuscation_proof_verification(&list.proofs[i]));
    tracing::debug!(target: LOG_TARGET, count, total = list.proofs.len(), result, "verified obfuscation list");
    result
}

impl<C: CurveGroup> PublishedObfuscationProof<C> {
    pub fn write_bytes(&self, out: &mut Vec<u8>) -> ProofResult<()> {
        self.c.write_bytes(out)?;
        self.co.write_bytes(out)?;
        out.extend_from_slice(&self.proof.to_bytes()?);
        Ok(())
    }

    pub fn read(reader: &mut WireReader<'_>) -> ProofResult<Self> {
        Ok(Self {
            c: Ciphertext::read(reader)?,
            co: Ciphertext::read(reader)?,
            proof: SigmaProof::read(reader, 2, 1)?,
        })
    }
}

impl<C: CurveGroup> PublishedListObfuscationProof<C> {
    pub fn to_bytes(&self) -> ProofResult<Vec<u8>> {
        let mut out = Vec::new();
        write_u32(&mut out, self.proofs.len())?;
        for proof in &self.proofs {
            proof.write_bytes(&mut out)?;
        }
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> ProofResult<Self> {
        let mut reader = WireReader::new(bytes);
        let count = reader.read_u32()? as usize;
        let proofs = (0..count)
            .map(|_| PublishedObfuscationProof::read(&mut reader))
            .collect::<ProofResult<Vec<_>>>()?;
        reader.finish()?;
        Ok(Self { proofs })
    }
}
