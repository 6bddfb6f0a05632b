//! Transparent aggregation proof: the node publishes the data provider
//! contributions next to the claimed per-group sums, and verifiers recompute
//! the sums.

use ark_ec::CurveGroup;

use crate::elgamal::ResponseAllDPs;
use crate::error::ProofResult;
use crate::parallel::{all_indexed, sample_count};
use crate::suite::{write_u32, WireReader};

const LOG_TARGET: &str = "drynx_proofs::proofs::aggregation";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedAggregationProof<C: CurveGroup> {
    pub dps_data: ResponseAllDPs<C>,
    pub aggregated_data: ResponseAllDPs<C>,
}

pub fn server_aggregation_proof_creation<C: CurveGroup>(
    dps_data: ResponseAllDPs<C>,
    aggregated_data: ResponseAllDPs<C>,
) -> PublishedAggregationProof<C> {
    PublishedAggregationProof {
        dps_data,
        aggregated_data,
    }
}

/// Every published group must exist among the inputs and equal their sum.
pub fn server_aggregation_proof_verification<C: CurveGroup>(
    published: &PublishedAggregationProof<C>,
) -> bool {
    let expected = match published.dps_data.group_sum() {
        Ok(groups) => groups,
        Err(err) => {
            tracing::debug!(target: LOG_TARGET, %err, "inconsistent data provider vectors");
            return false;
        }
    };
    let claimed = match published.aggregated_data.group_sum() {
        Ok(groups) => groups,
        Err(err) => {
            tracing::debug!(target: LOG_TARGET, %err, "inconsistent aggregated vectors");
            return false;
        }
    };
    for (group, vector) in &claimed {
        match expected.get(group) {
            Some(sum) if sum == vector => {}
            Some(_) => {
                tracing::debug!(target: LOG_TARGET, group, "aggregated vector differs from the sum");
                return false;
            }
            None => {
                tracing::debug!(target: LOG_TARGET, group, "group absent from the inputs");
                return false;
            }
        }
    }
    true
}

/// Verifies the first `⌈sample · N⌉` proofs of a list.
pub fn server_aggregation_list_proof_verification<C: CurveGroup>(
    proofs: &[PublishedAggregationProof<C>],
    sample: f64,
) -> bool {
    let count = sample_count(sample, proofs.len());
    all_indexed(count, |i| server_aggregation_proof_verification(&proofs[i]))
}

impl<C: CurveGroup> PublishedAggregationProof<C> {
    pub fn write_bytes(&self, out: &mut Vec<u8>) -> ProofResult<()> {
        self.dps_data.write_bytes(out)?;
        self.aggregated_data.write_bytes(out)
    }

    pub fn read(reader: &mut WireReader<'_>) -> ProofResult<Self> {
        Ok(Self {
            dps_data: ResponseAllDPs::read(reader)?,
            aggregated_data: ResponseAllDPs::read(reader)?,
        })
    }

    pub fn to_bytes(&self) -> ProofResult<Vec<u8>> {
        let mut out = Vec::new();
        self.write_bytes(&mut out)?;
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> ProofResult<Self> {
        let mut reader = WireReader::new(bytes);
        let proof = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(proof)
    }
}

pub fn aggregation_list_to_bytes<C: CurveGroup>(
    proofs: &[PublishedAggregationProof<C>],
) -> ProofResult<Vec<u8>> {
    let mut out = Vec::new();
    write_u32(&mut out, proofs.len())?;
    for proof in proofs {
        proof.write_bytes(&mut out)?;
    }
    Ok(out)
}

pub fn aggregation_list_from_bytes<C: CurveGroup>(
    bytes: &[u8],
) -> ProofResult<Vec<PublishedAggregationProof<C>>> {
    let mut reader = WireReader::new(bytes);
    let count = reader.read_u32()? as usize;
    let proofs = (0..count)
        .map(|_| PublishedAggregationProof::read(&mut reader))
        .collect::<ProofResult<Vec<_>>>()?;
    reader.finish()?;
    Ok(proofs)
}
