//! Proof that a node re-encrypted ciphertext randomness from the collective key
//! to the querier's key.
//!
//! For server key `K = kB`, ciphertext component `K_i` and target `Q`, the node
//! proves knowledge of `(v_i, k)` with `viB = v_i B`, `K = k B` and
//! `ks2 = k (-K_i) + v_i Q`.

use ark_ec::CurveGroup;
use ark_std::rand::Rng;
use tokio_util::sync::CancellationToken;

use super::sigma::{Representation, SigmaProof, PROOF_TAG};
use crate::elgamal::{key_switch_share_vector, CipherVector, KeySwitchShare};
use crate::error::{ProofError, ProofResult};
use crate::parallel::{all_indexed, barrier, sample_count, try_map_with_rng};
use crate::suite::{marshal_all, write_u32, WireReader};

const LOG_TARGET: &str = "drynx_proofs::proofs::key_switch";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedKSProof<C: CurveGroup> {
    /// Public key of the switching node.
    pub k: C,
    pub vi_b: C,
    pub ks2: C,
    /// `-K_i` of the switched ciphertext.
    pub r_b_neg: C,
    pub q: C,
    pub proof: SigmaProof<C>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedKSListProof<C: CurveGroup> {
    pub proofs: Vec<PublishedKSProof<C>>,
}

fn statement<C: CurveGroup>(
    k: C,
    vi_b: C,
    ks2: C,
    r_b_neg: C,
    q: C,
) -> ProofResult<Representation<C>> {
    let b = C::generator();
    let zero = C::zero();
    // Secrets ordered (v_i, k).
    Representation::new(
        vec![vec![b, zero], vec![zero, b], vec![q, r_b_neg]],
        vec![vi_b, k, ks2],
    )
}

#[allow(clippy::too_many_arguments)]
pub fn key_switch_proof_creation<C: CurveGroup, R: Rng>(
    k: C,
    vi_b: C,
    ks2: C,
    r_b_neg: C,
    q: C,
    vi: C::ScalarField,
    secret: C::ScalarField,
    rng: &mut R,
) -> ProofResult<PublishedKSProof<C>> {
    let proof = statement(k, vi_b, ks2, r_b_neg, q)?.prove(&[vi, secret], PROOF_TAG, rng)?;
    Ok(PublishedKSProof {
        k,
        vi_b,
        ks2,
        r_b_neg,
        q,
        proof,
    })
}

/// Proofs for every slot switched by one node with secret `secret`.
#[allow(clippy::too_many_arguments)]
pub fn key_switch_list_proof_creation<C: CurveGroup, R: Rng>(
    k: C,
    q: C,
    secret: C::ScalarField,
    ks2s: &[C],
    r_b_negs: &[C],
    vis: &[C::ScalarField],
    rng: &mut R,
    cancel: Option<&CancellationToken>,
) -> ProofResult<PublishedKSListProof<C>> {
    let len = vis.len();
    if ks2s.len() != len || r_b_negs.len() != len {
        return Err(ProofError::LengthMismatch {
            expected: len,
            actual: ks2s.len().min(r_b_negs.len()),
        });
    }
    barrier(cancel, "key switch proofs")?;
    let b = C::generator();
    let proofs = try_map_with_rng(rng, len, |i, stream| {
        key_switch_proof_creation(k, b * vis[i], ks2s[i], r_b_negs[i], q, vis[i], secret, stream)
    })?;
    barrier(cancel, "key switch publication")?;
    tracing::debug!(target: LOG_TARGET, slots = len, "created key switch proofs");
    Ok(PublishedKSListProof { proofs })
}

/// Computes this node's shares for `data` and proves them.
pub fn key_switch_with_proof<C: CurveGroup, R: Rng>(
    data: &CipherVector<C>,
    secret: C::ScalarField,
    target: C,
    rng: &mut R,
    cancel: Option<&CancellationToken>,
) -> ProofResult<(Vec<KeySwitchShare<C>>, PublishedKSListProof<C>)> {
    let (shares, vis) = key_switch_share_vector(data, secret, target, rng);
    let ks2s: Vec<C> = shares.iter().map(|share| share.ks2).collect();
    let r_b_negs: Vec<C> = data.iter().map(|ct| -ct.k).collect();
    let proof = key_switch_list_proof_creation(
        C::generator() * secret,
        target,
        secret,
        &ks2s,
        &r_b_negs,
        &vis,
        rng,
        cancel,
    )?;
    Ok((shares, proof))
}

pub fn key_switch_proof_verification<C: CurveGroup>(published: &PublishedKSProof<C>) -> bool {
    match statement(
        published.k,
        published.vi_b,
        published.ks2,
        published.r_b_neg,
        published.q,
    ) {
        Ok(statement) => statement.verify(&published.proof, PROOF_TAG),
        Err(_) => false,
    }
}

/// Verifies the first `⌈sample · N⌉` proofs.
pub fn key_switch_list_proof_verification<C: CurveGroup>(
    list: &PublishedKSListProof<C>,
    sample: f64,
) -> bool {
    let count = sample_count(sample, list.proofs.len());
    let result = all_indexed(count, |i| key_switch_proof_verification(&list.proofs[i]));
    tracing::debug!(target: LOG_TARGET, count, total = list.proofs.len(), result, "verified key switch list");
    result
}

impl<C: CurveGroup> PublishedKSProof<C> {
    /// `K, viB, ks2, rBNeg, Q` then the sigma proof.
    pub fn write_bytes(&self, out: &mut Vec<u8>) -> ProofResult<()> {
        marshal_all(&[self.k, self.vi_b, self.ks2, self.r_b_neg, self.q], out)?;
        out.extend_from_slice(&self.proof.to_bytes()?);
        Ok(())
    }

    pub fn read(reader: &mut WireReader<'_>) -> ProofResult<Self> {
        let points: Vec<C> = reader.read_vec(5)?;
        Ok(Self {
            k: points[0],
            vi_b: points[1],
            ks2: points[2],
            r_b_neg: points[3],
            q: points[4],
            proof: SigmaProof::read(reader, 3, 2)?,
        })
    }
}

impl<C: CurveGroup> PublishedKSListProof<C> {
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
            .map(|_| PublishedKSProof::read(&mut reader))
            .collect::<ProofResult<Vec<_>>>()?;
        reader.finish()?;
        Ok(Self { proofs })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elgamal::{aggregate_key, combine_share_vectors, DiscreteLogTable, KeyPair};
    use ark_bn254::{Fr, G1Projective};
    use ark_ec::PrimeGroup;
    use ark_ff::UniformRand;
    use ark_std::test_rng;

    type Curve = G1Projective;

    #[test]
    fn switched_vector_decrypts_and_proofs_verify() {
        let mut rng = test_rng();
        let nodes: Vec<_> = (0..3).map(|_| KeyPair::<Curve>::random(&mut rng)).collect();
        let collective = aggregate_key(&nodes.iter().map(|n| n.public_key).collect::<Vec<_>>());
        let querier = KeyPair::<Curve>::random(&mut rng);
        let data = CipherVector::encrypt(collective, &[1, 2], &mut rng);

        let mut shares = Vec::new();
        for node in &nodes {
            let (node_shares, proof) =
                key_switch_with_proof(&data, node.secret_key, querier.public_key, &mut rng, None)
                    .unwrap();
            assert!(key_switch_list_proof_verification(&proof, 1.0));
            assert_eq!(proof.proofs[0].k, node.public_key);
            shares.push(node_shares);
        }
        let switched = combine_share_vectors(&data, &shares).unwrap();
        let table = DiscreteLogTable::global::<Curve>(1_000);
        assert_eq!(table.decrypt_vector(querier.secret_key, &switched).unwrap(), vec![1, 2]);
    }

    #[test]
    fn summed_provider_vectors_switch_to_querier() {
        let mut rng = test_rng();
        let nodes: Vec<_> = (0..3).map(|_| KeyPair::<Curve>::random(&mut rng)).collect();
        let collective = aggregate_key(&nodes.iter().map(|n| n.public_key).collect::<Vec<_>>());
        let querier = KeyPair::<Curve>::random(&mut rng);

        let total = (0..3)
            .map(|_| CipherVector::encrypt(collective, &[1, 2, 3, 4, 5], &mut rng))
            .try_fold(CipherVector::zeros(5), |acc, provider| acc.add(&provider))
            .unwrap();

        let shares: Vec<_> = nodes
            .iter()
            .map(|node| {
                let (node_shares, proof) =
                    key_switch_with_proof(&total, node.secret_key, querier.public_key, &mut rng, None)
                        .unwrap();
                assert_eq!(proof.proofs.len(), 5);
                assert!(key_switch_list_proof_verification(&proof, 1.0));
                node_shares
            })
            .collect();
        let switched = combine_share_vectors(&total, &shares).unwrap();
        let table = DiscreteLogTable::global::<Curve>(1_000);
        assert_eq!(
            table.decrypt_vector(querier.secret_key, &switched).unwrap(),
            vec![3, 6, 9, 12, 15]
        );
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let mut rng = test_rng();
        let node = KeyPair::<Curve>::random(&mut rng);
        let querier = KeyPair::<Curve>::random(&mut rng);
        let data = CipherVector::encrypt(node.public_key, &[4], &mut rng);
        let (_, mut proof) =
            key_switch_with_proof(&data, node.secret_key, querier.public_key, &mut rng, None).unwrap();

        let forged = &mut proof.proofs[0];
        forged.ks2 += Curve::generator();
        assert!(!key_switch_list_proof_verification(&proof, 1.0));

        let impostor = Fr::rand(&mut rng);
        let (_, proof) =
            key_switch_with_proof(&data, impostor, querier.public_key, &mut rng, None).unwrap();
        let mut claimed = proof.clone();
        claimed.proofs[0].k = node.public_key;
        assert!(!key_switch_list_proof_verification(&claimed, 1.0));
    }

    #[test]
    fn list_bytes_round_trip() {
        let mut rng = test_rng();
        let node = KeyPair::<Curve>::random(&mut rng);
        let querier = KeyPair::<Curve>::random(&mut rng);
        let data = CipherVector::encrypt(node.public_key, &[1, 2, 3], &mut rng);
        let (_, proof) =
            key_switch_with_proof(&data, node.secret_key, querier.public_key, &mut rng, None).unwrap();
        let decoded = PublishedKSListProof::<Curve>::from_bytes(&proof.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, proof);
        assert!(key_switch_list_proof_verification(&decoded, 1.0));
    }
}
