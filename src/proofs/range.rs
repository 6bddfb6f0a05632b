//! Set-membership range proofs: a data provider shows that an encrypted value
//! lies in `[0, u^L)` by proving that each base-`u` digit carries a verifier's
//! signature `σ_φ = (x + φ)^{-1} B2`.
//!
//! Wire layout of one proof, every element at its fixed suite width:
//!
//! ```text
//! K ‖ C ‖ present:u8
//! [present == 1] L:u32 ‖ n:u32 ‖ c ‖ Zr ‖ D ‖ Zφ[L]
//!                (V[i][L] ‖ A[i][L] ‖ Zv[i][L]) for i in 0..n
//! ```

use ark_ec::pairing::{Pairing, PairingOutput};
use ark_ff::{Field, UniformRand, Zero};
use ark_std::rand::Rng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::elgamal::Ciphertext;
use crate::error::{ProofError, ProofResult};
use crate::parallel::{all_indexed, barrier, sample_count, try_map_with_rng};
use crate::suite::{hash_to_scalar, marshal, marshal_all, scalar_from_i64, write_u32, Suite, WireReader};

const LOG_TARGET: &str = "drynx_proofs::proofs::range";

/// Fixed secret of the reproducible signature set.
const DETERMINISTIC_SIGNATURE_SECRET: u64 = 12;

/// Digit base `u` and digit count `L` of one output slot. `(0, 0)` disables the proof.
pub type RangeBounds = (i64, i64);

/// A verifier's digit credentials: public key `y = xB1` and `σ_0..σ_{u-1}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishSignature<E: Pairing> {
    pub public: E::G1,
    pub signature: Vec<E::G2>,
}

/// Wire form of [`PublishSignature`]: the `σ_φ` concatenated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct PublishSignatureBytes<E: Pairing> {
    #[serde(with = "crate::crypto_serde::curve")]
    pub public: E::G1,
    #[serde(with = "crate::crypto_serde::bytes")]
    pub signature: Vec<u8>,
}

impl<E: Pairing> PublishSignature<E> {
    pub fn to_bytes(&self) -> ProofResult<PublishSignatureBytes<E>> {
        let mut signature = Vec::new();
        marshal_all(&self.signature, &mut signature)?;
        Ok(PublishSignatureBytes {
            public: self.public,
            signature,
        })
    }
}

impl<E: Pairing> PublishSignatureBytes<E> {
    pub fn to_signature(&self) -> ProofResult<PublishSignature<E>> {
        let width = Suite::<E>::point_len_g2();
        if self.signature.len() % width != 0 {
            return Err(ProofError::Malformed(format!(
                "signature bytes {} not a multiple of {width}",
                self.signature.len()
            )));
        }
        let mut reader = WireReader::new(&self.signature);
        let signature = reader.read_vec(self.signature.len() / width)?;
        reader.finish()?;
        Ok(PublishSignature {
            public: self.public,
            signature,
        })
    }
}

fn signature_set<E: Pairing>(
    suite: &Suite<E>,
    secret: E::ScalarField,
    u: i64,
) -> ProofResult<PublishSignatureBytes<E>> {
    if u < 0 {
        return Err(ProofError::InvalidInput(format!("negative digit base {u}")));
    }
    let signature = (0..u)
        .map(|phi| {
            let inverse = (secret + E::ScalarField::from(phi as u64))
                .inverse()
                .ok_or_else(|| ProofError::InvalidInput("signing secret equals -φ".into()))?;
            Ok(suite.b2 * inverse)
        })
        .collect::<ProofResult<Vec<_>>>()?;
    PublishSignature {
        public: suite.b1 * secret,
        signature,
    }
    .to_bytes()
}

/// Fresh signing secret; run once per verifier and digit base.
pub fn init_range_proof_signature<E: Pairing, R: Rng>(
    suite: &Suite<E>,
    u: i64,
    rng: &mut R,
) -> ProofResult<PublishSignatureBytes<E>> {
    signature_set(suite, E::ScalarField::rand(rng), u)
}

/// Reproducible signatures with the fixed secret `x = 12`. Simulation only.
pub fn init_range_proof_signature_deterministic<E: Pairing>(
    suite: &Suite<E>,
    u: i64,
) -> ProofResult<PublishSignatureBytes<E>> {
    signature_set(suite, E::ScalarField::from(DETERMINISTIC_SIGNATURE_SECRET), u)
}

/// Little-endian base-`base` digits of `n`, padded with zeros to `len`.
///
/// Values `>= base^len` yield more than `len` digits; negative values and
/// bases below 2 yield `len` zeros.
pub fn to_base(n: i64, base: i64, len: usize) -> Vec<i64> {
    let mut digits = Vec::with_capacity(len);
    if base >= 2 {
        let mut n = n;
        while n > 0 {
            digits.push(n % base);
            n /= base;
        }
    }
    while digits.len() < len {
        digits.push(0);
    }
    digits
}

/// Everything a data provider needs to prove one encrypted value.
#[derive(Clone, Debug)]
pub struct CreateProof<E: Pairing> {
    /// One credential set per verifier.
    pub sigs: Vec<PublishSignature<E>>,
    pub u: i64,
    pub l: i64,
    pub secret: i64,
    pub r: E::ScalarField,
    pub ca_pub: E::G1,
    pub cipher: Ciphertext<E::G1>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeProofData<E: Pairing> {
    pub challenge: E::ScalarField,
    pub zr: E::ScalarField,
    pub d: E::G1,
    /// `zv[i][j]`, verifier `i`, digit `j`.
    pub zv: Vec<Vec<E::ScalarField>>,
    pub zphi: Vec<E::ScalarField>,
    pub v: Vec<Vec<E::G2>>,
    pub a: Vec<Vec<PairingOutput<E>>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeProof<E: Pairing> {
    pub commit: Ciphertext<E::G1>,
    /// `None` when the slot carries no range constraint.
    pub rp: Option<RangeProofData<E>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RangeProofList<E: Pairing> {
    pub data: Vec<RangeProof<E>>,
}

/// `c = H(B1 ‖ C ‖ Σ y_i)`.
fn range_challenge<E: Pairing>(
    suite: &Suite<E>,
    commit: &E::G1,
    ys: &[E::G1],
) -> ProofResult<E::ScalarField> {
    let y_sum = ys.iter().fold(E::G1::zero(), |acc, y| acc + y);
    let b = marshal(&suite.b1)?;
    let c = marshal(commit)?;
    let y = marshal(&y_sum)?;
    Ok(hash_to_scalar(&[&b, &c, &y]))
}

fn digit_weight<E: Pairing>(u: i64, j: usize) -> E::ScalarField {
    scalar_from_i64::<E::ScalarField>(u).pow([j as u64])
}

struct DigitCommitment<E: Pairing> {
    d: E::G1,
    m: E::ScalarField,
    zphi: E::ScalarField,
    v: Vec<E::G2>,
    a: Vec<PairingOutput<E>>,
    zv: Vec<E::ScalarField>,
}

pub fn create_predicate_range_proof<E: Pairing, R: Rng>(
    suite: &Suite<E>,
    cp: &CreateProof<E>,
    rng: &mut R,
) -> ProofResult<RangeProof<E>> {
    if cp.u == 0 && cp.l == 0 {
        return Ok(RangeProof {
            commit: cp.cipher.clone(),
            rp: None,
        });
    }
    if cp.u < 0 || cp.l < 0 {
        return Err(ProofError::InvalidInput(format!(
            "range [{}, {}] has a negative component",
            cp.u, cp.l
        )));
    }
    if cp.sigs.is_empty() {
        return Err(ProofError::InvalidInput(
            "range proof needs at least one verifier credential set".into(),
        ));
    }

    let digits = to_base(cp.secret, cp.u, cp.l as usize);
    for sig in &cp.sigs {
        if let Some(phi) = digits.iter().find(|phi| **phi as usize >= sig.signature.len()) {
            return Err(ProofError::InvalidInput(format!(
                "digit {phi} has no signature among {}",
                sig.signature.len()
            )));
        }
    }

    let ys: Vec<E::G1> = cp.sigs.iter().map(|sig| sig.public).collect();
    let c = range_challenge(suite, &cp.cipher.c, &ys)?;
    tracing::debug!(target: LOG_TARGET, digits = digits.len(), verifiers = ys.len(), "derived range challenge");

    let commitments = try_map_with_rng(rng, digits.len(), |j, stream| {
        let phi = digits[j];
        let s = E::ScalarField::rand(stream);
        let t = E::ScalarField::rand(stream);
        let m = E::ScalarField::rand(stream);

        let d = suite.b1 * (s * digit_weight::<E>(cp.u, j)) + cp.ca_pub * m;
        let zphi = s - c * scalar_from_i64::<E::ScalarField>(phi);

        let mut v = Vec::with_capacity(cp.sigs.len());
        let mut a = Vec::with_capacity(cp.sigs.len());
        let mut zv = Vec::with_capacity(cp.sigs.len());
        let blinded_t = suite.pair(suite.b1 * t, suite.b2);
        for sig in &cp.sigs {
            let vij = E::ScalarField::rand(stream);
            let vp = sig.signature[phi as usize] * vij;
            a.push(suite.pair(suite.b1 * (-s), vp) + blinded_t);
            v.push(vp);
            zv.push(t - c * vij);
        }
        Ok(DigitCommitment::<E> {
            d,
            m,
            zphi,
            v,
            a,
            zv,
        })
    })?;

    let n = cp.sigs.len();
    let mut data = RangeProofData {
        challenge: c,
        zr: E::ScalarField::zero(),
        d: E::G1::zero(),
        zv: vec![Vec::with_capacity(digits.len()); n],
        zphi: Vec::with_capacity(digits.len()),
        v: vec![Vec::with_capacity(digits.len()); n],
        a: vec![Vec::with_capacity(digits.len()); n],
    };
    let mut m_sum = E::ScalarField::zero();
    for digit in commitments {
        data.d += digit.d;
        m_sum += digit.m;
        data.zphi.push(digit.zphi);
        for (i, ((v, a), zv)) in digit.v.into_iter().zip(digit.a).zip(digit.zv).enumerate() {
            data.v[i].push(v);
            data.a[i].push(a);
            data.zv[i].push(zv);
        }
    }
    data.zr = m_sum - c * cp.r;

    Ok(RangeProof {
        commit: cp.cipher.clone(),
        rp: Some(data),
    })
}

/// Proves every entry; the byte layout keeps entry order.
pub fn create_predicate_range_proof_list<E: Pairing, R: Rng>(
    suite: &Suite<E>,
    cps: &[CreateProof<E>],
    rng: &mut R,
    cancel: Option<&CancellationToken>,
) -> ProofResult<RangeProofList<E>> {
    barrier(cancel, "range proofs")?;
    let data = try_map_with_rng(rng, cps.len(), |i, stream| {
        create_predicate_range_proof(suite, &cps[i], stream)
    })?;
    barrier(cancel, "range proof publication")?;
    Ok(RangeProofList { data })
}

fn uniform_shape<E: Pairing>(rp: &RangeProofData<E>, l: usize, verifiers: usize) -> bool {
    let Some(v0) = rp.v.first() else {
        return false;
    };
    let (Some(a0), Some(zv0)) = (rp.a.first(), rp.zv.first()) else {
        return false;
    };
    if 4 * l != rp.zphi.len() + zv0.len() + a0.len() + v0.len() {
        tracing::debug!(target: LOG_TARGET, l, "digit vectors do not add up to 4L");
        return false;
    }
    let rows = rp.v.len();
    rows == verifiers
        && rp.a.len() == rows
        && rp.zv.len() == rows
        && rp.v.iter().all(|row| row.len() == l)
        && rp.a.iter().all(|row| row.len() == l)
        && rp.zv.iter().all(|row| row.len() == l)
        && rp.zphi.len() == l
}

/// Verifies one proof for range `[u, l]` against the verifiers' public keys `ys`.
pub fn range_proof_verification<E: Pairing>(
    suite: &Suite<E>,
    proof: &RangeProof<E>,
    u: i64,
    l: i64,
    ys: &[E::G1],
    p: E::G1,
) -> bool {
    if u == 0 && l == 0 {
        return true;
    }
    let Some(rp) = &proof.rp else {
        tracing::debug!(target: LOG_TARGET, u, l, "range proof body missing");
        return false;
    };
    if l < 0 || !uniform_shape(rp, l as usize, ys.len()) {
        tracing::debug!(target: LOG_TARGET, "range proof shape mismatch");
        return false;
    }

    let c = match range_challenge(suite, &proof.commit.c, ys) {
        Ok(c) => c,
        Err(err) => {
            tracing::debug!(target: LOG_TARGET, %err, "challenge derivation failed");
            return false;
        }
    };
    if c != rp.challenge {
        tracing::debug!(target: LOG_TARGET, "challenge mismatch");
        return false;
    }

    let d = rp
        .zphi
        .iter()
        .enumerate()
        .fold(proof.commit.c * c + p * rp.zr, |acc, (j, zphi)| {
            acc + suite.b1 * (*zphi * digit_weight::<E>(u, j))
        });
    if d != rp.d {
        tracing::debug!(target: LOG_TARGET, "commitment D mismatch");
        return false;
    }

    let result = all_indexed(rp.zphi.len(), |j| {
        let neg_zphi = suite.b1 * (-rp.zphi[j]);
        ys.iter().enumerate().all(|(i, y)| {
            let vij = rp.v[i][j];
            let recomputed = suite.pair(*y * c, vij)
                + suite.pair(neg_zphi, vij)
                + suite.pair(suite.b1 * rp.zv[i][j], suite.b2);
            recomputed == rp.a[i][j]
        })
    });
    tracing::debug!(target: LOG_TARGET, result, "range proof verification");
    result
}

/// Verifies the first `⌈sample · N⌉` proofs. `sigs[v][i]` is verifier `v`'s
/// credential set for output slot `i`.
pub fn range_proof_list_verification<E: Pairing>(
    suite: &Suite<E>,
    list: &RangeProofList<E>,
    ranges: &[RangeBounds],
    sigs: &[Vec<PublishSignatureBytes<E>>],
    p: E::G1,
    sample: f64,
) -> bool {
    let count = sample_count(sample, list.data.len());
    let result = all_indexed(count, |i| {
        let Some((u, l)) = ranges.get(i).copied() else {
            return false;
        };
        let ys: Option<Vec<E::G1>> = sigs
            .iter()
            .map(|row| row.get(i).map(|sig| sig.public))
            .collect();
        match ys {
            Some(ys) => range_proof_verification(suite, &list.data[i], u, l, &ys, p),
            None => false,
        }
    });
    tracing::debug!(target: LOG_TARGET, count, total = list.data.len(), result, "range proof list verification");
    result
}

impl<E: Pairing> RangeProof<E> {
    pub fn write_bytes(&self, out: &mut Vec<u8>) -> ProofResult<()> {
        self.commit.write_bytes(out)?;
        let Some(rp) = &self.rp else {
            out.push(0);
            return Ok(());
        };
        let l = rp.zphi.len();
        let rows = rp.v.len();
        if rp.a.len() != rows
            || rp.zv.len() != rows
            || rp.v.iter().any(|row| row.len() != l)
            || rp.a.iter().any(|row| row.len() != l)
            || rp.zv.iter().any(|row| row.len() != l)
        {
            return Err(ProofError::InvalidInput("ragged range proof body".into()));
        }
        out.push(1);
        write_u32(out, l)?;
        write_u32(out, rows)?;
        marshal_all(&[rp.challenge, rp.zr], out)?;
        marshal_all(&[rp.d], out)?;
        marshal_all(&rp.zphi, out)?;
        for i in 0..rows {
            marshal_all(&rp.v[i], out)?;
            marshal_all(&rp.a[i], out)?;
            marshal_all(&rp.zv[i], out)?;
        }
        Ok(())
    }

    pub fn read(reader: &mut WireReader<'_>) -> ProofResult<Self> {
        let commit = Ciphertext::read(reader)?;
        match reader.read_u8()? {
            0 => return Ok(Self { commit, rp: None }),
            1 => {}
            other => return Err(ProofError::Malformed(format!("range proof flag {other}"))),
        }
        let l = reader.read_u32()? as usize;
        let rows = reader.read_u32()? as usize;

        let scalar = Suite::<E>::scalar_len();
        let row_width = l
            .checked_mul(Suite::<E>::point_len_g2() + Suite::<E>::point_len_gt() + scalar)
            .ok_or_else(|| ProofError::Malformed(format!("range proof digit count {l}")))?;
        reader.check_count(rows, row_width)?;
        let needed = row_width
            .checked_mul(rows)
            .and_then(|rows| rows.checked_add(l.checked_mul(scalar)?))
            .and_then(|n| n.checked_add(2 * scalar + Suite::<E>::point_len_g1()));
        match needed {
            Some(needed) if needed <= reader.remaining() => {}
            _ => {
                return Err(ProofError::LengthMismatch {
                    expected: needed.unwrap_or(usize::MAX),
                    actual: reader.remaining(),
                })
            }
        }

        let challenge = reader.read()?;
        let zr = reader.read()?;
        let d = reader.read()?;
        let zphi = reader.read_vec(l)?;
        let mut v = Vec::with_capacity(rows);
        let mut a = Vec::with_capacity(rows);
        let mut zv = Vec::with_capacity(rows);
        for _ in 0..rows {
            v.push(reader.read_vec(l)?);
            a.push(reader.read_vec(l)?);
            zv.push(reader.read_vec(l)?);
        }
        Ok(Self {
            commit,
            rp: Some(RangeProofData {
                challenge,
                zr,
                d,
                zv,
                zphi,
                v,
                a,
            }),
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

impl<E: Pairing> RangeProofList<E> {
    pub fn to_bytes(&self) -> ProofResult<Vec<u8>> {
        let mut out = Vec::new();
        write_u32(&mut out, self.data.len())?;
        for proof in &self.data {
            proof.write_bytes(&mut out)?;
        }
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> ProofResult<Self> {
        let mut reader = WireReader::new(bytes);
        let count = reader.read_u32()? as usize;
        let data = (0..count)
            .map(|_| RangeProof::read(&mut reader))
            .collect::<ProofResult<Vec<_>>>()?;
        reader.finish()?;
        Ok(Self { data })
    }
}
