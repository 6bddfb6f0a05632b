//! Neff's simple k-shuffle: given `R_i = r_i G`, `S_i = s_i G` and `Γ = γG`,
//! prove `s_i = γ r_{π(i)}` for a hidden permutation `π`.
//!
//! After a challenge `t` the claim reduces to `Π (s_i - γt) = γ^k Π (r_i - t)`,
//! shown with an iterated logarithmic multiplication proof over the sequences
//! `a = (x̂_0..x̂_{k-1}, γ, .., γ)` and `b = (ŷ_0..ŷ_{k-1}, 1, .., 1)`.

use ark_ec::CurveGroup;
use ark_ff::{Field, One, UniformRand};
use ark_std::rand::Rng;

use crate::error::{ProofError, ProofResult};
use crate::parallel::map_indexed;
use crate::proofs::transcript::ProofTranscript;
use crate::suite::{marshal_all, WireReader};

const LOG_TARGET: &str = "drynx_proofs::proofs::shuffle::simple";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimpleShuffleProof<C: CurveGroup> {
    /// `Θ_0..Θ_{2k-1}`
    pub theta: Vec<C>,
    /// `α_0..α_{2k-2}`
    pub alpha: Vec<C::ScalarField>,
}

/// Secret side of a simple shuffle.
pub struct SimpleShuffleWitness<'a, C: CurveGroup> {
    pub gamma: C::ScalarField,
    pub r: &'a [C::ScalarField],
    /// `s_i = γ r_{pi[i]}`
    pub pi: &'a [usize],
}

fn absorb_statement<C: CurveGroup>(
    transcript: &mut ProofTranscript,
    r_points: &[C],
    s_points: &[C],
) -> ProofResult<C::ScalarField> {
    transcript.append_elements(b"simple/R", r_points)?;
    transcript.append_elements(b"simple/S", s_points)?;
    Ok(transcript.challenge_scalar(b"simple/t"))
}

pub fn prove<C: CurveGroup, R: Rng>(
    transcript: &mut ProofTranscript,
    g: C,
    r_points: &[C],
    s_points: &[C],
    witness: &SimpleShuffleWitness<'_, C>,
    rng: &mut R,
) -> ProofResult<SimpleShuffleProof<C>> {
    let k = witness.r.len();
    if k == 0 || witness.pi.len() != k || r_points.len() != k || s_points.len() != k {
        return Err(ProofError::InvalidInput(format!(
            "simple shuffle over {k} secrets with {} points",
            r_points.len()
        )));
    }
    let t = absorb_statement(transcript, r_points, s_points)?;

    let gamma = witness.gamma;
    let x_hat: Vec<C::ScalarField> = witness.r.iter().map(|r| *r - t).collect();
    let y_hat: Vec<C::ScalarField> = witness.pi.iter().map(|p| gamma * x_hat[*p]).collect();

    let n = 2 * k;
    let a: Vec<C::ScalarField> = x_hat.iter().copied().chain(std::iter::repeat(gamma).take(k)).collect();
    let b: Vec<C::ScalarField> = y_hat
        .iter()
        .copied()
        .chain(std::iter::repeat(C::ScalarField::one()).take(k))
        .collect();

    let theta_secret: Vec<C::ScalarField> = (0..n - 1).map(|_| C::ScalarField::rand(rng)).collect();
    let theta = map_indexed(n, |i| {
        let scalar = if i == 0 {
            -(theta_secret[0] * b[0])
        } else if i == n - 1 {
            theta_secret[n - 2] * a[n - 1]
        } else {
            theta_secret[i - 1] * a[i] - theta_secret[i] * b[i]
        };
        g * scalar
    });
    transcript.append_elements(b"simple/theta", &theta)?;
    let c: C::ScalarField = transcript.challenge_scalar(b"simple/c");

    let mut alpha = Vec::with_capacity(n - 1);
    let mut ratio = C::ScalarField::one();
    for i in 0..n - 1 {
        let inverse = b[i]
            .inverse()
            .ok_or_else(|| ProofError::InvalidInput("zero element in shuffle sequence".into()))?;
        ratio *= a[i] * inverse;
        alpha.push(theta_secret[i] + c * ratio);
    }
    tracing::debug!(target: LOG_TARGET, k, "built simple shuffle");
    Ok(SimpleShuffleProof { theta, alpha })
}

pub fn verify<C: CurveGroup>(
    transcript: &mut ProofTranscript,
    g: C,
    gamma_point: C,
    r_points: &[C],
    s_points: &[C],
    proof: &SimpleShuffleProof<C>,
) -> bool {
    let k = r_points.len();
    let n = 2 * k;
    if k == 0 || s_points.len() != k || proof.theta.len() != n || proof.alpha.len() != n - 1 {
        tracing::debug!(target: LOG_TARGET, k, "simple shuffle shape mismatch");
        return false;
    }
    let t = match absorb_statement(transcript, r_points, s_points) {
        Ok(t) => t,
        Err(_) => return false,
    };
    if transcript.append_elements(b"simple/theta", &proof.theta).is_err() {
        return false;
    }
    let c: C::ScalarField = transcript.challenge_scalar(b"simple/c");

    let point_a = |i: usize| if i < k { r_points[i] - g * t } else { gamma_point };
    let point_b = |i: usize| if i < k { s_points[i] - gamma_point * t } else { g };
    let alpha = |i: isize| {
        if i < 0 || i as usize == n - 1 {
            c
        } else {
            proof.alpha[i as usize]
        }
    };

    let checks = map_indexed(n, |i| {
        point_a(i) * alpha(i as isize - 1) - point_b(i) * alpha(i as isize) == proof.theta[i]
    });
    let result = checks.into_iter().all(|ok| ok);
    tracing::debug!(target: LOG_TARGET, result, "simple shuffle verification");
    result
}

impl<C: CurveGroup> SimpleShuffleProof<C> {
    pub fn write_bytes(&self, out: &mut Vec<u8>) -> ProofResult<()> {
        marshal_all(&self.theta, out)?;
        marshal_all(&self.alpha, out)
    }

    pub fn read(reader: &mut WireReader<'_>, k: usize) -> ProofResult<Self> {
        let n = 2 * k;
        Ok(Self {
            theta: reader.read_vec(n)?,
            alpha: reader.read_vec(n.saturating_sub(1))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Fr, G1Projective};
    use ark_ec::PrimeGroup;
    use ark_std::test_rng;

    type Curve = G1Projective;

    fn instance(k: usize, rng: &mut impl Rng) -> (Fr, Vec<Fr>, Vec<usize>, Vec<Curve>, Vec<Curve>) {
        let g = Curve::generator();
        let gamma = Fr::rand(rng);
        let r: Vec<Fr> = (0..k).map(|_| Fr::rand(rng)).collect();
        let pi: Vec<usize> = (0..k).map(|i| (i + 1) % k).collect();
        let r_points = r.iter().map(|x| g * x).collect();
        let s_points = pi.iter().map(|p| g * (gamma * r[*p])).collect();
        (gamma, r, pi, r_points, s_points)
    }

    #[test]
    fn honest_shuffle_verifies() {
        let mut rng = test_rng();
        let g = Curve::generator();
        for k in [1, 2, 5] {
            let (gamma, r, pi, rp, sp) = instance(k, &mut rng);
            let witness = SimpleShuffleWitness::<Curve> { gamma, r: &r, pi: &pi };
            let proof = prove(&mut ProofTranscript::new(b"t"), g, &rp, &sp, &witness, &mut rng).unwrap();
            assert!(verify(&mut ProofTranscript::new(b"t"), g, g * gamma, &rp, &sp, &proof));

            let mut bytes = Vec::new();
            proof.write_bytes(&mut bytes).unwrap();
            let mut reader = WireReader::new(&bytes);
            assert_eq!(SimpleShuffleProof::<Curve>::read(&mut reader, k).unwrap(), proof);
            reader.finish().unwrap();
        }
    }

    #[test]
    fn non_permutation_fails() {
        let mut rng = test_rng();
        let g = Curve::generator();
        let (gamma, r, pi, rp, mut sp) = instance(3, &mut rng);
        sp[0] += g;
        let witness = SimpleShuffleWitness::<Curve> { gamma, r: &r, pi: &pi };
        let proof = prove(&mut ProofTranscript::new(b"t"), g, &rp, &sp, &witness, &mut rng).unwrap();
        assert!(!verify(&mut ProofTranscript::new(b"t"), g, g * gamma, &rp, &sp, &proof));
    }

    #[test]
    fn empty_input_is_rejected() {
        let mut rng = test_rng();
        let g = Curve::generator();
        let witness = SimpleShuffleWitness::<Curve> { gamma: Fr::one(), r: &[], pi: &[] };
        assert!(prove(&mut ProofTranscript::new(b"t"), g, &[], &[], &witness, &mut rng).is_err());
        let proof = SimpleShuffleProof::<Curve> { theta: vec![], alpha: vec![] };
        assert!(!verify(&mut ProofTranscript::new(b"t"), g, g, &[], &[], &proof));
    }
}
