//! Neff's verifiable shuffle of ElGamal pairs. Proves that
//! `(X̄_i, Ȳ_i) = (X_{π(i)} + β_{π(i)} g, Y_{π(i)} + β_{π(i)} h)` for a hidden
//! permutation `π` and hidden scalars `β`.
//!
//! All verifier challenges come from one chained transcript, in the order
//! `ρ`, `λ`, then the simple-shuffle challenges.

use ark_ec::CurveGroup;
use ark_ff::{UniformRand, Zero};
use ark_std::rand::Rng;

use super::simple::{self, SimpleShuffleProof, SimpleShuffleWitness};
use crate::error::{ProofError, ProofResult};
use crate::parallel::{all_indexed, map_indexed};
use crate::proofs::transcript::ProofTranscript;
use crate::suite::{marshal_all, marshal_into, WireReader};

const LOG_TARGET: &str = "drynx_proofs::proofs::shuffle::neff";

pub const PAIR_SHUFFLE_TAG: &[u8] = b"PairShuffle";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PairShuffleProof<C: CurveGroup> {
    pub gamma: C,
    pub a: Vec<C>,
    pub c: Vec<C>,
    pub u: Vec<C>,
    pub w: Vec<C>,
    pub lambda1: C,
    pub lambda2: C,
    pub d: Vec<C>,
    pub sigma: Vec<C::ScalarField>,
    pub tau: C::ScalarField,
    pub simple: SimpleShuffleProof<C>,
}

/// Public side of a pair shuffle.
pub struct PairShuffleStatement<'a, C: CurveGroup> {
    pub g: C,
    pub h: C,
    pub x: &'a [C],
    pub y: &'a [C],
    pub x_bar: &'a [C],
    pub y_bar: &'a [C],
}

impl<C: CurveGroup> PairShuffleStatement<'_, C> {
    fn k(&self) -> usize {
        self.x.len()
    }

    fn well_formed(&self) -> bool {
        let k = self.k();
        k > 0 && self.y.len() == k && self.x_bar.len() == k && self.y_bar.len() == k
    }

    fn absorb(&self, transcript: &mut ProofTranscript) -> ProofResult<()> {
        transcript.append_element(b"g", &self.g)?;
        transcript.append_element(b"h", &self.h)?;
        transcript.append_elements(b"X", self.x)?;
        transcript.append_elements(b"Y", self.y)?;
        transcript.append_elements(b"Xbar", self.x_bar)?;
        transcript.append_elements(b"Ybar", self.y_bar)
    }
}

#[allow(clippy::too_many_arguments)]
fn absorb_commitments<C: CurveGroup>(
    transcript: &mut ProofTranscript,
    proof_gamma: &C,
    a: &[C],
    c: &[C],
    u: &[C],
    w: &[C],
    lambda1: &C,
    lambda2: &C,
) -> ProofResult<()> {
    transcript.append_element(b"Gamma", proof_gamma)?;
    transcript.append_elements(b"A", a)?;
    transcript.append_elements(b"C", c)?;
    transcript.append_elements(b"U", u)?;
    transcript.append_elements(b"W", w)?;
    transcript.append_element(b"Lambda1", lambda1)?;
    transcript.append_element(b"Lambda2", lambda2)
}

/// Checks that `pi` is a permutation of `0..k`.
pub fn check_permutation(pi: &[usize]) -> ProofResult<()> {
    let mut seen = vec![false; pi.len()];
    for &p in pi {
        match seen.get_mut(p) {
            Some(slot) if !*slot => *slot = true,
            _ => {
                return Err(ProofError::InvalidInput(format!(
                    "{p} breaks a permutation of 0..{}",
                    pi.len()
                )))
            }
        }
    }
    Ok(())
}

fn weighted_sum<C: CurveGroup>(points: &[C], scalars: &[C::ScalarField]) -> C {
    map_indexed(points.len(), |i| points[i] * scalars[i])
        .into_iter()
        .sum()
}

/// `beta` is indexed by input position.
pub fn prove<C: CurveGroup, R: Rng>(
    statement: &PairShuffleStatement<'_, C>,
    pi: &[usize],
    beta: &[C::ScalarField],
    rng: &mut R,
) -> ProofResult<PairShuffleProof<C>> {
    if !statement.well_formed() || pi.len() != statement.k() || beta.len() != statement.k() {
        return Err(ProofError::InvalidInput(format!(
            "pair shuffle over {} inputs with {} permutation entries",
            statement.k(),
            pi.len()
        )));
    }
    check_permutation(pi)?;
    let k = statement.k();
    let g = statement.g;
    let h = statement.h;

    let mut transcript = ProofTranscript::new(PAIR_SHUFFLE_TAG);
    statement.absorb(&mut transcript)?;

    let rand_vec = |rng: &mut R| -> Vec<C::ScalarField> {
        (0..k).map(|_| C::ScalarField::rand(rng)).collect()
    };
    let a_secret = rand_vec(rng);
    let u_secret = rand_vec(rng);
    let w_secret = rand_vec(rng);
    let tau0 = C::ScalarField::rand(rng);
    let gamma = C::ScalarField::rand(rng);

    let mut pi_inv = vec![0usize; k];
    for (i, &p) in pi.iter().enumerate() {
        pi_inv[p] = i;
    }

    let proof_gamma = g * gamma;
    let a = map_indexed(k, |i| g * a_secret[i]);
    let c = map_indexed(k, |i| g * (gamma * a_secret[pi[i]]));
    let u = map_indexed(k, |i| g * u_secret[i]);
    let w = map_indexed(k, |i| g * (gamma * w_secret[i]));

    let w_beta_sum: C::ScalarField =
        tau0 + (0..k).map(|i| w_secret[i] * beta[pi[i]]).sum::<C::ScalarField>();
    let wu: Vec<C::ScalarField> = (0..k).map(|i| w_secret[pi_inv[i]] - u_secret[i]).collect();
    let lambda1 = weighted_sum(statement.x, &wu) + g * w_beta_sum;
    let lambda2 = weighted_sum(statement.y, &wu) + h * w_beta_sum;

    absorb_commitments(&mut transcript, &proof_gamma, &a, &c, &u, &w, &lambda1, &lambda2)?;
    let rho: Vec<C::ScalarField> = transcript.challenge_scalars(b"rho", k);

    let b_secret: Vec<C::ScalarField> = (0..k).map(|i| rho[i] - u_secret[i]).collect();
    let d_secret: Vec<C::ScalarField> = (0..k).map(|i| gamma * b_secret[pi[i]]).collect();
    let d = map_indexed(k, |i| g * d_secret[i]);
    transcript.append_elements(b"D", &d)?;
    let lambda: C::ScalarField = transcript.challenge_scalar(b"lambda");

    let r_secret: Vec<C::ScalarField> =
        (0..k).map(|i| a_secret[i] + lambda * b_secret[i]).collect();
    let r_points = map_indexed(k, |i| a[i] + (g * rho[i] - u[i]) * lambda);
    let s_points = map_indexed(k, |i| c[i] + d[i] * lambda);
    let witness = SimpleShuffleWitness {
        gamma,
        r: &r_secret,
        pi,
    };
    let simple = simple::prove(&mut transcript, g, &r_points, &s_points, &witness, rng)?;

    let sigma: Vec<C::ScalarField> = (0..k).map(|i| w_secret[i] + b_secret[pi[i]]).collect();
    let tau = -tau0 + (0..k).map(|i| b_secret[i] * beta[i]).sum::<C::ScalarField>();

    tracing::debug!(target: LOG_TARGET, k, "built pair shuffle proof");
    Ok(PairShuffleProof {
        gamma: proof_gamma,
        a,
        c,
        u,
        w,
        lambda1,
        lambda2,
        d,
        sigma,
        tau,
        simple,
    })
}

pub fn verify<C: CurveGroup>(statement: &PairShuffleStatement<'_, C>, proof: &PairShuffleProof<C>) -> bool {
    match try_verify(statement, proof) {
        Ok(result) => {
            tracing::debug!(target: LOG_TARGET, k = statement.k(), result, "pair shuffle verification");
            result
        }
        Err(err) => {
            tracing::debug!(target: LOG_TARGET, error = %err, "pair shuffle rejected");
            false
        }
    }
}

fn try_verify<C: CurveGroup>(
    statement: &PairShuffleStatement<'_, C>,
    proof: &PairShuffleProof<C>,
) -> ProofResult<bool> {
    let k = statement.k();
    if !statement.well_formed() {
        return Ok(false);
    }
    let sized = [&proof.a, &proof.c, &proof.u, &proof.w, &proof.d];
    if sized.iter().any(|v| v.len() != k) || proof.sigma.len() != k {
        return Ok(false);
    }
    let g = statement.g;
    let h = statement.h;

    let mut transcript = ProofTranscript::new(PAIR_SHUFFLE_TAG);
    statement.absorb(&mut transcript)?;
    absorb_commitments(
        &mut transcript,
        &proof.gamma,
        &proof.a,
        &proof.c,
        &proof.u,
        &proof.w,
        &proof.lambda1,
        &proof.lambda2,
    )?;
    let rho: Vec<C::ScalarField> = transcript.challenge_scalars(b"rho", k);
    transcript.append_elements(b"D", &proof.d)?;
    let lambda: C::ScalarField = transcript.challenge_scalar(b"lambda");

    let r_points = map_indexed(k, |i| proof.a[i] + (g * rho[i] - proof.u[i]) * lambda);
    let s_points = map_indexed(k, |i| proof.c[i] + proof.d[i] * lambda);
    if !simple::verify(&mut transcript, g, proof.gamma, &r_points, &s_points, &proof.simple) {
        return Ok(false);
    }

    if !all_indexed(k, |i| proof.gamma * proof.sigma[i] == proof.w[i] + proof.d[i]) {
        return Ok(false);
    }

    let lhs1 = proof.lambda1 + g * proof.tau;
    let rhs1 = weighted_sum(statement.x_bar, &proof.sigma) - weighted_sum(statement.x, &rho);
    let lhs2 = proof.lambda2 + h * proof.tau;
    let rhs2 = weighted_sum(statement.y_bar, &proof.sigma) - weighted_sum(statement.y, &rho);
    Ok(lhs1 == rhs1 && lhs2 == rhs2)
}

impl<C: CurveGroup> PairShuffleProof<C> {
    /// `Γ, A, C, U, W, Λ1, Λ2, D, σ, τ, Θ, α`
    pub fn to_bytes(&self) -> ProofResult<Vec<u8>> {
        let mut out = Vec::new();
        marshal_into(&self.gamma, &mut out)?;
        marshal_all(&self.a, &mut out)?;
        marshal_all(&self.c, &mut out)?;
        marshal_all(&self.u, &mut out)?;
        marshal_all(&self.w, &mut out)?;
        marshal_into(&self.lambda1, &mut out)?;
        marshal_into(&self.lambda2, &mut out)?;
        marshal_all(&self.d, &mut out)?;
        marshal_all(&self.sigma, &mut out)?;
        marshal_into(&self.tau, &mut out)?;
        self.simple.write_bytes(&mut out)?;
        Ok(out)
    }

    /// Parses a proof over `k` pairs; trailing bytes are rejected.
    pub fn from_bytes(bytes: &[u8], k: usize) -> ProofResult<Self> {
        if k == 0 {
            return Err(ProofError::Malformed("pair shuffle over no pairs".into()));
        }
        let mut reader = WireReader::new(bytes);
        let proof = Self {
            gamma: reader.read()?,
            a: reader.read_vec(k)?,
            c: reader.read_vec(k)?,
            u: reader.read_vec(k)?,
            w: reader.read_vec(k)?,
            lambda1: reader.read()?,
            lambda2: reader.read()?,
            d: reader.read_vec(k)?,
            sigma: reader.read_vec(k)?,
            tau: reader.read()?,
            simple: SimpleShuffleProof::read(&mut reader, k)?,
        };
        reader.finish()?;
        if proof.gamma.is_zero() {
            return Err(ProofError::Malformed("identity Γ".into()));
        }
        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ark_bn254::{Fr, G1Projective};
    use ark_ec::PrimeGroup;
    use ark_std::test_rng;

    type Curve = G1Projective;

    struct Instance {
        h: Curve,
        x: Vec<Curve>,
        y: Vec<Curve>,
        x_bar: Vec<Curve>,
        y_bar: Vec<Curve>,
        pi: Vec<usize>,
        beta: Vec<Fr>,
    }

    impl Instance {
        fn statement(&self) -> PairShuffleStatement<'_, Curve> {
            PairShuffleStatement {
                g: Curve::generator(),
                h: self.h,
                x: &self.x,
                y: &self.y,
                x_bar: &self.x_bar,
                y_bar: &self.y_bar,
            }
        }
    }

    fn instance(k: usize, rng: &mut impl Rng) -> Instance {
        let g = Curve::generator();
        let h = g * Fr::rand(rng);
        let x: Vec<Curve> = (0..k).map(|_| g * Fr::rand(rng)).collect();
        let y: Vec<Curve> = (0..k).map(|_| g * Fr::rand(rng)).collect();
        let pi: Vec<usize> = (0..k).rev().collect();
        let beta: Vec<Fr> = (0..k).map(|_| Fr::rand(rng)).collect();
        let x_bar = pi.iter().map(|&p| x[p] + g * beta[p]).collect();
        let y_bar = pi.iter().map(|&p| y[p] + h * beta[p]).collect();
        Instance { h, x, y, x_bar, y_bar, pi, beta }
    }

    #[test]
    fn honest_pair_shuffle_verifies_and_round_trips() {
        let mut rng = test_rng();
        for k in [1, 3, 6] {
            let inst = instance(k, &mut rng);
            let proof = prove(&inst.statement(), &inst.pi, &inst.beta, &mut rng).unwrap();
            assert!(verify(&inst.statement(), &proof));

            let bytes = proof.to_bytes().unwrap();
            assert_eq!(PairShuffleProof::<Curve>::from_bytes(&bytes, k).unwrap(), proof);
            assert!(PairShuffleProof::<Curve>::from_bytes(&bytes[..bytes.len() - 1], k).is_err());
        }
    }

    #[test]
    fn wrong_output_is_rejected() {
        let mut rng = test_rng();
        let mut inst = instance(4, &mut rng);
        let proof = prove(&inst.statement(), &inst.pi, &inst.beta, &mut rng).unwrap();
        inst.x_bar.swap(0, 1);
        assert!(!verify(&inst.statement(), &proof));
    }

    #[test]
    fn wrong_witness_does_not_verify() {
        let mut rng = test_rng();
        let inst = instance(4, &mut rng);
        let identity: Vec<usize> = (0..4).collect();
        let proof = prove(&inst.statement(), &identity, &inst.beta, &mut rng).unwrap();
        assert!(!verify(&inst.statement(), &proof));
    }

    #[test]
    fn non_permutations_are_rejected() {
        assert!(check_permutation(&[0, 2, 1]).is_ok());
        assert!(check_permutation(&[0, 0, 1]).is_err());
        assert!(check_permutation(&[0, 3, 1]).is_err());
    }
}
