//! Quantised Laplace noise for the differentially private shuffle.
//!
//! The noise list is deterministic: every value `x` on the grid `k / scale`
//! appears `ceil(pdf(x) / quanta)` times, once as `x` and once as `-x`. The
//! computing nodes encrypt and shuffle the list so no one knows which entry
//! ends up added to the result.

use crate::error::{ProofError, ProofResult};

const LOG_TARGET: &str = "drynx_proofs::diff_privacy";

fn laplace_pdf(x: f64, mean: f64, b: f64) -> f64 {
    (-(x - mean).abs() / b).exp() / (2.0 * b)
}

/// Generates `n` noise values drawn from a Laplace(`mean`, `b`) profile.
///
/// When `quanta` is zero it is derived from `limit`: the probability mass on
/// the grid within `(-limit, limit)` split into `n` quanta. Values are spaced
/// `1 / scale` apart and multiplied back by `scale`.
pub fn generate_noise_values(
    n: usize,
    mean: f64,
    b: f64,
    quanta: f64,
    scale: f64,
    limit: f64,
) -> ProofResult<Vec<f64>> {
    if b <= 0.0 || scale <= 0.0 {
        return Err(ProofError::InvalidInput(format!(
            "laplace scale {b} and grid scale {scale} must be positive"
        )));
    }
    if n == 0 {
        return Ok(Vec::new());
    }
    let step = 1.0 / scale;

    let quanta = if quanta != 0.0 {
        if limit != 0.0 {
            tracing::debug!(target: LOG_TARGET, quanta, limit, "both quanta and limit set, using quanta");
        }
        quanta
    } else {
        let mut mass = 0.0;
        let mut x = 0.0;
        while x < limit {
            mass += if x == 0.0 { 1.0 } else { 2.0 } * laplace_pdf(x, mean, b);
            x += step;
        }
        mass / n as f64
    };
    if !(quanta > 0.0 && quanta.is_finite()) {
        return Err(ProofError::InvalidInput(format!(
            "noise quanta {quanta} must be positive"
        )));
    }

    let mut noise = Vec::with_capacity(n + 1);
    let mut x: f64 = 0.0;
    while noise.len() < n {
        let repeats = (laplace_pdf(x, mean, b) / quanta).ceil() as usize;
        if repeats == 0 {
            return Err(ProofError::InvalidInput(format!(
                "laplace density vanished at {x} before {n} noise values"
            )));
        }
        for _ in 0..repeats {
            noise.push(x * scale);
            if x != 0.0 {
                noise.push(-x * scale);
            }
            if noise.len() >= n {
                break;
            }
        }
        x += step;
    }
    noise.truncate(n);
    tracing::debug!(target: LOG_TARGET, n, quanta, "generated noise list");
    Ok(noise)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(values: &[f64], target: f64) -> usize {
        values.iter().filter(|v| **v == target).count()
    }

    #[test]
    fn explicit_quanta_repeats_by_density() {
        let noise = generate_noise_values(10, 0.0, 1.0, 0.1, 1.0, 0.0).unwrap();
        assert_eq!(noise.len(), 10);
        assert_eq!(count(&noise, 0.0), 5);
        assert_eq!(count(&noise, 1.0), 2);
        assert_eq!(count(&noise, -1.0), 2);
        assert_eq!(count(&noise, 2.0), 1);
    }

    #[test]
    fn derived_quanta_stays_near_zero_and_balanced() {
        let noise = generate_noise_values(100, 0.0, 2.0, 0.0, 1.0, 10.0).unwrap();
        assert_eq!(noise.len(), 100);
        assert!(noise.iter().all(|v| v.abs() <= 20.0));
        let positives = noise.iter().filter(|v| **v > 0.0).count();
        let negatives = noise.iter().filter(|v| **v < 0.0).count();
        assert!(positives.abs_diff(negatives) <= 1);
    }

    #[test]
    fn grid_scale_spaces_values() {
        let noise = generate_noise_values(7, 0.0, 1.0, 0.1, 2.0, 0.0).unwrap();
        assert!(noise.iter().all(|v| v.fract() == 0.0));
        assert!(noise.contains(&1.0));
    }

    #[test]
    fn degenerate_parameters_fail() {
        assert!(generate_noise_values(5, 0.0, 0.0, 0.1, 1.0, 0.0).is_err());
        assert!(generate_noise_values(5, 0.0, 1.0, 0.0, 1.0, 0.0).is_err());
        assert!(generate_noise_values(5, 0.0, 1.0, 0.1, 0.0, 0.0).is_err());
        assert!(generate_noise_values(0, 0.0, 1.0, 0.1, 1.0, 0.0)
            .unwrap()
            .is_empty());
    }
}
