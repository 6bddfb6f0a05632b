//! Ordinary least squares over `d` features via the normal equations.
//!
//! Slot layout: `N`, `Σ x_j` for each feature, `Σ x_j x_k` for `j <= k` in
//! row-major upper-triangle order, `Σ y`, then `Σ x_j y` for each feature.
//! The first part is the upper triangle of `XᵀX` (with an intercept column),
//! the last `d + 1` slots are `Xᵀy`.

use ark_ec::pairing::Pairing;
use ark_ec::CurveGroup;
use rand::Rng;

use super::{decrypt_slots, encrypt_slots, EncodedResponse, RangeInputs};
use crate::elgamal::{Ciphertext, DiscreteLogTable};
use crate::error::{ProofError, ProofResult};

const PIVOT_EPSILON: f64 = 1e-12;

/// `(d² + 5d + 4) / 2`.
pub fn slot_count(dimensions: usize) -> usize {
    (dimensions * dimensions + 5 * dimensions + 4) / 2
}

fn dimensions_of(slots: usize) -> ProofResult<usize> {
    let d = ((9.0 + 8.0 * slots as f64).sqrt() - 5.0) / 2.0;
    let d = d.round() as usize;
    if slot_count(d) != slots {
        return Err(ProofError::InvalidInput(format!(
            "{slots} slots do not form a linear regression encoding"
        )));
    }
    Ok(d)
}

/// `records[i]` holds the `d` features of observation `i`, `label[i]` its
/// target.
pub fn encode_linear_regression<E: Pairing, R: Rng>(
    records: &[Vec<i64>],
    label: &[i64],
    public_key: E::G1,
    range: Option<&RangeInputs<'_, E>>,
    rng: &mut R,
) -> ProofResult<EncodedResponse<E>> {
    if records.len() != label.len() {
        return Err(ProofError::LengthMismatch {
            expected: records.len(),
            actual: label.len(),
        });
    }
    let d = records.first().map(Vec::len).ok_or_else(|| {
        ProofError::InvalidInput("linear regression over zero records".into())
    })?;
    if let Some(record) = records.iter().find(|record| record.len() != d) {
        return Err(ProofError::LengthMismatch {
            expected: d,
            actual: record.len(),
        });
    }

    let mut values = Vec::with_capacity(slot_count(d));
    values.push(records.len() as i64);
    values.extend((0..d).map(|j| records.iter().map(|x| x[j]).sum::<i64>()));
    for j in 0..d {
        for k in j..d {
            values.push(records.iter().map(|x| x[j] * x[k]).sum());
        }
    }
    values.push(label.iter().sum());
    values.extend((0..d).map(|j| {
        records
            .iter()
            .zip(label)
            .map(|(x, y)| x[j] * y)
            .sum::<i64>()
    }));
    encrypt_slots(&values, public_key, range, rng)
}

/// Coefficients `[b0, b1, .., bd]` of `y = b0 + Σ b_j x_j`.
pub fn decode_linear_regression<C: CurveGroup>(
    ciphers: &[Ciphertext<C>],
    secret: C::ScalarField,
    table: &DiscreteLogTable,
) -> ProofResult<Vec<f64>> {
    let d = dimensions_of(ciphers.len())?;
    let clear = decrypt_slots(ciphers, secret, table)?;
    let (lhs, rhs) = clear.split_at(clear.len() - d - 1);

    let mut matrix = vec![vec![0.0; d + 2]; d + 1];
    let mut cells = lhs.iter();
    for i in 0..=d {
        for j in i..=d {
            let value = *cells.next().ok_or(ProofError::LengthMismatch {
                expected: slot_count(d),
                actual: clear.len(),
            })? as f64;
            matrix[i][j] = value;
            matrix[j][i] = value;
        }
    }
    for (row, value) in matrix.iter_mut().zip(rhs) {
        row[d + 1] = *value as f64;
    }
    solve_linear_system(matrix)
}

/// Solves an `n × (n + 1)` augmented system by Gaussian elimination with
/// partial pivoting.
pub fn solve_linear_system(mut matrix: Vec<Vec<f64>>) -> ProofResult<Vec<f64>> {
    let n = matrix.len();
    if let Some(row) = matrix.iter().find(|row| row.len() != n + 1) {
        return Err(ProofError::LengthMismatch {
            expected: n + 1,
            actual: row.len(),
        });
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|a, b| matrix[*a][col].abs().total_cmp(&matrix[*b][col].abs()))
            .unwrap_or(col);
        if matrix[pivot][col].abs() < PIVOT_EPSILON {
            return Err(ProofError::InvalidInput("singular normal equations".into()));
        }
        matrix.swap(col, pivot);
        for row in col + 1..n {
            let factor = matrix[row][col] / matrix[col][col];
            for k in col..=n {
                matrix[row][k] -= factor * matrix[col][k];
            }
        }
    }

    let mut solution = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| matrix[row][k] * solution[k]).sum();
        solution[row] = (matrix[row][n] - tail) / matrix[row][row];
    }
    Ok(solution)
}
