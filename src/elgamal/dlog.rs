//! Small-value discrete logarithm table used to decode plaintext points.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use ark_ec::CurveGroup;
use ark_serialize::CanonicalSerialize;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::{CipherVector, Ciphertext};
use crate::error::{ProofError, ProofResult};
use crate::parallel::map_indexed;

const LOG_TARGET: &str = "drynx_proofs::elgamal::dlog";

/// Bound used by [`decrypt_int`] and friends.
pub const DEFAULT_DLOG_LIMIT: i64 = 100_000;

type TableKey = (TypeId, i64);

static TABLES: Lazy<Mutex<HashMap<TableKey, Arc<DiscreteLogTable>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Maps the compressed encoding of `mB` back to `m` for every `m` in `[-limit, limit]`.
#[derive(Debug)]
pub struct DiscreteLogTable {
    limit: i64,
    entries: HashMap<Vec<u8>, i64>,
}

impl DiscreteLogTable {
    pub fn build<C: CurveGroup>(limit: i64) -> Self {
        let limit = limit.max(0);
        tracing::debug!(target: LOG_TARGET, limit, "building discrete log table");

        let base = C::generator();
        let mut points = Vec::with_capacity(2 * limit as usize + 1);
        let mut acc = C::zero();
        for _ in 0..=limit {
            points.push(acc);
            acc += base;
        }
        for m in 1..=limit as usize {
            points.push(-points[m]);
        }
        let affine = C::normalize_batch(&points);

        // Writing into a Vec cannot fail for a valid point.
        let encoded: Vec<Vec<u8>> = map_indexed(affine.len(), |i| {
            let mut buf = Vec::new();
            let _ = affine[i].serialize_compressed(&mut buf);
            buf
        });

        let mut entries = HashMap::with_capacity(encoded.len());
        for (i, key) in encoded.into_iter().enumerate() {
            let i = i as i64;
            let m = if i <= limit { i } else { limit - i };
            entries.insert(key, m);
        }
        Self { limit, entries }
    }

    /// Shared table for curve `C`, built once per `(curve, limit)`.
    pub fn global<C: CurveGroup>(limit: i64) -> Arc<DiscreteLogTable> {
        let mut tables = TABLES.lock();
        tables
            .entry((TypeId::of::<C>(), limit))
            .or_insert_with(|| Arc::new(Self::build::<C>(limit)))
            .clone()
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn lookup<C: CurveGroup>(&self, point: &C) -> ProofResult<i64> {
        let mut encoded = Vec::new();
        point
            .serialize_compressed(&mut encoded)
            .map_err(|err| ProofError::Serialization(err.to_string()))?;
        self.entries
            .get(&encoded)
            .copied()
            .ok_or(ProofError::DiscreteLogOutOfRange(self.limit))
    }

    pub fn decrypt<C: CurveGroup>(&self, secret: C::ScalarField, ct: &Ciphertext<C>) -> ProofResult<i64> {
        self.lookup(&ct.decrypt_point(secret))
    }

    pub fn decrypt_vector<C: CurveGroup>(
        &self,
        secret: C::ScalarField,
        vector: &CipherVector<C>,
    ) -> ProofResult<Vec<i64>> {
        vector
            .decrypt_points(secret)
            .iter()
            .map(|point| self.lookup(point))
            .collect()
    }
}

/// Decrypts a small signed integer using the shared default-bound table.
pub fn decrypt_int<C: CurveGroup>(secret: C::ScalarField, ct: &Ciphertext<C>) -> ProofResult<i64> {
    DiscreteLogTable::global::<C>(DEFAULT_DLOG_LIMIT).decrypt(secret, ct)
}

pub fn decrypt_int_vector<C: CurveGroup>(
    secret: C::ScalarField,
    vector: &CipherVector<C>,
) -> ProofResult<Vec<i64>> {
    DiscreteLogTable::global::<C>(DEFAULT_DLOG_LIMIT).decrypt_vector(secret, vector)
}
