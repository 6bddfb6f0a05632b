pub mod config;
pub mod crypto_serde;
pub mod diff_privacy;
pub mod elgamal;
pub mod encoding;
pub mod envelope;
pub mod error;
pub mod loader;
pub mod parallel;
pub mod proofs;
pub mod query;
pub mod signing;
pub mod suite;

#[cfg(test)]
pub mod test_utils;

pub use error::{ProofError, ProofResult, QueryError};
pub use suite::Suite;
