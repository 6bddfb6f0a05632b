//! Additive ElGamal over the base group of the pairing suite.

mod ciphertext;
mod dlog;
mod keys;
mod keyswitch;
mod response;
mod vector;

pub use ciphertext::Ciphertext;
pub use dlog::{decrypt_int, decrypt_int_vector, DiscreteLogTable, DEFAULT_DLOG_LIMIT};
pub use keys::{aggregate_key, KeyPair};
pub use keyswitch::{
    combine_share_vectors, combine_shares, key_switch, key_switch_share, key_switch_share_vector,
    key_switch_vector, KeySwitchShare,
};
pub use response::{
    list_shape, read_process_responses, write_process_responses, ProcessResponse, RecordShape,
    ResponseAllDPs, ResponseDPOneGroup,
};
pub use vector::{CipherVector, PrecomputedZeros, RerandomizationPool};
