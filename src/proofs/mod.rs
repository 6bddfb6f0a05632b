//! Zero-knowledge proofs binding each step of a survey: range, shuffle,
//! aggregation, obfuscation and key switch.

pub mod aggregation;
pub mod key_switch;
pub mod obfuscation;
pub mod range;
pub mod shuffle;
pub mod sigma;
pub mod transcript;

pub use aggregation::{
    aggregation_list_from_bytes, aggregation_list_to_bytes, server_aggregation_list_proof_verification,
    server_aggregation_proof_creation, server_aggregation_proof_verification,
    PublishedAggregationProof,
};
pub use key_switch::{
    key_switch_list_proof_creation, key_switch_list_proof_verification, key_switch_proof_creation,
    key_switch_proof_verification, key_switch_with_proof, PublishedKSListProof, PublishedKSProof,
};
pub use obfuscation::{
    obfuscation_list_proof_creation, obfuscation_list_proof_verification,
    obfuscation_proof_creation, obfuscation_proof_verification, PublishedListObfuscationProof,
    PublishedObfuscationProof,
};
pub use range::{
    create_predicate_range_proof, create_predicate_range_proof_list,
    init_range_proof_signature, init_range_proof_signature_deterministic,
    range_proof_list_verification, range_proof_verification, to_base, CreateProof,
    PublishSignature, PublishSignatureBytes, RangeBounds, RangeProof, RangeProofData,
    RangeProofList,
};
pub use shuffle::{
    shuffle_proof, shuffle_sequence, shuffling_list_proof_verification,
    shuffling_proof_creation, shuffling_proof_verification, PublishedShufflingProof,
};
pub use sigma::{Representation, SigmaProof, PROOF_TAG};
pub use transcript::ProofTranscript;
