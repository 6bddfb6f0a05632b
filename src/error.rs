use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProofError {
    #[error("Malformed encoding: {0}")]
    Malformed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Plaintext outside the decryption table bound {0}")]
    DiscreteLogOutOfRange(i64),

    #[error("Batch cancelled before {0}")]
    Cancelled(&'static str),
}

pub type ProofResult<T> = Result<T, ProofError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Operation <{0}> does not exist")]
    UnknownOperation(String),

    #[error("Malformed query: {0}")]
    Malformed(String),
}
