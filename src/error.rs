use thiserror::Error;

use crate::functions::FunctionError;

/// Failure kinds surfaced by the threshold engine.
///
/// Messages carry indices, counts, bit lengths and public fingerprints only.
/// Secret material (`p`, `q`, share values, reconstructed secrets) never ends
/// up in an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("key generation failed: {0}")]
    KeyGenFailure(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("invalid field: {0}")]
    InvalidField(String),
    #[error("insufficient shares: got {got} distinct, need {need}")]
    InsufficientShares { got: usize, need: usize },
    #[error("shares reference different field primes")]
    FieldMismatch,
    #[error("conflicting shares for index {index}")]
    ConflictingShare { index: u32 },
    #[error("malformed share: {0}")]
    MalformedShare(String),
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),
    #[error("reconstruction failed: {0}")]
    ReconstructionFailure(String),
    #[error("decryption failed: {0}")]
    DecryptionFailure(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<FunctionError> for Error {
    fn from(e: FunctionError) -> Self {
        match e {
            FunctionError::PrimeSearchExhausted(_) | FunctionError::DeadlineExceeded => {
                Error::KeyGenFailure(e.to_string())
            }
            FunctionError::InvalidBitLength => Error::InvalidParameters(e.to_string()),
            FunctionError::RandomNumberGeneration => Error::KeyGenFailure(e.to_string()),
            FunctionError::NoInverse => Error::DecryptionFailure(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_errors_map_to_kinds() {
        assert!(matches!(
            Error::from(FunctionError::PrimeSearchExhausted(10)),
            Error::KeyGenFailure(_)
        ));
        assert!(matches!(
            Error::from(FunctionError::DeadlineExceeded),
            Error::KeyGenFailure(_)
        ));
        assert!(matches!(
            Error::from(FunctionError::InvalidBitLength),
            Error::InvalidParameters(_)
        ));
        assert!(matches!(
            Error::from(FunctionError::NoInverse),
            Error::DecryptionFailure(_)
        ));
    }

    #[test]
    fn test_insufficient_shares_message() {
        let err = Error::InsufficientShares { got: 2, need: 3 };
        assert_eq!(err.to_string(), "insufficient shares: got 2 distinct, need 3");
    }
}
