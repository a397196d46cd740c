use thiserror::Error;

/// Errors that can occur when building, encoding or verifying macaroons
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MacaroonError {
    /// A field could not be encoded (oversized packet, non-UTF-8 JSON field)
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Malformed packet stream, invalid base64 or invalid JSON
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// The recomputed signature chain does not match the carried signature
    #[error("Invalid macaroon signature")]
    InvalidSignature,

    /// A first-party caveat matched no satisfier
    #[error("Caveat not satisfied: {0}")]
    CaveatNotSatisfied(String),

    /// No discharge macaroon carries the identifier of a third-party caveat
    #[error("No discharge macaroon found for caveat: {0}")]
    DischargeNotFound(String),

    /// A discharge macaroon's bound signature does not match the expected value
    #[error("Discharge binding mismatch: {0}")]
    DischargeBinding(String),

    /// A caveat's verification key id could not be opened
    #[error("Decryption error: {0}")]
    DecryptionError(String),

    /// A discharge chain re-entered a macaroon already being verified
    #[error("Cyclic discharge: {0}")]
    CyclicDischarge(String),

    /// Sealing a caveat key failed
    #[error("Cryptographic error: {0}")]
    CryptoError(String),

    /// Verification failed; carries every failure found
    #[error("Verification failed with {} failure(s)", .0.len())]
    VerificationFailed(Vec<MacaroonError>),
}

impl MacaroonError {
    /// Returns the individual failures behind a verification error.
    ///
    /// Any other error is returned as a single-element slice.
    pub fn failures(&self) -> &[MacaroonError] {
        match self {
            MacaroonError::VerificationFailed(failures) => failures,
            other => std::slice::from_ref(other),
        }
    }
}
