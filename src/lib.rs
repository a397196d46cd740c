pub mod binder;
pub mod caveat;
pub mod chain;
pub mod crypto;
pub mod error;
pub mod macaroon;
pub mod packet;
pub mod serialization;
pub mod verifier;

pub use binder::{Binder, HashSignaturesBinder, HmacBinder};
pub use caveat::Caveat;
pub use crypto::{SIGNATURE_SIZE, Signature, derive_key};
pub use error::MacaroonError;
pub use macaroon::Macaroon;
pub use serialization::Format;
pub use verifier::{Satisfier, Verifier};

/// Result type for macaroon operations
pub type Result<T> = std::result::Result<T, MacaroonError>;
