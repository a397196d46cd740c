use crate::crypto::{SIGNATURE_SIZE, Signature, hmac_sha256};

/// Binds a discharge macaroon's signature to the root macaroon it travels with
///
/// A bound discharge only verifies next to the root whose signature it was
/// bound to, so it cannot be lifted into another request. The verifier must
/// use the same binder the client used for each discharge.
pub trait Binder: Send + Sync {
    /// Computes the bound signature of a discharge
    fn bind(&self, root_signature: &Signature, discharge_signature: &Signature) -> Signature;
}

/// The default binder: `HMAC-SHA256(root_signature, discharge_signature)`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HmacBinder;

impl Binder for HmacBinder {
    fn bind(&self, root_signature: &Signature, discharge_signature: &Signature) -> Signature {
        hmac_sha256(root_signature, discharge_signature)
    }
}

/// Hashes both signatures under an all-zero key before combining them
///
/// This computes:
/// `HMAC(0^32, HMAC(0^32, root_signature) || HMAC(0^32, discharge_signature))`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashSignaturesBinder;

impl Binder for HashSignaturesBinder {
    fn bind(&self, root_signature: &Signature, discharge_signature: &Signature) -> Signature {
        let zero = [0u8; SIGNATURE_SIZE];
        let mut joined = [0u8; 2 * SIGNATURE_SIZE];
        joined[..SIGNATURE_SIZE].copy_from_slice(&hmac_sha256(&zero, root_signature));
        joined[SIGNATURE_SIZE..].copy_from_slice(&hmac_sha256(&zero, discharge_signature));
        hmac_sha256(&zero, &joined)
    }
}

impl<F> Binder for F
where
    F: Fn(&Signature, &Signature) -> Signature + Send + Sync,
{
    fn bind(&self, root_signature: &Signature, discharge_signature: &Signature) -> Signature {
        self(root_signature, discharge_signature)
    }
}
