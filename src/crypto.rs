use crate::{MacaroonError, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use xsalsa20poly1305::XSalsa20Poly1305;
use xsalsa20poly1305::aead::generic_array::GenericArray;
use xsalsa20poly1305::aead::rand_core::RngCore;
use xsalsa20poly1305::aead::{Aead, KeyInit, OsRng};

type HmacSha256 = Hmac<Sha256>;

/// Size of HMAC-SHA256 output in bytes (32 bytes = 256 bits)
pub const SIGNATURE_SIZE: usize = 32;

/// Size of the XSalsa20-Poly1305 nonce prepended to every sealed caveat key
pub const NONCE_SIZE: usize = 24;

/// A chain signature, also used as a signing and sealing key
pub type Signature = [u8; SIGNATURE_SIZE];

/// Public domain-separation key for [`derive_key`]
const KEY_GENERATOR: &[u8] = b"macaroons-key-generator";

/// Generates an HMAC-SHA256 signature
///
/// # Arguments
/// * `key` - The secret key
/// * `message` - The message to authenticate
///
/// # Returns
/// A 32-byte HMAC signature
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Signature {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(key).expect("HMAC can take key of any length");
    mac.update(message);
    mac.finalize().into_bytes().into()
}

/// Normalizes secret material of any length into a 32-byte signing key
///
/// This computes: HMAC-SHA256("macaroons-key-generator", secret)
pub fn derive_key(secret: &[u8]) -> Signature {
    hmac_sha256(KEY_GENERATOR, secret)
}

/// Binds a first-party caveat to the signature chain
///
/// This computes: HMAC-SHA256(previous_signature, caveat_id)
pub fn bind_caveat(signature: &Signature, caveat_id: &[u8]) -> Signature {
    hmac_sha256(signature, caveat_id)
}

/// Binds a third-party caveat to the signature chain
///
/// Each part is hashed on its own first, so the boundary between the
/// verification key id and the caveat id cannot shift:
/// `HMAC(sig, HMAC(sig, verification_key_id) || HMAC(sig, caveat_id))`
pub fn bind_third_party_caveat(
    signature: &Signature,
    verification_key_id: &[u8],
    caveat_id: &[u8],
) -> Signature {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(signature).expect("HMAC can take key of any length");
    mac.update(&hmac_sha256(signature, verification_key_id));
    mac.update(&hmac_sha256(signature, caveat_id));
    mac.finalize().into_bytes().into()
}

/// Draws a fresh random nonce from the operating system
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Seals a caveat root key under the current chain signature
///
/// Returns the verification key id stored in a third-party caveat: the
/// standard base64 text of `nonce || secretbox(key = signature, nonce, caveat_key)`.
/// The text form is what the chain signs and what goes on the wire.
pub fn seal_caveat_key(
    signature: &Signature,
    caveat_key: &Signature,
    nonce: &[u8; NONCE_SIZE],
) -> Result<Vec<u8>> {
    let cipher = <XSalsa20Poly1305 as KeyInit>::new_from_slice(signature)
        .map_err(|e| MacaroonError::CryptoError(e.to_string()))?;

    let ciphertext = cipher
        .encrypt(GenericArray::from_slice(nonce), caveat_key.as_slice())
        .map_err(|e| MacaroonError::CryptoError(e.to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    sealed.extend_from_slice(nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(STANDARD.encode(sealed).into_bytes())
}

/// Opens a verification key id produced by [`seal_caveat_key`]
///
/// Fails with [`MacaroonError::DecryptionError`] if the id is not base64, is
/// truncated, was tampered with, or was sealed under a different signature.
pub fn open_caveat_key(signature: &Signature, verification_key_id: &[u8]) -> Result<Signature> {
    let sealed = STANDARD.decode(verification_key_id).map_err(|e| {
        MacaroonError::DecryptionError(format!("verification key id is not base64: {e}"))
    })?;

    if sealed.len() < NONCE_SIZE {
        return Err(MacaroonError::DecryptionError(format!(
            "verification key id holds {} bytes, shorter than its nonce",
            sealed.len()
        )));
    }

    let (nonce, ciphertext) = sealed.split_at(NONCE_SIZE);
    let cipher = <XSalsa20Poly1305 as KeyInit>::new_from_slice(signature)
        .map_err(|e| MacaroonError::DecryptionError(e.to_string()))?;

    let plaintext = cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| {
            MacaroonError::DecryptionError("verification key id failed to open".to_string())
        })?;

    if plaintext.len() != SIGNATURE_SIZE {
        return Err(MacaroonError::DecryptionError(format!(
            "caveat key is {} bytes, expected {SIGNATURE_SIZE}",
            plaintext.len()
        )));
    }

    let mut caveat_key = [0u8; SIGNATURE_SIZE];
    caveat_key.copy_from_slice(&plaintext);
    Ok(caveat_key)
}

/// Compares two byte strings in constant time
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
