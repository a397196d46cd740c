use crate::caveat::Caveat;
use crate::crypto::{Signature, bind_caveat, bind_third_party_caveat, derive_key, hmac_sha256};

/// Running state of a macaroon's HMAC chain
///
/// The chain starts as `HMAC(key, identifier)` and absorbs every caveat in
/// order. First-party caveats contribute their id. Third-party caveats
/// contribute the separately hashed verification key id and id; see
/// [`bind_third_party_caveat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureChain {
    signature: Signature,
}

/// The outcome of replaying a chain over a caveat list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replay {
    /// Final signature after every caveat
    pub signature: Signature,

    /// `before[i]` is the chain signature just before caveat `i` was absorbed
    pub before: Vec<Signature>,
}

impl SignatureChain {
    /// Starts a chain from an already derived 32-byte key
    pub fn new(key: &Signature, identifier: &[u8]) -> Self {
        Self {
            signature: hmac_sha256(key, identifier),
        }
    }

    /// Starts a chain from caller-supplied secret material of any length
    pub fn from_secret(secret: &[u8], identifier: &[u8]) -> Self {
        Self::new(&derive_key(secret), identifier)
    }

    /// Resumes a chain at a known signature
    pub fn from_signature(signature: Signature) -> Self {
        Self { signature }
    }

    /// Current chain signature
    pub fn signature(&self) -> Signature {
        self.signature
    }

    /// Folds one caveat into the chain
    pub fn absorb(&mut self, caveat: &Caveat) {
        self.signature = match &caveat.verification_key_id {
            None => bind_caveat(&self.signature, &caveat.caveat_id),
            Some(vid) => bind_third_party_caveat(&self.signature, vid, &caveat.caveat_id),
        };
    }

    /// Recomputes a whole chain, remembering the signature before each caveat
    pub fn replay(key: &Signature, identifier: &[u8], caveats: &[Caveat]) -> Replay {
        let mut chain = Self::new(key, identifier);
        let mut before = Vec::with_capacity(caveats.len());

        for caveat in caveats {
            before.push(chain.signature);
            chain.absorb(caveat);
        }

        tracing::trace!(caveats = caveats.len(), "replayed signature chain");

        Replay {
            signature: chain.signature,
            before,
        }
    }
}
