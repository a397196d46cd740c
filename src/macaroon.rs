use crate::Result;
use crate::binder::{Binder, HmacBinder};
use crate::caveat::Caveat;
use crate::chain::SignatureChain;
use crate::crypto::{NONCE_SIZE, Signature, derive_key, generate_nonce, seal_caveat_key};
use crate::verifier::Verifier;
use std::fmt;

/// A macaroon is a bearer credential with embedded, attenuating caveats.
///
/// Macaroons use chained HMAC-SHA256 signatures, so anyone holding one can add
/// caveats but nobody can remove or reorder them without the root key.
///
/// The fields are private: the only way to grow a macaroon is through the
/// `add_*_caveat` methods, which update the caveat list and signature together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Macaroon {
    location: String,
    identifier: Vec<u8>,
    caveats: Vec<Caveat>,
    signature: Signature,
}

impl Macaroon {
    /// Creates a new macaroon (minting operation)
    ///
    /// # Arguments
    /// * `location` - Advisory location hint for the target service
    /// * `identifier` - A public identifier, bound into the signature
    /// * `root_key` - The secret root key known only to the issuer
    ///
    /// # Example
    /// ```
    /// use macaroons::Macaroon;
    ///
    /// let macaroon = Macaroon::new(
    ///     "http://mybank/",
    ///     "we used our secret key",
    ///     b"this is our super secret key; only we should know it",
    /// );
    /// assert_eq!(
    ///     macaroon.signature_hex(),
    ///     "e3d9e02908526c4c0039ae15114115d97fdd68bf2ba379b342aaf0f617d0552f"
    /// );
    /// ```
    pub fn new(
        location: impl Into<String>,
        identifier: impl Into<Vec<u8>>,
        root_key: &[u8],
    ) -> Self {
        let identifier = identifier.into();
        let signature = SignatureChain::from_secret(root_key, &identifier).signature();

        Self {
            location: location.into(),
            identifier,
            caveats: Vec::new(),
            signature,
        }
    }

    /// Creates a discharge macaroon for a third-party caveat
    ///
    /// Called by the third party once it has recovered the caveat key and
    /// checked its condition. `identifier` must equal the caveat's id.
    pub fn create_discharge(
        location: impl Into<String>,
        identifier: impl Into<Vec<u8>>,
        caveat_key: &[u8],
    ) -> Self {
        Self::new(location, identifier, caveat_key)
    }

    /// Reassembles a macaroon from decoded wire fields
    ///
    /// The signature is taken as carried; only verification can vouch for it.
    pub(crate) fn from_parts(
        location: String,
        identifier: Vec<u8>,
        caveats: Vec<Caveat>,
        signature: Signature,
    ) -> Self {
        Self {
            location,
            identifier,
            caveats,
            signature,
        }
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn identifier(&self) -> &[u8] {
        &self.identifier
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// The signature as lowercase hex
    pub fn signature_hex(&self) -> String {
        hex::encode(self.signature)
    }

    pub fn caveats(&self) -> &[Caveat] {
        &self.caveats
    }

    pub fn first_party_caveats(&self) -> impl Iterator<Item = &Caveat> {
        self.caveats.iter().filter(|c| c.is_first_party())
    }

    pub fn third_party_caveats(&self) -> impl Iterator<Item = &Caveat> {
        self.caveats.iter().filter(|c| c.is_third_party())
    }

    /// Returns the number of caveats in this macaroon
    pub fn caveat_count(&self) -> usize {
        self.caveats.len()
    }

    /// Returns true if this macaroon has no caveats
    pub fn is_unrestricted(&self) -> bool {
        self.caveats.is_empty()
    }

    /// Adds a first-party caveat to this macaroon
    ///
    /// # Example
    /// ```
    /// use macaroons::Macaroon;
    ///
    /// let mut macaroon = Macaroon::new(
    ///     "http://mybank/",
    ///     "we used our secret key",
    ///     b"this is our super secret key; only we should know it",
    /// );
    /// macaroon.add_first_party_caveat("test = caveat");
    /// assert_eq!(
    ///     macaroon.signature_hex(),
    ///     "197bac7a044af33332865b9266e26d493bdd668a660e44d88ce1a998c23dbd67"
    /// );
    /// ```
    pub fn add_first_party_caveat(&mut self, predicate: impl Into<Vec<u8>>) {
        let caveat = Caveat::first_party(predicate);
        self.append(caveat);
    }

    /// Adds a third-party caveat to this macaroon
    ///
    /// The caveat key is derived, sealed under the current signature and stored
    /// as the caveat's verification key id. `identifier` is handed to the third
    /// party untouched; it must let that party recover the caveat key and the
    /// condition to check.
    ///
    /// On error the macaroon is left unchanged.
    ///
    /// # Example
    /// ```
    /// use macaroons::Macaroon;
    ///
    /// let mut macaroon = Macaroon::new("http://mybank/", "id", b"root key");
    /// macaroon
    ///     .add_third_party_caveat("http://auth.mybank/", b"caveat key", "user = Alice")
    ///     .unwrap();
    /// assert_eq!(macaroon.third_party_caveats().count(), 1);
    /// ```
    pub fn add_third_party_caveat(
        &mut self,
        location: impl Into<String>,
        caveat_key: &[u8],
        identifier: impl Into<Vec<u8>>,
    ) -> Result<()> {
        self.add_third_party_caveat_with_nonce(location, caveat_key, identifier, &generate_nonce())
    }

    pub(crate) fn add_third_party_caveat_with_nonce(
        &mut self,
        location: impl Into<String>,
        caveat_key: &[u8],
        identifier: impl Into<Vec<u8>>,
        nonce: &[u8; NONCE_SIZE],
    ) -> Result<()> {
        let verification_key_id = seal_caveat_key(&self.signature, &derive_key(caveat_key), nonce)?;
        let caveat = Caveat::third_party(identifier, verification_key_id, location);
        self.append(caveat);
        Ok(())
    }

    fn append(&mut self, caveat: Caveat) {
        let mut chain = SignatureChain::from_signature(self.signature);
        chain.absorb(&caveat);
        self.signature = chain.signature();
        self.caveats.push(caveat);
    }

    /// Binds a discharge macaroon to this macaroon with the default binder
    ///
    /// Returns a copy of `discharge` whose signature is bound to this
    /// macaroon's signature; `discharge` itself is not modified.
    pub fn prepare_for_request(&self, discharge: &Macaroon) -> Macaroon {
        self.prepare_for_request_with(discharge, &HmacBinder)
    }

    /// Binds a discharge macaroon to this macaroon with a specific binder
    pub fn prepare_for_request_with(&self, discharge: &Macaroon, binder: &dyn Binder) -> Macaroon {
        let mut bound = discharge.clone();
        bound.signature = binder.bind(&self.signature, &discharge.signature);
        bound
    }

    /// Binds every discharge with the default binder
    pub fn prepare_discharges(&self, discharges: &[Macaroon]) -> Vec<Macaroon> {
        discharges
            .iter()
            .map(|discharge| self.prepare_for_request(discharge))
            .collect()
    }

    /// Verifies this macaroon; see [`Verifier::verify`]
    pub fn verify(&self, root_key: &[u8], verifier: &Verifier, discharges: &[Macaroon]) -> Result<()> {
        verifier.verify(self, root_key, discharges)
    }

    /// Human-readable dump of every field, one per line
    ///
    /// # Example
    /// ```
    /// use macaroons::Macaroon;
    ///
    /// let mut macaroon = Macaroon::new("http://mybank/", "we used our secret key", b"secret");
    /// macaroon.add_first_party_caveat("test = caveat");
    /// let dump = macaroon.inspect();
    /// assert!(dump.starts_with("location http://mybank/\nidentifier we used our secret key\ncid test = caveat\n"));
    /// ```
    pub fn inspect(&self) -> String {
        let mut lines = vec![
            format!("location {}", self.location),
            format!("identifier {}", String::from_utf8_lossy(&self.identifier)),
        ];

        for caveat in &self.caveats {
            lines.push(format!("cid {}", caveat.display_id()));
            if let Some(vid) = &caveat.verification_key_id {
                lines.push(format!("vid {}", String::from_utf8_lossy(vid)));
            }
            if let Some(cl) = &caveat.location {
                lines.push(format!("cl {cl}"));
            }
        }

        lines.push(format!("signature {}", self.signature_hex()));
        lines.join("\n")
    }
}

impl fmt::Display for Macaroon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inspect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binder::HashSignaturesBinder;
    use crate::crypto::{SIGNATURE_SIZE, open_caveat_key};

    const BANK_KEY: &[u8] = b"this is our super secret key; only we should know it";

    fn bank_macaroon() -> Macaroon {
        Macaroon::new("http://mybank/", "we used our secret key", BANK_KEY)
    }

    #[test]
    fn test_new_macaroon() {
        let macaroon = bank_macaroon();

        assert_eq!(macaroon.location(), "http://mybank/");
        assert_eq!(macaroon.identifier(), b"we used our secret key");
        assert!(macaroon.is_unrestricted());
        assert_eq!(
            macaroon.signature_hex(),
            "e3d9e02908526c4c0039ae15114115d97fdd68bf2ba379b342aaf0f617d0552f"
        );
        assert_eq!(macaroon, bank_macaroon());
    }

    #[test]
    fn test_add_first_party_caveat() {
        let mut macaroon = bank_macaroon();
        macaroon.add_first_party_caveat("test = caveat");

        assert_eq!(macaroon.caveat_count(), 1);
        assert!(macaroon.caveats()[0].is_first_party());
        assert_eq!(
            macaroon.signature_hex(),
            "197bac7a044af33332865b9266e26d493bdd668a660e44d88ce1a998c23dbd67"
        );
    }

    #[test]
    fn test_add_third_party_caveat_seals_caveat_key() {
        let mut macaroon = Macaroon::new("http://mybank/", "we used our other secret key", b"root");
        macaroon.add_first_party_caveat("account = 3735928559");
        let before = *macaroon.signature();

        macaroon
            .add_third_party_caveat("http://auth.mybank/", b"caveat key", "remind auth")
            .unwrap();

        let caveat = &macaroon.caveats()[1];
        assert!(caveat.is_third_party());
        assert_eq!(caveat.caveat_id, b"remind auth");
        assert_eq!(caveat.location.as_deref(), Some("http://auth.mybank/"));

        let vid = caveat.verification_key_id.as_ref().unwrap();
        assert_eq!(open_caveat_key(&before, vid).unwrap(), derive_key(b"caveat key"));
    }

    #[test]
    fn test_third_party_caveat_with_fixed_nonce_is_deterministic() {
        let nonce = [0u8; NONCE_SIZE];
        let build = || {
            let mut m = Macaroon::new("http://mybank/", "id", b"root");
            m.add_third_party_caveat_with_nonce("http://auth/", b"ck", "cid", &nonce)
                .unwrap();
            m
        };

        assert_eq!(build(), build());
        let vid = build().caveats()[0].verification_key_id.clone().unwrap();
        assert!(vid.starts_with(b"AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"));
    }

    fn other_bank_macaroon() -> Macaroon {
        let mut macaroon = Macaroon::new(
            "http://mybank/",
            "we used our other secret key",
            b"this is a different super-secret key; never use the same secret twice",
        );
        macaroon.add_first_party_caveat("account = 3735928559");
        macaroon
            .add_third_party_caveat_with_nonce(
                "http://auth.mybank/",
                b"4; guaranteed random by a fair toss of the dice",
                "this was how we remind auth of key/pred",
                &[0u8; NONCE_SIZE],
            )
            .unwrap();
        macaroon
    }

    #[test]
    fn test_third_party_caveat_signature() {
        assert_eq!(
            other_bank_macaroon().signature_hex(),
            "6b99edb2ec6d7a4382071d7d41a0bf7dfa27d87d2f9fea86e330d7850ffda2b2"
        );
    }

    #[test]
    fn test_prepare_for_request_hash_signatures_signature() {
        let mut discharge = Macaroon::create_discharge(
            "http://auth.mybank/",
            "this was how we remind auth of key/pred",
            b"4; guaranteed random by a fair toss of the dice",
        );
        discharge.add_first_party_caveat("time < 2015-01-01T00:00");

        let protected =
            other_bank_macaroon().prepare_for_request_with(&discharge, &HashSignaturesBinder);

        assert_eq!(
            protected.signature_hex(),
            "b38b26ab29d3724e728427e758cccc16d9d7f3de46d0d811b70b117b05357b9b"
        );
    }

    #[test]
    fn test_third_party_caveats_use_fresh_nonces() {
        let mut a = Macaroon::new("loc", "id", b"root");
        let mut b = a.clone();
        a.add_third_party_caveat("http://auth/", b"ck", "cid").unwrap();
        b.add_third_party_caveat("http://auth/", b"ck", "cid").unwrap();

        assert_ne!(a.signature(), b.signature());
    }

    #[test]
    fn test_caveat_filters() {
        let mut macaroon = bank_macaroon();
        macaroon.add_first_party_caveat("a = 1");
        macaroon.add_third_party_caveat("http://auth/", b"ck", "tp").unwrap();
        macaroon.add_first_party_caveat("b = 2");

        assert_eq!(macaroon.first_party_caveats().count(), 2);
        assert_eq!(macaroon.third_party_caveats().count(), 1);
        assert!(!macaroon.is_unrestricted());
    }

    #[test]
    fn test_prepare_for_request_leaves_discharge_untouched() {
        let root = bank_macaroon();
        let discharge = Macaroon::create_discharge("http://auth/", "cid", b"ck");

        let bound = root.prepare_for_request(&discharge);

        assert_ne!(bound.signature(), discharge.signature());
        assert_eq!(bound.identifier(), discharge.identifier());
        assert_eq!(bound.caveats(), discharge.caveats());
        assert_eq!(discharge, Macaroon::create_discharge("http://auth/", "cid", b"ck"));
    }

    #[test]
    fn test_prepare_for_request_with_binder() {
        let root = bank_macaroon();
        let discharge = Macaroon::create_discharge("http://auth/", "cid", b"ck");

        let default = root.prepare_for_request(&discharge);
        let hashed = root.prepare_for_request_with(&discharge, &HashSignaturesBinder);

        assert_ne!(default.signature(), hashed.signature());
        assert_eq!(
            hashed.signature(),
            &HashSignaturesBinder.bind(root.signature(), discharge.signature())
        );
    }

    #[test]
    fn test_prepare_discharges() {
        let root = bank_macaroon();
        let discharges = vec![
            Macaroon::create_discharge("http://a/", "a", b"ka"),
            Macaroon::create_discharge("http://b/", "b", b"kb"),
        ];

        let bound = root.prepare_discharges(&discharges);

        assert_eq!(bound.len(), 2);
        assert_eq!(bound[1], root.prepare_for_request(&discharges[1]));
    }

    #[test]
    fn test_inspect() {
        let mut macaroon = bank_macaroon();
        macaroon.add_first_party_caveat("test = caveat");

        assert_eq!(
            macaroon.inspect(),
            "location http://mybank/\nidentifier we used our secret key\ncid test = caveat\n\
             signature 197bac7a044af33332865b9266e26d493bdd668a660e44d88ce1a998c23dbd67"
        );
        assert_eq!(macaroon.to_string(), macaroon.inspect());
    }

    #[test]
    fn test_inspect_prints_stored_verification_key_id() {
        let dump = other_bank_macaroon().inspect();

        assert_eq!(
            dump.lines().nth(4),
            Some(
                "vid AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA027FAuBYhtHwJ58FX6UlVNFtFsGxQHS7uD/w/dedwv4Jjw7UorCREw5rXbRqIKhr"
            )
        );
    }

    #[test]
    fn test_inspect_third_party_lines() {
        let mut macaroon = bank_macaroon();
        macaroon
            .add_third_party_caveat_with_nonce("http://auth/", b"ck", "tp", &[0u8; NONCE_SIZE])
            .unwrap();

        let dump = macaroon.inspect();
        let lines: Vec<&str> = dump.lines().collect();

        assert_eq!(lines.len(), 6);
        assert_eq!(lines[2], "cid tp");
        assert!(lines[3].starts_with("vid AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"));
        assert_eq!(lines[3].len(), "vid ".len() + 96);
        assert_eq!(lines[4], "cl http://auth/");
        assert_eq!(lines[5].len(), "signature ".len() + 2 * SIGNATURE_SIZE);
    }
}
