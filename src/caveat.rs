/// One entry in a macaroon's caveat list, in the order it was appended
///
/// The three fields mirror the `cid`, `vid` and `cl` wire packets. Every
/// caveat has a `cid`; third-party caveats also carry a `vid` and usually a
/// `cl`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caveat {
    /// `cid`: for a first-party caveat, the predicate the target service
    /// checks. For a third-party caveat, an opaque id the third party uses to
    /// recover the caveat key and condition; a discharge must carry it as its
    /// identifier.
    pub caveat_id: Vec<u8>,

    /// `vid`: the caveat key sealed under the chain signature that preceded
    /// this caveat, kept as the base64 text the chain signs. `None` for
    /// first-party caveats.
    pub verification_key_id: Option<Vec<u8>>,

    /// `cl`: where to ask for a discharge. A hint only, never signed.
    pub location: Option<String>,
}

impl Caveat {
    /// A caveat the target service checks itself
    pub fn first_party(predicate: impl Into<Vec<u8>>) -> Self {
        Self {
            caveat_id: predicate.into(),
            verification_key_id: None,
            location: None,
        }
    }

    /// A caveat discharged elsewhere; `sealed_key` is the already sealed `vid`
    ///
    /// This only assembles the fields. [`crate::Macaroon::add_third_party_caveat`]
    /// does the sealing and signing.
    pub fn third_party(
        identifier: impl Into<Vec<u8>>,
        sealed_key: impl Into<Vec<u8>>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            caveat_id: identifier.into(),
            verification_key_id: Some(sealed_key.into()),
            location: Some(location.into()),
        }
    }

    /// Returns true if this is a first-party caveat
    ///
    /// Only the verification key id decides; the location is advisory.
    pub fn is_first_party(&self) -> bool {
        self.verification_key_id.is_none()
    }

    /// Returns true if this is a third-party caveat
    pub fn is_third_party(&self) -> bool {
        !self.is_first_party()
    }

    /// The caveat id rendered for messages and logs
    pub fn display_id(&self) -> String {
        String::from_utf8_lossy(&self.caveat_id).into_owned()
    }
}
