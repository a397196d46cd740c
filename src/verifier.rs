use crate::binder::{Binder, HmacBinder};
use crate::caveat::Caveat;
use crate::chain::{Replay, SignatureChain};
use crate::crypto::{Signature, constant_time_eq, derive_key, open_caveat_key};
use crate::{Macaroon, MacaroonError, Result};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Decides whether a first-party caveat holds
///
/// Implemented for every `Fn(&[u8]) -> bool` closure, so most callers never
/// name this trait.
pub trait Satisfier: Send + Sync {
    /// Returns true if the caveat predicate is satisfied
    fn is_satisfied(&self, predicate: &[u8]) -> bool;
}

impl<F> Satisfier for F
where
    F: Fn(&[u8]) -> bool + Send + Sync,
{
    fn is_satisfied(&self, predicate: &[u8]) -> bool {
        self(predicate)
    }
}

/// Checks a macaroon, its caveats and its discharges
///
/// Configure the verifier with the builder methods, then call
/// [`Verifier::verify`]. Verification only borrows the verifier, so a
/// configured instance can be shared across threads; it cannot be changed
/// while a verification is running.
///
/// # Example
/// ```
/// use macaroons::{Macaroon, Verifier};
///
/// let key = b"this is our super secret key; only we should know it";
/// let mut macaroon = Macaroon::new("http://mybank/", "we used our secret key", key);
/// macaroon.add_first_party_caveat("account = 3735928559");
/// macaroon.add_first_party_caveat("time < 2030-01-01T00:00");
///
/// let verifier = Verifier::new()
///     .satisfy_exact("account = 3735928559")
///     .satisfy_general(|predicate: &[u8]| predicate.starts_with(b"time < "));
///
/// assert!(verifier.verify(&macaroon, key, &[]).is_ok());
/// assert!(!verifier.is_valid(&macaroon, b"wrong key", &[]));
/// ```
pub struct Verifier {
    exact: HashSet<Vec<u8>>,
    general: Vec<Box<dyn Satisfier>>,
    identifier_binders: HashMap<Vec<u8>, Box<dyn Binder>>,
    location_binders: HashMap<String, Box<dyn Binder>>,
    default_binder: Box<dyn Binder>,
}

impl Verifier {
    /// Creates a verifier that satisfies nothing and binds with [`HmacBinder`]
    pub fn new() -> Self {
        Self {
            exact: HashSet::new(),
            general: Vec::new(),
            identifier_binders: HashMap::new(),
            location_binders: HashMap::new(),
            default_binder: Box::new(HmacBinder),
        }
    }

    /// Accepts first-party caveats equal to `predicate`
    pub fn satisfy_exact(mut self, predicate: impl Into<Vec<u8>>) -> Self {
        self.exact.insert(predicate.into());
        self
    }

    /// Accepts first-party caveats for which `satisfier` returns true
    pub fn satisfy_general<S: Satisfier + 'static>(mut self, satisfier: S) -> Self {
        self.general.push(Box::new(satisfier));
        self
    }

    /// Uses `binder` for the discharge macaroon with this identifier
    pub fn bind_identifier(
        mut self,
        identifier: impl Into<Vec<u8>>,
        binder: impl Binder + 'static,
    ) -> Self {
        self.identifier_binders
            .insert(identifier.into(), Box::new(binder));
        self
    }

    /// Uses `binder` for discharge macaroons issued at this location
    pub fn bind_location(mut self, location: impl Into<String>, binder: impl Binder + 'static) -> Self {
        self.location_binders.insert(location.into(), Box::new(binder));
        self
    }

    /// Replaces the binder used when no identifier or location matches
    pub fn with_default_binder(mut self, binder: impl Binder + 'static) -> Self {
        self.default_binder = Box::new(binder);
        self
    }

    /// Returns true if a first-party caveat matches an exact predicate or any
    /// general satisfier
    pub fn is_satisfied(&self, predicate: &[u8]) -> bool {
        self.exact.contains(predicate) || self.general.iter().any(|s| s.is_satisfied(predicate))
    }

    /// Selects the binder for a discharge: by identifier, then by location,
    /// then the default
    pub fn binder_for(&self, discharge: &Macaroon) -> &dyn Binder {
        if let Some(binder) = self.identifier_binders.get(discharge.identifier()) {
            trace!("binder selected by identifier");
            return binder.as_ref();
        }
        if let Some(binder) = self.location_binders.get(discharge.location()) {
            trace!(location = discharge.location(), "binder selected by location");
            return binder.as_ref();
        }
        self.default_binder.as_ref()
    }

    /// Verifies a macaroon against its root key and a pool of bound discharges
    ///
    /// Every caveat is checked, transitively through the discharges, and all
    /// failures are reported together.
    ///
    /// # Returns
    /// * `Ok(())` if the signature chain holds and every caveat is satisfied
    /// * `Err(MacaroonError::VerificationFailed)` listing each failure otherwise
    pub fn verify(&self, macaroon: &Macaroon, root_key: &[u8], discharges: &[Macaroon]) -> Result<()> {
        let mut verification = Verification {
            verifier: self,
            root: macaroon,
            discharges,
            path: Vec::new(),
            failures: Vec::new(),
        };
        verification.check_root(&derive_key(root_key));

        if verification.failures.is_empty() {
            Ok(())
        } else {
            Err(MacaroonError::VerificationFailed(verification.failures))
        }
    }

    /// Like [`Verifier::verify`], discarding the failure reasons
    pub fn is_valid(&self, macaroon: &Macaroon, root_key: &[u8], discharges: &[Macaroon]) -> bool {
        self.verify(macaroon, root_key, discharges).is_ok()
    }
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

/// State of one `verify` call
struct Verification<'a> {
    verifier: &'a Verifier,
    root: &'a Macaroon,
    discharges: &'a [Macaroon],
    /// Identifiers of the macaroons on the branch being verified
    path: Vec<&'a [u8]>,
    failures: Vec<MacaroonError>,
}

impl<'a> Verification<'a> {
    fn check_root(&mut self, key: &Signature) {
        let root = self.root;
        let replay = SignatureChain::replay(key, root.identifier(), root.caveats());

        if !constant_time_eq(&replay.signature, root.signature()) {
            debug!(identifier = %lossy(root.identifier()), "root signature mismatch");
            self.failures.push(MacaroonError::InvalidSignature);
            return;
        }

        self.path.push(root.identifier());
        self.check_caveats(root, &replay);
        self.path.pop();
    }

    fn check_caveats(&mut self, macaroon: &'a Macaroon, replay: &Replay) {
        for (caveat, before) in macaroon.caveats().iter().zip(&replay.before) {
            match &caveat.verification_key_id {
                None => {
                    if !self.verifier.is_satisfied(&caveat.caveat_id) {
                        debug!(
                            identifier = %lossy(macaroon.identifier()),
                            caveat = %caveat.display_id(),
                            "caveat not satisfied"
                        );
                        self.failures
                            .push(MacaroonError::CaveatNotSatisfied(caveat.display_id()));
                    }
                }
                Some(vid) => self.check_third_party(caveat, vid, before),
            }
        }
    }

    fn check_third_party(&mut self, caveat: &Caveat, vid: &[u8], before: &Signature) {
        let Some(discharge) = self
            .discharges
            .iter()
            .find(|d| d.identifier() == caveat.caveat_id.as_slice())
        else {
            debug!(caveat = %caveat.display_id(), "no discharge macaroon");
            self.failures
                .push(MacaroonError::DischargeNotFound(caveat.display_id()));
            return;
        };

        if self.path.contains(&discharge.identifier()) {
            debug!(caveat = %caveat.display_id(), depth = self.path.len(), "discharge cycle");
            self.failures
                .push(MacaroonError::CyclicDischarge(caveat.display_id()));
            return;
        }

        let caveat_key = match open_caveat_key(before, vid) {
            Ok(key) => key,
            Err(err) => {
                debug!(caveat = %caveat.display_id(), "verification key id did not open");
                self.failures.push(err);
                return;
            }
        };

        let replay = SignatureChain::replay(&caveat_key, discharge.identifier(), discharge.caveats());
        let expected = self
            .verifier
            .binder_for(discharge)
            .bind(self.root.signature(), &replay.signature);

        if !constant_time_eq(&expected, discharge.signature()) {
            debug!(caveat = %caveat.display_id(), "discharge bound signature mismatch");
            self.failures
                .push(MacaroonError::DischargeBinding(caveat.display_id()));
            return;
        }

        trace!(caveat = %caveat.display_id(), depth = self.path.len(), "verifying discharge");
        self.path.push(discharge.identifier());
        self.check_caveats(discharge, &replay);
        self.path.pop();
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
