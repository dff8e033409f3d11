//! Authentication engine: walks a file's access control list for a
//! requested operation and presents secrets until the chain is satisfied
//! or refused, creating missing parent directories on the way.

use cardsmith_card::{
    AccessCondition, CardSession, FileDescriptor, Operation, SecretMethod, TransportError,
};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::personalizer::InputRequestFn;
use crate::profile::{PinRole, Profile};
use crate::{Error, Result};

/// Borrowed view of one personalization session: the card connection, the
/// profile (mutable for its PIN secret cache) and the input callback.
/// Every card round-trip the engine performs goes through this context.
pub struct AuthCtx<'a> {
    pub(crate) card: &'a mut dyn CardSession,
    pub(crate) profile: &'a mut Profile,
    pub(crate) input: Option<&'a InputRequestFn>,
}

impl std::fmt::Debug for AuthCtx<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthCtx")
            .field("profile", &self.profile)
            .field("has_input", &self.input.is_some())
            .finish_non_exhaustive()
    }
}

impl AuthCtx<'_> {
    /// Satisfy the ACL of `file` for `op`.
    ///
    /// Entries are walked in order: `Refuse` fails immediately wherever it
    /// appears, `Allow` terminates the chain successfully, and every
    /// `Secret` entry before that must verify. A failed verification
    /// aborts the whole call; there is no retry against the card.
    pub fn authenticate(&mut self, file: &FileDescriptor, op: Operation) -> Result<()> {
        for entry in file.acl.entries(op) {
            match *entry {
                AccessCondition::Refuse => {
                    return Err(Error::SecurityNotSatisfied(format!(
                        "{op:?} on {} is never allowed",
                        file.path
                    )));
                }
                AccessCondition::Allow => break,
                AccessCondition::Secret { method, reference } => {
                    self.verify_secret(method, reference)?;
                }
            }
        }
        Ok(())
    }

    /// Resolve and present one secret.
    ///
    /// Pre-supplied keys from the profile win, exact reference before the
    /// method's wildcard. A PIN whose reference matches no policy is an
    /// error: the profile is supposed to know every PIN on its card. Other
    /// methods without a pre-supplied key are left for the card to judge.
    fn verify_secret(&mut self, method: SecretMethod, reference: u8) -> Result<()> {
        if let Some(key) = self.profile.find_auth_key(method, reference) {
            let key = Zeroizing::new(key.to_vec());
            return self
                .card
                .verify(method, reference, &key)
                .map_err(verification_error);
        }

        if method != SecretMethod::Chv {
            warn!(%method, reference, "no secret available; letting the card decide");
            return Ok(());
        }

        let index = self
            .profile
            .pin_index_by_reference(reference)
            .ok_or(Error::NotFound("no PIN policy matches the required reference"))?;

        let secret = match self.profile.pins()[index].secret(PinRole::Pin) {
            Some(secret) => Zeroizing::new(secret.to_string()),
            None => self.collect_secret(index, PinRole::Pin)?,
        };

        self.card
            .verify(SecretMethod::Chv, reference, secret.as_bytes())
            .map_err(verification_error)
    }

    /// Ask the user for a PIN or PUK, enforcing the policy's length
    /// bounds, and cache the accepted value for later use.
    pub(crate) fn collect_secret(
        &mut self,
        index: usize,
        role: PinRole,
    ) -> Result<Zeroizing<String>> {
        const ATTEMPTS: usize = 3;

        let input = self
            .input
            .ok_or(Error::UserInteraction("no input callback set for secret entry"))?;

        let policy = &self.profile.pins()[index];
        let prompt = if policy.label.is_empty() {
            format!("Please enter {} for {}:", role.name(), policy.ident)
        } else {
            format!(
                "Please enter {} for {} ({}):",
                role.name(),
                policy.ident,
                policy.label
            )
        };
        let (min, max) = (policy.min_length, policy.stored_length);

        for _ in 0..ATTEMPTS {
            let value = input(&prompt);
            if value.len() < min {
                warn!("secret too short ({min} characters min)");
                continue;
            }
            if value.len() > max {
                warn!("secret too long ({max} characters max)");
                continue;
            }
            let value = Zeroizing::new(value);
            self.profile.pins_mut()[index].cache_secret(role, value.clone());
            return Ok(value);
        }
        Err(Error::InvalidArguments("secret length out of range"))
    }

    /// Select the directory containing `file`, creating it from its
    /// profile descriptor if the card does not have it yet. Recursion
    /// through [`Self::create_file`] builds a missing hierarchy
    /// depth-first, one level at a time.
    pub fn select_parent(&mut self, file: &FileDescriptor) -> Result<FileDescriptor> {
        let parent = file.path.parent();
        match self.card.select(&parent) {
            Ok(descriptor) => Ok(descriptor),
            Err(TransportError::FileNotFound) if !parent.is_root() => {
                let descriptor = self
                    .profile
                    .find_file_by_path(&parent)
                    .cloned()
                    .ok_or(Error::NotFound("parent directory unknown to the profile"))?;
                debug!(path = %parent, "creating missing parent");
                self.create_file(&descriptor)?;
                Ok(self.card.select(&parent)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create `file` on the card: select its parent, satisfy the parent's
    /// create conditions, then issue the create.
    pub fn create_file(&mut self, file: &FileDescriptor) -> Result<()> {
        let parent = self.select_parent(file)?;
        self.authenticate(&parent, Operation::Create)?;
        self.card.create(file)?;
        Ok(())
    }

    /// Write `data` to `file`, creating the file (and any missing parent
    /// chain) first if the card does not have it. Every directory rewrite
    /// and key-blob write passes through here, so creation and
    /// authentication can never be skipped.
    pub fn update_file(&mut self, file: &FileDescriptor, data: &[u8]) -> Result<()> {
        if let Err(e) = self.card.select(&file.path) {
            match e {
                TransportError::FileNotFound => {
                    let mut fresh = file.clone();
                    if fresh.size < data.len() {
                        fresh.size = data.len();
                    }
                    self.create_file(&fresh)?;
                    self.card.select(&file.path)?;
                }
                other => return Err(other.into()),
            }
        }

        self.authenticate(file, Operation::Update)?;
        self.card.update_binary(0, data)?;
        Ok(())
    }
}

fn verification_error(e: TransportError) -> Error {
    match e {
        TransportError::VerificationFailed { method, reference } => Error::SecurityNotSatisfied(
            format!("failed to verify {method} (ref=0x{reference:02X})"),
        ),
        other => other.into(),
    }
}
