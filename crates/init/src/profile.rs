//! Declarative card profile: PIN policies, key templates and the logical
//! file layout for one card family/application.
//!
//! A profile is loaded once at startup and read-only afterwards, except
//! for the PIN secret cache, which the authentication engine fills in as
//! secrets are supplied or collected.

use std::collections::BTreeMap;
use std::fmt;

use cardsmith_card::{CardPath, FileDescriptor, SecretMethod};
use zeroize::Zeroizing;

use crate::types::{DfType, KeyUsage, ObjectId, ObjectKind};

/// Which of a policy's two secrets is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinRole {
    Pin = 0,
    Puk = 1,
}

impl PinRole {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Pin => "PIN",
            Self::Puk => "PUK",
        }
    }
}

/// Policy for one card holder verification value.
pub struct PinPolicy {
    /// Identifier other objects use to name this PIN as their protector.
    pub auth_id: ObjectId,
    /// Short name, e.g. `CHV1`.
    pub ident: String,
    /// Human label stored in the AODF.
    pub label: String,
    /// Reference number presented to the card on verify.
    pub reference: u8,
    pub min_length: usize,
    pub stored_length: usize,
    /// Retry counters for PIN and PUK; a zero PUK counter means the
    /// policy defines no unblocking secret.
    pub attempts: [u8; 2],
    pub pad_char: u8,
    /// The EF holding this PIN on the card.
    pub file: FileDescriptor,
    secrets: [Option<Zeroizing<String>>; 2],
}

// Skips the secret cache; the derived impl would print the PIN values.
impl fmt::Debug for PinPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinPolicy")
            .field("auth_id", &self.auth_id)
            .field("ident", &self.ident)
            .field("reference", &self.reference)
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}

impl PinPolicy {
    pub fn new(
        auth_id: ObjectId,
        ident: impl Into<String>,
        label: impl Into<String>,
        reference: u8,
        file: FileDescriptor,
    ) -> Self {
        Self {
            auth_id,
            ident: ident.into(),
            label: label.into(),
            reference,
            min_length: 4,
            stored_length: 8,
            attempts: [3, 10],
            pad_char: 0x00,
            file,
            secrets: [None, None],
        }
    }

    pub fn lengths(mut self, min: usize, stored: usize) -> Self {
        self.min_length = min;
        self.stored_length = stored;
        self
    }

    pub fn attempts(mut self, pin: u8, puk: u8) -> Self {
        self.attempts = [pin, puk];
        self
    }

    pub const fn has_puk(&self) -> bool {
        self.attempts[1] != 0
    }

    pub fn secret(&self, role: PinRole) -> Option<&str> {
        self.secrets[role as usize].as_deref().map(String::as_str)
    }

    /// Seed a secret from caller input (command line, options file).
    pub fn set_secret(&mut self, role: PinRole, value: String) {
        self.secrets[role as usize] = Some(Zeroizing::new(value));
    }

    pub(crate) fn cache_secret(&mut self, role: PinRole, value: Zeroizing<String>) {
        self.secrets[role as usize] = Some(value);
    }
}

/// Defaults copied into a key object at allocation time.
#[derive(Debug, Clone)]
pub struct KeyTemplate {
    pub name: String,
    pub label: Option<String>,
    pub id: Option<ObjectId>,
    pub usage: KeyUsage,
    /// The PIN (by auth id) protecting keys cut from this template.
    pub auth_id: Option<ObjectId>,
}

impl KeyTemplate {
    pub fn new(name: impl Into<String>, usage: KeyUsage) -> Self {
        Self {
            name: name.into(),
            label: None,
            id: None,
            usage,
            auth_id: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn id(mut self, id: ObjectId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn auth_id(mut self, auth_id: ObjectId) -> Self {
        self.auth_id = Some(auth_id);
        self
    }
}

/// A pre-supplied secret for a non-interactive authentication method.
/// `reference: None` is a wildcard matching any reference of the method.
#[derive(Debug)]
pub struct AuthKey {
    pub method: SecretMethod,
    pub reference: Option<u8>,
    pub value: Zeroizing<Vec<u8>>,
}

/// Immutable personalization configuration for one card family.
#[derive(Debug)]
pub struct Profile {
    pub label: String,
    pub manufacturer: String,
    pub serial: Vec<u8>,
    pub app_df: FileDescriptor,
    pub odf: FileDescriptor,
    pub tokeninfo: FileDescriptor,
    df_files: BTreeMap<DfType, FileDescriptor>,
    key_slots: BTreeMap<ObjectKind, FileDescriptor>,
    files: Vec<FileDescriptor>,
    pins: Vec<PinPolicy>,
    private_templates: Vec<KeyTemplate>,
    public_templates: Vec<KeyTemplate>,
    auth_keys: Vec<AuthKey>,
}

impl Profile {
    pub fn builder(label: impl Into<String>) -> ProfileBuilder {
        ProfileBuilder::new(label)
    }

    pub fn pins(&self) -> &[PinPolicy] {
        &self.pins
    }

    pub fn pins_mut(&mut self) -> &mut [PinPolicy] {
        &mut self.pins
    }

    pub fn find_pin_by_auth_id(&self, auth_id: &ObjectId) -> Option<&PinPolicy> {
        self.pins.iter().find(|p| &p.auth_id == auth_id)
    }

    pub fn find_pin_by_ident(&mut self, ident: &str) -> Option<&mut PinPolicy> {
        self.pins.iter_mut().find(|p| p.ident == ident)
    }

    pub(crate) fn pin_index_by_reference(&self, reference: u8) -> Option<usize> {
        self.pins.iter().position(|p| p.reference == reference)
    }

    /// The profile's descriptor for a file at `path`, used when a missing
    /// parent directory has to be created on the fly.
    pub fn find_file_by_path(&self, path: &CardPath) -> Option<&FileDescriptor> {
        self.files.iter().find(|f| &f.path == path)
    }

    /// Template for a key class, by name or the first one defined.
    pub fn key_template(&self, kind: ObjectKind, name: Option<&str>) -> Option<&KeyTemplate> {
        let list = match kind {
            ObjectKind::Private => &self.private_templates,
            ObjectKind::Public => &self.public_templates,
        };
        match name {
            Some(name) => list.iter().find(|t| t.name == name),
            None => list.first(),
        }
    }

    /// The directory file the profile assigns to a type, if any.
    pub fn df_file(&self, ty: DfType) -> Option<&FileDescriptor> {
        self.df_files.get(&ty)
    }

    /// Base descriptor for key files of a class; vendors offset its file
    /// identifier by the running object index.
    pub fn key_slot(&self, kind: ObjectKind) -> Option<&FileDescriptor> {
        self.key_slots.get(&kind)
    }

    /// Pre-supplied secret for a method, exact reference first, then the
    /// wildcard entry.
    pub fn find_auth_key(&self, method: SecretMethod, reference: u8) -> Option<&[u8]> {
        self.auth_keys
            .iter()
            .find(|k| k.method == method && k.reference == Some(reference))
            .or_else(|| {
                self.auth_keys
                    .iter()
                    .find(|k| k.method == method && k.reference.is_none())
            })
            .map(|k| k.value.as_slice())
    }
}

/// Builder for [`Profile`]. The application DF, ODF and token-info
/// descriptors are required; everything else is optional.
#[derive(Debug)]
pub struct ProfileBuilder {
    label: String,
    manufacturer: String,
    serial: Vec<u8>,
    app_df: Option<FileDescriptor>,
    odf: Option<FileDescriptor>,
    tokeninfo: Option<FileDescriptor>,
    df_files: BTreeMap<DfType, FileDescriptor>,
    key_slots: BTreeMap<ObjectKind, FileDescriptor>,
    files: Vec<FileDescriptor>,
    pins: Vec<PinPolicy>,
    private_templates: Vec<KeyTemplate>,
    public_templates: Vec<KeyTemplate>,
    auth_keys: Vec<AuthKey>,
}

impl ProfileBuilder {
    fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            manufacturer: String::new(),
            serial: Vec::new(),
            app_df: None,
            odf: None,
            tokeninfo: None,
            df_files: BTreeMap::new(),
            key_slots: BTreeMap::new(),
            files: Vec::new(),
            pins: Vec::new(),
            private_templates: Vec::new(),
            public_templates: Vec::new(),
            auth_keys: Vec::new(),
        }
    }

    pub fn manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = manufacturer.into();
        self
    }

    pub fn serial(mut self, serial: &[u8]) -> Self {
        self.serial = serial.to_vec();
        self
    }

    pub fn app_df(mut self, file: FileDescriptor) -> Self {
        self.files.push(file.clone());
        self.app_df = Some(file);
        self
    }

    pub fn odf(mut self, file: FileDescriptor) -> Self {
        self.files.push(file.clone());
        self.odf = Some(file);
        self
    }

    pub fn tokeninfo(mut self, file: FileDescriptor) -> Self {
        self.files.push(file.clone());
        self.tokeninfo = Some(file);
        self
    }

    pub fn df_file(mut self, ty: DfType, file: FileDescriptor) -> Self {
        self.files.push(file.clone());
        self.df_files.insert(ty, file);
        self
    }

    pub fn key_slot(mut self, kind: ObjectKind, file: FileDescriptor) -> Self {
        self.key_slots.insert(kind, file);
        self
    }

    /// Register an extra file of the logical layout (a nested DF, a data
    /// EF) so lazy parent creation can find its descriptor.
    pub fn file(mut self, file: FileDescriptor) -> Self {
        self.files.push(file);
        self
    }

    pub fn pin(mut self, policy: PinPolicy) -> Self {
        self.files.push(policy.file.clone());
        self.pins.push(policy);
        self
    }

    pub fn private_key_template(mut self, template: KeyTemplate) -> Self {
        self.private_templates.push(template);
        self
    }

    pub fn public_key_template(mut self, template: KeyTemplate) -> Self {
        self.public_templates.push(template);
        self
    }

    pub fn auth_key(mut self, method: SecretMethod, reference: Option<u8>, value: &[u8]) -> Self {
        self.auth_keys.push(AuthKey {
            method,
            reference,
            value: Zeroizing::new(value.to_vec()),
        });
        self
    }

    /// Finish the profile. Panics if the application DF, ODF or
    /// token-info descriptor is missing; profiles are built at startup
    /// from static configuration, not from untrusted input.
    pub fn build(self) -> Profile {
        Profile {
            label: self.label,
            manufacturer: self.manufacturer,
            serial: self.serial,
            app_df: self.app_df.expect("profile needs an application DF"),
            odf: self.odf.expect("profile needs an ODF descriptor"),
            tokeninfo: self.tokeninfo.expect("profile needs a token-info descriptor"),
            df_files: self.df_files,
            key_slots: self.key_slots,
            files: self.files,
            pins: self.pins,
            private_templates: self.private_templates,
            public_templates: self.public_templates,
            auth_keys: self.auth_keys,
        }
    }
}
