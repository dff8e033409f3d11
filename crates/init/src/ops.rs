//! Vendor capability layer. Everything card-model specific sits behind
//! [`CardOps`]; the engine core never branches on a card name.

use cardsmith_card::FileDescriptor;

use crate::auth::AuthCtx;
use crate::keys::KeyMaterial;
use crate::profile::Profile;
use crate::types::{Algorithm, ObjectKind};
use crate::vendor::SoftOps;
use crate::{Error, Result};

/// Card-model specific personalization operations.
///
/// Implementations receive an [`AuthCtx`] and are expected to route all
/// file writes through it so ACL handling and lazy file creation stay
/// uniform across vendors.
pub trait CardOps {
    /// Driver name, as selected on the command line.
    fn name(&self) -> &'static str;

    /// Remove the application and everything under it from the card.
    fn erase_card(&self, ctx: &mut AuthCtx<'_>) -> Result<()>;

    /// Create the application skeleton: the application DF and the PIN
    /// files, installing the supplied PIN values.
    fn init_application(&self, ctx: &mut AuthCtx<'_>) -> Result<()>;

    /// Descriptor for the file backing the `index`-th key object of a
    /// class, derived from the profile's key slot.
    fn allocate_file(
        &self,
        profile: &Profile,
        kind: ObjectKind,
        index: usize,
    ) -> Result<FileDescriptor>;

    /// Write externally generated key material into its allocated file.
    fn store_native_key(
        &self,
        ctx: &mut AuthCtx<'_>,
        file: &FileDescriptor,
        material: &KeyMaterial,
    ) -> Result<()>;

    /// Ask the card to generate the key pair itself. Vendors without the
    /// capability keep the default; the engine falls back to software
    /// generation on `NotSupported`.
    fn generate_native_key(
        &self,
        _ctx: &mut AuthCtx<'_>,
        _file: &FileDescriptor,
        _algorithm: Algorithm,
        _bits: usize,
    ) -> Result<KeyMaterial> {
        Err(Error::NotSupported("on-card key generation"))
    }
}

impl std::fmt::Debug for dyn CardOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CardOps").field(&self.name()).finish()
    }
}

/// Look up a driver by name.
pub fn ops_by_name(name: &str) -> Result<Box<dyn CardOps>> {
    match name {
        "soft" => Ok(Box::new(SoftOps)),
        _ => Err(Error::NotSupported("unknown card driver")),
    }
}
