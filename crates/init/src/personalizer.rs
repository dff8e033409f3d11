//! The personalization session: one card, one profile, one driver.

use cardsmith_card::CardSession;
use tracing::{debug, info, warn};

use crate::allocator::setup_key;
use crate::directory;
use crate::keys;
use crate::object::{Catalog, DirectoryObject, ObjectPayload, PinInfo};
use crate::ops::CardOps;
use crate::profile::{PinRole, Profile};
use crate::request::KeyRequest;
use crate::types::{DfType, ObjectId, ObjectKind, PinFlags};
use crate::{Error, Result};

/// Callback used to collect secrets from the user.
pub type InputRequestFn = Box<dyn Fn(&str) -> String + Send + Sync>;

/// Orchestrates personalization of one card.
///
/// Owns the card session, the profile and the running object catalog.
/// All entry points take the card lock for their whole duration; partial
/// failures leave whatever was already written in place.
pub struct Personalizer<S: CardSession> {
    card: S,
    ops: Box<dyn CardOps>,
    profile: Profile,
    catalog: Catalog,
    input: Option<InputRequestFn>,
}

impl<S: CardSession + std::fmt::Debug> std::fmt::Debug for Personalizer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Personalizer")
            .field("card", &self.card)
            .field("ops", &self.ops)
            .field("profile", &self.profile)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl<S: CardSession> Personalizer<S> {
    pub fn new(card: S, ops: Box<dyn CardOps>, profile: Profile) -> Self {
        Self {
            card,
            ops,
            profile,
            catalog: Catalog::new(),
            input: None,
        }
    }

    /// Attach the secret-entry callback.
    pub fn with_input(mut self, input: InputRequestFn) -> Self {
        self.input = Some(input);
        self
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn profile_mut(&mut self) -> &mut Profile {
        &mut self.profile
    }

    pub fn card(&self) -> &S {
        &self.card
    }

    pub fn card_mut(&mut self) -> &mut S {
        &mut self.card
    }

    /// Catalog entries of one directory type, in creation order.
    pub fn objects(&self, ty: DfType) -> &[DirectoryObject] {
        self.catalog.objects(ty)
    }

    /// Split the session into its disjoint working parts.
    fn parts(&mut self) -> (crate::auth::AuthCtx<'_>, &mut Catalog, &dyn CardOps) {
        let Self {
            card,
            ops,
            profile,
            catalog,
            input,
        } = self;
        (
            crate::auth::AuthCtx {
                card,
                profile,
                input: input.as_ref(),
            },
            catalog,
            &**ops,
        )
    }

    fn with_lock<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.card.lock()?;
        let result = f(self);
        self.card.unlock()?;
        result
    }

    /// Remove the application from the card and forget the session
    /// catalog.
    pub fn erase_card(&mut self) -> Result<()> {
        self.with_lock(|this| {
            let (mut ctx, catalog, ops) = this.parts();
            ops.erase_card(&mut ctx)?;
            *catalog = Catalog::new();
            info!("application erased");
            Ok(())
        })
    }

    /// Create the application on the card: the DF skeleton, the PIN
    /// files, the token information file and the authentication object
    /// directory.
    pub fn add_application(&mut self) -> Result<()> {
        self.with_lock(|this| {
            this.collect_pins()?;
            this.catalog_pins();

            let (mut ctx, catalog, ops) = this.parts();
            ops.init_application(&mut ctx)?;
            directory::update_tokeninfo(&mut ctx)?;
            directory::update_df(&mut ctx, catalog, DfType::AuthObjects)?;
            info!("application created");
            Ok(())
        })
    }

    /// Generate a key pair and store both halves, updating the key
    /// directories. Native generation is attempted first when requested;
    /// a card that cannot generate has its native flag cleared and falls
    /// back to software generation exactly once.
    pub fn generate_key(&mut self, request: &mut KeyRequest) -> Result<ObjectId> {
        self.with_lock(|this| {
            this.write_private(request, true)?;
            this.write_public(request)?;
            this.resolved_id(request)
        })
    }

    /// Store an externally supplied key pair, updating the key
    /// directories. The request must carry key material.
    pub fn store_key(&mut self, request: &mut KeyRequest) -> Result<ObjectId> {
        require_material(request)?;
        self.with_lock(|this| {
            this.write_private(request, false)?;
            this.write_public(request)?;
            this.resolved_id(request)
        })
    }

    /// Store only the private half of supplied key material.
    pub fn store_private_key(&mut self, request: &mut KeyRequest) -> Result<ObjectId> {
        require_material(request)?;
        self.with_lock(|this| {
            this.write_private(request, false)?;
            this.resolved_id(request)
        })
    }

    /// Store only the public half of supplied key material.
    pub fn store_public_key(&mut self, request: &mut KeyRequest) -> Result<ObjectId> {
        require_material(request)?;
        self.with_lock(|this| {
            this.write_public(request)?;
            this.resolved_id(request)
        })
    }

    fn write_private(&mut self, request: &mut KeyRequest, allow_generate: bool) -> Result<()> {
        let (mut ctx, catalog, ops) = self.parts();
        let private = setup_key(ctx.profile, ops, catalog, request, ObjectKind::Private)?;

        let material = match request.material.take() {
            Some(material) => {
                ops.store_native_key(&mut ctx, &private.file, &material)?;
                material
            }
            None if allow_generate => {
                if request.native {
                    match ops.generate_native_key(
                        &mut ctx,
                        &private.file,
                        request.algorithm,
                        request.bits,
                    ) {
                        // A native key stays on the card; nothing to store.
                        Ok(material) => material,
                        Err(Error::NotSupported(what)) => {
                            warn!("card does not support {what}; generating in software");
                            request.native = false;
                            let material =
                                keys::generate_software(request.algorithm, request.bits)?;
                            ops.store_native_key(&mut ctx, &private.file, &material)?;
                            material
                        }
                        Err(e) => return Err(e),
                    }
                } else {
                    let material = keys::generate_software(request.algorithm, request.bits)?;
                    ops.store_native_key(&mut ctx, &private.file, &material)?;
                    material
                }
            }
            None => return Err(Error::InvalidArguments("no key material to store")),
        };

        record_key_length(catalog, &private, material.bits());
        directory::update_df(&mut ctx, catalog, DfType::PrivateKeys)?;
        request.material = Some(material);
        Ok(())
    }

    fn write_public(&mut self, request: &mut KeyRequest) -> Result<()> {
        let (mut ctx, catalog, ops) = self.parts();
        let public = setup_key(ctx.profile, ops, catalog, request, ObjectKind::Public)?;

        let material = request
            .material
            .as_ref()
            .ok_or(Error::InvalidArguments("no key material to store"))?;
        let der = material.public_key_der()?;
        record_key_length(catalog, &public, material.bits());
        ctx.update_file(&public.file, &der)?;
        directory::update_df(&mut ctx, catalog, DfType::PublicKeys)?;
        Ok(())
    }

    fn resolved_id(&self, request: &KeyRequest) -> Result<ObjectId> {
        let id = request
            .id
            .clone()
            .ok_or(Error::NotFound("allocation assigned no identifier"))?;
        debug!(%id, "key pair stored");
        Ok(id)
    }

    /// Satisfy the ACL of `file` for one operation.
    pub fn authenticate(
        &mut self,
        file: &cardsmith_card::FileDescriptor,
        op: cardsmith_card::Operation,
    ) -> Result<()> {
        let (mut ctx, _, _) = self.parts();
        ctx.authenticate(file, op)
    }

    /// Create one file from its descriptor, satisfying the parent's
    /// create conditions and building missing parents along the way.
    pub fn create_file(&mut self, file: &cardsmith_card::FileDescriptor) -> Result<()> {
        self.with_lock(|this| {
            let (mut ctx, _, _) = this.parts();
            ctx.create_file(file)
        })
    }

    /// Collect every PIN (and PUK) the profile defines and the card does
    /// not hold yet.
    fn collect_pins(&mut self) -> Result<()> {
        for index in 0..self.profile.pins().len() {
            let path = self.profile.pins()[index].file.path.clone();
            if self.card.select(&path).is_ok() {
                debug!(path = %path, "PIN file already on card");
                continue;
            }
            if self.profile.pins()[index].secret(PinRole::Pin).is_none() {
                let (mut ctx, _, _) = self.parts();
                ctx.collect_secret(index, PinRole::Pin)?;
            }
            let policy = &self.profile.pins()[index];
            if policy.has_puk() && policy.secret(PinRole::Puk).is_none() {
                let (mut ctx, _, _) = self.parts();
                ctx.collect_secret(index, PinRole::Puk)?;
            }
        }
        Ok(())
    }

    /// Mirror the profile's PIN policies into the catalog as
    /// authentication objects.
    fn catalog_pins(&mut self) {
        for policy in self.profile.pins() {
            let exists = self
                .catalog
                .objects(DfType::AuthObjects)
                .iter()
                .any(|o| o.id() == &policy.auth_id);
            if exists {
                continue;
            }
            let mut flags = PinFlags::CASE_SENSITIVE | PinFlags::INITIALIZED;
            if policy.stored_length > policy.min_length {
                flags = flags | PinFlags::NEEDS_PADDING;
            }
            self.catalog.push_object(DirectoryObject {
                label: policy.label.clone(),
                auth_id: None,
                payload: ObjectPayload::Pin(PinInfo {
                    auth_id: policy.auth_id.clone(),
                    reference: policy.reference,
                    flags,
                    min_length: policy.min_length,
                    stored_length: policy.stored_length,
                    pad_char: policy.pad_char,
                    path: policy.file.path.clone(),
                }),
            });
        }
    }
}

fn require_material(request: &KeyRequest) -> Result<()> {
    if request.material.is_none() {
        return Err(Error::InvalidArguments("no key material to store"));
    }
    Ok(())
}

fn record_key_length(catalog: &mut Catalog, key: &crate::allocator::AllocatedKey, bits: usize) {
    if let Some(info) = catalog
        .object_mut(key.df_type, key.index)
        .and_then(DirectoryObject::key_info_mut)
    {
        info.key_length = bits;
    }
}
