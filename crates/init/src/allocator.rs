//! Key object allocation: turns a request plus a profile template into a
//! catalog entry with a backing file, before any card I/O happens.

use cardsmith_card::{AccessCondition, FileDescriptor, Operation};
use tracing::debug;

use crate::object::{Catalog, DirectoryObject, KeyInfo, ObjectPayload};
use crate::ops::CardOps;
use crate::profile::Profile;
use crate::request::KeyRequest;
use crate::types::{DfType, ObjectId, ObjectKind};
use crate::{Error, Result};

/// Outcome of allocating one key object.
#[derive(Debug)]
pub(crate) struct AllocatedKey {
    pub df_type: DfType,
    /// Index of the catalog entry, for patching in the real key length
    /// once the material exists.
    pub index: usize,
    pub file: FileDescriptor,
}

/// Resolve template, label, identifier and backing file for one key
/// object and append it to the catalog.
///
/// Everything here is argument validation and bookkeeping; the first
/// card command for this key is issued by the caller afterwards. The
/// resolved identifier is written back into the request so a following
/// store of the other half of the pair lands under the same id.
pub(crate) fn setup_key(
    profile: &Profile,
    ops: &dyn CardOps,
    catalog: &mut Catalog,
    request: &mut KeyRequest,
    kind: ObjectKind,
) -> Result<AllocatedKey> {
    let df_type = DfType::for_kind(kind);

    if let Some(id) = &request.id {
        if catalog.find_key(df_type, id).is_some() {
            return Err(Error::NotSupported("updating an existing key in place"));
        }
    }

    let template = profile
        .key_template(kind, request.template.as_deref())
        .ok_or(Error::NotFound("no key template for this object class"))?;

    let label = request
        .label
        .clone()
        .or_else(|| template.label.clone())
        .unwrap_or_else(|| {
            match kind {
                ObjectKind::Private => "Private Key",
                ObjectKind::Public => "Public Key",
            }
            .to_string()
        });

    let id = match &request.id {
        Some(id) => id.clone(),
        None => template
            .id
            .clone()
            .unwrap_or_else(ObjectId::default_base)
            .offset_last(catalog.count(df_type)),
    };
    if id.is_empty() {
        return Err(Error::InvalidArguments("empty key identifier"));
    }
    if template.usage.is_empty() {
        return Err(Error::InvalidArguments("key template grants no usage"));
    }

    let mut file = ops.allocate_file(profile, kind, catalog.count(df_type))?;

    // Private keys are usage-protected by their PIN; the protecting
    // policy must exist before anything is sent to the card.
    let auth_id = match kind {
        ObjectKind::Private => match &template.auth_id {
            Some(auth_id) => {
                let pin = profile
                    .find_pin_by_auth_id(auth_id)
                    .ok_or(Error::NotFound("no PIN policy matches the template's auth id"))?;
                file.acl
                    .require(Operation::Update, AccessCondition::chv(pin.reference));
                Some(auth_id.clone())
            }
            None => None,
        },
        ObjectKind::Public => None,
    };

    debug!(%df_type, %id, path = %file.path, "allocated key object");

    let info = KeyInfo {
        id: id.clone(),
        usage: template.usage,
        algorithm: request.algorithm,
        key_length: request.bits,
        path: file.path.clone(),
    };
    let payload = match kind {
        ObjectKind::Private => ObjectPayload::PrivateKey(info),
        ObjectKind::Public => ObjectPayload::PublicKey(info),
    };
    let index = catalog.push_object(DirectoryObject {
        label,
        auth_id,
        payload,
    });
    request.id = Some(id);

    Ok(AllocatedKey {
        df_type,
        index,
        file,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardsmith_card::{Acl, CardPath};

    use crate::profile::{KeyTemplate, PinPolicy};
    use crate::types::{Algorithm, KeyUsage};

    fn ef(path: &str) -> FileDescriptor {
        FileDescriptor::ef(CardPath::from_hex(path).unwrap(), 64, Acl::new())
    }

    fn profile(private_auth: bool) -> Profile {
        let mut template = KeyTemplate::new("default", KeyUsage::SIGN | KeyUsage::DECRYPT);
        if private_auth {
            template = template.auth_id(ObjectId::new(&[0x01]));
        }
        Profile::builder("Test")
            .app_df(FileDescriptor::df(
                CardPath::from_hex("3F005015").unwrap(),
                Acl::new(),
            ))
            .odf(ef("3F0050155031"))
            .tokeninfo(ef("3F0050155032"))
            .pin(PinPolicy::new(
                ObjectId::new(&[0x01]),
                "CHV1",
                "User PIN",
                0x01,
                ef("3F0050150000"),
            ))
            .key_slot(ObjectKind::Private, ef("3F0050154B00"))
            .key_slot(ObjectKind::Public, ef("3F0050155500"))
            .private_key_template(template)
            .public_key_template(KeyTemplate::new("default", KeyUsage::VERIFY))
            .build()
    }

    fn ops() -> Box<dyn CardOps> {
        crate::ops::ops_by_name("soft").unwrap()
    }

    #[test]
    fn auto_ids_are_distinct_per_class() {
        let profile = profile(true);
        let ops = ops();
        let mut catalog = Catalog::new();

        let mut first = KeyRequest::new(Algorithm::Rsa, 1024);
        let a = setup_key(&profile, ops.as_ref(), &mut catalog, &mut first, ObjectKind::Private)
            .unwrap();
        let mut second = KeyRequest::new(Algorithm::Rsa, 1024);
        let b = setup_key(&profile, ops.as_ref(), &mut catalog, &mut second, ObjectKind::Private)
            .unwrap();

        assert_eq!(first.id.as_ref().unwrap().as_bytes(), &[0x45]);
        assert_eq!(second.id.as_ref().unwrap().as_bytes(), &[0x46]);
        assert_ne!(a.file.path, b.file.path);
        assert_eq!(a.index, 0);
        assert_eq!(b.index, 1);
    }

    #[test]
    fn public_half_reuses_the_private_id() {
        let profile = profile(true);
        let ops = ops();
        let mut catalog = Catalog::new();

        let mut request = KeyRequest::new(Algorithm::Rsa, 1024);
        setup_key(&profile, ops.as_ref(), &mut catalog, &mut request, ObjectKind::Private)
            .unwrap();
        let private_id = request.id.clone().unwrap();
        setup_key(&profile, ops.as_ref(), &mut catalog, &mut request, ObjectKind::Public).unwrap();
        assert_eq!(request.id.as_ref(), Some(&private_id));
    }

    #[test]
    fn missing_pin_policy_fails_allocation() {
        let profile = Profile::builder("Test")
            .app_df(FileDescriptor::df(
                CardPath::from_hex("3F005015").unwrap(),
                Acl::new(),
            ))
            .odf(ef("3F0050155031"))
            .tokeninfo(ef("3F0050155032"))
            .key_slot(ObjectKind::Private, ef("3F0050154B00"))
            .private_key_template(
                KeyTemplate::new("default", KeyUsage::SIGN).auth_id(ObjectId::new(&[0x07])),
            )
            .build();
        let ops = ops();
        let mut catalog = Catalog::new();
        let mut request = KeyRequest::new(Algorithm::Rsa, 1024);
        assert!(matches!(
            setup_key(&profile, ops.as_ref(), &mut catalog, &mut request, ObjectKind::Private),
            Err(Error::NotFound(_))
        ));
        assert_eq!(catalog.count(DfType::PrivateKeys), 0);
    }

    #[test]
    fn existing_id_refuses_in_place_update() {
        let profile = profile(true);
        let ops = ops();
        let mut catalog = Catalog::new();

        let mut request =
            KeyRequest::new(Algorithm::Rsa, 1024).with_id(ObjectId::new(&[0x45]));
        setup_key(&profile, ops.as_ref(), &mut catalog, &mut request, ObjectKind::Private)
            .unwrap();

        let mut again =
            KeyRequest::new(Algorithm::Rsa, 1024).with_id(ObjectId::new(&[0x45]));
        assert!(matches!(
            setup_key(&profile, ops.as_ref(), &mut catalog, &mut again, ObjectKind::Private),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn private_file_acl_gains_the_pin_condition() {
        let profile = profile(true);
        let ops = ops();
        let mut catalog = Catalog::new();
        let mut request = KeyRequest::new(Algorithm::Rsa, 1024);
        let allocated =
            setup_key(&profile, ops.as_ref(), &mut catalog, &mut request, ObjectKind::Private)
                .unwrap();
        assert_eq!(
            allocated.file.acl.entries(Operation::Update).first(),
            Some(&AccessCondition::chv(0x01))
        );
    }
}
