//! The built-in card layout used when no profile is given: a PKCS#15
//! application under `5015` with user and security-officer PINs.

use cardsmith_card::{AccessCondition, Acl, CardPath, FileDescriptor, Operation};
use cardsmith_init::{DfType, KeyTemplate, KeyUsage, ObjectId, ObjectKind, PinPolicy, Profile};

fn path(hex: &str) -> CardPath {
    CardPath::from_hex(hex).unwrap_or_else(CardPath::root)
}

pub(crate) fn builtin_profile() -> Profile {
    let user_pin = ObjectId::new(&[0x01]);
    let so_pin = ObjectId::new(&[0x02]);

    Profile::builder("Cardsmith Token")
        .manufacturer("Cardsmith")
        .serial(&[0x00, 0x00, 0x00, 0x01])
        .app_df(FileDescriptor::df(path("3F005015"), Acl::new()))
        .odf(FileDescriptor::ef(path("3F0050155031"), 128, Acl::new()))
        .tokeninfo(FileDescriptor::ef(path("3F0050155032"), 128, Acl::new()))
        .df_file(
            DfType::PrivateKeys,
            FileDescriptor::ef(path("3F0050154401"), 256, Acl::new()),
        )
        .df_file(
            DfType::PublicKeys,
            FileDescriptor::ef(path("3F0050154402"), 256, Acl::new()),
        )
        .df_file(
            DfType::AuthObjects,
            FileDescriptor::ef(path("3F0050154403"), 256, Acl::new()),
        )
        .pin(
            PinPolicy::new(
                user_pin.clone(),
                "CHV1",
                "User PIN",
                0x01,
                FileDescriptor::ef(
                    path("3F0050150000"),
                    16,
                    Acl::new().rule(Operation::Read, &[AccessCondition::Refuse]),
                ),
            )
            .lengths(4, 8)
            .attempts(3, 10),
        )
        .pin(
            PinPolicy::new(
                so_pin,
                "CHV2",
                "Security Officer PIN",
                0x02,
                FileDescriptor::ef(
                    path("3F0050150100"),
                    16,
                    Acl::new().rule(Operation::Read, &[AccessCondition::Refuse]),
                ),
            )
            .lengths(6, 8)
            .attempts(3, 0),
        )
        .key_slot(
            ObjectKind::Private,
            FileDescriptor::ef(path("3F0050154B01"), 1024, Acl::new()),
        )
        .key_slot(
            ObjectKind::Public,
            FileDescriptor::ef(path("3F0050155501"), 512, Acl::new()),
        )
        .private_key_template(
            KeyTemplate::new("user", KeyUsage::SIGN | KeyUsage::DECRYPT | KeyUsage::UNWRAP)
                .auth_id(user_pin),
        )
        .public_key_template(KeyTemplate::new(
            "user",
            KeyUsage::VERIFY | KeyUsage::ENCRYPT | KeyUsage::WRAP,
        ))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_profile_is_complete() {
        let profile = builtin_profile();
        assert_eq!(profile.pins().len(), 2);
        assert!(profile.df_file(DfType::PrivateKeys).is_some());
        assert!(profile.key_slot(ObjectKind::Private).is_some());
        assert!(profile.key_template(ObjectKind::Private, Some("user")).is_some());
        // The SO PIN defines no unblocking secret.
        assert!(!profile.pins()[1].has_puk());
    }
}
