use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Asymmetric algorithm families the engine can handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Rsa,
    Dsa,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rsa => write!(f, "RSA"),
            Self::Dsa => write!(f, "DSA"),
        }
    }
}

/// Which half of a key pair an operation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ObjectKind {
    Private,
    Public,
}

/// The card-resident directory files the engine maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DfType {
    /// PrKDF, the private key directory.
    PrivateKeys,
    /// PuKDF, the public key directory.
    PublicKeys,
    /// AODF, the authentication object (PIN) directory.
    AuthObjects,
}

impl DfType {
    /// Context tag of this directory's entry in the object directory file.
    pub const fn odf_tag(self) -> u8 {
        match self {
            Self::PrivateKeys => 0,
            Self::PublicKeys => 1,
            Self::AuthObjects => 8,
        }
    }

    pub const fn for_kind(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Private => Self::PrivateKeys,
            ObjectKind::Public => Self::PublicKeys,
        }
    }
}

impl fmt::Display for DfType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PrivateKeys => "PrKDF",
            Self::PublicKeys => "PuKDF",
            Self::AuthObjects => "AODF",
        };
        write!(f, "{s}")
    }
}

/// Short byte-string identifier of a directory object, unique within its
/// type class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectId(Vec<u8>);

impl ObjectId {
    /// Base identifier used when a request supplies none; the running
    /// object count is added to its last byte.
    pub fn default_base() -> Self {
        Self(vec![0x45])
    }

    pub fn new(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|_| Error::InvalidArguments("malformed object id"))?;
        if bytes.is_empty() {
            return Err(Error::InvalidArguments("empty object id"));
        }
        Ok(Self(bytes))
    }

    /// Derive a fresh identifier by offsetting the last byte, keeping
    /// auto-assigned ids distinct as long as objects are only appended.
    pub fn offset_last(&self, count: usize) -> Self {
        let mut bytes = self.0.clone();
        if let Some(last) = bytes.last_mut() {
            *last = last.wrapping_add(count as u8);
        }
        Self(bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

/// PKCS#15 key usage flags, by standard bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyUsage(u16);

impl KeyUsage {
    pub const ENCRYPT: Self = Self(1 << 0);
    pub const DECRYPT: Self = Self(1 << 1);
    pub const SIGN: Self = Self(1 << 2);
    pub const SIGN_RECOVER: Self = Self(1 << 3);
    pub const WRAP: Self = Self(1 << 4);
    pub const UNWRAP: Self = Self(1 << 5);
    pub const VERIFY: Self = Self(1 << 6);
    pub const VERIFY_RECOVER: Self = Self(1 << 7);
    pub const DERIVE: Self = Self(1 << 8);
    pub const NON_REPUDIATION: Self = Self(1 << 9);

    pub const fn none() -> Self {
        Self(0)
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw flag mask, bit `i` being standard flag number `i`.
    pub const fn bits(self) -> u16 {
        self.0
    }
}

impl std::ops::BitOr for KeyUsage {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::ENCRYPT, "encrypt"),
            (Self::DECRYPT, "decrypt"),
            (Self::SIGN, "sign"),
            (Self::SIGN_RECOVER, "signRecover"),
            (Self::WRAP, "wrap"),
            (Self::UNWRAP, "unwrap"),
            (Self::VERIFY, "verify"),
            (Self::VERIFY_RECOVER, "verifyRecover"),
            (Self::DERIVE, "derive"),
            (Self::NON_REPUDIATION, "nonRepudiation"),
        ];
        let mut set = Vec::new();
        for (flag, name) in names {
            if self.contains(flag) {
                set.push(name);
            }
        }
        write!(f, "{}", set.join(", "))
    }
}

/// PKCS#15 PIN flags, by standard bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinFlags(u16);

impl PinFlags {
    pub const CASE_SENSITIVE: Self = Self(1 << 0);
    pub const LOCAL: Self = Self(1 << 1);
    pub const CHANGE_DISABLED: Self = Self(1 << 2);
    pub const UNBLOCK_DISABLED: Self = Self(1 << 3);
    pub const INITIALIZED: Self = Self(1 << 4);
    pub const NEEDS_PADDING: Self = Self(1 << 5);

    pub const fn none() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }
}

impl std::ops::BitOr for PinFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Parse a key spec such as `rsa/1024` or `dsa-2048`. The bit length is
/// optional and defaults to 1024.
pub(crate) fn parse_key_spec(spec: &str) -> Result<(Algorithm, usize)> {
    let lower = spec.to_ascii_lowercase();
    let (algorithm, rest) = if let Some(rest) = lower.strip_prefix("rsa") {
        (Algorithm::Rsa, rest)
    } else if let Some(rest) = lower.strip_prefix("dsa") {
        (Algorithm::Dsa, rest)
    } else {
        return Err(Error::NotSupported("algorithm not supported"));
    };

    let rest = rest.strip_prefix(['/', '-']).unwrap_or(rest);
    if rest.is_empty() {
        return Ok((algorithm, 1024));
    }
    let bits = usize::from_str(rest).map_err(|_| Error::InvalidArguments("invalid bit number"))?;
    Ok((algorithm, bits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_spec_parsing() {
        assert_eq!(parse_key_spec("rsa/2048").unwrap(), (Algorithm::Rsa, 2048));
        assert_eq!(parse_key_spec("DSA-1024").unwrap(), (Algorithm::Dsa, 1024));
        assert_eq!(parse_key_spec("rsa").unwrap(), (Algorithm::Rsa, 1024));
        assert!(matches!(
            parse_key_spec("ecdsa/256"),
            Err(Error::NotSupported(_))
        ));
        assert!(matches!(
            parse_key_spec("rsa/banana"),
            Err(Error::InvalidArguments(_))
        ));
    }

    #[test]
    fn id_offset_stays_short() {
        let id = ObjectId::default_base();
        assert_eq!(id.offset_last(0).as_bytes(), &[0x45]);
        assert_eq!(id.offset_last(3).as_bytes(), &[0x48]);
        assert_ne!(id.offset_last(1), id.offset_last(2));
    }

    #[test]
    fn usage_display_lists_set_flags() {
        let usage = KeyUsage::SIGN | KeyUsage::DECRYPT;
        assert!(usage.contains(KeyUsage::SIGN));
        assert!(!usage.contains(KeyUsage::WRAP));
        assert_eq!(usage.to_string(), "decrypt, sign");
    }
}
