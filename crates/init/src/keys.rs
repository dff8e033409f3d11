//! Key material: software generation and the standard public/private key
//! encodings.

use std::fmt;
use std::sync::Once;

use dsa::{Components, KeySize, SigningKey};
use pkcs8::{EncodePrivateKey, EncodePublicKey};
use rand::RngCore;
use rand::rngs::OsRng;
use rsa::pkcs1::EncodeRsaPublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::debug;
use zeroize::Zeroizing;

use crate::types::Algorithm;
use crate::{Error, Result};

/// An asymmetric key pair held off-card.
pub enum KeyMaterial {
    Rsa(Box<RsaPrivateKey>),
    Dsa(Box<SigningKey>),
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("algorithm", &format_args!("{}", self.algorithm()))
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

impl KeyMaterial {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Rsa(_) => Algorithm::Rsa,
            Self::Dsa(_) => Algorithm::Dsa,
        }
    }

    /// Modulus length (RSA) or prime length (DSA) in bits.
    pub fn bits(&self) -> usize {
        match self {
            Self::Rsa(key) => key.size() * 8,
            Self::Dsa(key) => key.verifying_key().components().p().bits() as usize,
        }
    }

    /// Standard DER encoding of the public half: PKCS#1 `RSAPublicKey`
    /// for RSA, SubjectPublicKeyInfo for DSA.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        match self {
            Self::Rsa(key) => Ok(RsaPublicKey::from(key.as_ref())
                .to_pkcs1_der()
                .map_err(|e| Error::Encoding(e.to_string()))?
                .as_bytes()
                .to_vec()),
            Self::Dsa(key) => Ok(key.verifying_key().to_public_key_der()?.as_bytes().to_vec()),
        }
    }

    /// PKCS#8 DER encoding of the private half, for vendors that store
    /// keys as opaque blobs.
    pub fn private_key_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let doc = match self {
            Self::Rsa(key) => key.to_pkcs8_der()?,
            Self::Dsa(key) => key.to_pkcs8_der()?,
        };
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }
}

static SEED_RNG: Once = Once::new();

/// Make sure the OS entropy pool answers before the first key is cut.
/// Idempotent; runs once per process.
fn seed_rng() {
    SEED_RNG.call_once(|| {
        let mut probe = [0u8; 32];
        OsRng.fill_bytes(&mut probe);
    });
}

/// Generate a key pair off-card.
pub(crate) fn generate_software(algorithm: Algorithm, bits: usize) -> Result<KeyMaterial> {
    seed_rng();
    debug!(%algorithm, bits, "software key generation");
    match algorithm {
        Algorithm::Rsa => {
            let key = RsaPrivateKey::new(&mut OsRng, bits)?;
            Ok(KeyMaterial::Rsa(Box::new(key)))
        }
        Algorithm::Dsa => {
            let size = match bits {
                1024 => KeySize::DSA_1024_160,
                2048 => KeySize::DSA_2048_256,
                3072 => KeySize::DSA_3072_256,
                _ => return Err(Error::NotSupported("DSA size (use 1024, 2048 or 3072 bits)")),
            };
            let components = Components::generate(&mut OsRng, size);
            let key = SigningKey::generate(&mut OsRng, components);
            Ok(KeyMaterial::Dsa(Box::new(key)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::DecodeRsaPublicKey;

    #[test]
    fn rsa_public_encoding_round_trips() {
        let material = generate_software(Algorithm::Rsa, 512).unwrap();
        assert_eq!(material.algorithm(), Algorithm::Rsa);
        assert_eq!(material.bits(), 512);

        let der = material.public_key_der().unwrap();
        let decoded = RsaPublicKey::from_pkcs1_der(&der).unwrap();
        let KeyMaterial::Rsa(key) = &material else {
            unreachable!()
        };
        assert_eq!(&decoded, &RsaPublicKey::from(key.as_ref()));
    }

    #[test]
    fn unsupported_dsa_size_is_rejected() {
        assert!(matches!(
            generate_software(Algorithm::Dsa, 512),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn debug_does_not_leak_key_material() {
        let material = generate_software(Algorithm::Rsa, 512).unwrap();
        let printed = format!("{material:?}");
        assert!(printed.contains("RSA"));
        assert!(printed.contains("512"));
        assert!(!printed.contains("primes"));
    }
}
