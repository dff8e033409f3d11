use std::str::FromStr;

use crate::keys::KeyMaterial;
use crate::types::{Algorithm, ObjectId, parse_key_spec};
use crate::{Error, Result};

/// One generate-or-store request; lives for the duration of a single call
/// chain. After a private key has been allocated, the resolved identifier
/// is written back into the request so the paired public-key store reuses
/// it.
#[derive(Debug)]
pub struct KeyRequest {
    pub algorithm: Algorithm,
    /// Requested key length in bits.
    pub bits: usize,
    pub id: Option<ObjectId>,
    pub label: Option<String>,
    /// Profile template to cut the object from; the class default when
    /// absent.
    pub template: Option<String>,
    /// Ask the card to generate the key pair itself. Cleared after a
    /// `NotSupported` outcome so the engine falls back to software
    /// generation exactly once.
    pub native: bool,
    /// The key material, once generated or imported.
    pub material: Option<KeyMaterial>,
}

impl KeyRequest {
    pub fn new(algorithm: Algorithm, bits: usize) -> Self {
        Self {
            algorithm,
            bits,
            id: None,
            label: None,
            template: None,
            native: false,
            material: None,
        }
    }

    pub fn with_id(mut self, id: ObjectId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_template(mut self, name: impl Into<String>) -> Self {
        self.template = Some(name.into());
        self
    }

    pub fn native(mut self, native: bool) -> Self {
        self.native = native;
        self
    }

    /// Wrap imported key material for storing.
    pub fn with_material(mut self, material: KeyMaterial) -> Self {
        self.algorithm = material.algorithm();
        self.bits = material.bits();
        self.material = Some(material);
        self
    }
}

impl FromStr for KeyRequest {
    type Err = Error;

    /// Parse a key spec such as `rsa/1024` or `dsa-2048`.
    fn from_str(spec: &str) -> Result<Self> {
        let (algorithm, bits) = parse_key_spec(spec)?;
        Ok(Self::new(algorithm, bits))
    }
}
