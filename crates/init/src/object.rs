use std::collections::BTreeMap;

use cardsmith_card::{CardPath, FileDescriptor};

use crate::types::{Algorithm, DfType, KeyUsage, ObjectId, PinFlags};

/// PIN metadata carried by an AODF entry.
#[derive(Debug, Clone)]
pub struct PinInfo {
    pub auth_id: ObjectId,
    pub reference: u8,
    pub flags: PinFlags,
    pub min_length: usize,
    pub stored_length: usize,
    pub pad_char: u8,
    pub path: CardPath,
}

/// Key metadata carried by a PrKDF/PuKDF entry.
#[derive(Debug, Clone)]
pub struct KeyInfo {
    pub id: ObjectId,
    pub usage: KeyUsage,
    pub algorithm: Algorithm,
    /// Modulus length (RSA) or prime length (DSA) in bits.
    pub key_length: usize,
    /// Path of the backing file.
    pub path: CardPath,
}

/// Type-specific payload of a directory object.
#[derive(Debug, Clone)]
pub enum ObjectPayload {
    Pin(PinInfo),
    PrivateKey(KeyInfo),
    PublicKey(KeyInfo),
}

/// One catalog entry of the card-resident directory structure.
#[derive(Debug, Clone)]
pub struct DirectoryObject {
    pub label: String,
    /// Which PIN (by auth id) guards use of this object.
    pub auth_id: Option<ObjectId>,
    pub payload: ObjectPayload,
}

impl DirectoryObject {
    /// The object's identifier within its type class.
    pub fn id(&self) -> &ObjectId {
        match &self.payload {
            ObjectPayload::Pin(info) => &info.auth_id,
            ObjectPayload::PrivateKey(info) | ObjectPayload::PublicKey(info) => &info.id,
        }
    }

    pub fn df_type(&self) -> DfType {
        match &self.payload {
            ObjectPayload::Pin(_) => DfType::AuthObjects,
            ObjectPayload::PrivateKey(_) => DfType::PrivateKeys,
            ObjectPayload::PublicKey(_) => DfType::PublicKeys,
        }
    }

    pub fn key_info(&self) -> Option<&KeyInfo> {
        match &self.payload {
            ObjectPayload::PrivateKey(info) | ObjectPayload::PublicKey(info) => Some(info),
            ObjectPayload::Pin(_) => None,
        }
    }

    pub(crate) fn key_info_mut(&mut self) -> Option<&mut KeyInfo> {
        match &mut self.payload {
            ObjectPayload::PrivateKey(info) | ObjectPayload::PublicKey(info) => Some(info),
            ObjectPayload::Pin(_) => None,
        }
    }
}

#[derive(Debug, Default)]
struct DfState {
    objects: Vec<DirectoryObject>,
    files: Vec<FileDescriptor>,
}

/// In-memory state of the card's directory structure for one session.
///
/// Objects are only ever appended; directory files are re-encoded from
/// this state in full on every update, never diffed.
#[derive(Debug, Default)]
pub struct Catalog {
    dfs: BTreeMap<DfType, DfState>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn objects(&self, ty: DfType) -> &[DirectoryObject] {
        self.dfs.get(&ty).map(|s| s.objects.as_slice()).unwrap_or(&[])
    }

    pub fn count(&self, ty: DfType) -> usize {
        self.objects(ty).len()
    }

    /// Append an object to its type's list, returning its index.
    pub fn push_object(&mut self, object: DirectoryObject) -> usize {
        let state = self.dfs.entry(object.df_type()).or_default();
        state.objects.push(object);
        state.objects.len() - 1
    }

    pub(crate) fn object_mut(&mut self, ty: DfType, index: usize) -> Option<&mut DirectoryObject> {
        self.dfs.get_mut(&ty).and_then(|s| s.objects.get_mut(index))
    }

    /// Find a key object by identifier within one type class.
    pub fn find_key(&self, ty: DfType, id: &ObjectId) -> Option<&DirectoryObject> {
        self.objects(ty)
            .iter()
            .find(|o| o.key_info().is_some() && o.id() == id)
    }

    pub fn files(&self, ty: DfType) -> &[FileDescriptor] {
        self.dfs.get(&ty).map(|s| s.files.as_slice()).unwrap_or(&[])
    }

    pub fn register_file(&mut self, ty: DfType, file: FileDescriptor) {
        self.dfs.entry(ty).or_default().files.push(file);
    }

    /// Directory types with a registered file and the path of their
    /// first file, which is what the object directory announces.
    pub fn directory_entries(&self) -> Vec<(DfType, CardPath)> {
        self.dfs
            .iter()
            .filter_map(|(ty, state)| state.files.first().map(|f| (*ty, f.path.clone())))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_object(id: u8) -> DirectoryObject {
        DirectoryObject {
            label: "Key".into(),
            auth_id: None,
            payload: ObjectPayload::PrivateKey(KeyInfo {
                id: ObjectId::new(&[id]),
                usage: KeyUsage::SIGN,
                algorithm: Algorithm::Rsa,
                key_length: 1024,
                path: CardPath::from_hex("3F0050154B01").unwrap(),
            }),
        }
    }

    #[test]
    fn find_key_respects_type_class() {
        let mut catalog = Catalog::new();
        catalog.push_object(key_object(0x45));
        assert!(catalog.find_key(DfType::PrivateKeys, &ObjectId::new(&[0x45])).is_some());
        assert!(catalog.find_key(DfType::PublicKeys, &ObjectId::new(&[0x45])).is_none());
        assert!(catalog.find_key(DfType::PrivateKeys, &ObjectId::new(&[0x46])).is_none());
    }

    #[test]
    fn directory_entries_follow_registration() {
        let mut catalog = Catalog::new();
        assert!(catalog.directory_entries().is_empty());
        catalog.register_file(
            DfType::PrivateKeys,
            FileDescriptor::ef(
                CardPath::from_hex("3F0050154402").unwrap(),
                128,
                Default::default(),
            ),
        );
        let entries = catalog.directory_entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, DfType::PrivateKeys);
    }
}
