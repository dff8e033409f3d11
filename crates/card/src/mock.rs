//! In-memory card for tests and demos.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::acl::SecretMethod;
use crate::file::{FileDescriptor, FileKind};
use crate::path::CardPath;
use crate::session::{CardSession, TransportError};

/// One transport round-trip, as recorded by [`MockCard`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Select(CardPath),
    Create(CardPath),
    Delete(CardPath),
    Update { path: CardPath, len: usize },
    Verify { method: SecretMethod, reference: u8 },
}

#[derive(Debug, Clone)]
struct StoredFile {
    descriptor: FileDescriptor,
    data: Vec<u8>,
}

/// A virtual card holding its file system and secrets in memory.
///
/// Every operation is appended to an event log so tests can assert on the
/// exact order of card round-trips.
#[derive(Debug)]
pub struct MockCard {
    files: BTreeMap<CardPath, StoredFile>,
    secrets: HashMap<(SecretMethod, u8), Vec<u8>>,
    selected: Option<CardPath>,
    events: Vec<Event>,
}

impl MockCard {
    /// A blank card holding only the master file.
    pub fn new() -> Self {
        let mf = FileDescriptor::df(CardPath::root(), Default::default());
        let mut files = BTreeMap::new();
        files.insert(
            mf.path.clone(),
            StoredFile {
                descriptor: mf,
                data: Vec::new(),
            },
        );
        Self {
            files,
            secrets: HashMap::new(),
            selected: None,
            events: Vec::new(),
        }
    }

    /// Everything the card has been asked to do, in order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Whether a file exists at `path`.
    pub fn has_file(&self, path: &CardPath) -> bool {
        self.files.contains_key(path)
    }

    /// Contents of the file at `path`, if present.
    pub fn file_data(&self, path: &CardPath) -> Option<&[u8]> {
        self.files.get(path).map(|f| f.data.as_slice())
    }

    /// Pre-provision a secret, as if the card had been personalized before.
    pub fn set_secret(&mut self, method: SecretMethod, reference: u8, secret: &[u8]) {
        self.secrets.insert((method, reference), secret.to_vec());
    }

    fn selected_file(&mut self) -> Result<&mut StoredFile, TransportError> {
        let path = self.selected.clone().ok_or(TransportError::NoFileSelected)?;
        self.files
            .get_mut(&path)
            .ok_or(TransportError::FileNotFound)
    }
}

impl Default for MockCard {
    fn default() -> Self {
        Self::new()
    }
}

impl CardSession for MockCard {
    fn select(&mut self, path: &CardPath) -> Result<FileDescriptor, TransportError> {
        self.events.push(Event::Select(path.clone()));
        match self.files.get(path) {
            Some(file) => {
                debug!(path = %path, "select");
                self.selected = Some(path.clone());
                Ok(file.descriptor.clone())
            }
            None => Err(TransportError::FileNotFound),
        }
    }

    fn create(&mut self, file: &FileDescriptor) -> Result<(), TransportError> {
        self.events.push(Event::Create(file.path.clone()));
        if self.files.contains_key(&file.path) {
            return Err(TransportError::FileExists);
        }
        if !file.path.is_root() && !self.files.contains_key(&file.path.parent()) {
            return Err(TransportError::FileNotFound);
        }
        debug!(path = %file.path, size = file.size, "create");
        self.files.insert(
            file.path.clone(),
            StoredFile {
                descriptor: file.clone(),
                data: Vec::new(),
            },
        );
        Ok(())
    }

    fn delete(&mut self, path: &CardPath) -> Result<(), TransportError> {
        self.events.push(Event::Delete(path.clone()));
        if !self.files.contains_key(path) {
            return Err(TransportError::FileNotFound);
        }
        if path.is_root() {
            return Err(TransportError::NotAllowed);
        }
        let doomed = path.clone();
        self.files.retain(|p, _| !doomed.contains(p));
        if self.selected.as_ref().is_some_and(|s| doomed.contains(s)) {
            self.selected = None;
        }
        Ok(())
    }

    fn read_binary(&mut self, offset: usize, len: Option<usize>) -> Result<Vec<u8>, TransportError> {
        let file = self.selected_file()?;
        if file.descriptor.kind != FileKind::Ef {
            return Err(TransportError::NotAllowed);
        }
        if offset > file.data.len() {
            return Err(TransportError::NotAllowed);
        }
        let end = match len {
            Some(n) => (offset + n).min(file.data.len()),
            None => file.data.len(),
        };
        Ok(file.data[offset..end].to_vec())
    }

    fn update_binary(&mut self, offset: usize, data: &[u8]) -> Result<(), TransportError> {
        let path = self.selected.clone().ok_or(TransportError::NoFileSelected)?;
        self.events.push(Event::Update {
            path,
            len: data.len(),
        });
        let file = self.selected_file()?;
        if file.descriptor.kind != FileKind::Ef {
            return Err(TransportError::NotAllowed);
        }
        if file.data.len() < offset + data.len() {
            file.data.resize(offset + data.len(), 0);
        }
        file.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn verify(
        &mut self,
        method: SecretMethod,
        reference: u8,
        secret: &[u8],
    ) -> Result<(), TransportError> {
        self.events.push(Event::Verify { method, reference });
        match self.secrets.get(&(method, reference)) {
            Some(expected) if expected.as_slice() == secret => Ok(()),
            _ => Err(TransportError::VerificationFailed { method, reference }),
        }
    }

    fn install_secret(
        &mut self,
        method: SecretMethod,
        reference: u8,
        secret: &[u8],
    ) -> Result<(), TransportError> {
        self.secrets.insert((method, reference), secret.to_vec());
        Ok(())
    }

    fn lock(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn unlock(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::Acl;

    fn ef(path: &str) -> FileDescriptor {
        FileDescriptor::ef(CardPath::from_hex(path).unwrap(), 64, Acl::new())
    }

    #[test]
    fn create_requires_parent() {
        let mut card = MockCard::new();
        let orphan = ef("3F0050155031");
        assert!(matches!(
            card.create(&orphan),
            Err(TransportError::FileNotFound)
        ));

        let df = FileDescriptor::df(CardPath::from_hex("3F005015").unwrap(), Acl::new());
        card.create(&df).unwrap();
        card.create(&orphan).unwrap();
        assert!(card.has_file(&orphan.path));
    }

    #[test]
    fn update_addresses_selected_file() {
        let mut card = MockCard::new();
        let file = ef("3F002F00");
        card.create(&file).unwrap();
        assert!(matches!(
            card.update_binary(0, b"abc"),
            Err(TransportError::NoFileSelected)
        ));
        card.select(&file.path).unwrap();
        card.update_binary(0, b"abc").unwrap();
        assert_eq!(card.read_binary(0, None).unwrap(), b"abc");
        assert_eq!(card.read_binary(1, Some(1)).unwrap(), b"b");
    }

    #[test]
    fn delete_removes_subtree() {
        let mut card = MockCard::new();
        let df = FileDescriptor::df(CardPath::from_hex("3F005015").unwrap(), Acl::new());
        card.create(&df).unwrap();
        card.create(&ef("3F0050155031")).unwrap();
        card.delete(&df.path).unwrap();
        assert!(!card.has_file(&CardPath::from_hex("3F0050155031").unwrap()));
        assert!(card.has_file(&CardPath::root()));
    }

    #[test]
    fn verify_matches_installed_secret() {
        let mut card = MockCard::new();
        card.install_secret(SecretMethod::Chv, 1, b"1234").unwrap();
        card.verify(SecretMethod::Chv, 1, b"1234").unwrap();
        assert!(matches!(
            card.verify(SecretMethod::Chv, 1, b"0000"),
            Err(TransportError::VerificationFailed { .. })
        ));
        assert!(matches!(
            card.verify(SecretMethod::Chv, 9, b"1234"),
            Err(TransportError::VerificationFailed { .. })
        ));
    }
}
