use std::fmt;

/// Identifier of the master file, the root of every card file system.
pub const MF_ID: u16 = 0x3F00;

/// Absolute path of a card file: a sequence of two-byte file identifiers
/// starting at the master file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CardPath(Vec<u8>);

impl CardPath {
    /// Path of the master file (`3F00`).
    pub fn root() -> Self {
        Self(MF_ID.to_be_bytes().to_vec())
    }

    /// Build a path from raw bytes. The length must be a non-zero multiple
    /// of two.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() % 2 != 0 {
            return None;
        }
        Some(Self(bytes.to_vec()))
    }

    /// Parse a hex path such as `"3F005015"`.
    pub fn from_hex(s: &str) -> Option<Self> {
        hex::decode(s).ok().and_then(|b| Self::from_bytes(&b))
    }

    /// Append one file identifier, yielding the child path.
    pub fn child(&self, id: u16) -> Self {
        let mut bytes = self.0.clone();
        bytes.extend_from_slice(&id.to_be_bytes());
        Self(bytes)
    }

    /// Path of the containing directory: the path with its last component
    /// dropped, or the root when nothing remains.
    pub fn parent(&self) -> Self {
        if self.0.len() <= 2 {
            return Self::root();
        }
        Self(self.0[..self.0.len() - 2].to_vec())
    }

    /// Last file identifier on the path.
    pub fn file_id(&self) -> u16 {
        let n = self.0.len();
        u16::from_be_bytes([self.0[n - 2], self.0[n - 1]])
    }

    /// Whether this is the master file itself.
    pub fn is_root(&self) -> bool {
        self.0.len() == 2 && self.file_id() == MF_ID
    }

    /// Whether `other` lies underneath this path (or is this path).
    pub fn contains(&self, other: &Self) -> bool {
        other.0.starts_with(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for CardPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode_upper(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_drops_one_component() {
        let path = CardPath::from_hex("3F0050154401").unwrap();
        assert_eq!(path.parent(), CardPath::from_hex("3F005015").unwrap());
        assert_eq!(path.parent().parent(), CardPath::root());
        // The root is its own parent.
        assert_eq!(CardPath::root().parent(), CardPath::root());
    }

    #[test]
    fn rejects_odd_lengths() {
        assert!(CardPath::from_bytes(&[0x3F]).is_none());
        assert!(CardPath::from_bytes(&[]).is_none());
        assert!(CardPath::from_hex("3F00").is_some());
    }

    #[test]
    fn child_and_file_id() {
        let path = CardPath::root().child(0x5015);
        assert_eq!(path.file_id(), 0x5015);
        assert!(!path.is_root());
        assert!(CardPath::root().contains(&path));
        assert!(!path.contains(&CardPath::root()));
    }
}
