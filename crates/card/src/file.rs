use crate::acl::Acl;
use crate::path::CardPath;

/// Structural kind of a card file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Dedicated file (a directory).
    Df,
    /// Transparent elementary file.
    Ef,
}

/// Logical descriptor of a card file: where it lives, how big it is, and
/// which authentication each operation on it requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub path: CardPath,
    pub kind: FileKind,
    pub size: usize,
    pub acl: Acl,
}

impl FileDescriptor {
    pub fn df(path: CardPath, acl: Acl) -> Self {
        Self {
            path,
            kind: FileKind::Df,
            size: 0,
            acl,
        }
    }

    pub fn ef(path: CardPath, size: usize, acl: Acl) -> Self {
        Self {
            path,
            kind: FileKind::Ef,
            size,
            acl,
        }
    }
}
