use crate::acl::SecretMethod;
use crate::file::FileDescriptor;
use crate::path::CardPath;

/// Errors surfaced by a card transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("file not found")]
    FileNotFound,

    #[error("file already exists")]
    FileExists,

    #[error("no file selected")]
    NoFileSelected,

    #[error("verification failed for {method} (ref=0x{reference:02X})")]
    VerificationFailed {
        method: SecretMethod,
        reference: u8,
    },

    #[error("operation not allowed by the card")]
    NotAllowed,

    #[error("card error: {0}")]
    Card(String),
}

/// Capability interface to one card connection.
///
/// The session is a single serialized resource: one outstanding operation
/// at a time, request/response over one logical channel. Read and update
/// address the currently selected file.
pub trait CardSession {
    /// Select a file by absolute path, returning its descriptor.
    fn select(&mut self, path: &CardPath) -> Result<FileDescriptor, TransportError>;

    /// Create a file. The parent directory must exist and the caller must
    /// already have satisfied the parent's create conditions.
    fn create(&mut self, file: &FileDescriptor) -> Result<(), TransportError>;

    /// Delete a file (and, for a directory, everything beneath it).
    fn delete(&mut self, path: &CardPath) -> Result<(), TransportError>;

    /// Read from the selected transparent file.
    fn read_binary(&mut self, offset: usize, len: Option<usize>) -> Result<Vec<u8>, TransportError>;

    /// Write to the selected transparent file.
    fn update_binary(&mut self, offset: usize, data: &[u8]) -> Result<(), TransportError>;

    /// Present a secret to the card.
    fn verify(
        &mut self,
        method: SecretMethod,
        reference: u8,
        secret: &[u8],
    ) -> Result<(), TransportError>;

    /// Provision a secret on the card. Vendor `init_application` code uses
    /// this while personalizing; a later `verify` must match it.
    fn install_secret(
        &mut self,
        method: SecretMethod,
        reference: u8,
        secret: &[u8],
    ) -> Result<(), TransportError>;

    /// Take exclusive use of the card for a sequence of operations.
    fn lock(&mut self) -> Result<(), TransportError>;

    /// Release exclusive use of the card.
    fn unlock(&mut self) -> Result<(), TransportError>;
}
