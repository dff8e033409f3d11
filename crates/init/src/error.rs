use cardsmith_card::TransportError;
use iso7816_tlv::TlvError;

/// Result type for personalization operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for personalization operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A capability is missing: unsupported algorithm, update-in-place,
    /// a vendor operation the bound card family does not implement.
    #[error("not supported: {0}")]
    NotSupported(&'static str),

    /// An object, template, PIN policy or file could not be resolved.
    #[error("not found: {0}")]
    NotFound(&'static str),

    /// A request is missing required data (identifier, usage flags).
    #[error("invalid arguments: {0}")]
    InvalidArguments(&'static str),

    /// An ACL entry refused the operation or a secret failed to verify.
    #[error("security status not satisfied: {0}")]
    SecurityNotSatisfied(String),

    /// Underlying card I/O failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Directory record serialization failure
    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("TlvError: {0}")]
    Tlv(TlvError),

    #[error(transparent)]
    Rsa(#[from] rsa::Error),

    /// An operation needed user input but no callback was set
    #[error("user interaction required: {0}")]
    UserInteraction(&'static str),
}

impl From<TlvError> for Error {
    fn from(error: TlvError) -> Self {
        Self::Tlv(error)
    }
}

impl From<pkcs8::Error> for Error {
    fn from(error: pkcs8::Error) -> Self {
        Self::Encoding(error.to_string())
    }
}

impl From<pkcs8::spki::Error> for Error {
    fn from(error: pkcs8::spki::Error) -> Self {
        Self::Encoding(error.to_string())
    }
}
