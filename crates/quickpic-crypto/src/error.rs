use thiserror::Error;

pub type Result<T> = std::result::Result<T, CryptoError>;

/// Failures are deliberately coarse: callers learn the category, never
/// which byte or which layer tripped.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("malformed envelope: {0}")]
    Format(&'static str),

    #[error("envelope authentication failed")]
    Authentication,

    #[error("invalid key: {0}")]
    InvalidKey(&'static str),

    #[error("invalid signature")]
    Signature,

    #[error("encryption failed")]
    Encryption,

    #[error("compression failed: {0}")]
    Compression(#[source] std::io::Error),
}
