/// QuickPic Crypto Library
///
/// Hybrid envelope for one-to-one messages:
/// - raw DEFLATE compression of the plaintext
/// - ChaCha20-Poly1305 under a fresh per-message content key
/// - the content key wrapped under an X25519 + HKDF-SHA256 derived KEK
/// - Ed25519 signature over the finished envelope
///
/// The relay server only needs `keys` and `signing` to validate what users
/// register; the `client` feature adds sealing and opening.

pub mod error;
pub mod keys;
pub mod signing;

#[cfg(feature = "client")]
pub mod agreement;
#[cfg(feature = "client")]
pub mod cipher;
#[cfg(feature = "client")]
pub mod compress;
#[cfg(feature = "client")]
pub mod envelope;

pub use error::{CryptoError, Result};
pub use keys::{PublicKey, SecretKey};
pub use signing::{Signature, SigningPublicKey};

#[cfg(feature = "client")]
pub use envelope::{SealedEnvelope, open, open_verified, seal};
