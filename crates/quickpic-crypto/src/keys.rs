use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand_core::OsRng;
use x25519_dalek::StaticSecret;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};

/// Length of X25519 public keys, private seeds and symmetric keys.
pub const KEY_LEN: usize = 32;

/// X25519 public key as distributed to peers (base64 over the wire).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PublicKey([u8; KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    /// Encode a key to base64 for registration and display.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    /// Decode a base64 key, rejecting anything that is not exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        decode_key(encoded).map(Self)
    }

    #[cfg(feature = "client")]
    pub(crate) fn to_dalek(self) -> x25519_dalek::PublicKey {
        x25519_dalek::PublicKey::from(self.0)
    }
}

/// Long-lived X25519 private key. Its raw seed doubles as the Ed25519
/// signing seed (see [`crate::signing`]).
///
/// No `Clone` or `Debug`: the seed must not end up in copies or logs.
pub struct SecretKey(StaticSecret);

impl SecretKey {
    /// Generate a fresh identity key from OS entropy.
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(OsRng))
    }

    /// Clamping happens inside x25519-dalek during scalar multiplication,
    /// so raw bytes are stored as-is.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    /// The raw 32-byte seed. Zeroized when dropped.
    pub fn to_bytes(&self) -> Zeroizing<[u8; KEY_LEN]> {
        Zeroizing::new(self.0.to_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(x25519_dalek::PublicKey::from(&self.0).to_bytes())
    }

    #[cfg(feature = "client")]
    pub(crate) fn as_static(&self) -> &StaticSecret {
        &self.0
    }
}

pub(crate) fn decode_key(encoded: &str) -> Result<[u8; KEY_LEN]> {
    let bytes = BASE64
        .decode(encoded.trim())
        .map_err(|_| CryptoError::InvalidKey("not valid base64"))?;
    bytes
        .try_into()
        .map_err(|_| CryptoError::InvalidKey("expected 32 bytes"))
}
