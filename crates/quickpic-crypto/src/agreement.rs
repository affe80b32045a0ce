//! X25519 key agreement and the HKDF step that turns the shared secret
//! into the key-encryption-key (KEK) for the wrapped content key.

use hkdf::Hkdf;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{CryptoError, Result};
use crate::keys::{KEY_LEN, PublicKey, SecretKey};

/// HKDF `info` label. Changing it breaks every envelope already in flight.
pub const KEY_WRAP_INFO: &[u8] = b"QuickPic-Key-Encryption";

/// Raw X25519 output. Zeroized on drop, never `Clone` or `Debug`.
pub struct SharedSecret(Zeroizing<[u8; KEY_LEN]>);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

/// X25519(ours, theirs). Both sides of a conversation get the same value.
///
/// Low-order peer keys produce an all-zero secret; those are rejected.
pub fn shared_secret(ours: &SecretKey, theirs: &PublicKey) -> Result<SharedSecret> {
    let raw = ours.as_static().diffie_hellman(&theirs.to_dalek());
    if !raw.was_contributory() {
        return Err(CryptoError::InvalidKey("low-order public key"));
    }
    Ok(SharedSecret(Zeroizing::new(raw.to_bytes())))
}

/// KEK = HKDF-SHA256(ikm = shared secret, salt = none, info = [`KEY_WRAP_INFO`], L = 32).
pub fn derive_kek(shared: &SharedSecret) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let hk = Hkdf::<Sha256>::new(None, shared.as_bytes());
    let mut kek = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(KEY_WRAP_INFO, &mut kek[..])
        .map_err(|_| CryptoError::Encryption)?;
    Ok(kek)
}
