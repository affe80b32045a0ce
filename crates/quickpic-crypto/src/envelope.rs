//! Envelope wire format:
//!
//! ```text
//! [u32 BE: len(wrapped key)][wrapped key][wrapped content]
//! wrapped key     = nonce(12) ‖ ChaCha20-Poly1305(KEK, content key) ‖ tag(16)
//! wrapped content = nonce(12) ‖ ChaCha20-Poly1305(content key, deflate(plaintext)) ‖ tag(16)
//! ```
//!
//! The signature travels next to the envelope, not inside it, and covers
//! every envelope byte.

use zeroize::Zeroizing;

use crate::agreement::{derive_kek, shared_secret};
use crate::cipher::{self, NONCE_LEN, TAG_LEN};
use crate::compress::{deflate, inflate};
use crate::error::{CryptoError, Result};
use crate::keys::{KEY_LEN, PublicKey, SecretKey};
use crate::signing::{Signature, SigningPublicKey};

const LEN_PREFIX: usize = 4;

/// Output of [`seal`]: the bytes to relay plus the sender's signature.
#[derive(Debug, Clone)]
pub struct SealedEnvelope {
    pub bytes: Vec<u8>,
    pub signature: Signature,
}

/// Compress, encrypt under a fresh content key, wrap that key for the
/// recipient and sign the result.
pub fn seal(plaintext: &[u8], recipient: &PublicKey, sender: &SecretKey) -> Result<SealedEnvelope> {
    let compressed = deflate(plaintext)?;

    let content_key = cipher::generate_content_key();
    let wrapped_content = cipher::seal(&content_key, &compressed)?;

    let kek = derive_kek(&shared_secret(sender, recipient)?)?;
    let wrapped_key = cipher::seal(&kek, &content_key[..])?;

    let key_len = u32::try_from(wrapped_key.len()).map_err(|_| CryptoError::Encryption)?;

    let mut bytes = Vec::with_capacity(LEN_PREFIX + wrapped_key.len() + wrapped_content.len());
    bytes.extend_from_slice(&key_len.to_be_bytes());
    bytes.extend_from_slice(&wrapped_key);
    bytes.extend_from_slice(&wrapped_content);

    let signature = sender.sign(&bytes);
    Ok(SealedEnvelope { bytes, signature })
}

/// Reverse of [`seal`] without looking at the signature. The static-static
/// ECDH already limits who could have produced a valid wrapped key to the
/// two parties; use [`open_verified`] when the sender's signing key is known.
///
/// Any authentication failure aborts the whole open; nothing partial is
/// returned.
pub fn open(envelope: &[u8], sender: &PublicKey, recipient: &SecretKey) -> Result<Vec<u8>> {
    let (wrapped_key, wrapped_content) = split(envelope)?;

    let kek = derive_kek(&shared_secret(recipient, sender)?)?;
    let content_key = unwrap_content_key(&kek, wrapped_key)?;

    let compressed = cipher::open(&content_key, wrapped_content)?;
    inflate(&compressed)
}

/// Check the Ed25519 signature over the raw envelope, then [`open`] it.
pub fn open_verified(
    envelope: &[u8],
    signature: &Signature,
    sender_signing_key: &SigningPublicKey,
    sender: &PublicKey,
    recipient: &SecretKey,
) -> Result<Vec<u8>> {
    sender_signing_key.verify(envelope, signature)?;
    open(envelope, sender, recipient)
}

/// Split at the declared length. Fails with `Format` if the prefix is
/// missing or claims more bytes than the buffer holds.
fn split(envelope: &[u8]) -> Result<(&[u8], &[u8])> {
    let Some((prefix, rest)) = envelope.split_first_chunk::<LEN_PREFIX>() else {
        return Err(CryptoError::Format("missing length prefix"));
    };
    let declared = u32::from_be_bytes(*prefix) as usize;
    if declared > rest.len() {
        return Err(CryptoError::Format("declared key length exceeds envelope"));
    }
    Ok(rest.split_at(declared))
}

fn unwrap_content_key(kek: &[u8; KEY_LEN], wrapped_key: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let raw = Zeroizing::new(cipher::open(kek, wrapped_key)?);
    let key: [u8; KEY_LEN] = raw
        .as_slice()
        .try_into()
        .map_err(|_| CryptoError::Format("wrapped key is not 32 bytes"))?;
    Ok(Zeroizing::new(key))
}

/// Size of a wrapped 32-byte content key; what a fresh envelope's length
/// prefix always says.
pub const WRAPPED_KEY_LEN: usize = NONCE_LEN + KEY_LEN + TAG_LEN;
