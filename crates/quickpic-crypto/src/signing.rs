//! Ed25519 signatures over sealed envelopes.
//!
//! The signing key is built by reading the sender's X25519 private seed as
//! an Ed25519 seed. The resulting verifying key has no relation to the
//! X25519 public key, so it has to be published separately
//! ([`SecretKey::signing_public_key`]) for recipients to check signatures.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};

use crate::error::{CryptoError, Result};
use crate::keys::{SecretKey, decode_key};

/// Ed25519 signature (64 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature([u8; 64]);

impl Signature {
    pub const LEN: usize = 64;

    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|_| CryptoError::Signature)?;
        let bytes: [u8; 64] = bytes.try_into().map_err(|_| CryptoError::Signature)?;
        Ok(Self(bytes))
    }
}

/// Ed25519 verifying key that peers use to check envelope signatures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SigningPublicKey(VerifyingKey);

impl SigningPublicKey {
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        VerifyingKey::from_bytes(bytes)
            .map(Self)
            .map_err(|_| CryptoError::InvalidKey("not an Ed25519 point"))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0.as_bytes())
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        Self::from_bytes(&decode_key(encoded)?)
    }

    /// Strict verification: rejects small-order keys and malleable
    /// signatures.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<()> {
        let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
        self.0
            .verify_strict(message, &sig)
            .map_err(|_| CryptoError::Signature)
    }
}

impl SecretKey {
    fn signing_key(&self) -> SigningKey {
        SigningKey::from_bytes(&self.to_bytes())
    }

    /// Verifying key matching the signatures this identity produces.
    pub fn signing_public_key(&self) -> SigningPublicKey {
        SigningPublicKey(self.signing_key().verifying_key())
    }

    /// Deterministic Ed25519 signature over `message`.
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key().sign(message).to_bytes())
    }
}
