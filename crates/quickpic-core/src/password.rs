/// Password hashing with raw Argon2id.
///
/// Stored form is base64(salt ‖ digest) with a 16-byte salt, not a PHC
/// string, so hashes written by older deployments keep verifying.
use argon2::{Algorithm, Argon2, Params, Version, password_hash::Output};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;

use crate::error::{CoreError, Result};

pub const SALT_LEN: usize = 16;

/// Argon2id cost parameters. The default is time 1, 64 MiB, 4 lanes,
/// 32-byte output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordParams {
    pub time_cost: u32,
    pub memory_kib: u32,
    pub parallelism: u32,
    pub output_len: usize,
}

impl Default for PasswordParams {
    fn default() -> Self {
        Self {
            time_cost: 1,
            memory_kib: 64 * 1024,
            parallelism: 4,
            output_len: 32,
        }
    }
}

impl PasswordParams {
    fn hasher(&self) -> Result<Argon2<'static>> {
        let params = Params::new(
            self.memory_kib,
            self.time_cost,
            self.parallelism,
            Some(self.output_len),
        )
        .map_err(|e| CoreError::Internal(format!("invalid argon2 params: {}", e)))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    fn derive(&self, password: &str, salt: &[u8]) -> Result<Vec<u8>> {
        let mut digest = vec![0u8; self.output_len];
        self.hasher()?
            .hash_password_into(password.as_bytes(), salt, &mut digest)
            .map_err(|e| CoreError::Internal(format!("password hashing failed: {}", e)))?;
        Ok(digest)
    }
}

/// Hash under a fresh random salt.
pub fn hash_password(password: &str, params: &PasswordParams) -> Result<String> {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);

    let digest = params.derive(password, &salt)?;

    let mut combined = Vec::with_capacity(SALT_LEN + digest.len());
    combined.extend_from_slice(&salt);
    combined.extend_from_slice(&digest);
    Ok(BASE64.encode(combined))
}

/// Recompute and compare in constant time. A malformed stored hash is a
/// mismatch, not an error.
pub fn verify_password(password: &str, encoded: &str, params: &PasswordParams) -> Result<bool> {
    let Ok(combined) = BASE64.decode(encoded) else {
        return Ok(false);
    };
    if combined.len() != SALT_LEN + params.output_len {
        return Ok(false);
    }
    let (salt, stored) = combined.split_at(SALT_LEN);

    let computed = params.derive(password, salt)?;

    // `Output` equality is constant-time.
    match (Output::new(stored), Output::new(&computed)) {
        (Ok(stored), Ok(computed)) => Ok(stored == computed),
        _ => Ok(false),
    }
}

/// Spend the same work as a real verification. Used when the username does
/// not exist so response time does not reveal it.
pub fn burn_verification(password: &str, params: &PasswordParams) {
    let _ = params.derive(password, &[0u8; SALT_LEN]);
}
