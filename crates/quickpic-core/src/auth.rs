use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
    errors::ErrorKind,
};
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use uuid::Uuid;

use quickpic_crypto::{PublicKey, SigningPublicKey};
use quickpic_types::api::{AuthResponse, Claims};
use quickpic_types::models::{RefreshToken, User};

use crate::error::{CoreError, Result, TokenError};
use crate::password::{self, PasswordParams};
use crate::store::{StoreError, UserStore};

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 32;
const PASSWORD_MIN: usize = 8;
const REFRESH_TOKEN_BYTES: usize = 32;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub password: PasswordParams,
}

impl AuthConfig {
    /// 15-minute access tokens, 7-day refresh tokens, default Argon2 cost.
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
            password: PasswordParams::default(),
        }
    }
}

/// Registration, login and the access/refresh token lifecycle.
pub struct AuthService {
    users: Arc<dyn UserStore>,
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserStore>, config: AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            users,
            config,
            validation,
        }
    }

    pub fn register(
        &self,
        username: &str,
        password: &str,
        public_key: &str,
        signing_key: Option<&str>,
    ) -> Result<AuthResponse> {
        let username = fold_username(username);
        let len = username.chars().count();
        if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
            return Err(CoreError::InvalidInput(format!(
                "username must be {USERNAME_MIN}-{USERNAME_MAX} characters"
            )));
        }
        if password.chars().count() < PASSWORD_MIN {
            return Err(CoreError::InvalidInput(format!(
                "password must be at least {PASSWORD_MIN} characters"
            )));
        }
        let public_key = PublicKey::from_base64(public_key)
            .map_err(|_| CoreError::InvalidInput("public_key must be base64 of 32 bytes".into()))?;
        let signing_key = signing_key
            .map(SigningPublicKey::from_base64)
            .transpose()
            .map_err(|_| CoreError::InvalidInput("signing_key must be an Ed25519 key".into()))?;

        if self.users.get_user_by_username(&username)?.is_some() {
            return Err(CoreError::UsernameTaken);
        }

        let mut user = User {
            id: Uuid::new_v4(),
            user_number: 0,
            username,
            password_hash: password::hash_password(password, &self.config.password)?,
            public_key: public_key.to_base64(),
            signing_key: signing_key.map(|k| k.to_base64()),
            created_at: Utc::now(),
        };

        match self.users.create_user(&user) {
            Ok(user_number) => user.user_number = user_number,
            // Lost a race with a concurrent registration of the same name.
            Err(StoreError::Conflict(_)) => return Err(CoreError::UsernameTaken),
            Err(e) => return Err(e.into()),
        }

        info!(
            "Registered user #{} {} ({})",
            user.user_number, user.username, user.id
        );
        self.issue_tokens(&user)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<AuthResponse> {
        let username = fold_username(username);

        let Some(user) = self.users.get_user_by_username(&username)? else {
            password::burn_verification(password, &self.config.password);
            return Err(CoreError::Credentials);
        };

        if !password::verify_password(password, &user.password_hash, &self.config.password)? {
            debug!("Password mismatch for {}", user.id);
            return Err(CoreError::Credentials);
        }

        self.issue_tokens(&user)
    }

    /// Redeem a refresh token for a fresh pair. The old token is gone
    /// afterwards whether or not it was still valid.
    pub fn refresh(&self, refresh_token: &str) -> Result<AuthResponse> {
        let now = Utc::now();
        let record = self
            .users
            .take_refresh_token(&hash_token(refresh_token))?
            .ok_or(TokenError::Invalid)?;

        if record.is_expired(now) {
            return Err(TokenError::Invalid.into());
        }

        let user = self.users.get_user_by_id(record.user_id)?.ok_or_else(|| {
            warn!("Refresh token for missing user {}", record.user_id);
            TokenError::Invalid
        })?;

        self.issue_tokens(&user)
    }

    /// Unknown tokens are ignored.
    pub fn logout(&self, refresh_token: &str) -> Result<()> {
        if !self.users.delete_refresh_token(&hash_token(refresh_token))? {
            debug!("Logout with unknown refresh token");
        }
        Ok(())
    }

    /// Revoke every refresh token the user holds. Outstanding access tokens
    /// stay valid until they expire.
    pub fn logout_all(&self, user_id: Uuid) -> Result<u64> {
        let revoked = self.users.delete_all_refresh_tokens(user_id)?;
        info!("Revoked {} refresh tokens for {}", revoked, user_id);
        Ok(revoked)
    }

    /// Check signature, algorithm and expiry; return the subject.
    pub fn validate_access_token(&self, token: &str) -> std::result::Result<Uuid, TokenError> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims.sub)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    pub fn purge_expired_tokens(&self) -> Result<u64> {
        Ok(self.users.purge_expired_refresh_tokens(Utc::now())?)
    }

    fn issue_tokens(&self, user: &User) -> Result<AuthResponse> {
        let now = Utc::now();
        let access_token = self.issue_access_token(user.id, now)?;

        let mut raw = [0u8; REFRESH_TOKEN_BYTES];
        rand::rng().fill_bytes(&mut raw);
        let refresh_token = URL_SAFE_NO_PAD.encode(raw);

        self.users.store_refresh_token(&RefreshToken {
            token_hash: hash_token(&refresh_token),
            user_id: user.id,
            expires_at: now + self.config.refresh_token_ttl,
        })?;

        Ok(AuthResponse {
            access_token,
            refresh_token,
            expires_in: self.config.access_token_ttl.num_seconds(),
            user: user.to_public(),
        })
    }

    fn issue_access_token(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + self.config.access_token_ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| CoreError::Internal(format!("token signing failed: {}", e)))
    }
}

/// Usernames are unique ignoring case; the folded form is what gets stored.
pub fn fold_username(username: &str) -> String {
    username.trim().to_lowercase()
}

/// Only this digest of a refresh token is persisted.
fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
