use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    models::{Role, UserRecord},
};

/// Claims
///
/// The signed payload of an access token. Tokens are stateless: nothing about them is
/// persisted, and verification only checks the signature and `exp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (sub): the user's id.
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    /// Issued At (iat), seconds since the epoch.
    pub iat: usize,
    /// Expiration Time (exp), seconds since the epoch.
    pub exp: usize,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// TokenService
///
/// Issues and verifies HS256 access tokens. Cheap to clone; the keys are shared.
#[derive(Clone)]
pub struct TokenService {
    keys: Arc<Keys>,
    ttl: Duration,
    validation: Validation,
}

impl TokenService {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        // No clock-skew allowance: an expired token is expired.
        validation.leeway = 0;

        Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
            }),
            ttl,
            validation,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.jwt_secret, config.jwt_expires_in)
    }

    /// issue
    ///
    /// Encodes the user's id, email and role with an expiry `ttl` from now.
    pub fn issue(&self, user: &UserRecord) -> AppResult<String> {
        let now = Utc::now().timestamp().max(0) as usize;
        let exp = usize::try_from(self.ttl.as_secs())
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| AppError::Internal("token lifetime overflows the expiry".to_string()))?;
        let claims = Claims {
            sub: user.id,
            email: user.email.clone(),
            role: user.role,
            iat: now,
            exp,
        };
        self.sign(&claims)
    }

    /// Signs an arbitrary claim set with this service's key.
    pub fn sign(&self, claims: &Claims) -> AppResult<String> {
        encode(&Header::default(), claims, &self.keys.encoding)
            .map_err(|e| AppError::Internal(format!("token signing failed: {e}")))
    }

    /// verify
    ///
    /// Returns the claims of a well-formed, correctly signed, unexpired token. Every failure
    /// reason (malformed, bad signature, expired, wrong algorithm) maps to `InvalidToken`.
    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        decode::<Claims>(token, &self.keys.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(kind = ?e.kind(), "token rejected");
                AppError::InvalidToken
            })
    }
}
