use std::{fmt, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, decode_header, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::{
    config::Config,
    error::{AuthError, IssueError},
    models::{
        auth::{AccessClaims, RefreshClaims, TokenClaims},
        user::User,
    },
    services::clock::Clock,
};

/// HMAC key material for one token domain.
pub struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SigningKey {
    pub fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey(<redacted>)")
    }
}

/// The two disjoint key domains. A token signed under one never verifies
/// under the other.
#[derive(Debug)]
pub struct JwtKeys {
    pub access: SigningKey,
    pub refresh: SigningKey,
}

impl JwtKeys {
    pub fn from_config(config: &Config) -> Self {
        Self {
            access: SigningKey::from_secret(config.jwt_access_secret.as_bytes()),
            refresh: SigningKey::from_secret(config.jwt_refresh_secret.as_bytes()),
        }
    }
}

/// Claims <-> compact HS256 token. Checks signature and shape only; expiry
/// is left to [`TokenValidator`].
#[derive(Clone)]
pub struct TokenCodec {
    validation: Validation,
}

impl Default for TokenCodec {
    fn default() -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self { validation }
    }
}

impl TokenCodec {
    pub fn encode<C: Serialize>(
        &self,
        claims: &C,
        key: &SigningKey,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::new(Algorithm::HS256), claims, &key.encoding)
    }

    pub fn decode<C: DeserializeOwned>(
        &self,
        token: &str,
        key: &SigningKey,
    ) -> Result<C, AuthError> {
        let header = decode_header(token).map_err(|_| AuthError::Malformed)?;
        if header.alg != Algorithm::HS256 {
            return Err(AuthError::UnsupportedFormat);
        }
        let data = decode::<C>(token, &key.decoding, &self.validation)?;
        Ok(data.claims)
    }
}

/// Mints access and refresh tokens.
pub struct TokenIssuer {
    codec: TokenCodec,
    keys: Arc<JwtKeys>,
    access_ttl: Duration,
    refresh_ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(
        keys: Arc<JwtKeys>,
        access_ttl: Duration,
        refresh_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            codec: TokenCodec::default(),
            keys,
            access_ttl,
            refresh_ttl,
            clock,
        }
    }

    pub fn issue_access_token(&self, user: &User) -> Result<String, IssueError> {
        let now = self.clock.now();
        let claims = AccessClaims {
            sub: user.email.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expiry(now, self.access_ttl)?,
            roles: user.role_names(),
            first_name: user.first_name.clone(),
        };
        Ok(self.codec.encode(&claims, &self.keys.access)?)
    }

    pub fn issue_refresh_token(&self, user: &User) -> Result<String, IssueError> {
        let now = self.clock.now();
        let claims = RefreshClaims {
            sub: user.email.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expiry(now, self.refresh_ttl)?,
        };
        Ok(self.codec.encode(&claims, &self.keys.refresh)?)
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> Result<i64, IssueError> {
    now.checked_add_signed(ttl)
        .map(|at| at.timestamp())
        .ok_or(IssueError::ExpiryOutOfRange)
}

/// Verifies signature and expiry against the matching key domain.
pub struct TokenValidator {
    codec: TokenCodec,
    keys: Arc<JwtKeys>,
    clock: Arc<dyn Clock>,
}

impl TokenValidator {
    pub fn new(keys: Arc<JwtKeys>, clock: Arc<dyn Clock>) -> Self {
        Self {
            codec: TokenCodec::default(),
            keys,
            clock,
        }
    }

    /// Signature, shape and expiry checked; returns the claims on success.
    pub fn validate_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        self.check_expiry(self.claims_of_access(token)?)
    }

    pub fn validate_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        self.check_expiry(self.claims_of_refresh(token)?)
    }

    /// Signature and shape only. Expired tokens still decode.
    pub fn claims_of_access(&self, token: &str) -> Result<AccessClaims, AuthError> {
        self.codec.decode(token, &self.keys.access)
    }

    pub fn claims_of_refresh(&self, token: &str) -> Result<RefreshClaims, AuthError> {
        self.codec.decode(token, &self.keys.refresh)
    }

    fn check_expiry<C: TokenClaims>(&self, claims: C) -> Result<C, AuthError> {
        if claims.expires_at() <= self.clock.now().timestamp() {
            return Err(AuthError::Expired);
        }
        Ok(claims)
    }
}
