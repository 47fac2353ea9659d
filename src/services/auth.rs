use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    error::{AuthError, SessionError},
    models::user::{JwtResponse, User},
    services::{
        jwt::{TokenIssuer, TokenValidator},
        metrics,
        session_store::SessionStore,
        users::{CredentialVerifier, PrincipalLookup},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl From<TokenPair> for JwtResponse {
    fn from(pair: TokenPair) -> Self {
        Self {
            access_token: Some(pair.access_token),
            refresh_token: Some(pair.refresh_token),
        }
    }
}

/// Outcome of trading a refresh token for a new access token.
///
/// A refresh token that verifies but is no longer the principal's current
/// one yields `Superseded` rather than an error. Existing clients expect an
/// empty `{accessToken: null, refreshToken: null}` body in that case, unlike
/// [`SessionService::rotate`] which fails outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessExchange {
    Issued(String),
    Superseded,
}

impl From<AccessExchange> for JwtResponse {
    fn from(exchange: AccessExchange) -> Self {
        match exchange {
            AccessExchange::Issued(access_token) => Self {
                access_token: Some(access_token),
                refresh_token: None,
            },
            AccessExchange::Superseded => Self {
                access_token: None,
                refresh_token: None,
            },
        }
    }
}

/// Login, access-token exchange and full rotation.
pub struct SessionService {
    issuer: Arc<TokenIssuer>,
    validator: Arc<TokenValidator>,
    store: Arc<dyn SessionStore>,
    credentials: Arc<dyn CredentialVerifier>,
    principals: Arc<dyn PrincipalLookup>,
}

impl SessionService {
    pub fn new(
        issuer: Arc<TokenIssuer>,
        validator: Arc<TokenValidator>,
        store: Arc<dyn SessionStore>,
        credentials: Arc<dyn CredentialVerifier>,
        principals: Arc<dyn PrincipalLookup>,
    ) -> Self {
        Self {
            issuer,
            validator,
            store,
            credentials,
            principals,
        }
    }

    pub fn login(&self, email: &str, password: &str) -> Result<TokenPair, SessionError> {
        let user = match self.credentials.verify(email, password) {
            Ok(user) => user,
            Err(e) => {
                metrics::record_login("failure");
                warn!("Login rejected: {e}");
                return Err(e.into());
            }
        };

        let access_token = self.issuer.issue_access_token(&user)?;
        let refresh_token = self.issuer.issue_refresh_token(&user)?;
        self.store.put(&user.email, refresh_token.clone());

        metrics::record_login("success");
        info!(user_id = user.id, "Login succeeded");
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// New access token for a current refresh token; the stored refresh
    /// token is left untouched.
    pub fn exchange_for_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<AccessExchange, SessionError> {
        let claims = self.validator.validate_refresh(refresh_token).inspect_err(|e| {
            metrics::record_renewal("exchange", e.kind());
        })?;

        if !self.store.cas_compare(&claims.sub, refresh_token) {
            metrics::record_renewal("exchange", AuthError::Superseded.kind());
            warn!("Access exchange with a superseded refresh token");
            return Ok(AccessExchange::Superseded);
        }

        let user = self.principal(&claims.sub)?;
        let access_token = self.issuer.issue_access_token(&user)?;
        metrics::record_renewal("exchange", "issued");
        info!(user_id = user.id, "Access token exchanged");
        Ok(AccessExchange::Issued(access_token))
    }

    /// New access and refresh tokens; the new refresh token replaces the
    /// presented one, which stops working everywhere.
    pub fn rotate(&self, refresh_token: &str) -> Result<TokenPair, SessionError> {
        let claims = self.validator.validate_refresh(refresh_token).inspect_err(|e| {
            metrics::record_renewal("rotate", e.kind());
        })?;

        if !self.store.cas_compare(&claims.sub, refresh_token) {
            return Err(self.superseded_rotation());
        }

        let user = self.principal(&claims.sub)?;
        let access_token = self.issuer.issue_access_token(&user)?;
        let new_refresh = self.issuer.issue_refresh_token(&user)?;

        // The compare above is only an early exit; this swap is the gate
        // concurrent rotations race on.
        if !self
            .store
            .replace_if_current(&user.email, refresh_token, new_refresh.clone())
        {
            return Err(self.superseded_rotation());
        }

        metrics::record_renewal("rotate", "issued");
        info!(user_id = user.id, "Refresh token rotated");
        Ok(TokenPair {
            access_token,
            refresh_token: new_refresh,
        })
    }

    fn principal(&self, email: &str) -> Result<User, SessionError> {
        self.principals
            .find_by_email(email)
            .ok_or_else(|| SessionError::UnknownPrincipal(email.to_string()))
    }

    fn superseded_rotation(&self) -> SessionError {
        metrics::record_renewal("rotate", AuthError::Superseded.kind());
        warn!("Rotation with a superseded refresh token");
        AuthError::Superseded.into()
    }
}
