use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::user::{Role, RoleName, User};

/// Claims embedded in the JWT access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    pub sub: String, // user email
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub roles: Vec<RoleName>,
    #[serde(rename = "firstName")]
    pub first_name: String,
}

/// Claims embedded in the JWT refresh token. Carries no authorization data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String, // user email
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// Expiry view shared by both claim sets.
pub trait TokenClaims {
    /// Expiry as seconds since the Unix epoch.
    fn expires_at(&self) -> i64;
}

impl TokenClaims for AccessClaims {
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

impl TokenClaims for RefreshClaims {
    fn expires_at(&self) -> i64 {
        self.exp
    }
}

/// Identity rebuilt from a validated access token, attached to the request
/// extensions by the authentication middleware.
#[derive(Debug, Clone)]
pub struct AuthorizationContext {
    pub principal_id: String,
    pub display_name: String,
    pub roles: BTreeSet<Role>,
    pub user: User,
    pub authenticated: bool,
}

impl AuthorizationContext {
    pub fn has_authority(&self, role: RoleName) -> bool {
        self.roles.iter().any(|r| r.name == role)
    }
}
