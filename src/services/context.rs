use std::{collections::BTreeSet, sync::Arc};

use crate::{
    error::ContextError,
    models::auth::{AccessClaims, AuthorizationContext},
    services::users::{PrincipalLookup, RoleLookup},
};

/// Rebuilds an [`AuthorizationContext`] from validated access claims,
/// resolving role names against the authoritative role records.
pub struct AuthenticationContextBuilder {
    roles: Arc<dyn RoleLookup>,
    principals: Arc<dyn PrincipalLookup>,
}

impl AuthenticationContextBuilder {
    pub fn new(roles: Arc<dyn RoleLookup>, principals: Arc<dyn PrincipalLookup>) -> Self {
        Self { roles, principals }
    }

    pub fn build(&self, claims: &AccessClaims) -> Result<AuthorizationContext, ContextError> {
        // A role can vanish between issuance and use; that rejects the
        // request, it is not a server fault.
        let roles = claims
            .roles
            .iter()
            .map(|name| {
                self.roles
                    .find_by_name(*name)
                    .ok_or(ContextError::RoleNotFound(*name))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        let user = self
            .principals
            .find_by_email(&claims.sub)
            .ok_or_else(|| ContextError::PrincipalNotFound(claims.sub.clone()))?;

        Ok(AuthorizationContext {
            principal_id: claims.sub.clone(),
            display_name: claims.first_name.clone(),
            roles,
            user,
            authenticated: true,
        })
    }
}
