use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::warn;

use crate::{
    error::{ApiError, ErrorBody},
    models::{auth::AuthorizationContext, user::RoleName},
    services::metrics,
    AppState,
};

const BEARER_PREFIX: &str = "Bearer ";

/// Bearer token from the `Authorization` header, if one was supplied.
/// A missing header or any other scheme means "no token".
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
}

/// Runs on every request. Anonymous requests pass through untouched; a
/// present token must validate, otherwise the request ends here with 401.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()).map(str::to_owned) else {
        return next.run(request).await;
    };

    let claims = match state.validator.validate_access(&token) {
        Ok(claims) => claims,
        Err(e) => return reject(e.kind(), e.to_string()),
    };

    let context = match state.contexts.build(&claims) {
        Ok(context) => context,
        Err(e) => return reject("EntityNotFound", e.to_string()),
    };

    request.extensions_mut().insert(context);
    next.run(request).await
}

fn reject(error: &str, message: String) -> Response {
    metrics::record_gate_rejection(error);
    warn!(error, "Rejected bearer token");
    ErrorBody::new(StatusCode::UNAUTHORIZED, error, message)
        .into_response_with(StatusCode::UNAUTHORIZED)
}

/// Handlers that take an `AuthorizationContext` require an authenticated
/// caller.
impl<S> FromRequestParts<S> for AuthorizationContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthorizationContext>()
            .filter(|ctx| ctx.authenticated)
            .cloned()
            .ok_or(ApiError::Unauthenticated)
    }
}

/// Authenticated caller holding the ADMIN authority.
#[derive(Debug, Clone)]
pub struct AdminContext(pub AuthorizationContext);

impl<S> FromRequestParts<S> for AdminContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let ctx = AuthorizationContext::from_request_parts(parts, state).await?;
        if !ctx.has_authority(RoleName::Admin) {
            return Err(ApiError::Forbidden(RoleName::Admin));
        }
        Ok(AdminContext(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("Basic xyz")), None);
        assert_eq!(bearer_token(&headers("bearer abc")), None);
        assert_eq!(bearer_token(&headers("Bearer")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_empty_bearer_value_is_still_a_token() {
        assert_eq!(bearer_token(&headers("Bearer ")), Some(""));
        assert_eq!(bearer_token(&headers("Bearer  x")), Some(" x"));
    }
}
