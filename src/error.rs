use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use serde::Serialize;

use crate::models::user::RoleName;

/// Why a token was rejected. Never carries the token itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("Token expired")]
    Expired,
    #[error("Malformed jwt")]
    Malformed,
    #[error("Unsupported jwt")]
    UnsupportedFormat,
    #[error("Invalid signature")]
    BadSignature,
    #[error("Invalid token")]
    Invalid,
    #[error("Refresh token is no longer current")]
    Superseded,
}

impl AuthError {
    /// Name reported in the `error` field of rejection bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Expired => "Expired",
            AuthError::Malformed => "Malformed",
            AuthError::UnsupportedFormat => "UnsupportedFormat",
            AuthError::BadSignature => "BadSignature",
            AuthError::Invalid => "Invalid",
            AuthError::Superseded => "Superseded",
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Utf8(_) => {
                AuthError::Malformed
            }
            ErrorKind::InvalidAlgorithm
            | ErrorKind::InvalidAlgorithmName
            | ErrorKind::MissingAlgorithm => AuthError::UnsupportedFormat,
            ErrorKind::InvalidSignature => AuthError::BadSignature,
            _ => AuthError::Invalid,
        }
    }
}

/// Failure to mint a token.
#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("Token expiry is out of range")]
    ExpiryOutOfRange,
    #[error("Failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

/// Failure to rebuild an authorization context from valid claims.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    #[error("Can't find role by name {0}")]
    RoleNotFound(RoleName),
    #[error("A user with email {0} does not exist")]
    PrincipalNotFound(String),
}

/// Raised by the credential collaborator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CredentialError {
    #[error("Bad credentials")]
    BadCredentials,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error(transparent)]
    Token(#[from] AuthError),
    #[error("A user with email {0} does not exist")]
    UnknownPrincipal(String),
    #[error(transparent)]
    Issue(#[from] IssueError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UserError {
    #[error("A user with email {0} already exists")]
    AlreadyExists(String),
    #[error("A user with email {0} does not exist")]
    NotFound(String),
    #[error("User with email {0} already has the {1} role")]
    AlreadyHasRole(String, RoleName),
    #[error("{0} is an incorrect invite code")]
    IncorrectInviteCode(String),
    #[error("Can't find role by name {0}")]
    RoleNotFound(RoleName),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    InvalidUpdate(String),
    #[error("Failed to hash password")]
    Hashing,
}

/// Uniform JSON error body: `{ timestamp, status, error, message }`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub timestamp: DateTime<Utc>,
    pub status: u16,
    pub error: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(status: StatusCode, error: &str, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            status: status.as_u16(),
            error: error.to_string(),
            message: message.into(),
        }
    }

    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

/// Errors surfaced by HTTP handlers and extractors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error("Full authentication is required to access this resource")]
    Unauthenticated,
    #[error("Access denied: {0} authority required")]
    Forbidden(RoleName),
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Session(SessionError::Credentials(_)) => {
                (StatusCode::FORBIDDEN, "BadCredentials")
            }
            ApiError::Session(SessionError::Token(e)) => (StatusCode::BAD_REQUEST, e.kind()),
            ApiError::Session(SessionError::UnknownPrincipal(_)) => {
                (StatusCode::UNAUTHORIZED, "UsernameNotFound")
            }
            ApiError::Session(SessionError::Issue(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
            }
            ApiError::User(UserError::AlreadyExists(_))
            | ApiError::User(UserError::IncorrectInviteCode(_))
            | ApiError::User(UserError::Validation(_)) => {
                (StatusCode::BAD_REQUEST, "Registration")
            }
            ApiError::User(UserError::InvalidUpdate(_)) => (StatusCode::BAD_REQUEST, "Validation"),
            ApiError::User(UserError::NotFound(_)) | ApiError::User(UserError::RoleNotFound(_)) => {
                (StatusCode::NOT_FOUND, "EntityNotFound")
            }
            ApiError::User(UserError::AlreadyHasRole(..)) => (StatusCode::CONFLICT, "IllegalState"),
            ApiError::User(UserError::Hashing) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
            }
            ApiError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "AuthorizationDenied"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = self.parts();
        let message = if status.is_server_error() {
            tracing::error!("Request failed: {self}");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        ErrorBody::new(status, error, message).into_response_with(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_jwt_errors() {
        let cases = [
            (ErrorKind::ExpiredSignature, AuthError::Expired),
            (ErrorKind::InvalidToken, AuthError::Malformed),
            (ErrorKind::InvalidAlgorithm, AuthError::UnsupportedFormat),
            (ErrorKind::InvalidSignature, AuthError::BadSignature),
            (ErrorKind::MissingRequiredClaim("sub".into()), AuthError::Invalid),
        ];
        for (kind, expected) in cases {
            let err = jsonwebtoken::errors::Error::from(kind);
            assert_eq!(AuthError::from(err), expected);
        }
    }

    #[test]
    fn test_api_error_status_mapping() {
        let err = ApiError::from(SessionError::Token(AuthError::Superseded));
        assert_eq!(err.parts(), (StatusCode::BAD_REQUEST, "Superseded"));

        let err = ApiError::from(SessionError::Credentials(CredentialError::BadCredentials));
        assert_eq!(err.parts().0, StatusCode::FORBIDDEN);

        let err = ApiError::from(UserError::AlreadyHasRole("a@b.c".into(), RoleName::Admin));
        assert_eq!(err.parts().0, StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "User with email a@b.c already has the ADMIN role");

        let err = ApiError::from(SessionError::from(IssueError::ExpiryOutOfRange));
        assert_eq!(err.parts(), (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"));
    }
}
