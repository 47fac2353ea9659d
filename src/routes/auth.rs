use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::ApiError,
    models::user::{
        JwtResponse, LoginRequest, RefreshTokenRequest, UserRegistrationRequest, UserResponse,
    },
    AppState,
};

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<JwtResponse>, ApiError> {
    let pair = state.sessions.login(&body.email, &body.password)?;
    Ok(Json(pair.into()))
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<UserRegistrationRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let user = state.users.register(body)?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// POST /auth/token — `{accessToken, refreshToken: null}`, or both null when
/// the refresh token has been superseded.
pub async fn access_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<JwtResponse>, ApiError> {
    let exchange = state.sessions.exchange_for_access_token(&body.refresh_token)?;
    Ok(Json(exchange.into()))
}

/// POST /auth/refresh — full rotation; any failure is an error response.
pub async fn refresh_token(
    State(state): State<AppState>,
    Json(body): Json<RefreshTokenRequest>,
) -> Result<Json<JwtResponse>, ApiError> {
    let pair = state.sessions.rotate(&body.refresh_token)?;
    Ok(Json(pair.into()))
}
