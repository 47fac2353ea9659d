use axum::{
    extract::{Path, State},
    Json,
};

use crate::{
    error::ApiError,
    middleware::auth::AdminContext,
    models::{
        auth::AuthorizationContext,
        user::{RoleName, UserResponse, UserUpdateRequest},
    },
    AppState,
};

pub async fn me(ctx: AuthorizationContext) -> Json<UserResponse> {
    Json(ctx.user.into())
}

/// PATCH /users/me — partial profile update of the caller.
pub async fn update_me(
    State(state): State<AppState>,
    ctx: AuthorizationContext,
    Json(body): Json<UserUpdateRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.users.update(&ctx.principal_id, body)?;
    Ok(Json(user.into()))
}

/// PUT /users/{email}/role/{role_name} — ADMIN only.
pub async fn add_role(
    State(state): State<AppState>,
    AdminContext(admin): AdminContext,
    Path((email, role_name)): Path<(String, String)>,
) -> Result<Json<UserResponse>, ApiError> {
    let role: RoleName = role_name
        .parse()
        .map_err(|e: anyhow::Error| ApiError::BadRequest(e.to_string()))?;
    tracing::info!(admin = %admin.principal_id, %role, "Granting role");
    let user = state.users.add_role(&email, role)?;
    Ok(Json(user.into()))
}
