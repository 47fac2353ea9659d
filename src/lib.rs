pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use config::Config;
use services::{
    auth::SessionService,
    clock::Clock,
    context::AuthenticationContextBuilder,
    jwt::{JwtKeys, TokenIssuer, TokenValidator},
    session_store::{InMemorySessionStore, SessionStore},
    users::{AdminGrant, RoleRepository, UserDirectory},
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionService>,
    pub validator: Arc<TokenValidator>,
    pub contexts: Arc<AuthenticationContextBuilder>,
    pub users: Arc<UserDirectory>,
    pub roles: Arc<RoleRepository>,
}

impl AppState {
    /// Wires the token subsystem with an in-process session store.
    pub fn new(config: &Config, clock: Arc<dyn Clock>) -> Self {
        Self::with_store(config, clock, Arc::new(InMemorySessionStore::new()))
    }

    pub fn with_store(
        config: &Config,
        clock: Arc<dyn Clock>,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let keys = Arc::new(JwtKeys::from_config(config));
        let issuer = Arc::new(TokenIssuer::new(
            keys.clone(),
            config.access_ttl(),
            config.refresh_ttl(),
            clock.clone(),
        ));
        let validator = Arc::new(TokenValidator::new(keys, clock));

        let roles = Arc::new(RoleRepository::new());
        let users = Arc::new(UserDirectory::new(
            roles.clone(),
            AdminGrant {
                email: config.admin_email.clone(),
                invite_code: config.admin_invite_code.clone(),
            },
            config.bcrypt_cost,
        ));

        let sessions = Arc::new(SessionService::new(
            issuer,
            validator.clone(),
            store,
            users.clone(),
            users.clone(),
        ));
        let contexts = Arc::new(AuthenticationContextBuilder::new(roles.clone(), users.clone()));

        Self {
            sessions,
            validator,
            contexts,
            users,
            roles,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::metrics::metrics_handler))
        // Auth
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/token", post(routes::auth::access_token))
        .route("/auth/refresh", post(routes::auth::refresh_token))
        // Users
        .route("/users/me", get(routes::users::me).patch(routes::users::update_me))
        .route("/users/{email}/role/{role_name}", put(routes::users::add_role))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    middleware::auth::authenticate,
                )),
        )
        .with_state(state)
}
