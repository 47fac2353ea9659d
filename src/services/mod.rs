pub mod auth;
pub mod clock;
pub mod context;
pub mod jwt;
pub mod metrics;
pub mod session_store;
pub mod users;
