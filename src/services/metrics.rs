use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec};

lazy_static! {
    pub static ref LOGINS_COUNTER: CounterVec = register_counter_vec!(
        "auth_logins_total",
        "Login attempts by outcome",
        &["status"]
    ).unwrap();

    pub static ref TOKEN_RENEWALS_COUNTER: CounterVec = register_counter_vec!(
        "auth_token_renewals_total",
        "Access-token exchanges and full rotations by outcome",
        &["operation", "outcome"]
    ).unwrap();

    pub static ref GATE_REJECTIONS_COUNTER: CounterVec = register_counter_vec!(
        "auth_gate_rejections_total",
        "Requests rejected by the bearer-token middleware, by error kind",
        &["error"]
    ).unwrap();
}

pub fn record_login(status: &str) {
    LOGINS_COUNTER.with_label_values(&[status]).inc();
}

pub fn record_renewal(operation: &str, outcome: &str) {
    TOKEN_RENEWALS_COUNTER
        .with_label_values(&[operation, outcome])
        .inc();
}

pub fn record_gate_rejection(error: &str) {
    GATE_REJECTIONS_COUNTER.with_label_values(&[error]).inc();
}
