use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::server::{api_key_auth, AppState};

use super::auths::{list_expiring, notify_auth_expiry, notify_user_auth_expiry, send_test_email};
use super::health::{health, readiness};
use super::metrics::prometheus_metrics;
use super::root::root;

pub fn api_routes(state: AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/", get(root))
        .route("/metrics", get(prometheus_metrics))
        .route("/auths/notify-auth-expiry", post(notify_auth_expiry))
        .route("/auths/notify-auth-expiry/user", post(notify_user_auth_expiry))
        .route("/auths/expiring", get(list_expiring))
        .route("/auths/test-email", post(send_test_email))
        .route_layer(middleware::from_fn_with_state(state, api_key_auth));

    Router::new()
        // Probes stay open for the load balancer
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(protected)
}
