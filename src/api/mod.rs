//! API layer - HTTP endpoint handlers.

mod auths;
mod health;
mod metrics;
mod root;
mod routes;

pub use auths::{list_expiring, notify_auth_expiry, notify_user_auth_expiry, send_test_email};
pub use health::{health, readiness};
pub use metrics::prometheus_metrics;
pub use root::root;
pub use routes::api_routes;
