use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub endpoints: Vec<EndpointInfo>,
}

#[derive(Debug, Serialize)]
pub struct EndpointInfo {
    pub method: &'static str,
    pub path: &'static str,
    pub description: &'static str,
}

const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/health", "Liveness probe"),
    ("GET", "/health/ready", "Readiness probe"),
    ("GET", "/metrics", "Prometheus metrics"),
    ("POST", "/auths/notify-auth-expiry", "Notify every person in a unit with expiring authorisations"),
    ("POST", "/auths/notify-auth-expiry/user", "Notify one person, without deduplication"),
    ("GET", "/auths/expiring", "List expiring authorisations without sending"),
    ("POST", "/auths/test-email", "Send a sample notification email"),
];

/// GET / - service name, version and endpoint map
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        endpoints: ENDPOINTS
            .iter()
            .map(|&(method, path, description)| EndpointInfo {
                method,
                path,
                description,
            })
            .collect(),
    })
}
