//! Liveness and readiness endpoints.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub version: &'static str,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub notification_store: CheckResult,
    pub api_keys: CheckResult,
    pub registry: CheckResult,
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResult {
    fn from_result<E: std::fmt::Display>(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self {
                ok: true,
                backend: None,
                error: None,
            },
            Err(e) => Self {
                ok: false,
                backend: None,
                error: Some(e.to_string()),
            },
        }
    }

    fn with_backend(mut self, backend: &'static str) -> Self {
        self.backend = Some(backend);
        self
    }
}

/// GET /health - process is up; no dependencies are touched
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// GET /health/ready - stores reachable and registry credentials configured
#[tracing::instrument(name = "http.readiness", skip(state))]
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let store = state.workflow.store();
    let checks = ReadinessChecks {
        notification_store: CheckResult::from_result(store.ping().await)
            .with_backend(store.backend_type()),
        api_keys: CheckResult::from_result(state.api_keys.ping().await),
        registry: CheckResult::from_result(state.workflow.registry().check_ready()),
    };

    let ready = checks.notification_store.ok && checks.api_keys.ok && checks.registry.ok;
    if !ready {
        tracing::warn!(?checks, "Service not ready");
    }

    let (status, label) = if ready {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    };
    (status, Json(ReadinessResponse { status: label, checks }))
}
