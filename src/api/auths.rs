//! Authorisation expiry endpoints.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    Json,
};
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::server::AppState;
use crate::workflow::{
    ExpiringListResponse, ExpiringQuery, NotifyRequest, NotifyResponse, TestEmailRequest,
    TestEmailResponse, UserNotifyRequest,
};

/// Parse a JSON body that may be absent; an empty body yields the defaults.
fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::Validation(format!("Invalid request body: {}", e)))
}

/// POST /auths/notify-auth-expiry - deduplicated batch run for a unit
#[tracing::instrument(name = "http.notify_auth_expiry", skip(state, body))]
pub async fn notify_auth_expiry(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<NotifyResponse>> {
    let request: NotifyRequest = optional_json(&body)?;

    let response = state
        .workflow
        .check_and_notify(request.unit_id.as_deref(), request.warning_days)
        .await?;

    Ok(Json(response))
}

/// POST /auths/notify-auth-expiry/user - ad-hoc send for one person
#[tracing::instrument(name = "http.notify_user_auth_expiry", skip(state, payload))]
pub async fn notify_user_auth_expiry(
    State(state): State<AppState>,
    payload: std::result::Result<Json<UserNotifyRequest>, JsonRejection>,
) -> Result<Json<NotifyResponse>> {
    let Json(request) = payload?;

    let response = state
        .workflow
        .notify_resource(
            &request.resource_id,
            request.unit_id.as_deref(),
            request.warning_days,
        )
        .await?;

    Ok(Json(response))
}

/// GET /auths/expiring - list only
#[tracing::instrument(name = "http.list_expiring", skip(state, query))]
pub async fn list_expiring(
    State(state): State<AppState>,
    query: std::result::Result<Query<ExpiringQuery>, QueryRejection>,
) -> Result<Json<ExpiringListResponse>> {
    let Query(query) = query?;

    let response = state
        .workflow
        .list_expiring(query.unit_id.as_deref(), query.warning_days)
        .await?;

    Ok(Json(response))
}

/// POST /auths/test-email - sample notice to an arbitrary address
#[tracing::instrument(name = "http.send_test_email", skip(state, payload))]
pub async fn send_test_email(
    State(state): State<AppState>,
    payload: std::result::Result<Json<TestEmailRequest>, JsonRejection>,
) -> Result<Json<TestEmailResponse>> {
    let Json(request) = payload?;

    let response = state
        .workflow
        .send_test_email(&request.email, &request.resource_id)
        .await?;

    Ok(Json(response))
}
