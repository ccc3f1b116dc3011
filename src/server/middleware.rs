use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use super::AppState;
use crate::auth::resolve_api_key;
use crate::error::AppError;
use crate::metrics::AuthMetrics;

/// API key authentication middleware.
///
/// Reads the key from the configured header (`X-API-Key` by default), hashes
/// it and looks the hash up in the user store. The resolved `ApiUser` is
/// attached to the request extensions.
pub async fn api_key_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let header_name = state.settings.notify.api_key_header.as_str();

    let api_key = req
        .headers()
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_owned);

    let Some(api_key) = api_key else {
        AuthMetrics::record_missing();
        tracing::warn!(header = %header_name, path = %req.uri().path(), "Missing API key header");
        return Err(AppError::Auth("API key required".to_string()));
    };

    match resolve_api_key(state.api_keys.as_ref(), &api_key).await? {
        Some(user) => {
            tracing::debug!(user = %user.name, "API key accepted");
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        None => {
            AuthMetrics::record_invalid();
            tracing::warn!(path = %req.uri().path(), "Invalid API key provided");
            Err(AppError::Auth("Invalid API key".to_string()))
        }
    }
}
