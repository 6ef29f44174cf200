//! Request handlers. Each one unpacks the request and delegates to
//! [`VaultService`]; errors render through [`VaultError`]'s `IntoResponse`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{BytesRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::error::VaultError;
use crate::service::{RetrieveSecretResponse, StoreSecretResponse, VaultService};

/// Prometheus text exposition content type.
const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4";

fn authorization(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
}

/// `POST /secret`
pub async fn store_secret(
    State(service): State<VaultService>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<StoreSecretResponse>, VaultError> {
    // An unreadable body is a validation failure, reported only after
    // admission and authentication have passed.
    let body = body.unwrap_or_default();
    service
        .store_secret(authorization(&headers), &body)
        .await
        .map(Json)
}

/// `GET /secret/:key`
pub async fn retrieve_secret(
    State(service): State<VaultService>,
    headers: HeaderMap,
    key: Result<Path<String>, PathRejection>,
) -> Result<Json<RetrieveSecretResponse>, VaultError> {
    // An undecodable key becomes an empty one, which the service rejects as
    // invalid after admission and authentication.
    let key = key.map(|Path(key)| key).unwrap_or_default();
    service
        .retrieve_secret(authorization(&headers), &key)
        .await
        .map(Json)
}

/// `GET /health`
pub async fn health(State(service): State<VaultService>) -> Response {
    match service.health().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "ok" }))).into_response(),
        Err(e) => {
            error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "unavailable" })),
            )
                .into_response()
        }
    }
}

/// `GET /metrics`
pub async fn metrics(State(service): State<VaultService>) -> Response {
    match service.metrics().render() {
        Ok(text) => ([(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)], text).into_response(),
        Err(e) => VaultError::internal(format!("metrics encoding failed: {e}")).into_response(),
    }
}
