//! API handlers.

pub mod channels;
pub mod guide;
pub mod hdhr;
pub mod sse;
pub mod streams;
pub mod tune;

use axum::http::{header, HeaderMap, StatusCode};
use axum::Json;
use camtuner_types::api::ErrorResponse;
use tracing::error;

use crate::config::ServerSettings;
use crate::registry::RegistryError;
use crate::state::ChannelOpError;
use crate::stream::StreamError;

/// Error half of every JSON handler result.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub(crate) fn channel_not_found() -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("channel not found")),
    )
}

pub(crate) fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message)))
}

pub(crate) fn registry_error(e: RegistryError) -> ApiError {
    match e {
        RegistryError::NotFound(_) => channel_not_found(),
        RegistryError::DuplicateId(id) => (
            StatusCode::CONFLICT,
            Json(ErrorResponse::with_details(
                "channel number already in use",
                id,
            )),
        ),
    }
}

pub(crate) fn channel_op_error(e: ChannelOpError) -> ApiError {
    match e {
        ChannelOpError::Registry(e) => registry_error(e),
        ChannelOpError::Invalid(message) => bad_request(message),
        ChannelOpError::Storage(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::with_details(
                "Failed to save lineup",
                e.to_string(),
            )),
        ),
    }
}

pub(crate) fn stream_error(e: StreamError) -> ApiError {
    match e {
        StreamError::NotFound(_) => channel_not_found(),
        StreamError::Unresolvable(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::with_details(
                "channel has no playable source",
                e.to_string(),
            )),
        ),
        StreamError::ShuttingDown => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new(e.to_string())),
        ),
        StreamError::Spawn { .. } | StreamError::Interrupted => {
            error!("Tune failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::with_details(
                    "failed to start stream",
                    e.to_string(),
                )),
            )
        }
    }
}

/// Base URL clients should use to reach this server.
///
/// Taken from the request `Host` header so that the documents work through
/// whatever address the client used; falls back to the configured bind address.
pub(crate) fn base_url(headers: &HeaderMap, server: &ServerSettings) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|h| !h.is_empty());

    match host {
        Some(host) => format!("http://{}", host),
        None => {
            let bind = match server.host.as_str() {
                "" | "0.0.0.0" | "::" => "127.0.0.1",
                other => other,
            };
            format!("http://{}:{}", bind, server.port)
        }
    }
}
