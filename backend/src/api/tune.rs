//! Tune endpoint: one MPEG-TS stream per request.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderName},
    response::{IntoResponse, Response},
};
use tracing::info;

use super::{channel_not_found, stream_error, ApiError};
use crate::state::AppState;

const TS_MEDIA_TYPE: &str = "video/mp2t";

const NO_CACHE_HEADERS: [(HeaderName, &str); 4] = [
    (header::CONTENT_TYPE, TS_MEDIA_TYPE),
    (header::CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (header::PRAGMA, "no-cache"),
    (header::EXPIRES, "0"),
];

/// Channel number from a tuner path segment: `v<id>` or `v<id>.ts`.
pub fn parse_tuner_path(segment: &str) -> Option<&str> {
    let id = segment.strip_prefix('v')?;
    let id = id.strip_suffix(".ts").unwrap_or(id);
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Stream a channel until the client disconnects.
#[utoipa::path(
    get,
    path = "/auto/{tuner}",
    tag = "tuner",
    params(
        ("tuner" = String, Path, description = "`v<channel>` or `v<channel>.ts`")
    ),
    responses(
        (status = 200, description = "Open-ended MPEG-TS stream", content_type = "video/mp2t"),
        (status = 404, description = "Channel not found", body = camtuner_types::api::ErrorResponse),
        (status = 503, description = "Channel has no playable source", body = camtuner_types::api::ErrorResponse),
        (status = 500, description = "Transcoder could not be started", body = camtuner_types::api::ErrorResponse)
    )
)]
pub async fn stream_channel(
    State(state): State<AppState>,
    Path(tuner): Path<String>,
) -> Result<Response, ApiError> {
    let channel_id = parse_tuner_path(&tuner).ok_or_else(channel_not_found)?;
    let stream = state.tune(channel_id).map_err(stream_error)?;
    info!(channel_id, stream_id = stream.id(), "Viewer tuned in");

    Ok((NO_CACHE_HEADERS, Body::from_stream(stream)).into_response())
}

/// Headers only; never starts a pipeline.
#[utoipa::path(
    head,
    path = "/auto/{tuner}",
    tag = "tuner",
    params(
        ("tuner" = String, Path, description = "`v<channel>` or `v<channel>.ts`")
    ),
    responses(
        (status = 200, description = "Channel exists"),
        (status = 404, description = "Channel not found")
    )
)]
pub async fn head_channel(
    State(state): State<AppState>,
    Path(tuner): Path<String>,
) -> Result<Response, ApiError> {
    match parse_tuner_path(&tuner) {
        Some(channel_id) if state.registry().contains(channel_id) => {
            Ok((NO_CACHE_HEADERS, Body::empty()).into_response())
        }
        _ => Err(channel_not_found()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tuner_path() {
        assert_eq!(parse_tuner_path("v101"), Some("101"));
        assert_eq!(parse_tuner_path("v101.ts"), Some("101"));
        assert_eq!(parse_tuner_path("v"), None);
        assert_eq!(parse_tuner_path("v.ts"), None);
        assert_eq!(parse_tuner_path("101"), None);
    }
}
