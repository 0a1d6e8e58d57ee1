//! Active stream inspection.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use camtuner_types::{
    api::{ErrorResponse, StreamListResponse},
    StreamId, StreamInfo,
};

use super::ApiError;
use crate::state::AppState;

/// List viewers currently tuned in.
#[utoipa::path(
    get,
    path = "/api/streams",
    tag = "streams",
    responses(
        (status = 200, description = "Active streams", body = StreamListResponse)
    )
)]
pub async fn list_streams(State(state): State<AppState>) -> Json<StreamListResponse> {
    Json(StreamListResponse {
        streams: state.supervisor().list(),
    })
}

/// Get one active stream.
#[utoipa::path(
    get,
    path = "/api/streams/{id}",
    tag = "streams",
    params(
        ("id" = u64, Path, description = "Stream ID")
    ),
    responses(
        (status = 200, description = "Stream found", body = StreamInfo),
        (status = 404, description = "Stream not found", body = ErrorResponse)
    )
)]
pub async fn get_stream(
    State(state): State<AppState>,
    Path(id): Path<StreamId>,
) -> Result<Json<StreamInfo>, ApiError> {
    state.supervisor().get(id).map(Json).ok_or((
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("stream not found")),
    ))
}
