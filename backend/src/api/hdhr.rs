//! HDHomeRun-compatible discovery documents.

use axum::{extract::State, http::HeaderMap, Json};
use camtuner_types::api::{DiscoverResponse, LineupEntry, LineupStatus};

use super::base_url;
use crate::guide::tune_url;
use crate::state::AppState;

const MODEL_NUMBER: &str = "HDHR4-2US";
const FIRMWARE_NAME: &str = "hdhomerun_ip";
const FIRMWARE_VERSION: &str = "2024.06.01";
const DEVICE_AUTH: &str = "camtuner";

/// Device descriptor.
#[utoipa::path(
    get,
    path = "/discover.json",
    tag = "tuner",
    responses(
        (status = 200, description = "Tuner device descriptor", body = DiscoverResponse)
    )
)]
pub async fn discover(State(state): State<AppState>, headers: HeaderMap) -> Json<DiscoverResponse> {
    let server = state.server();
    let base = base_url(&headers, server);

    Json(DiscoverResponse {
        friendly_name: format!("{} (IPTV Bridge)", server.name),
        model_number: MODEL_NUMBER.to_string(),
        firmware_name: FIRMWARE_NAME.to_string(),
        firmware_version: FIRMWARE_VERSION.to_string(),
        device_id: state.device_id().to_string(),
        device_auth: DEVICE_AUTH.to_string(),
        lineup_url: format!("{}/lineup.json", base),
        base_url: base,
        lineup_status: LineupStatus::default(),
        tuner_count: server.tuner_count,
    })
}

/// Channel lineup in operator order.
#[utoipa::path(
    get,
    path = "/lineup.json",
    tag = "tuner",
    responses(
        (status = 200, description = "One entry per channel", body = Vec<LineupEntry>)
    )
)]
pub async fn lineup(State(state): State<AppState>, headers: HeaderMap) -> Json<Vec<LineupEntry>> {
    let base = base_url(&headers, state.server());
    let entries = state
        .registry()
        .list()
        .into_iter()
        .map(|channel| LineupEntry {
            url: tune_url(&base, &channel.id),
            guide_number: channel.id,
            guide_name: channel.name,
        })
        .collect();
    Json(entries)
}

/// Scan status. Channels are configured, never scanned.
#[utoipa::path(
    get,
    path = "/lineup_status.json",
    tag = "tuner",
    responses(
        (status = 200, description = "Static scan status", body = LineupStatus)
    )
)]
pub async fn lineup_status() -> Json<LineupStatus> {
    Json(LineupStatus::default())
}
