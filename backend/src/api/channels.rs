//! Channel API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use camtuner_types::{
    api::{
        ChannelListResponse, ChannelResponse, CreateChannelRequest, CreateMosaicRequest,
        ErrorResponse, ProbeResponse, ReorderChannelsRequest, SetChannelNumberRequest,
        UpdateChannelRequest,
    },
    channel::MOSAIC_SCHEME,
    is_supported_source_url, is_valid_channel_number, Channel, ChannelId, MAX_MOSAIC_SOURCES,
    MIN_MOSAIC_SOURCES,
};
use tracing::{debug, info};

use super::{bad_request, channel_not_found, channel_op_error, registry_error, ApiError};
use crate::state::AppState;

const INVALID_NUMBER: &str = "channel number must be digits only, 1-99999";
const INVALID_SOURCE: &str = "source must be an rtsp://, rtsps://, http:// or https:// URL";

/// Check the source after an edit so the operator sees its status.
fn spawn_probe(state: &AppState, channel_id: ChannelId) {
    let state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = state.probe_channel(&channel_id).await {
            debug!("Probe skipped: {}", e);
        }
    });
}

fn channel_number(state: &AppState, requested: Option<ChannelId>) -> Result<ChannelId, ApiError> {
    match requested {
        Some(id) => {
            let id = id.trim().to_string();
            if is_valid_channel_number(&id) {
                Ok(id)
            } else {
                Err(bad_request(INVALID_NUMBER))
            }
        }
        None => Ok(state.next_channel_id()),
    }
}

fn mosaic_members(sources: Vec<ChannelId>) -> Result<Vec<ChannelId>, ApiError> {
    let members: Vec<ChannelId> = sources
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if members.len() < MIN_MOSAIC_SOURCES {
        return Err(bad_request("enter at least two channel numbers"));
    }
    Ok(members.into_iter().take(MAX_MOSAIC_SOURCES).collect())
}

/// List all channels in lineup order.
#[utoipa::path(
    get,
    path = "/api/channels",
    tag = "channels",
    responses(
        (status = 200, description = "List all channels", body = ChannelListResponse)
    )
)]
pub async fn list_channels(State(state): State<AppState>) -> Json<ChannelListResponse> {
    Json(ChannelListResponse {
        channels: state.registry().list(),
    })
}

/// Get a channel by number.
#[utoipa::path(
    get,
    path = "/api/channels/{id}",
    tag = "channels",
    params(
        ("id" = String, Path, description = "Channel number")
    ),
    responses(
        (status = 200, description = "Channel found", body = ChannelResponse),
        (status = 404, description = "Channel not found", body = ErrorResponse)
    )
)]
pub async fn get_channel(
    State(state): State<AppState>,
    Path(id): Path<ChannelId>,
) -> Result<Json<ChannelResponse>, ApiError> {
    state
        .registry()
        .get(&id)
        .map(|channel| Json(ChannelResponse { channel }))
        .ok_or_else(channel_not_found)
}

/// Add a camera channel to the end of the lineup.
#[utoipa::path(
    post,
    path = "/api/channels",
    tag = "channels",
    request_body = CreateChannelRequest,
    responses(
        (status = 201, description = "Channel created", body = ChannelResponse),
        (status = 400, description = "Invalid channel number or source", body = ErrorResponse),
        (status = 409, description = "Channel number in use", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn create_channel(
    State(state): State<AppState>,
    Json(req): Json<CreateChannelRequest>,
) -> Result<(StatusCode, Json<ChannelResponse>), ApiError> {
    let url = req.url.trim().to_string();
    if !is_supported_source_url(&url) {
        return Err(bad_request(INVALID_SOURCE));
    }
    let id = channel_number(&state, req.id)?;

    let mut channel = Channel::new(id, req.name.trim(), url)
        .with_transport(req.transport)
        .with_credentials(req.username, req.password);
    channel.auth_mode = req.auth_mode;
    channel.transcode_audio = req.transcode_audio.unwrap_or(true);
    channel.tvg_id = req.tvg_id.filter(|s| !s.is_empty());
    channel.tvg_logo = req.tvg_logo.unwrap_or_default();
    channel.epg_title = req.epg_title.filter(|s| !s.is_empty());
    if let Some(desc) = req.epg_desc {
        channel.epg_desc = desc;
    }

    info!("Creating channel: {} ({})", channel.name, channel.id);
    let channel = state
        .create_channel(channel)
        .await
        .map_err(channel_op_error)?;
    spawn_probe(&state, channel.id.clone());

    Ok((StatusCode::CREATED, Json(ChannelResponse { channel })))
}

/// Add a mosaic of 2-4 existing channels.
#[utoipa::path(
    post,
    path = "/api/channels/mosaic",
    tag = "channels",
    request_body = CreateMosaicRequest,
    responses(
        (status = 201, description = "Mosaic created", body = ChannelResponse),
        (status = 400, description = "Too few members", body = ErrorResponse),
        (status = 409, description = "Channel number in use", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn create_mosaic(
    State(state): State<AppState>,
    Json(req): Json<CreateMosaicRequest>,
) -> Result<(StatusCode, Json<ChannelResponse>), ApiError> {
    if state.registry().len() < MIN_MOSAIC_SOURCES {
        return Err(bad_request("add at least two channels first"));
    }
    let members = mosaic_members(req.sources)?;
    let id = channel_number(&state, req.id)?;

    // Audio policy follows the first member unless given
    let transcode_audio = req.transcode_audio.unwrap_or_else(|| {
        state
            .registry()
            .get(&members[0])
            .map(|first| first.transcode_audio)
            .unwrap_or(true)
    });
    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| format!("Mosaic {}", members.join(",")));

    let channel = Channel::mosaic(id, name, members, transcode_audio);
    info!(
        "Creating mosaic channel: {} ({}) over {:?}",
        channel.name, channel.id, channel.mosaic_sources
    );
    let channel = state
        .create_channel(channel)
        .await
        .map_err(channel_op_error)?;
    spawn_probe(&state, channel.id.clone());

    Ok((StatusCode::CREATED, Json(ChannelResponse { channel })))
}

/// Edit a channel's source or metadata.
///
/// Setting `url` turns a mosaic into a single-source channel; setting
/// `mosaic_sources` does the reverse.
#[utoipa::path(
    put,
    path = "/api/channels/{id}",
    tag = "channels",
    params(
        ("id" = String, Path, description = "Channel number")
    ),
    request_body = UpdateChannelRequest,
    responses(
        (status = 200, description = "Channel updated", body = ChannelResponse),
        (status = 400, description = "Invalid source", body = ErrorResponse),
        (status = 404, description = "Channel not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn update_channel(
    State(state): State<AppState>,
    Path(id): Path<ChannelId>,
    Json(req): Json<UpdateChannelRequest>,
) -> Result<Json<ChannelResponse>, ApiError> {
    if req.url.is_some() && req.mosaic_sources.is_some() {
        return Err(bad_request("set either url or mosaic_sources, not both"));
    }
    let url = match req.url {
        Some(url) => {
            let url = url.trim().to_string();
            if !is_supported_source_url(&url) {
                return Err(bad_request(INVALID_SOURCE));
            }
            Some(url)
        }
        None => None,
    };
    let members = req.mosaic_sources.map(mosaic_members).transpose()?;

    info!("Updating channel {}", id);
    let channel = state
        .update_channel(&id, move |channel| {
            if let Some(url) = url {
                channel.url = url;
                channel.mosaic_sources.clear();
            }
            if let Some(members) = members {
                channel.url = format!("{}{}", MOSAIC_SCHEME, members.join(","));
                channel.mosaic_sources = members;
            }
            if let Some(name) = req.name.filter(|n| !n.trim().is_empty()) {
                channel.name = name.trim().to_string();
            }
            if let Some(transport) = req.transport {
                channel.transport = transport;
            }
            if let Some(username) = req.username {
                channel.username = username;
            }
            if let Some(password) = req.password {
                channel.password = password;
            }
            if let Some(auth_mode) = req.auth_mode {
                channel.auth_mode = auth_mode;
            }
            if let Some(transcode_audio) = req.transcode_audio {
                channel.transcode_audio = transcode_audio;
            }
            if let Some(tvg_id) = req.tvg_id {
                channel.tvg_id = Some(tvg_id).filter(|s| !s.is_empty());
            }
            if let Some(tvg_logo) = req.tvg_logo {
                channel.tvg_logo = tvg_logo;
            }
            if let Some(epg_title) = req.epg_title {
                channel.epg_title = Some(epg_title).filter(|s| !s.is_empty());
            }
            if let Some(epg_desc) = req.epg_desc {
                channel.epg_desc = epg_desc;
            }
        })
        .await
        .map_err(channel_op_error)?;
    spawn_probe(&state, channel.id.clone());

    Ok(Json(ChannelResponse { channel }))
}

/// Remove a channel. Viewers already tuned in keep their stream.
#[utoipa::path(
    delete,
    path = "/api/channels/{id}",
    tag = "channels",
    params(
        ("id" = String, Path, description = "Channel number")
    ),
    responses(
        (status = 204, description = "Channel deleted"),
        (status = 404, description = "Channel not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn delete_channel(
    State(state): State<AppState>,
    Path(id): Path<ChannelId>,
) -> Result<StatusCode, ApiError> {
    info!("Deleting channel {}", id);
    state.delete_channel(&id).await.map_err(channel_op_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Change a channel number.
#[utoipa::path(
    post,
    path = "/api/channels/{id}/number",
    tag = "channels",
    params(
        ("id" = String, Path, description = "Current channel number")
    ),
    request_body = SetChannelNumberRequest,
    responses(
        (status = 200, description = "Channel renumbered", body = ChannelResponse),
        (status = 400, description = "Invalid channel number", body = ErrorResponse),
        (status = 404, description = "Channel not found", body = ErrorResponse),
        (status = 409, description = "Channel number in use", body = ErrorResponse)
    )
)]
pub async fn set_channel_number(
    State(state): State<AppState>,
    Path(id): Path<ChannelId>,
    Json(req): Json<SetChannelNumberRequest>,
) -> Result<Json<ChannelResponse>, ApiError> {
    let number = req.number.trim().to_string();
    if !is_valid_channel_number(&number) {
        return Err(bad_request(INVALID_NUMBER));
    }

    state
        .renumber_channel(&id, &number)
        .await
        .map_err(channel_op_error)?;
    let channel = state.registry().get(&number).ok_or_else(channel_not_found)?;
    Ok(Json(ChannelResponse { channel }))
}

/// Move a lineup entry. Channel numbers stay with their positions.
#[utoipa::path(
    post,
    path = "/api/channels/reorder",
    tag = "channels",
    request_body = ReorderChannelsRequest,
    responses(
        (status = 200, description = "Lineup after the move", body = ChannelListResponse),
        (status = 400, description = "Position out of range", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn reorder_channels(
    State(state): State<AppState>,
    Json(req): Json<ReorderChannelsRequest>,
) -> Result<Json<ChannelListResponse>, ApiError> {
    let len = state.registry().len();
    if req.from >= len || req.to >= len {
        return Err(bad_request(format!(
            "position out of range (lineup has {} channels)",
            len
        )));
    }

    state
        .reorder_channels(req.from, req.to)
        .await
        .map_err(channel_op_error)?;
    Ok(Json(ChannelListResponse {
        channels: state.registry().list(),
    }))
}

/// Check that a channel's source can be opened.
#[utoipa::path(
    post,
    path = "/api/channels/{id}/probe",
    tag = "channels",
    params(
        ("id" = String, Path, description = "Channel number")
    ),
    responses(
        (status = 200, description = "Probe finished", body = ProbeResponse),
        (status = 404, description = "Channel not found", body = ErrorResponse)
    )
)]
pub async fn probe_channel(
    State(state): State<AppState>,
    Path(id): Path<ChannelId>,
) -> Result<Json<ProbeResponse>, ApiError> {
    let status = state.probe_channel(&id).await.map_err(registry_error)?;
    Ok(Json(ProbeResponse {
        channel_id: id,
        status,
    }))
}
