//! OpenAPI documentation configuration.

use camtuner_types::api::{
    ChannelListResponse, ChannelResponse, CreateChannelRequest, CreateMosaicRequest,
    DiscoverResponse, ErrorResponse, LineupEntry, LineupStatus, ProbeResponse,
    ReorderChannelsRequest, SetChannelNumberRequest, StreamListResponse, UpdateChannelRequest,
};
use camtuner_types::{
    AuthMode, Channel, ProbeState, ProbeStatus, StreamInfo, StreamState, Transport,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::hdhr::discover,
        crate::api::hdhr::lineup,
        crate::api::hdhr::lineup_status,
        crate::api::tune::stream_channel,
        crate::api::tune::head_channel,
        crate::api::guide::xmltv,
        crate::api::guide::m3u,
        crate::api::channels::list_channels,
        crate::api::channels::get_channel,
        crate::api::channels::create_channel,
        crate::api::channels::create_mosaic,
        crate::api::channels::update_channel,
        crate::api::channels::delete_channel,
        crate::api::channels::set_channel_number,
        crate::api::channels::reorder_channels,
        crate::api::channels::probe_channel,
        crate::api::streams::list_streams,
        crate::api::streams::get_stream,
    ),
    components(
        schemas(
            Channel,
            Transport,
            AuthMode,
            ProbeState,
            ProbeStatus,
            StreamInfo,
            StreamState,
            CreateChannelRequest,
            CreateMosaicRequest,
            UpdateChannelRequest,
            SetChannelNumberRequest,
            ReorderChannelsRequest,
            ChannelResponse,
            ChannelListResponse,
            ProbeResponse,
            StreamListResponse,
            DiscoverResponse,
            LineupEntry,
            LineupStatus,
            ErrorResponse,
        )
    ),
    tags(
        (name = "tuner", description = "HDHomeRun-compatible discovery and tune endpoints"),
        (name = "guide", description = "XMLTV guide and M3U playlist"),
        (name = "channels", description = "Lineup management endpoints"),
        (name = "streams", description = "Active viewer streams")
    ),
    info(
        title = "camtuner API",
        version = "0.1.0",
        description = "Virtual network tuner serving IP camera feeds as MPEG-TS channels",
        license(
            name = "MIT OR Apache-2.0"
        )
    )
)]
pub struct ApiDoc;
