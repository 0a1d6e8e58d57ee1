//! camtuner backend library.
//!
//! This module exposes the application builder for use in tests.

use axum::http::{header, Method};
use axum::{
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

pub mod api;
pub mod config;
pub mod events;
pub mod guide;
pub mod openapi;
pub mod paths;
pub mod pipeline;
pub mod probe;
pub mod registry;
pub mod server;
pub mod state;
pub mod storage;
pub mod stream;
pub mod tools;

use state::AppState;

/// Create the Axum application router with a given state.
///
/// This function is used both by the main server binary and by integration tests.
pub fn create_app_with_state(state: AppState) -> Router {
    // Operator API
    let api_router = Router::new()
        .route(
            "/channels",
            get(api::channels::list_channels).post(api::channels::create_channel),
        )
        .route("/channels/mosaic", post(api::channels::create_mosaic))
        .route("/channels/reorder", post(api::channels::reorder_channels))
        .route(
            "/channels/{id}",
            get(api::channels::get_channel)
                .put(api::channels::update_channel)
                .delete(api::channels::delete_channel),
        )
        .route(
            "/channels/{id}/number",
            post(api::channels::set_channel_number),
        )
        .route("/channels/{id}/probe", post(api::channels::probe_channel))
        .route("/streams", get(api::streams::list_streams))
        .route("/streams/{id}", get(api::streams::get_stream))
        .route("/events", get(api::sse::events_stream));

    // Tuner surface expected by DVR clients, kept at the root
    let tuner_router = Router::new()
        .route("/discover.json", get(api::hdhr::discover))
        .route("/lineup.json", get(api::hdhr::lineup))
        .route("/lineup_status.json", get(api::hdhr::lineup_status))
        .route(
            "/auto/{tuner}",
            get(api::tune::stream_channel).head(api::tune::head_channel),
        )
        .route("/xmltv", get(api::guide::xmltv))
        .route("/m3u", get(api::guide::m3u));

    Router::new()
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi_json))
        .merge(tuner_router)
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_methods([
                    Method::GET,
                    Method::HEAD,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
                .allow_origin(Any),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "OK"
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(openapi::ApiDoc::openapi())
}
