//! Guide and playlist documents.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;

use super::base_url;
use crate::guide::{render_m3u, render_xmltv, GuideWindow};
use crate::state::AppState;

/// Raw query values; anything unparsable falls back to the defaults.
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
pub struct XmltvQuery {
    /// Look-ahead in hours (1-168, default 24)
    pub hours: Option<String>,
    /// Programme slot length in minutes (5-240, default 30)
    pub slot: Option<String>,
}

/// XMLTV guide with one synthetic programme per slot per channel.
#[utoipa::path(
    get,
    path = "/xmltv",
    tag = "guide",
    params(XmltvQuery),
    responses(
        (status = 200, description = "XMLTV document", content_type = "application/xml")
    )
)]
pub async fn xmltv(State(state): State<AppState>, Query(query): Query<XmltvQuery>) -> impl IntoResponse {
    let window = GuideWindow::from_query(query.hours.as_deref(), query.slot.as_deref());
    let body = render_xmltv(&state.registry().list(), Utc::now(), window);
    ([(header::CONTENT_TYPE, "application/xml; charset=utf-8")], body)
}

/// Extended M3U playlist of every channel.
#[utoipa::path(
    get,
    path = "/m3u",
    tag = "guide",
    responses(
        (status = 200, description = "M3U playlist", content_type = "application/x-mpegURL")
    )
)]
pub async fn m3u(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let base = base_url(&headers, state.server());
    let body = render_m3u(&state.registry().list(), &base);
    ([(header::CONTENT_TYPE, "application/x-mpegURL")], body)
}
