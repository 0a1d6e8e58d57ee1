//! Source URL and credential handling.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use camtuner_types::{AuthMode, Channel, Transport};
use url::Url;

use super::spec::InputDescriptor;

/// Resolve the URL the transcoder should open for a channel.
///
/// Credentials are injected into the authority only for RTSP(S) URLs that do
/// not already embed credentials, and only when the channel defines a user
/// name or password. Everything else passes through unchanged.
pub fn authenticated_url(channel: &Channel) -> String {
    inject_credentials(&channel.url, &channel.username, &channel.password)
}

/// Insert percent-encoded `user:pass@` into the authority of an RTSP URL.
///
/// URLs that fail to parse are returned as given.
pub fn inject_credentials(url: &str, username: &str, password: &str) -> String {
    if username.is_empty() && password.is_empty() {
        return url.to_string();
    }
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    if !parsed.scheme().starts_with("rtsp")
        || !parsed.username().is_empty()
        || parsed.password().is_some()
    {
        return url.to_string();
    }

    let user = urlencoding::encode(username);
    let pass = urlencoding::encode(password);
    if parsed.set_username(&user).is_err() || parsed.set_password(Some(&pass)).is_err() {
        return url.to_string();
    }
    parsed.into()
}

/// `Authorization: Basic` header for channels using header authentication.
pub fn basic_auth_header(channel: &Channel) -> Option<String> {
    if channel.auth_mode != AuthMode::HeaderBasic {
        return None;
    }
    let token = STANDARD.encode(format!("{}:{}", channel.username, channel.password));
    Some(format!("Authorization: Basic {}", token))
}

/// Build the transcoder input for a single-source channel.
pub fn input_for_channel(channel: &Channel, user_agent: &str) -> InputDescriptor {
    let is_rtsp = channel.url.to_ascii_lowercase().starts_with("rtsp://");
    let rtsp_transport = match channel.transport {
        Transport::Auto => None,
        transport if is_rtsp => Some(transport),
        _ => None,
    };
    InputDescriptor {
        url: authenticated_url(channel),
        rtsp_transport,
        headers: basic_auth_header(channel),
        user_agent: user_agent.to_string(),
    }
}
