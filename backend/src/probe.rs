//! Connectivity check for channel sources.
//!
//! Runs the prober against a channel's source and reports `OK` or `Error`
//! with a short detail. RTSP sources are tried over TCP, then UDP. Mosaics
//! are checked through their first live member.

use camtuner_types::{Channel, ProbeStatus};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::pipeline::resolve_members;
use crate::pipeline::source::{authenticated_url, basic_auth_header};

/// Longest detail kept from prober diagnostics.
pub const MAX_DETAIL_CHARS: usize = 400;

#[derive(Debug, Clone)]
pub struct Prober {
    program: Option<PathBuf>,
    user_agent: String,
    timeout: Duration,
}

impl Prober {
    pub fn new(program: Option<PathBuf>, user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program,
            user_agent: user_agent.into(),
            timeout,
        }
    }

    /// Probe `channel`, resolving mosaic members against `snapshot`.
    pub async fn probe(&self, channel: &Channel, snapshot: &[Channel]) -> ProbeStatus {
        let Some(program) = &self.program else {
            return ProbeStatus::error("ffprobe not found");
        };

        let target = if channel.mosaic_sources.is_empty() {
            channel
        } else {
            resolve_members(channel, snapshot)
                .into_iter()
                .next()
                .unwrap_or(channel)
        };
        if target.stream_url().is_none() {
            return ProbeStatus::error("no stream source");
        }

        let url = authenticated_url(target);
        let headers = basic_auth_header(target);
        let is_rtsp = url.to_ascii_lowercase().starts_with("rtsp://");
        let mode = if !channel.mosaic_sources.is_empty() {
            "mosaic"
        } else if is_rtsp {
            "rtsp"
        } else {
            "http"
        };
        let transports: &[Option<&str>] = if is_rtsp {
            &[Some("tcp"), Some("udp")]
        } else {
            &[None]
        };

        let mut last_error = String::from("Unknown");
        for transport in transports {
            let args = probe_args(&url, *transport, headers.as_deref(), &self.user_agent);
            let label = transport.unwrap_or("http");
            debug!(channel_id = %channel.id, transport = label, "Probing source");

            let output = Command::new(program)
                .args(&args)
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .output();

            match tokio::time::timeout(self.timeout, output).await {
                Ok(Ok(output)) if output.status.success() => {
                    info!(channel_id = %channel.id, mode, "Probe succeeded");
                    return ProbeStatus::ok(format!("probe {} ok", mode));
                }
                Ok(Ok(output)) => {
                    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                    last_error = if stderr.is_empty() {
                        format!("probe {} failed", label)
                    } else {
                        stderr
                    };
                }
                Ok(Err(e)) => last_error = format!("failed to run prober: {}", e),
                Err(_) => last_error = format!("probe {} timeout", label),
            }
        }

        info!(channel_id = %channel.id, "Probe failed: {}", last_error);
        ProbeStatus::error(truncate_detail(&last_error))
    }
}

/// Prober arguments for one attempt.
pub fn probe_args(
    url: &str,
    transport: Option<&str>,
    headers: Option<&str>,
    user_agent: &str,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["-v".into(), "error".into(), "-user_agent".into(), user_agent.into()];
    if let Some(transport) = transport {
        args.push("-rtsp_transport".into());
        args.push(transport.into());
        if transport == "tcp" {
            args.push("-rtsp_flags".into());
            args.push("prefer_tcp".into());
        }
    }
    if let Some(headers) = headers {
        args.push("-headers".into());
        args.push(headers.into());
    }
    args.extend(
        ["-i", url, "-show_streams", "-select_streams", "v:0"]
            .into_iter()
            .map(String::from),
    );
    args
}

fn truncate_detail(detail: &str) -> String {
    detail.chars().take(MAX_DETAIL_CHARS).collect()
}
