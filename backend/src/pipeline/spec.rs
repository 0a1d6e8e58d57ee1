//! Typed transcoder invocation.
//!
//! A [`PipelineSpec`] describes one transcoder run as inputs, an optional
//! composite filter graph and an MPEG-TS output. It is only flattened into an
//! argument vector by [`PipelineSpec::to_args`] when a process is spawned.

use camtuner_types::Transport;
use std::path::PathBuf;

/// Flags placed before any input.
const GLOBAL_ARGS: [&str; 3] = ["-nostats", "-loglevel", "error"];

/// One transcoder input.
#[derive(Debug, Clone, PartialEq)]
pub struct InputDescriptor {
    /// Source URL with credentials already applied
    pub url: String,
    /// RTSP transport override (only set for `rtsp://` sources)
    pub rtsp_transport: Option<Transport>,
    /// Extra request headers, CRLF separated
    pub headers: Option<String>,
    pub user_agent: String,
}

impl InputDescriptor {
    fn push_args(&self, args: &mut Vec<String>) {
        match self.rtsp_transport {
            Some(Transport::Tcp) => args.extend(
                ["-rtsp_transport", "tcp", "-rtsp_flags", "prefer_tcp"].map(String::from),
            ),
            Some(Transport::Udp) => args.extend(["-rtsp_transport", "udp"].map(String::from)),
            Some(Transport::Auto) | None => {}
        }
        args.extend(
            [
                "-fflags",
                "nobuffer",
                "-flags",
                "low_delay",
                "-analyzeduration",
                "100000",
                "-probesize",
                "32768",
                "-user_agent",
            ]
            .map(String::from),
        );
        args.push(self.user_agent.clone());
        if let Some(headers) = &self.headers {
            args.push("-headers".to_string());
            args.push(headers.clone());
        }
        args.push("-i".to_string());
        args.push(self.url.clone());
    }
}

/// One `[in]filter,filter[out]` chain of a filter graph.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChain {
    pub inputs: Vec<String>,
    pub filters: Vec<String>,
    pub output: String,
}

impl std::fmt::Display for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for input in &self.inputs {
            write!(f, "[{}]", input)?;
        }
        write!(f, "{}[{}]", self.filters.join(","), self.output)
    }
}

/// Composite filter graph (`-filter_complex`).
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    pub chains: Vec<FilterChain>,
    /// Label of the composited video output
    pub video_out: String,
}

impl std::fmt::Display for FilterGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let chains: Vec<String> = self.chains.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", chains.join(";"))
    }
}

/// Video handling of the output.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoCodec {
    /// Pass the source bitstream through, applying bitstream filters
    Copy { bitstream_filters: Vec<String> },
    /// Re-encode with libx264
    X264 {
        preset: String,
        tune: String,
        keyframe_interval: u32,
        pixel_format: String,
    },
}

impl VideoCodec {
    /// Copy H.264 and convert to Annex B with access unit delimiters inserted.
    pub fn passthrough() -> Self {
        Self::Copy {
            bitstream_filters: vec![
                "h264_mp4toannexb".to_string(),
                "h264_metadata=aud=insert".to_string(),
            ],
        }
    }

    /// Low-latency encode used for composites.
    pub fn low_latency() -> Self {
        Self::X264 {
            preset: "veryfast".to_string(),
            tune: "zerolatency".to_string(),
            keyframe_interval: 60,
            pixel_format: "yuv420p".to_string(),
        }
    }

    fn push_args(&self, args: &mut Vec<String>) {
        match self {
            Self::Copy { bitstream_filters } => {
                args.extend(["-c:v", "copy"].map(String::from));
                if !bitstream_filters.is_empty() {
                    args.push("-bsf:v".to_string());
                    args.push(bitstream_filters.join(","));
                }
            }
            Self::X264 {
                preset,
                tune,
                keyframe_interval,
                pixel_format,
            } => {
                args.extend(["-c:v", "libx264", "-preset"].map(String::from));
                args.push(preset.clone());
                args.push("-tune".to_string());
                args.push(tune.clone());
                args.push("-g".to_string());
                args.push(keyframe_interval.to_string());
                args.push("-keyint_min".to_string());
                args.push(keyframe_interval.to_string());
                args.push("-pix_fmt".to_string());
                args.push(pixel_format.clone());
            }
        }
    }
}

/// Audio handling of the output.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCodec {
    Copy,
    Aac {
        sample_rate: u32,
        channels: u8,
        bitrate: String,
    },
}

impl AudioCodec {
    /// Stereo AAC at 44.1 kHz / 128 kbit/s, or copy.
    pub fn for_policy(transcode: bool) -> Self {
        if transcode {
            Self::Aac {
                sample_rate: 44_100,
                channels: 2,
                bitrate: "128k".to_string(),
            }
        } else {
            Self::Copy
        }
    }

    fn push_args(&self, args: &mut Vec<String>) {
        match self {
            Self::Copy => args.extend(["-c:a", "copy"].map(String::from)),
            Self::Aac {
                sample_rate,
                channels,
                bitrate,
            } => {
                args.extend(["-c:a", "aac", "-ar"].map(String::from));
                args.push(sample_rate.to_string());
                args.push("-ac".to_string());
                args.push(channels.to_string());
                args.push("-b:a".to_string());
                args.push(bitrate.clone());
            }
        }
    }
}

/// MPEG-TS muxer settings.
#[derive(Debug, Clone, PartialEq)]
pub struct MuxerSettings {
    /// `-mpegts_flags` value
    pub flags: String,
    /// Seconds between PAT/PMT repeats
    pub pat_period: f32,
    pub service_provider: String,
    pub service_name: String,
}

impl MuxerSettings {
    /// Restart-tolerant settings: discontinuity flagged on the first packet and
    /// headers resent, so a receiver picks the stream back up after a respawn.
    pub fn restart_tolerant(
        service_provider: impl Into<String>,
        service_name: impl Into<String>,
    ) -> Self {
        Self {
            flags: "+initial_discontinuity+resend_headers".to_string(),
            pat_period: 0.2,
            service_provider: service_provider.into(),
            service_name: service_name.into(),
        }
    }
}

/// The single output of a pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDescriptor {
    /// `-map` selectors in order
    pub maps: Vec<String>,
    pub video: VideoCodec,
    pub audio: AudioCodec,
    pub max_muxing_queue_size: Option<u32>,
    pub muxer: MuxerSettings,
}

impl OutputDescriptor {
    fn push_args(&self, args: &mut Vec<String>) {
        for map in &self.maps {
            args.push("-map".to_string());
            args.push(map.clone());
        }
        self.video.push_args(args);
        self.audio.push_args(args);
        if let Some(size) = self.max_muxing_queue_size {
            args.push("-max_muxing_queue_size".to_string());
            args.push(size.to_string());
        }
        args.extend(
            [
                "-flush_packets",
                "1",
                "-muxpreload",
                "0",
                "-muxdelay",
                "0",
                "-mpegts_flags",
            ]
            .map(String::from),
        );
        args.push(self.muxer.flags.clone());
        args.push("-pat_period".to_string());
        args.push(self.muxer.pat_period.to_string());
        args.push("-metadata".to_string());
        args.push(format!("service_provider={}", self.muxer.service_provider));
        args.push("-metadata".to_string());
        args.push(format!("service_name={}", self.muxer.service_name));
        args.extend(["-f", "mpegts", "pipe:1"].map(String::from));
    }
}

/// Complete description of one transcoder run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSpec {
    pub inputs: Vec<InputDescriptor>,
    pub filter_graph: Option<FilterGraph>,
    pub output: OutputDescriptor,
}

impl PipelineSpec {
    /// True when several inputs are composited into one picture.
    pub fn is_composite(&self) -> bool {
        self.filter_graph.is_some()
    }

    /// Flatten into transcoder arguments (program name excluded).
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = GLOBAL_ARGS.iter().map(|a| a.to_string()).collect();
        for input in &self.inputs {
            input.push_args(&mut args);
        }
        if let Some(graph) = &self.filter_graph {
            args.push("-filter_complex".to_string());
            args.push(graph.to_string());
        }
        self.output.push_args(&mut args);
        args
    }

    /// Bind the spec to a transcoder executable.
    pub fn into_launch(self, program: impl Into<PathBuf>) -> LaunchCommand {
        LaunchCommand {
            program: program.into(),
            args: self.to_args(),
        }
    }
}

/// Program plus argument vector, ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl LaunchCommand {
    pub fn new(program: impl Into<PathBuf>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_chain_display() {
        let chain = FilterChain {
            inputs: vec!["v0".into(), "v1".into()],
            filters: vec!["xstack=inputs=2".into()],
            output: "vout".into(),
        };
        assert_eq!(chain.to_string(), "[v0][v1]xstack=inputs=2[vout]");
    }

    #[test]
    fn test_input_args_order() {
        let input = InputDescriptor {
            url: "rtsp://cam/live".into(),
            rtsp_transport: Some(Transport::Udp),
            headers: Some("Authorization: Basic dTpw".into()),
            user_agent: "ua".into(),
        };
        let mut args = Vec::new();
        input.push_args(&mut args);

        assert_eq!(&args[..2], ["-rtsp_transport", "udp"]);
        let headers = args.iter().position(|a| a == "-headers").unwrap();
        let url = args.iter().position(|a| a == "-i").unwrap();
        assert!(headers < url);
        assert_eq!(args.last().unwrap(), "rtsp://cam/live");
    }

    #[test]
    fn test_output_ends_with_pipe() {
        let output = OutputDescriptor {
            maps: vec!["0:v:0".into()],
            video: VideoCodec::passthrough(),
            audio: AudioCodec::Copy,
            max_muxing_queue_size: None,
            muxer: MuxerSettings::restart_tolerant("Prov", "Svc"),
        };
        let mut args = Vec::new();
        output.push_args(&mut args);

        assert_eq!(&args[args.len() - 3..], ["-f", "mpegts", "pipe:1"]);
        assert!(args.contains(&"h264_mp4toannexb,h264_metadata=aud=insert".to_string()));
        assert!(args.contains(&"0.2".to_string()));
        assert!(args.contains(&"service_name=Svc".to_string()));
    }
}
