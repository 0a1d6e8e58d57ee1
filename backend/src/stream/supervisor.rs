//! Active stream supervision.
//!
//! Every tune request gets its own pipeline process and relay task. The relay
//! reads the process output in chunks and forwards them through a bounded
//! queue to the viewer's [`ActiveStream`]. When the output ends the process is
//! torn down and respawned after a [`RestartBackoff`] delay, for as long as
//! the viewer stays connected. Dropping the [`ActiveStream`] cancels the relay,
//! which interrupts the process and kills it if it does not exit in time.

use bytes::Bytes;
use camtuner_types::{Channel, ChannelId, StreamId, StreamInfo, StreamState, TunerEvent};
use futures::Stream;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::backoff::RestartBackoff;
use super::process::{PipelineProcess, StderrLog};
use super::StreamError;
use crate::config::StreamSettings;
use crate::events::EventBroadcaster;
use crate::pipeline::{LaunchCommand, PipelineBuilder};
use crate::registry::ChannelRegistry;

/// Diagnostic lines retained per stream.
const STDERR_LINES: usize = 32;

/// Consecutive empty attempts between error reports.
const EMPTY_ATTEMPTS_PER_REPORT: u32 = 5;

/// Produces the command for each (re)spawn of a stream's pipeline.
pub trait LaunchSource: Send + Sync + 'static {
    fn launch(&self) -> Result<LaunchCommand, StreamError>;
}

impl LaunchSource for LaunchCommand {
    fn launch(&self) -> Result<LaunchCommand, StreamError> {
        Ok(self.clone())
    }
}

/// Pipeline of a tuned channel.
///
/// The channel definition is the one seen at tune time. Mosaic members are
/// resolved against the current lineup on every spawn.
pub struct ChannelLaunch {
    channel: Channel,
    registry: ChannelRegistry,
    builder: PipelineBuilder,
    transcoder: Option<PathBuf>,
}

impl ChannelLaunch {
    pub fn new(
        channel: Channel,
        registry: ChannelRegistry,
        builder: PipelineBuilder,
        transcoder: Option<PathBuf>,
    ) -> Self {
        Self {
            channel,
            registry,
            builder,
            transcoder,
        }
    }
}

impl LaunchSource for ChannelLaunch {
    fn launch(&self) -> Result<LaunchCommand, StreamError> {
        let snapshot = self.registry.list();
        let spec = self.builder.build(&self.channel, &snapshot)?;
        let program = self
            .transcoder
            .clone()
            .ok_or_else(StreamError::transcoder_missing)?;
        Ok(spec.into_launch(program))
    }
}

/// Owns every active stream.
pub struct StreamSupervisor {
    settings: StreamSettings,
    events: EventBroadcaster,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    next_id: AtomicU64,
    streams: Arc<Mutex<HashMap<StreamId, StreamInfo>>>,
}

impl StreamSupervisor {
    pub fn new(settings: StreamSettings, events: EventBroadcaster) -> Self {
        Self {
            settings,
            events,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            next_id: AtomicU64::new(1),
            streams: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start a pipeline for one viewer.
    ///
    /// The first spawn happens before this returns; if it fails the error is
    /// returned and nothing keeps running. Later failures are retried by the
    /// relay task until the viewer goes away.
    pub fn open<S: LaunchSource>(
        &self,
        channel_id: &str,
        source: S,
    ) -> Result<ActiveStream, StreamError> {
        if self.shutdown.is_cancelled() {
            return Err(StreamError::ShuttingDown);
        }

        let command = source.launch()?;
        let log = StderrLog::new(STDERR_LINES);
        let process = PipelineProcess::spawn(&command, channel_id, log.clone())?;

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let info = StreamInfo {
            id,
            channel_id: channel_id.to_string(),
            state: StreamState::Streaming,
            pid: process.pid(),
            restarts: 0,
            bytes_relayed: 0,
            started_at: unix_now(),
        };
        self.streams.lock().insert(id, info);
        info!(stream_id = id, channel_id = %channel_id, pid = process.pid(), "Stream started");
        self.events.broadcast(TunerEvent::StreamStarted {
            stream_id: id,
            channel_id: channel_id.to_string(),
        });

        let (tx, rx) = mpsc::channel(self.settings.buffer_chunks.max(1));
        let cancel = self.shutdown.child_token();
        let relay = Relay {
            id,
            channel_id: channel_id.to_string(),
            source,
            settings: self.settings.clone(),
            log,
            streams: self.streams.clone(),
            events: self.events.clone(),
            cancel: cancel.clone(),
            tx,
        };
        self.tracker.spawn(relay.run(process));

        Ok(ActiveStream {
            id,
            rx,
            _guard: cancel.drop_guard(),
        })
    }

    /// Snapshot of all active streams, oldest first.
    pub fn list(&self) -> Vec<StreamInfo> {
        let mut streams: Vec<StreamInfo> = self.streams.lock().values().cloned().collect();
        streams.sort_by_key(|s| s.id);
        streams
    }

    pub fn get(&self, id: StreamId) -> Option<StreamInfo> {
        self.streams.lock().get(&id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.streams.lock().len()
    }

    /// Cancel every active stream and wait until all pipelines are gone.
    pub async fn shutdown(&self) {
        info!(active = self.active_count(), "Stopping all streams");
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        debug!("All streams stopped");
    }
}

/// A viewer's live byte stream. Dropping it stops the pipeline.
pub struct ActiveStream {
    id: StreamId,
    rx: mpsc::Receiver<Bytes>,
    _guard: DropGuard,
}

impl ActiveStream {
    pub fn id(&self) -> StreamId {
        self.id
    }
}

impl Stream for ActiveStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx).map(|chunk| chunk.map(Ok))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PumpEnd {
    /// The process closed its output
    OutputClosed,
    /// The viewer left or the server is stopping
    Detached,
}

/// Relay task state for one active stream.
struct Relay<S> {
    id: StreamId,
    channel_id: ChannelId,
    source: S,
    settings: StreamSettings,
    log: StderrLog,
    streams: Arc<Mutex<HashMap<StreamId, StreamInfo>>>,
    events: EventBroadcaster,
    cancel: CancellationToken,
    tx: mpsc::Sender<Bytes>,
}

impl<S: LaunchSource> Relay<S> {
    async fn run(self, first: PipelineProcess) {
        let grace = self.settings.teardown_grace();
        let mut backoff = RestartBackoff::from_settings(&self.settings);
        let mut buf = vec![0u8; self.settings.chunk_size.max(1)];
        let mut empty_attempts: u32 = 0;
        let mut current = Some(first);

        loop {
            let relayed = match current.take() {
                Some(mut process) => {
                    let pid = process.pid();
                    self.update(|info| {
                        info.state = StreamState::Streaming;
                        info.pid = pid;
                    });

                    let (bytes, end) = self.pump(&mut process, &mut buf).await;
                    if end == PumpEnd::Detached || self.viewer_gone() {
                        self.update(|info| info.state = StreamState::Draining);
                        let teardown = process.terminate(grace).await;
                        debug!(stream_id = self.id, ?teardown, "Pipeline torn down");
                        break;
                    }

                    process.terminate(grace).await;
                    debug!(
                        stream_id = self.id,
                        channel_id = %self.channel_id,
                        bytes,
                        "{}",
                        StreamError::Interrupted
                    );
                    bytes > 0
                }
                None => false,
            };

            if relayed {
                empty_attempts = 0;
            } else {
                empty_attempts += 1;
                if empty_attempts % EMPTY_ATTEMPTS_PER_REPORT == 0 {
                    error!(
                        stream_id = self.id,
                        channel_id = %self.channel_id,
                        attempts = empty_attempts,
                        last_error = ?self.log.last(),
                        "Pipeline keeps ending without output"
                    );
                }
            }

            let delay = backoff.next_delay(relayed);
            let delay_ms = delay.as_millis() as u64;
            self.update(|info| {
                info.state = StreamState::Restarting;
                info.pid = None;
                info.restarts += 1;
            });
            info!(
                stream_id = self.id,
                channel_id = %self.channel_id,
                delay_ms,
                last_error = ?self.log.last(),
                "Pipeline ended, restarting"
            );
            self.events.broadcast(TunerEvent::StreamRestarting {
                stream_id: self.id,
                channel_id: self.channel_id.clone(),
                delay_ms,
            });

            let resume = tokio::select! {
                _ = self.cancel.cancelled() => false,
                _ = self.tx.closed() => false,
                _ = tokio::time::sleep(delay) => true,
            };
            if !resume {
                break;
            }

            self.update(|info| info.state = StreamState::Spawning);
            match self.source.launch().and_then(|command| {
                PipelineProcess::spawn(&command, &self.channel_id, self.log.clone())
            }) {
                Ok(process) => current = Some(process),
                Err(e) => warn!(
                    stream_id = self.id,
                    channel_id = %self.channel_id,
                    "Failed to respawn pipeline: {}",
                    e
                ),
            }
        }

        self.streams.lock().remove(&self.id);
        info!(stream_id = self.id, channel_id = %self.channel_id, "Stream stopped");
        self.events.broadcast(TunerEvent::StreamStopped {
            stream_id: self.id,
            channel_id: self.channel_id.clone(),
        });
    }

    /// Forward output until it ends or the viewer leaves. Returns the bytes
    /// relayed in this attempt.
    async fn pump(&self, process: &mut PipelineProcess, buf: &mut [u8]) -> (u64, PumpEnd) {
        let mut relayed: u64 = 0;
        loop {
            let read = tokio::select! {
                _ = self.cancel.cancelled() => return (relayed, PumpEnd::Detached),
                read = process.read_chunk(buf) => read,
            };
            let n = match read {
                Ok(0) => return (relayed, PumpEnd::OutputClosed),
                Ok(n) => n,
                Err(e) => {
                    warn!(stream_id = self.id, "Failed to read pipeline output: {}", e);
                    return (relayed, PumpEnd::OutputClosed);
                }
            };

            let chunk = Bytes::copy_from_slice(&buf[..n]);
            let sent = tokio::select! {
                _ = self.cancel.cancelled() => false,
                sent = self.tx.send(chunk) => sent.is_ok(),
            };
            if !sent {
                return (relayed, PumpEnd::Detached);
            }
            relayed += n as u64;
            self.update(|info| info.bytes_relayed += n as u64);
        }
    }

    fn viewer_gone(&self) -> bool {
        self.cancel.is_cancelled() || self.tx.is_closed()
    }

    fn update(&self, edit: impl FnOnce(&mut StreamInfo)) {
        if let Some(info) = self.streams.lock().get_mut(&self.id) {
            edit(info);
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::atomic::AtomicUsize;
    use std::time::{Duration, Instant};

    fn fast_settings() -> StreamSettings {
        StreamSettings {
            chunk_size: 1316,
            backoff_floor_ms: 20,
            backoff_cap_ms: 100,
            backoff_factor: 1.7,
            teardown_grace_ms: 300,
            buffer_chunks: 4,
        }
    }

    fn supervisor() -> StreamSupervisor {
        StreamSupervisor::new(fast_settings(), EventBroadcaster::default())
    }

    fn sh(script: &str) -> LaunchCommand {
        LaunchCommand::new("/bin/sh", ["-c", script])
    }

    fn is_running(pid: u32) -> bool {
        // SAFETY: signal 0 only checks for existence.
        unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
    }

    async fn wait_until_idle(supervisor: &StreamSupervisor, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            if supervisor.active_count() == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_relays_output_across_restarts() {
        let supervisor = supervisor();
        let mut stream = supervisor.open("1", sh("printf abc")).unwrap();

        let mut received = Vec::new();
        while received.len() < 9 {
            let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("stream stalled")
                .expect("stream ended")
                .unwrap();
            received.extend_from_slice(&chunk);
        }

        assert_eq!(&received[..9], b"abcabcabc");
        let info = supervisor.get(stream.id()).unwrap();
        assert!(info.restarts >= 2);
        assert!(info.bytes_relayed >= 9);
        assert_eq!(info.channel_id, "1");
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported_to_caller() {
        let supervisor = supervisor();
        let result = supervisor.open("1", LaunchCommand::new("/nonexistent/ffmpeg", ["-i", "x"]));

        assert!(matches!(result, Err(StreamError::Spawn { .. })));
        assert_eq!(supervisor.active_count(), 0);
    }

    #[tokio::test]
    async fn test_unresolvable_channel_is_not_spawned() {
        let supervisor = supervisor();
        let registry = ChannelRegistry::new();
        let grid = Channel::mosaic("200", "Grid", vec!["1".into(), "2".into()], true);
        let launch = ChannelLaunch::new(
            grid,
            registry,
            PipelineBuilder::new("ua", "CamIPTV"),
            Some(PathBuf::from("/bin/true")),
        );

        let result = supervisor.open("200", launch);
        assert!(matches!(result, Err(StreamError::Unresolvable(id)) if id == "200"));
        assert_eq!(supervisor.active_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_transcoder_is_a_spawn_error() {
        let supervisor = supervisor();
        let registry = ChannelRegistry::new();
        let launch = ChannelLaunch::new(
            Channel::new("1", "Door", "rtsp://10.0.0.1/live"),
            registry,
            PipelineBuilder::new("ua", "CamIPTV"),
            None,
        );

        assert!(matches!(
            supervisor.open("1", launch),
            Err(StreamError::Spawn { .. })
        ));
    }

    #[tokio::test]
    async fn test_disconnect_tears_down_pipeline() {
        let supervisor = supervisor();
        let stream = supervisor.open("1", sh("exec sleep 30")).unwrap();
        let pid = supervisor.get(stream.id()).unwrap().pid.unwrap();
        assert!(is_running(pid));

        drop(stream);

        assert!(wait_until_idle(&supervisor, Duration::from_secs(3)).await);
        assert!(!is_running(pid));
    }

    #[tokio::test]
    async fn test_disconnect_kills_hung_pipeline() {
        let supervisor = supervisor();
        let stream = supervisor
            .open("1", sh("trap '' INT; while true; do sleep 1; done"))
            .unwrap();
        let pid = supervisor.get(stream.id()).unwrap().pid.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        drop(stream);

        assert!(wait_until_idle(&supervisor, Duration::from_secs(3)).await);
        assert!(!is_running(pid));
    }

    #[tokio::test]
    async fn test_streams_are_independent() {
        let supervisor = supervisor();
        let first = supervisor.open("1", sh("exec sleep 30")).unwrap();
        let second = supervisor.open("1", sh("exec sleep 30")).unwrap();
        let second_pid = supervisor.get(second.id()).unwrap().pid.unwrap();
        assert_ne!(first.id(), second.id());

        drop(first);
        let deadline = Instant::now() + Duration::from_secs(3);
        while supervisor.active_count() > 1 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        assert_eq!(supervisor.active_count(), 1);
        assert!(is_running(second_pid));
        drop(second);
        assert!(wait_until_idle(&supervisor, Duration::from_secs(3)).await);
    }

    #[tokio::test]
    async fn test_shutdown_stops_everything() {
        let supervisor = supervisor();
        let a = supervisor.open("1", sh("exec sleep 30")).unwrap();
        let b = supervisor.open("2", sh("exec sleep 30")).unwrap();
        let pids: Vec<u32> = supervisor.list().iter().filter_map(|s| s.pid).collect();
        assert_eq!(pids.len(), 2);

        tokio::time::timeout(Duration::from_secs(5), supervisor.shutdown())
            .await
            .expect("shutdown hung");

        assert_eq!(supervisor.active_count(), 0);
        for pid in pids {
            assert!(!is_running(pid));
        }
        assert!(matches!(
            supervisor.open("3", sh("exec sleep 30")),
            Err(StreamError::ShuttingDown)
        ));
        drop((a, b));
    }

    /// Succeeds on the first launch, then fails every other attempt.
    struct Flaky {
        calls: AtomicUsize,
    }

    impl LaunchSource for Flaky {
        fn launch(&self) -> Result<LaunchCommand, StreamError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call % 2 == 1 {
                Err(StreamError::Unresolvable("9".to_string()))
            } else {
                Ok(LaunchCommand::new("/bin/sh", ["-c", "printf z"]))
            }
        }
    }

    #[tokio::test]
    async fn test_respawn_failures_are_retried() {
        let supervisor = supervisor();
        let mut stream = supervisor
            .open(
                "9",
                Flaky {
                    calls: AtomicUsize::new(0),
                },
            )
            .unwrap();

        let mut received = Vec::new();
        while received.len() < 3 {
            let chunk = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("stream stalled")
                .expect("stream ended")
                .unwrap();
            received.extend_from_slice(&chunk);
        }
        assert_eq!(&received[..3], b"zzz");
    }

    #[tokio::test]
    async fn test_lifecycle_events() {
        let events = EventBroadcaster::default();
        let mut rx = events.receiver();
        let supervisor = StreamSupervisor::new(fast_settings(), events);

        let stream = supervisor.open("5", sh("exec sleep 30")).unwrap();
        let id = stream.id();
        drop(stream);

        let mut started = false;
        let mut stopped = false;
        while !stopped {
            let event = tokio::time::timeout(Duration::from_secs(3), rx.recv())
                .await
                .expect("no event")
                .unwrap();
            match event {
                TunerEvent::StreamStarted { stream_id, .. } if stream_id == id => started = true,
                TunerEvent::StreamStopped { stream_id, .. } if stream_id == id => stopped = true,
                _ => {}
            }
        }
        assert!(started);
    }
}
