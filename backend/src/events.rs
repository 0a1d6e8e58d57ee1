//! Lineup and stream notifications for operator clients.
//!
//! Every persisted edit, probe result and viewer lifecycle change is
//! published here. The `/api/events` SSE feed tags each frame with a topic
//! (`lineup`, `probe` or `stream`) so clients can refresh only the view that
//! changed.

use axum::response::sse::{Event, KeepAlive};
use axum::response::Sse;
use camtuner_types::TunerEvent;
use futures::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, warn};

/// Events buffered per subscriber before it is considered lagging.
const EVENT_BUFFER: usize = 256;

/// SSE topic of a frame telling a lagging client to refetch everything.
pub const RESYNC_TOPIC: &str = "resync";

/// SSE topic for an event.
pub fn topic(event: &TunerEvent) -> &'static str {
    match event {
        TunerEvent::ChannelCreated { .. }
        | TunerEvent::ChannelUpdated { .. }
        | TunerEvent::ChannelDeleted { .. }
        | TunerEvent::ChannelRenumbered { .. }
        | TunerEvent::ChannelsReordered { .. }
        | TunerEvent::LineupReplaced { .. } => "lineup",
        TunerEvent::ChannelProbed { .. } => "probe",
        TunerEvent::StreamStarted { .. }
        | TunerEvent::StreamRestarting { .. }
        | TunerEvent::StreamStopped { .. } => "stream",
        TunerEvent::Ping => "ping",
    }
}

/// Fan-out of [`TunerEvent`]s to SSE clients and in-process listeners.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: Arc<broadcast::Sender<TunerEvent>>,
}

impl EventBroadcaster {
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Publish an event. Nobody listening is not an error.
    pub fn broadcast(&self, event: TunerEvent) {
        debug!("Broadcasting event: {}", event.description());
        let _ = self.sender.send(event);
    }

    /// Raw receiver, for in-process consumers.
    pub fn receiver(&self) -> broadcast::Receiver<TunerEvent> {
        self.sender.subscribe()
    }

    /// SSE feed for one operator client.
    pub fn subscribe(&self) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
        Sse::new(self.frames()).keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(15))
                .text("keep-alive"),
        )
    }

    /// Tagged frames for one subscriber. A client that falls behind gets a
    /// single `resync` frame carrying the number of missed events instead of
    /// a silent gap.
    fn frames(&self) -> impl Stream<Item = Result<Event, Infallible>> {
        BroadcastStream::new(self.sender.subscribe()).filter_map(|result| match result {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(topic(&event)).data(json))),
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                    None
                }
            },
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                warn!(missed, "SSE client lagging, asking it to resync");
                Some(Ok(Event::default()
                    .event(RESYNC_TOPIC)
                    .data(missed.to_string())))
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(EVENT_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(id: &str) -> TunerEvent {
        TunerEvent::ChannelCreated {
            channel_id: id.to_string(),
        }
    }

    #[test]
    fn test_topics() {
        assert_eq!(topic(&created("101")), "lineup");
        assert_eq!(
            topic(&TunerEvent::ChannelsReordered { from: 0, to: 3 }),
            "lineup"
        );
        assert_eq!(
            topic(&TunerEvent::StreamRestarting {
                stream_id: 1,
                channel_id: "101".to_string(),
                delay_ms: 1000,
            }),
            "stream"
        );
    }

    #[tokio::test]
    async fn test_receivers_see_edits() {
        let broadcaster = EventBroadcaster::new(10);
        assert_eq!(broadcaster.subscriber_count(), 0);
        let _subscription = broadcaster.subscribe();
        let mut rx = broadcaster.receiver();
        assert_eq!(broadcaster.subscriber_count(), 2);

        broadcaster.broadcast(created("101"));

        match rx.recv().await.unwrap() {
            TunerEvent::ChannelCreated { channel_id } => assert_eq!(channel_id, "101"),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_lagging_client_gets_one_resync_frame() {
        let broadcaster = EventBroadcaster::new(2);
        let frames = broadcaster.frames();
        for i in 0..5 {
            broadcaster.broadcast(created(&i.to_string()));
        }

        // Three missed events collapse into one frame, then the two kept ones
        let received: Vec<_> = tokio::time::timeout(
            Duration::from_secs(2),
            frames.take(3).collect::<Vec<_>>(),
        )
        .await
        .unwrap();
        assert_eq!(received.len(), 3);
    }
}
