//! Application state management.

use crate::config::{Config, ServerSettings, StreamSettings, TranscoderSettings};
use crate::events::EventBroadcaster;
use crate::pipeline::PipelineBuilder;
use crate::probe::Prober;
use crate::registry::{ChannelRegistry, RegistryError};
use crate::storage::{JsonFileStorage, Storage, StorageError};
use crate::stream::{ActiveStream, ChannelLaunch, StreamError, StreamSupervisor};
use crate::tools::Executables;
use camtuner_types::{Channel, ChannelId, ProbeStatus, TunerEvent};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Error type for operator edits.
#[derive(Debug, thiserror::Error)]
pub enum ChannelOpError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("{0}")]
    Invalid(String),

    #[error("Failed to persist lineup: {0}")]
    Storage(#[from] StorageError),
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    server: ServerSettings,
    device_id: String,
    /// The lineup; the only shared mutable state
    registry: ChannelRegistry,
    storage: Arc<dyn Storage>,
    /// Held across snapshot and save so writes land in lineup order
    persist_lock: tokio::sync::Mutex<()>,
    builder: PipelineBuilder,
    supervisor: StreamSupervisor,
    prober: Prober,
    executables: Executables,
    events: EventBroadcaster,
}

impl AppState {
    /// Create new application state with the given storage backend.
    pub fn new(
        storage: impl Storage + 'static,
        server: ServerSettings,
        transcoder: &TranscoderSettings,
        stream: StreamSettings,
        executables: Executables,
    ) -> Self {
        let events = EventBroadcaster::default();
        let device_id = server
            .device_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(local_device_id);

        Self {
            inner: Arc::new(AppStateInner {
                builder: PipelineBuilder::new(&transcoder.user_agent, &server.name),
                prober: Prober::new(
                    executables.prober.clone(),
                    &transcoder.user_agent,
                    transcoder.probe_timeout(),
                ),
                supervisor: StreamSupervisor::new(stream, events.clone()),
                server,
                device_id,
                registry: ChannelRegistry::new(),
                storage: Arc::new(storage),
                persist_lock: tokio::sync::Mutex::new(()),
                executables,
                events,
            }),
        }
    }

    /// Create application state from configuration, with JSON file storage
    /// and executables discovered on this machine.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            JsonFileStorage::new(&config.channels_path),
            config.server.clone(),
            &config.transcoder,
            config.stream.clone(),
            Executables::discover(&config.transcoder),
        )
    }

    pub fn registry(&self) -> &ChannelRegistry {
        &self.inner.registry
    }

    /// Get the event broadcaster.
    pub fn events(&self) -> &EventBroadcaster {
        &self.inner.events
    }

    pub fn supervisor(&self) -> &StreamSupervisor {
        &self.inner.supervisor
    }

    pub fn server(&self) -> &ServerSettings {
        &self.inner.server
    }

    pub fn executables(&self) -> &Executables {
        &self.inner.executables
    }

    /// Eight upper-case hex digits identifying this tuner.
    pub fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    /// Load the lineup from storage into the registry.
    pub async fn load_from_storage(&self) -> anyhow::Result<usize> {
        info!("Loading channels from storage...");
        let channels = self.inner.storage.load_all().await.map_err(|e| {
            error!("Failed to load channels from storage: {}", e);
            e
        })?;
        let count = self.inner.registry.replace_all(channels);
        info!("Loaded {} channels", count);
        self.inner
            .events
            .broadcast(TunerEvent::LineupReplaced { count });
        Ok(count)
    }

    /// Write the current lineup to storage.
    async fn persist(&self) -> Result<(), StorageError> {
        let _guard = self.inner.persist_lock.lock().await;
        let channels = self.inner.registry.list();
        self.inner.storage.save_all(&channels).await.map_err(|e| {
            error!("Failed to save channels to storage: {}", e);
            e
        })
    }

    /// Add a channel to the end of the lineup.
    pub async fn create_channel(&self, channel: Channel) -> Result<Channel, ChannelOpError> {
        let channel_id = channel.id.clone();
        self.inner.registry.add(channel.clone())?;
        self.persist().await?;
        self.inner
            .events
            .broadcast(TunerEvent::ChannelCreated { channel_id });
        Ok(channel)
    }

    /// Edit a channel in place. The channel number cannot change here.
    pub async fn update_channel<F>(&self, id: &str, edit: F) -> Result<Channel, ChannelOpError>
    where
        F: FnOnce(&mut Channel),
    {
        let channel = self.inner.registry.update(id, edit)?;
        self.persist().await?;
        self.inner.events.broadcast(TunerEvent::ChannelUpdated {
            channel_id: channel.id.clone(),
        });
        Ok(channel)
    }

    /// Remove a channel. Viewers already tuned to it keep their stream.
    pub async fn delete_channel(&self, id: &str) -> Result<Channel, ChannelOpError> {
        let channel = self.inner.registry.remove(id)?;
        self.persist().await?;
        self.inner.events.broadcast(TunerEvent::ChannelDeleted {
            channel_id: channel.id.clone(),
        });
        Ok(channel)
    }

    /// Change a channel number.
    pub async fn renumber_channel(&self, old: &str, new: &str) -> Result<(), ChannelOpError> {
        self.inner.registry.set_id(old, new)?;
        if old != new {
            self.persist().await?;
            self.inner.events.broadcast(TunerEvent::ChannelRenumbered {
                old_id: old.to_string(),
                new_id: new.to_string(),
            });
        }
        Ok(())
    }

    /// Move a lineup entry. Returns false when nothing moved.
    pub async fn reorder_channels(&self, from: usize, to: usize) -> Result<bool, ChannelOpError> {
        if !self.inner.registry.reorder(from, to) {
            return Ok(false);
        }
        self.persist().await?;
        self.inner
            .events
            .broadcast(TunerEvent::ChannelsReordered { from, to });
        Ok(true)
    }

    /// Probe a channel's source and record the outcome on the channel.
    pub async fn probe_channel(&self, id: &str) -> Result<ProbeStatus, RegistryError> {
        let snapshot = self.inner.registry.list();
        let channel = snapshot
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;

        let status = self.inner.prober.probe(channel, &snapshot).await;

        // The channel may have been removed or renumbered while probing
        if let Err(e) = self.inner.registry.set_status(id, status.clone()) {
            warn!("Probe result for channel {} dropped: {}", id, e);
        }
        self.inner.events.broadcast(TunerEvent::ChannelProbed {
            channel_id: id.to_string(),
            state: status.state,
            detail: status.detail.clone(),
        });
        Ok(status)
    }

    /// Start an independent pipeline for one viewer of `id`.
    pub fn tune(&self, id: &str) -> Result<ActiveStream, StreamError> {
        let channel = self
            .inner
            .registry
            .get(id)
            .ok_or_else(|| StreamError::NotFound(id.to_string()))?;
        let launch = ChannelLaunch::new(
            channel,
            self.inner.registry.clone(),
            self.inner.builder.clone(),
            self.inner.executables.transcoder.clone(),
        );
        self.inner.supervisor.open(id, launch)
    }

    /// Next free channel number.
    pub fn next_channel_id(&self) -> ChannelId {
        self.inner.registry.next_id()
    }

    /// Stop every active stream and wait for their pipelines to exit.
    pub async fn shutdown(&self) {
        self.inner.supervisor.shutdown().await;
    }
}

/// Device id derived from a host name: the low 32 bits of the name-based
/// (DNS namespace) UUID.
pub fn device_id_for_host(host: &str) -> String {
    let uuid = Uuid::new_v5(&Uuid::NAMESPACE_DNS, host.as_bytes());
    format!("{:08X}", uuid.as_u128() & 0xFFFF_FFFF)
}

fn local_device_id() -> String {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|e| {
            warn!("Could not read host name, using localhost: {}", e);
            "localhost".to_string()
        });
    device_id_for_host(&host)
}
