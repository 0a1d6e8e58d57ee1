//! Channel registry.
//!
//! The registry is the ordered lineup of channel definitions. It is the only
//! shared mutable state in the tuner: operator edits and viewer tune requests
//! both go through it, serialized by a single lock.

mod reorder;

pub use reorder::reorder_channels;

use camtuner_types::{Channel, ChannelId, ProbeStatus};
use parking_lot::RwLock;
use std::sync::Arc;

/// Error type for registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Channel {0} already exists")]
    DuplicateId(ChannelId),

    #[error("Channel {0} not found")]
    NotFound(ChannelId),
}

pub type Result<T> = std::result::Result<T, RegistryError>;

/// Ordered, lock-guarded list of channels.
///
/// Cloning the registry yields another handle to the same lineup. Every
/// operation takes the lock exactly once, so a concurrent `list()` never sees
/// a half-applied mutation.
#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
    channels: Arc<RwLock<Vec<Channel>>>,
}

impl ChannelRegistry {
    /// Create a new empty channel registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with channels.
    ///
    /// Later duplicates of an already-seen channel number are dropped.
    pub fn with_channels(channels: Vec<Channel>) -> Self {
        let registry = Self::new();
        registry.replace_all(channels);
        registry
    }

    /// Append a channel to the end of the lineup.
    pub fn add(&self, channel: Channel) -> Result<()> {
        let mut channels = self.channels.write();
        if channels.iter().any(|c| c.id == channel.id) {
            return Err(RegistryError::DuplicateId(channel.id));
        }
        tracing::info!(channel_id = %channel.id, name = %channel.name, "Adding channel");
        channels.push(channel);
        Ok(())
    }

    /// Remove a channel, returning its definition.
    pub fn remove(&self, id: &str) -> Result<Channel> {
        let mut channels = self.channels.write();
        let index = channels
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        tracing::info!(channel_id = %id, "Removing channel");
        Ok(channels.remove(index))
    }

    /// Get a copy of a channel definition.
    pub fn get(&self, id: &str) -> Option<Channel> {
        self.channels.read().iter().find(|c| c.id == id).cloned()
    }

    /// Check if a channel number is in use.
    pub fn contains(&self, id: &str) -> bool {
        self.channels.read().iter().any(|c| c.id == id)
    }

    /// Snapshot of the lineup in operator order.
    pub fn list(&self) -> Vec<Channel> {
        self.channels.read().clone()
    }

    pub fn len(&self) -> usize {
        self.channels.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().is_empty()
    }

    /// Change a channel number.
    ///
    /// Setting a channel to its own number is a no-op.
    pub fn set_id(&self, old: &str, new: &str) -> Result<()> {
        let mut channels = self.channels.write();
        if old != new && channels.iter().any(|c| c.id == new) {
            return Err(RegistryError::DuplicateId(new.to_string()));
        }
        let channel = channels
            .iter_mut()
            .find(|c| c.id == old)
            .ok_or_else(|| RegistryError::NotFound(old.to_string()))?;
        if old != new {
            tracing::info!(old_id = %old, new_id = %new, "Renumbering channel");
            channel.id = new.to_string();
        }
        Ok(())
    }

    /// Apply an in-place edit to a channel.
    ///
    /// The edit cannot change the channel number; use [`Self::set_id`] for that.
    pub fn update<F>(&self, id: &str, edit: F) -> Result<Channel>
    where
        F: FnOnce(&mut Channel),
    {
        let mut channels = self.channels.write();
        let channel = channels
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        edit(channel);
        channel.id = id.to_string();
        Ok(channel.clone())
    }

    /// Record the outcome of a connectivity probe.
    pub fn set_status(&self, id: &str, status: ProbeStatus) -> Result<()> {
        self.update(id, |channel| channel.status = status)
            .map(|_| ())
    }

    /// Move the entry at `from` to `to`; see [`reorder_channels`]. Returns
    /// false (and changes nothing) when either index is out of range or both
    /// are equal.
    pub fn reorder(&self, from: usize, to: usize) -> bool {
        let mut channels = self.channels.write();
        let moved = reorder_channels(&mut channels, from, to);
        if moved {
            tracing::info!(from, to, "Reordered lineup");
        }
        moved
    }

    /// Replace the whole lineup (configuration load).
    pub fn replace_all(&self, channels: Vec<Channel>) -> usize {
        let mut unique: Vec<Channel> = Vec::with_capacity(channels.len());
        for mut channel in channels {
            if unique.iter().any(|c| c.id == channel.id) {
                tracing::warn!(channel_id = %channel.id, "Skipping duplicate channel number");
                continue;
            }
            channel.fill_defaults();
            unique.push(channel);
        }
        let count = unique.len();
        *self.channels.write() = unique;
        count
    }

    /// Next free channel number: one past the highest numeric id, or 101 for
    /// an empty lineup.
    pub fn next_id(&self) -> ChannelId {
        self.channels
            .read()
            .iter()
            .filter_map(|c| c.id.parse::<u64>().ok())
            .max()
            .map(|max| (max + 1).to_string())
            .unwrap_or_else(|| "101".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn cam(id: &str) -> Channel {
        Channel::new(id, format!("Cam {}", id), format!("rtsp://10.0.0.{}/live", id))
    }

    fn ids(registry: &ChannelRegistry) -> Vec<String> {
        registry.list().into_iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_add_and_get() {
        let registry = ChannelRegistry::new();
        registry.add(cam("101")).unwrap();

        let channel = registry.get("101").unwrap();
        assert_eq!(channel.name, "Cam 101");
        assert!(registry.get("102").is_none());
    }

    #[test]
    fn test_add_duplicate_fails() {
        let registry = ChannelRegistry::new();
        registry.add(cam("101")).unwrap();

        let err = registry.add(cam("101")).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateId("101".to_string()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove() {
        let registry = ChannelRegistry::with_channels(vec![cam("1"), cam("2"), cam("3")]);

        let removed = registry.remove("2").unwrap();
        assert_eq!(removed.id, "2");
        assert_eq!(ids(&registry), vec!["1", "3"]);
        assert_eq!(
            registry.remove("2").unwrap_err(),
            RegistryError::NotFound("2".to_string())
        );
    }

    #[test]
    fn test_set_id() {
        let registry = ChannelRegistry::with_channels(vec![cam("1"), cam("2")]);

        assert_eq!(
            registry.set_id("1", "2").unwrap_err(),
            RegistryError::DuplicateId("2".to_string())
        );
        registry.set_id("1", "1").unwrap();
        registry.set_id("1", "7").unwrap();

        assert_eq!(ids(&registry), vec!["7", "2"]);
        assert!(registry.get("7").is_some());
        assert!(registry.get("1").is_none());
        assert_eq!(
            registry.set_id("1", "9").unwrap_err(),
            RegistryError::NotFound("1".to_string())
        );
    }

    #[test]
    fn test_update_keeps_channel_number() {
        let registry = ChannelRegistry::with_channels(vec![cam("5")]);

        let updated = registry
            .update("5", |c| {
                c.name = "Garage".to_string();
                c.id = "6".to_string();
            })
            .unwrap();

        assert_eq!(updated.id, "5");
        assert_eq!(registry.get("5").unwrap().name, "Garage");
    }

    #[test]
    fn test_ids_stay_unique_over_operation_sequences() {
        let registry = ChannelRegistry::new();
        // Deterministic pseudo-random walk over add/set_id operations
        let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
        for _ in 0..500 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let a = (seed % 12).to_string();
            let b = ((seed >> 8) % 12).to_string();
            if seed % 2 == 0 {
                let _ = registry.add(cam(&a));
            } else {
                let _ = registry.set_id(&a, &b);
            }

            let all = ids(&registry);
            let unique: HashSet<_> = all.iter().collect();
            assert_eq!(all.len(), unique.len(), "duplicate ids in {:?}", all);
        }
    }

    #[test]
    fn test_replace_all_drops_duplicates() {
        let registry = ChannelRegistry::new();
        let mut nameless = cam("3");
        nameless.name.clear();

        let count = registry.replace_all(vec![cam("1"), cam("1"), nameless]);

        assert_eq!(count, 2);
        assert_eq!(ids(&registry), vec!["1", "3"]);
        assert_eq!(registry.get("3").unwrap().name, "Channel 3");
    }

    #[test]
    fn test_next_id() {
        let registry = ChannelRegistry::new();
        assert_eq!(registry.next_id(), "101");

        registry.add(cam("104")).unwrap();
        registry.add(cam("7")).unwrap();
        assert_eq!(registry.next_id(), "105");
    }

    #[test]
    fn test_set_status() {
        let registry = ChannelRegistry::with_channels(vec![cam("1")]);
        registry
            .set_status("1", ProbeStatus::ok("probe rtsp ok"))
            .unwrap();
        assert_eq!(registry.get("1").unwrap().status.detail, "probe rtsp ok");
    }

    #[test]
    fn test_concurrent_list_sees_whole_mutations() {
        let registry = ChannelRegistry::with_channels(vec![cam("1"), cam("2")]);
        let writer = {
            let registry = registry.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    let id = (100 + i).to_string();
                    registry.add(cam(&id)).unwrap();
                    registry.reorder(0, 1);
                    registry.remove(&id).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let snapshot = ids(&registry);
            let unique: HashSet<_> = snapshot.iter().collect();
            assert_eq!(snapshot.len(), unique.len());
            assert!(snapshot.len() == 2 || snapshot.len() == 3);
        }
        writer.join().unwrap();
        assert_eq!(registry.len(), 2);
    }
}
