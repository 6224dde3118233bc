//! In-memory device registry.
//!
//! Insertion order is part of the contract: listings always come back in
//! the order devices were first seen, and a full resync preserves the
//! positions of survivors while appending newcomers at the end.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tokio::sync::watch;

use crate::model::Device;

pub struct DeviceStore {
    devices: RwLock<IndexMap<u64, Arc<Device>>>,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,
}

impl DeviceStore {
    pub fn new() -> Self {
        let (last_refresh, _) = watch::channel(None);
        Self {
            devices: RwLock::new(IndexMap::new()),
            last_refresh,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, IndexMap<u64, Arc<Device>>> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, IndexMap<u64, Arc<Device>>> {
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace one record. Returns `true` when the node was new.
    pub fn upsert(&self, device: Device) -> bool {
        self.write()
            .insert(device.node_id, Arc::new(device))
            .is_none()
    }

    pub fn get(&self, node_id: u64) -> Option<Arc<Device>> {
        self.read().get(&node_id).cloned()
    }

    pub fn remove(&self, node_id: u64) -> Option<Arc<Device>> {
        // shift_remove keeps the remaining order intact
        self.write().shift_remove(&node_id)
    }

    /// All records, in first-seen order.
    pub fn list(&self) -> Vec<Arc<Device>> {
        self.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Replace the whole registry with `devices` and stamp the refresh
    /// time. Nodes present before and after keep their positions; new
    /// nodes are appended in the order given; nodes absent from
    /// `devices` disappear.
    pub fn resync(&self, devices: Vec<Device>) {
        let mut incoming: IndexMap<u64, Device> =
            devices.into_iter().map(|d| (d.node_id, d)).collect();

        let mut guard = self.write();
        let mut next = IndexMap::with_capacity(incoming.len());
        for id in guard.keys() {
            if let Some(device) = incoming.shift_remove(id) {
                next.insert(*id, Arc::new(device));
            }
        }
        for (id, device) in incoming {
            next.insert(id, Arc::new(device));
        }
        *guard = next;
        drop(guard);

        // send_replace stamps the time even with no subscribers
        self.last_refresh.send_replace(Some(Utc::now()));
    }

    /// Rename one record in place. Returns the updated record, or `None`
    /// when the node is unknown.
    pub fn rename(&self, node_id: u64, name: &str) -> Option<Arc<Device>> {
        let mut guard = self.write();
        let entry = guard.get_mut(&node_id)?;
        let mut device = (**entry).clone();
        device.name = name.to_owned();
        *entry = Arc::new(device);
        Some(Arc::clone(entry))
    }

    /// When the registry last completed a resync, if ever.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.borrow()
    }

    /// Subscribe to refresh completion stamps.
    pub fn subscribe_refresh(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.last_refresh.subscribe()
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new()
    }
}
