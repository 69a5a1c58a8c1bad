//! Coordinator registry
//!
//! Owned by the hosting session and passed by reference to whatever needs
//! to look a coordinator up. Dropping the registry drops every coordinator
//! it holds.
//!
//! Each entry also keeps a [`Writer`] for its coordinator. Command handlers
//! should write through it rather than through the locked coordinator,
//! which a poller may hold for a whole cycle.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::HeatPumpConfig;
use crate::coordinator::{Connector, Coordinator, TcpConnector, Writer};

/// A coordinator shared between the scheduler and command handlers
pub type SharedCoordinator<C = TcpConnector> = Arc<Mutex<Coordinator<C>>>;

/// Entry id a host would use for `config`: host, port and unit id.
pub fn entry_id(config: &HeatPumpConfig) -> String {
    format!("{}_{}_{}", config.host, config.port, config.unit_id)
}

struct Entry<C: Connector> {
    coordinator: SharedCoordinator<C>,
    writer: Writer<C>,
}

/// Coordinators keyed by configuration entry id.
pub struct CoordinatorRegistry<C: Connector = TcpConnector> {
    entries: HashMap<String, Entry<C>>,
}

impl<C: Connector> CoordinatorRegistry<C> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Register a coordinator, replacing any previous one under the same id.
    pub fn insert(&mut self, id: impl Into<String>, coordinator: Coordinator<C>) -> SharedCoordinator<C> {
        let id = id.into();
        let writer = coordinator.writer();
        let shared = Arc::new(Mutex::new(coordinator));
        let entry = Entry {
            coordinator: shared.clone(),
            writer,
        };
        if self.entries.insert(id.clone(), entry).is_some() {
            info!("Replaced coordinator for entry {}", id);
        } else {
            debug!("Registered coordinator for entry {}", id);
        }
        shared
    }

    pub fn get(&self, id: &str) -> Option<SharedCoordinator<C>> {
        self.entries.get(id).map(|entry| entry.coordinator.clone())
    }

    /// Write handle for an entry; usable while a poll cycle is running.
    pub fn writer(&self, id: &str) -> Option<Writer<C>> {
        self.entries.get(id).map(|entry| entry.writer.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    /// Unregister an entry. Holders of the shared handle keep it alive.
    pub fn remove(&mut self, id: &str) -> Option<SharedCoordinator<C>> {
        let removed = self.entries.remove(id)?;
        debug!("Removed coordinator for entry {}", id);
        Some(removed.coordinator)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<C: Connector> Default for CoordinatorRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}
