#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Event bus used to hand sandbox state changes to whoever renders them.
//!
//! Publishing is synchronous: events are emitted from timer ticks and learner
//! actions, neither of which may await.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Generic event record encoded as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// Unique identifier (uuid).
    pub id: String,
    /// Module producing the event.
    pub source: String,
    /// Event type (e.g., `sandbox.snapshot`).
    pub event_type: String,
    /// ISO timestamp.
    pub timestamp: String,
    /// Arbitrary JSON payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl EventRecord {
    /// Builds a freshly stamped record.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        event_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: format!("evt-{}", Uuid::new_v4()),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            payload,
        }
    }
}

/// Event publisher interface.
pub trait EventPublisher: Send + Sync {
    /// Publishes an event.
    fn publish(&self, event: EventRecord) -> Result<()>;
}

/// In-memory broadcast bus with a bounded backlog.
#[derive(Debug, Clone)]
pub struct MemoryEventBus {
    sender: broadcast::Sender<EventRecord>,
    capacity: usize,
    backlog: Arc<Mutex<VecDeque<EventRecord>>>,
}

impl MemoryEventBus {
    /// Creates a new bus with the given capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            capacity,
            backlog: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
        }
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    /// Snapshot of recent events retained in memory.
    #[must_use]
    pub fn snapshot(&self) -> Vec<EventRecord> {
        self.backlog.lock().iter().cloned().collect()
    }

    /// Retained events of one type, oldest first.
    #[must_use]
    pub fn events_of(&self, event_type: &str) -> Vec<EventRecord> {
        self.backlog
            .lock()
            .iter()
            .filter(|event| event.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Most recent retained event of one type.
    #[must_use]
    pub fn last_of(&self, event_type: &str) -> Option<EventRecord> {
        self.backlog
            .lock()
            .iter()
            .rev()
            .find(|event| event.event_type == event_type)
            .cloned()
    }
}

impl EventPublisher for MemoryEventBus {
    fn publish(&self, event: EventRecord) -> Result<()> {
        {
            let mut backlog = self.backlog.lock();
            if backlog.len() == self.capacity {
                backlog.pop_front();
            }
            backlog.push_back(event.clone());
        }
        // no receivers is not an error for a display bus
        let _ = self.sender.send(event);
        Ok(())
    }
}

/// File-backed publisher appending JSON lines.
#[derive(Debug)]
pub struct FileEventPublisher {
    path: PathBuf,
    writer: Mutex<File>,
}

impl FileEventPublisher {
    /// Creates a publisher that appends to the given path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(file),
        })
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventPublisher for FileEventPublisher {
    fn publish(&self, event: EventRecord) -> Result<()> {
        let data = serde_json::to_vec(&event)?;
        let mut writer = self.writer.lock();
        writer.write_all(&data)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}
