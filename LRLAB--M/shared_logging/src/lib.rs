#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Structured JSON logging shared by the lab crates.

use std::{
    collections::VecDeque,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Log severity level, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    /// Debug information.
    Debug,
    /// Informational events.
    Info,
    /// Warning indicator.
    Warn,
    /// Error indicator.
    Error,
}

/// Structured log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    /// Timestamp in ISO8601.
    pub timestamp: DateTime<Utc>,
    /// Module emitting the log.
    pub module: String,
    /// Severity.
    pub level: LogLevel,
    /// Human-readable message.
    pub message: String,
    /// Arbitrary JSON payload for fields.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl LogRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(module: impl Into<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            module: module.into(),
            level,
            message: message.into(),
            metadata: serde_json::Map::new(),
        }
    }

    /// Attaches metadata; non-object values are stored under `data`.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        match metadata {
            serde_json::Value::Object(map) => self.metadata = map,
            serde_json::Value::Null => {}
            other => {
                self.metadata.insert("data".into(), other);
            }
        }
        self
    }
}

/// Destination for structured log records.
pub trait LogSink: Send + Sync {
    /// Writes one record.
    fn log(&self, record: &LogRecord) -> Result<()>;
}

/// Thread-safe JSON-lines logger with append-only semantics.
#[derive(Debug)]
pub struct JsonLogger {
    path: PathBuf,
    writer: Mutex<File>,
}

impl JsonLogger {
    /// Creates or opens a logger at the desired path.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(file),
        })
    }

    /// Returns the underlying file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for JsonLogger {
    fn log(&self, record: &LogRecord) -> Result<()> {
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, record)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

/// Bounded in-memory sink keeping the most recent records.
#[derive(Debug)]
pub struct MemoryLogger {
    capacity: usize,
    min_level: LogLevel,
    records: Mutex<VecDeque<LogRecord>>,
}

impl MemoryLogger {
    /// Creates a sink retaining at most `capacity` records.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            min_level: LogLevel::Debug,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Drops records below `level`.
    #[must_use]
    pub const fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Snapshot of retained records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Returns true if any retained record carries `message`.
    #[must_use]
    pub fn contains(&self, message: &str) -> bool {
        self.records.lock().iter().any(|r| r.message == message)
    }
}

impl LogSink for MemoryLogger {
    fn log(&self, record: &LogRecord) -> Result<()> {
        if record.level < self.min_level {
            return Ok(());
        }
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn writes_json_lines() {
        let dir = tempdir().unwrap();
        let logger = JsonLogger::new(dir.path().join("nested/sandbox.log")).unwrap();
        logger
            .log(&LogRecord::new("sandbox", LogLevel::Info, "training.start"))
            .unwrap();
        logger
            .log(&LogRecord::new("sandbox", LogLevel::Warn, "training.diverged"))
            .unwrap();
        let content = fs::read_to_string(logger.path()).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("\"message\":\"training.start\""));
        assert!(content.contains("\"level\":\"WARN\""));
    }

    #[test]
    fn memory_logger_is_bounded_and_filtered() {
        let logger = MemoryLogger::new(2).with_min_level(LogLevel::Info);
        logger
            .log(&LogRecord::new("m", LogLevel::Debug, "dropped"))
            .unwrap();
        for message in ["a", "b", "c"] {
            logger
                .log(&LogRecord::new("m", LogLevel::Info, message))
                .unwrap();
        }
        let messages: Vec<_> = logger.records().into_iter().map(|r| r.message).collect();
        assert_eq!(messages, vec!["b", "c"]);
        assert!(!logger.contains("dropped"));
    }

    #[test]
    fn metadata_wraps_scalars() {
        let record = LogRecord::new("m", LogLevel::Info, "x").with_metadata(json!(3));
        assert_eq!(record.metadata["data"], json!(3));
        let record = LogRecord::new("m", LogLevel::Info, "x").with_metadata(json!({ "n": 1 }));
        assert_eq!(record.metadata["n"], json!(1));
    }
}
