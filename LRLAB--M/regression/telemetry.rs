use std::{fmt, path::PathBuf, sync::Arc};

use anyhow::Result;
use lrlab_event_bus::{EventPublisher, EventRecord};
use lrlab_logging::{JsonLogger, LogLevel, LogRecord, LogSink};
use serde_json::Value;

/// Builder for sandbox telemetry sinks.
pub struct SandboxTelemetryBuilder {
    module: String,
    log_path: Option<PathBuf>,
    log_sink: Option<Arc<dyn LogSink>>,
    event_publisher: Option<Arc<dyn EventPublisher>>,
}

impl SandboxTelemetryBuilder {
    /// Creates the builder.
    #[must_use]
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            log_path: None,
            log_sink: None,
            event_publisher: None,
        }
    }

    /// Writes JSON lines to `path`. Ignored when a sink is set.
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Sends log records to an existing sink.
    #[must_use]
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.log_sink = Some(sink);
        self
    }

    /// Sets the event publisher.
    #[must_use]
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    /// Builds the telemetry handle.
    pub fn build(self) -> Result<SandboxTelemetry> {
        let logger: Option<Arc<dyn LogSink>> = match (self.log_sink, self.log_path) {
            (Some(sink), _) => Some(sink),
            (None, Some(path)) => Some(Arc::new(JsonLogger::new(path)?)),
            (None, None) => None,
        };
        Ok(SandboxTelemetry {
            inner: Arc::new(TelemetryInner {
                module: self.module,
                logger,
                publisher: self.event_publisher,
            }),
        })
    }
}

/// Telemetry handle shared by the sandbox and its timer ticks.
#[derive(Clone)]
pub struct SandboxTelemetry {
    inner: Arc<TelemetryInner>,
}

impl fmt::Debug for SandboxTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxTelemetry")
            .field("module", &self.inner.module)
            .field("logger", &self.inner.logger.is_some())
            .field("publisher", &self.inner.publisher.is_some())
            .finish()
    }
}

struct TelemetryInner {
    module: String,
    logger: Option<Arc<dyn LogSink>>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl SandboxTelemetry {
    /// Returns a builder.
    #[must_use]
    pub fn builder(module: impl Into<String>) -> SandboxTelemetryBuilder {
        SandboxTelemetryBuilder::new(module)
    }

    /// Logs structured metadata.
    pub fn log(&self, level: LogLevel, message: &str, metadata: Value) -> Result<()> {
        if let Some(logger) = &self.inner.logger {
            let record = LogRecord::new(&self.inner.module, level, message).with_metadata(metadata);
            logger.log(&record)?;
        }
        Ok(())
    }

    /// Emits an event on the bus.
    pub fn event(&self, event_type: &str, payload: Value) -> Result<()> {
        if let Some(publisher) = &self.inner.publisher {
            publisher.publish(EventRecord::new(&self.inner.module, event_type, payload))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lrlab_event_bus::MemoryEventBus;
    use lrlab_logging::MemoryLogger;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn telemetry_writes_log_and_event() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("sandbox.log");
        let bus = Arc::new(MemoryEventBus::new(16));
        let telemetry = SandboxTelemetry::builder("sandbox")
            .log_path(&path)
            .event_publisher(bus.clone())
            .build()
            .unwrap();
        telemetry
            .log(LogLevel::Info, "training.started", json!({ "learning_rate": 0.0001 }))
            .unwrap();
        telemetry
            .event("sandbox.snapshot", json!({ "loss": 2.0 }))
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("training.started"));
        assert_eq!(bus.snapshot().len(), 1);
        assert_eq!(bus.snapshot()[0].source, "sandbox");
    }

    #[test]
    fn explicit_sink_wins_over_path() {
        let sink = Arc::new(MemoryLogger::new(8));
        let telemetry = SandboxTelemetry::builder("sandbox")
            .log_sink(sink.clone())
            .build()
            .unwrap();
        telemetry.log(LogLevel::Debug, "input.rejected", Value::Null).unwrap();
        assert!(sink.contains("input.rejected"));
    }

    #[test]
    fn bare_telemetry_is_silent() {
        let telemetry = SandboxTelemetry::builder("sandbox").build().unwrap();
        telemetry.log(LogLevel::Info, "noop", Value::Null).unwrap();
        telemetry.event("noop", Value::Null).unwrap();
    }
}
