//! Owned chat session between one learner and the tutor.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use lrlab_logging::{LogLevel, LogRecord, LogSink};
use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::{
    client::{ChatMessage, TutorClient, TutorError},
    config::TutorConfig,
};

/// Reply shown when the model answers with no text.
pub const EMPTY_REPLY_FALLBACK: &str = "Sorry, I can't answer that question right now.";
/// Reply shown when the tutor cannot be reached.
pub const CONNECTION_FALLBACK: &str =
    "The tutor connection seems to have a problem. Check the API key or try again later.";

#[derive(Default)]
struct Conversation {
    // everything shown to the learner, fallbacks included
    transcript: Vec<ChatMessage>,
    // completed exchanges sent upstream
    history: Vec<ChatMessage>,
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// A learner's conversation with the tutor. One request in flight at a time.
pub struct TutorSession {
    client: Arc<dyn TutorClient>,
    config: TutorConfig,
    conversation: Mutex<Conversation>,
    in_flight: AtomicBool,
    logger: Option<Arc<dyn LogSink>>,
}

impl std::fmt::Debug for TutorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TutorSession")
            .field("model", &self.config.model)
            .field("turns", &self.conversation.lock().transcript.len())
            .field("busy", &self.is_busy())
            .finish()
    }
}

impl TutorSession {
    /// Opens a session whose transcript starts with the configured greeting.
    #[must_use]
    pub fn new(client: Arc<dyn TutorClient>, config: TutorConfig) -> Self {
        let conversation = Conversation {
            transcript: vec![ChatMessage::model(config.greeting.clone())],
            history: Vec::new(),
        };
        Self {
            client,
            config,
            conversation: Mutex::new(conversation),
            in_flight: AtomicBool::new(false),
            logger: None,
        }
    }

    /// Sends diagnostics to `sink`.
    #[must_use]
    pub fn with_logger(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.logger = Some(sink);
        self
    }

    /// Returns true while a request is outstanding.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Everything shown to the learner so far.
    #[must_use]
    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.conversation.lock().transcript.clone()
    }

    /// Asks the tutor. Upstream failures come back as fallback replies;
    /// only a blank prompt or a concurrent request is an error.
    pub async fn ask(&self, prompt: &str) -> Result<String, TutorError> {
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(TutorError::EmptyPrompt);
        }
        let Some(_guard) = InFlight::acquire(&self.in_flight) else {
            self.log(LogLevel::Debug, "tutor.busy", Value::Null);
            return Err(TutorError::Busy);
        };

        let question = ChatMessage::user(prompt);
        let history = {
            let mut conversation = self.conversation.lock();
            conversation.transcript.push(question.clone());
            let mut history = conversation.history.clone();
            history.push(question.clone());
            history
        };

        let outcome = self
            .client
            .generate(&self.config.system_instruction, &history)
            .await;
        let reply = match outcome {
            Ok(text) if !text.trim().is_empty() => {
                let mut conversation = self.conversation.lock();
                conversation.history.push(question);
                conversation.history.push(ChatMessage::model(text.clone()));
                text
            }
            Ok(_) => {
                self.log(LogLevel::Warn, "tutor.empty_reply", Value::Null);
                EMPTY_REPLY_FALLBACK.to_string()
            }
            Err(err) => {
                self.log(
                    LogLevel::Error,
                    "tutor.request_failed",
                    json!({ "error": err.to_string() }),
                );
                CONNECTION_FALLBACK.to_string()
            }
        };
        self.conversation
            .lock()
            .transcript
            .push(ChatMessage::model(reply.clone()));
        Ok(reply)
    }

    fn log(&self, level: LogLevel, message: &str, metadata: Value) {
        if let Some(logger) = &self.logger {
            let record = LogRecord::new("tutor", level, message).with_metadata(metadata);
            let _ = logger.log(&record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{LoopbackTutorClient, Role};
    use async_trait::async_trait;
    use lrlab_logging::MemoryLogger;
    use tokio::sync::Notify;

    struct FixedClient(Result<&'static str, u16>);

    #[async_trait]
    impl TutorClient for FixedClient {
        async fn generate(&self, _: &str, _: &[ChatMessage]) -> Result<String, TutorError> {
            self.0.map(str::to_string).map_err(TutorError::Status)
        }
    }

    struct RecordingClient(Mutex<Vec<usize>>);

    #[async_trait]
    impl TutorClient for RecordingClient {
        async fn generate(&self, _: &str, history: &[ChatMessage]) -> Result<String, TutorError> {
            self.0.lock().push(history.len());
            Ok("noted".into())
        }
    }

    struct GatedClient(Arc<Notify>);

    #[async_trait]
    impl TutorClient for GatedClient {
        async fn generate(&self, _: &str, _: &[ChatMessage]) -> Result<String, TutorError> {
            self.0.notified().await;
            Ok("done".into())
        }
    }

    #[tokio::test]
    async fn transcript_opens_with_greeting_and_records_turns() {
        let session = TutorSession::new(Arc::new(LoopbackTutorClient), TutorConfig::default());
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].role, Role::Model);

        let reply = session.ask("  why square the error?  ").await.unwrap();
        assert!(reply.contains("why square the error?"));
        let transcript = session.transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[1], ChatMessage::user("why square the error?"));
        assert_eq!(transcript[2].text, reply);
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let session = TutorSession::new(Arc::new(LoopbackTutorClient), TutorConfig::default());
        assert!(matches!(session.ask("   ").await, Err(TutorError::EmptyPrompt)));
        assert_eq!(session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn empty_reply_and_failure_use_distinct_fallbacks() {
        let empty = TutorSession::new(Arc::new(FixedClient(Ok("  "))), TutorConfig::default());
        assert_eq!(empty.ask("hi").await.unwrap(), EMPTY_REPLY_FALLBACK);

        let sink = Arc::new(MemoryLogger::new(8));
        let failing = TutorSession::new(Arc::new(FixedClient(Err(503))), TutorConfig::default())
            .with_logger(sink.clone());
        assert_eq!(failing.ask("hi").await.unwrap(), CONNECTION_FALLBACK);
        assert!(sink.contains("tutor.request_failed"));
        assert!(!failing.is_busy());
    }

    #[tokio::test]
    async fn history_sent_upstream_skips_greeting_and_failed_turns() {
        let client = Arc::new(RecordingClient(Mutex::new(Vec::new())));
        let session = TutorSession::new(client.clone(), TutorConfig::default());
        session.ask("one").await.unwrap();
        session.ask("two").await.unwrap();
        assert_eq!(*client.0.lock(), vec![1, 3]);
    }

    #[tokio::test]
    async fn concurrent_request_is_busy() {
        let gate = Arc::new(Notify::new());
        let session = Arc::new(TutorSession::new(
            Arc::new(GatedClient(gate.clone())),
            TutorConfig::default(),
        ));
        let first = {
            let session = Arc::clone(&session);
            tokio::spawn(async move { session.ask("first").await })
        };
        while !session.is_busy() {
            tokio::task::yield_now().await;
        }
        assert!(matches!(session.ask("second").await, Err(TutorError::Busy)));
        gate.notify_one();
        assert_eq!(first.await.unwrap().unwrap(), "done");
        assert!(!session.is_busy());
        assert_eq!(session.transcript().len(), 3);
    }
}
