use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Who authored a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The learner.
    User,
    /// The tutor.
    Model,
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author.
    pub role: Role,
    /// Plain text.
    pub text: String,
}

impl ChatMessage {
    /// Learner turn.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    /// Tutor turn.
    #[must_use]
    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Errors raised by the tutor boundary.
#[derive(Debug, Error)]
pub enum TutorError {
    /// Prompt was blank.
    #[error("prompt is empty")]
    EmptyPrompt,
    /// Another request on the same session has not finished.
    #[error("a tutor request is already in flight")]
    Busy,
    /// No API key configured.
    #[error("tutor API key is not configured")]
    MissingApiKey,
    /// Network or timeout failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// Upstream answered with a non-success status.
    #[error("upstream returned status {0}")]
    Status(u16),
    /// Upstream payload did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

/// Generates the next tutor turn from the conversation so far.
#[async_trait]
pub trait TutorClient: Send + Sync {
    /// Returns the reply text for `history`, whose last entry is the learner's turn.
    async fn generate(
        &self,
        system_instruction: &str,
        history: &[ChatMessage],
    ) -> Result<String, TutorError>;
}

/// Offline client that answers without a network call.
#[derive(Debug, Default)]
pub struct LoopbackTutorClient;

#[async_trait]
impl TutorClient for LoopbackTutorClient {
    async fn generate(
        &self,
        _system_instruction: &str,
        history: &[ChatMessage],
    ) -> Result<String, TutorError> {
        let question = history
            .iter()
            .rev()
            .find(|msg| msg.role == Role::User)
            .map_or("", |msg| msg.text.as_str());
        Ok(format!(
            "(offline tutor) You asked: \"{question}\". Picture the loss as a valley: \
             gradient descent takes small steps downhill, and the learning rate sets the stride."
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_serialize_lowercase() {
        let json = serde_json::to_value(ChatMessage::model("hi")).unwrap();
        assert_eq!(json["role"], "model");
        assert_eq!(json["text"], "hi");
    }

    #[tokio::test]
    async fn loopback_echoes_last_question() {
        let history = vec![ChatMessage::user("first"), ChatMessage::model("ok"), ChatMessage::user("what is MSE?")];
        let reply = LoopbackTutorClient.generate("sys", &history).await.unwrap();
        assert!(reply.contains("what is MSE?"));
    }
}
