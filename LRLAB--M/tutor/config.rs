use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Tutor connection and persona settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorConfig {
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// API root, without the `/models/...` suffix.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API key; requests fail over to the fallback reply when absent.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Persona sent with every request.
    #[serde(default = "default_system_instruction")]
    pub system_instruction: String,
    /// First model message shown in the transcript.
    #[serde(default = "default_greeting")]
    pub greeting: String,
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            endpoint: default_endpoint(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
            system_instruction: default_system_instruction(),
            greeting: default_greeting(),
        }
    }
}

impl TutorConfig {
    /// Parses and validates a TOML document with tutor keys at the top level.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("parsing tutor config")?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects unusable settings.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            bail!("tutor model must be set");
        }
        if self.endpoint.trim().is_empty() {
            bail!("tutor endpoint must be set");
        }
        if self.timeout_ms == 0 {
            bail!("tutor timeout_ms must be positive");
        }
        Ok(())
    }

    /// Per-request timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Key with surrounding whitespace removed; `None` when blank.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

fn default_model() -> String {
    "gemini-2.5-flash".into()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}

const fn default_timeout_ms() -> u64 {
    30_000
}

fn default_system_instruction() -> String {
    "You are an AI tutor who teaches machine learning fundamentals and specialises in linear regression.\n\
     Your audience is AI beginners. Follow these principles:\n\
     1. Explain in plain language and use everyday analogies, such as walking downhill for gradient descent.\n\
     2. Explain what each formula means physically instead of piling up symbols.\n\
     3. Keep a warm, encouraging tone that sparks curiosity.\n\
     4. Keep answers short and clear unless the learner asks for detail.\n\
     5. When code is involved, use Python (NumPy/scikit-learn) style pseudocode."
        .into()
}

fn default_greeting() -> String {
    "Hi! I'm your linear regression teaching assistant. Ask me about the ideas, the formulas, or where it gets used."
        .into()
}
