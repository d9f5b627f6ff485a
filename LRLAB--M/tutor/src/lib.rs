#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! LRLab tutor: a conversational assistant boundary behind a pluggable client.

/// Tutor settings.
#[path = "../config.rs"]
pub mod config;

/// Chat messages, errors, and the client abstraction.
#[path = "../client.rs"]
pub mod client;

/// Gemini REST client.
#[path = "../gemini.rs"]
pub mod gemini;

/// Owned learner session.
#[path = "../main.rs"]
pub mod session;

pub use client::{ChatMessage, LoopbackTutorClient, Role, TutorClient, TutorError};
pub use config::TutorConfig;
pub use gemini::GeminiClient;
pub use session::{TutorSession, CONNECTION_FALLBACK, EMPTY_REPLY_FALLBACK};
