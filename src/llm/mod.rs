//! Answer generation for Interview Copilot.
//!
//! This module provides:
//! * [`TokenProvider`] — async trait implemented by streaming backends.
//! * [`RemoteProvider`] — hosted chat-completions API (SSE, bearer auth).
//! * [`LocalProvider`] — local Ollama-style `/api/generate` (JSON lines).
//! * [`StreamingClient`] — probe-ordered provider list with the zero-token
//!   cross-provider fallback policy.
//! * [`PromptBuilder`] — persona + background + history prompt assembly.
//! * [`AnswerGenerator`] — full question → streamed answer flow, including
//!   the canned-answer fallback and overlap-based confidence.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::{atomic::AtomicBool, Arc};
//! use interview_copilot::config::AppConfig;
//! use interview_copilot::detect::QuestionKind;
//! use interview_copilot::llm::{AnswerGenerator, GenOptions, StreamingClient};
//! use interview_copilot::profile::Profile;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let profile = Arc::new(Profile::load("default").unwrap());
//!
//!     let client = StreamingClient::connect(&config.llm).await;
//!     let generator = AnswerGenerator::new(client, profile, GenOptions::from(&config.llm));
//!
//!     let cancel = Arc::new(AtomicBool::new(false));
//!     let answer = generator
//!         .answer("Tell me about yourself", QuestionKind::General, &[], cancel, |token| {
//!             print!("{token}");
//!         })
//!         .await;
//!     println!("\n(confidence {:.2})", answer.confidence);
//! }
//! ```

pub mod client;
pub mod generator;
pub mod prompt;
pub mod provider;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use client::{ProviderState, StreamingClient};
pub use generator::{answer_confidence, AnswerGenerator, AnswerOutcome, GeneratedAnswer};
pub use prompt::PromptBuilder;
pub use provider::{
    remote_model_for, GenError, GenOptions, LocalProvider, RemoteProvider, StreamItem,
    TokenProvider,
};
