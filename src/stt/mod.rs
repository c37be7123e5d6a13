//! STT (Speech-to-Text) module.
//!
//! # Architecture
//!
//! ```text
//! RecordedClip ──▶ Transcriber ──▶ TranscriptOutcome
//!                     │  silence guard (rms < floor → Silence, no engine call)
//!                     │  resample to 16 kHz
//!                     ▼
//!              SpeechEngine (trait)
//!                     ▲
//!              WhisperEngine (whisper-rs)
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use interview_copilot::audio::RecordedClip;
//! use interview_copilot::stt::{Transcriber, TranscriptOutcome, WhisperEngine};
//!
//! let engine = Arc::new(WhisperEngine::load("models/ggml-base.bin").unwrap());
//! let transcriber = Transcriber::new(engine, "en", 1e-4);
//!
//! let clip = RecordedClip { samples: vec![0.1; 48_000], sample_rate: 48_000 };
//! match transcriber.transcribe(&clip) {
//!     TranscriptOutcome::Transcript(t) => println!("{} ({:.2})", t.text, t.confidence),
//!     TranscriptOutcome::Silence => println!("(silence)"),
//!     TranscriptOutcome::EngineFailed(e) => eprintln!("engine error: {e}"),
//! }
//! ```

pub mod adapter;
pub mod engine;

// ── Public re-exports ──────────────────────────────────────────────────────

pub use adapter::{Transcriber, TranscriptOutcome, TranscriptResult};
pub use engine::{EngineOutput, EngineSegment, SpeechEngine, SttError, WhisperEngine};

// test-only re-export so other test modules can import the mock without
// `use interview_copilot::stt::engine::MockEngine`.
#[cfg(test)]
pub use engine::MockEngine;
