//! Interview Copilot — live interview answer assistant.
//!
//! Captures system audio, transcribes it with Whisper, detects interviewer
//! questions, and streams a tailored first-person answer from a remote or
//! local LLM.
//!
//! Pipeline shape:
//!
//! ```text
//! audio capture ─► recorder ─► transcriber ─► question detector
//!                                                   │
//!                              output sink ◄─ answer generator ◄─┘
//! ```

pub mod audio;
pub mod config;
pub mod detect;
pub mod llm;
pub mod profile;
pub mod session;
pub mod stt;
