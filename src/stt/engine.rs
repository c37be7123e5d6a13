//! Core speech-engine trait and the Whisper implementation.
//!
//! # Overview
//!
//! [`SpeechEngine`] is the narrow seam between the transcription adapter and
//! whatever actually performs speech recognition.  It is object-safe and
//! `Send + Sync` so it can be held behind an `Arc<dyn SpeechEngine>`.
//!
//! [`WhisperEngine`] is the production implementation wrapping a
//! `whisper_rs::WhisperContext`.  Construct it with [`WhisperEngine::load`].
//!
//! [`MockEngine`] (available under `#[cfg(test)]`) returns a pre-configured
//! output and counts its invocations — the silence-guard tests rely on the
//! counter staying at zero.

use std::path::Path;

use thiserror::Error;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

// ---------------------------------------------------------------------------
// SttError
// ---------------------------------------------------------------------------

/// All errors that can arise from the STT subsystem.
#[derive(Debug, Clone, Error)]
pub enum SttError {
    /// The GGML model file was not found at the given path.
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// `whisper_rs` failed to initialise a `WhisperContext` or `WhisperState`.
    #[error("Whisper context initialisation failed: {0}")]
    ContextInit(String),

    /// An error occurred during the inference pass.
    #[error("Transcription error: {0}")]
    Inference(String),
}

// ---------------------------------------------------------------------------
// Engine output types
// ---------------------------------------------------------------------------

/// One recognised segment with its no-speech probability.
#[derive(Debug, Clone)]
pub struct EngineSegment {
    /// Segment text (may include punctuation inserted by the model).
    pub text: String,
    /// Probability that the segment contains no speech, in `[0, 1]`.
    pub no_speech_prob: f32,
}

/// Raw engine output before the adapter derives transcript-level fields.
#[derive(Debug, Clone, Default)]
pub struct EngineOutput {
    /// Recognised segments in order.
    pub segments: Vec<EngineSegment>,
    /// Language the engine detected, when it reports one.
    pub language: Option<String>,
}

// ---------------------------------------------------------------------------
// SpeechEngine trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface for speech recognition backends.
///
/// # Contract
///
/// - `audio` must be **16 kHz, mono, f32** PCM samples.
/// - `language_hint` is an ISO-639-1 code, or `"auto"` to let the engine
///   detect the language itself.
pub trait SpeechEngine: Send + Sync {
    /// Transcribe `audio` and return segments with no-speech probabilities.
    fn transcribe(&self, audio: &[f32], language_hint: &str) -> Result<EngineOutput, SttError>;
}

// Compile-time assertion: Box<dyn SpeechEngine> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn SpeechEngine>) {}
};

/// Number of CPU threads handed to Whisper, capped at 8 to avoid
/// diminishing returns.
pub(crate) fn optimal_threads() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get().min(8) as i32)
        .unwrap_or(4)
}

// ---------------------------------------------------------------------------
// WhisperEngine
// ---------------------------------------------------------------------------

/// Production engine that wraps a `whisper_rs::WhisperContext`.
///
/// A new `WhisperState` is created for every [`SpeechEngine::transcribe`]
/// call so the engine can be shared across threads without locking.
pub struct WhisperEngine {
    ctx: WhisperContext,
    n_threads: i32,
}

impl std::fmt::Debug for WhisperEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperEngine")
            .field("n_threads", &self.n_threads)
            .finish_non_exhaustive()
    }
}

// `WhisperContext` holds a raw pointer internally but declares
// `unsafe impl Send` and `unsafe impl Sync` in whisper-rs — the model
// weights are read-only after loading.
// SAFETY: WhisperContext is Send+Sync as declared by whisper-rs.
unsafe impl Send for WhisperEngine {}
unsafe impl Sync for WhisperEngine {}

impl WhisperEngine {
    /// Load a GGML model from `model_path` and prepare it for inference.
    ///
    /// # Errors
    ///
    /// - [`SttError::ModelNotFound`] — `model_path` does not exist.
    /// - [`SttError::ContextInit`]  — whisper-rs failed to load the file.
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self, SttError> {
        let path = model_path.as_ref();

        if !path.exists() {
            return Err(SttError::ModelNotFound(path.display().to_string()));
        }

        let path_str = path.to_str().ok_or_else(|| {
            SttError::ModelNotFound(format!(
                "model path contains non-UTF-8 characters: {}",
                path.display()
            ))
        })?;

        let ctx_params = WhisperContextParameters::default();
        let ctx = WhisperContext::new_with_params(path_str, ctx_params)
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        Ok(Self {
            ctx,
            n_threads: optimal_threads(),
        })
    }
}

impl SpeechEngine for WhisperEngine {
    fn transcribe(&self, audio: &[f32], language_hint: &str) -> Result<EngineOutput, SttError> {
        let mut fp = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        // set_language takes an Option<&str> whose lifetime is tied to fp.
        // Both `fp` and the borrow of `language_hint` remain alive until
        // state.full() returns, so the borrow is valid.
        let lang: Option<&str> = if language_hint == "auto" {
            None
        } else {
            Some(language_hint)
        };
        fp.set_language(lang);
        fp.set_n_threads(self.n_threads);
        fp.set_print_progress(false);
        fp.set_print_realtime(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| SttError::ContextInit(e.to_string()))?;

        let wall_start = std::time::Instant::now();

        state
            .full(fp, audio)
            .map_err(|e| SttError::Inference(e.to_string()))?;

        let n_segments = state
            .full_n_segments()
            .map_err(|e| SttError::Inference(e.to_string()))?;

        let mut segments: Vec<EngineSegment> = Vec::with_capacity(n_segments as usize);

        for i in 0..n_segments {
            let text = state
                .full_get_segment_text(i)
                .map_err(|e| SttError::Inference(format!("segment {i}: {e}")))?;

            // whisper-rs does not expose whisper.cpp's per-segment no-speech
            // probability, so derive it from the mean token probability.
            let n_tokens = state.full_n_tokens(i).unwrap_or(0);
            let mut prob_sum = 0.0_f32;
            let mut prob_count = 0u32;
            for j in 0..n_tokens {
                if let Ok(p) = state.full_get_token_prob(i, j) {
                    prob_sum += p;
                    prob_count += 1;
                }
            }
            let no_speech_prob = if prob_count > 0 {
                (1.0 - prob_sum / prob_count as f32).clamp(0.0, 1.0)
            } else {
                0.5
            };

            segments.push(EngineSegment {
                text,
                no_speech_prob,
            });
        }

        log::debug!(
            "whisper: {} segments in {} ms",
            segments.len(),
            wall_start.elapsed().as_millis()
        );

        Ok(EngineOutput {
            segments,
            language: None,
        })
    }
}

// ---------------------------------------------------------------------------
// MockEngine  (test-only)
// ---------------------------------------------------------------------------

/// Test double that returns a pre-configured output and counts calls.
#[cfg(test)]
pub struct MockEngine {
    response: Result<EngineOutput, SttError>,
    calls: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockEngine {
    /// A mock returning the given segments as `(text, no_speech_prob)` pairs.
    pub fn with_segments(segments: &[(&str, f32)]) -> Self {
        Self {
            response: Ok(EngineOutput {
                segments: segments
                    .iter()
                    .map(|(text, p)| EngineSegment {
                        text: text.to_string(),
                        no_speech_prob: *p,
                    })
                    .collect(),
                language: None,
            }),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// A mock returning an empty segment list.
    pub fn empty() -> Self {
        Self::with_segments(&[])
    }

    /// A mock that always fails.
    pub fn failing(error: SttError) -> Self {
        Self {
            response: Err(error),
            calls: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Number of `transcribe` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl SpeechEngine for MockEngine {
    fn transcribe(&self, _audio: &[f32], _language_hint: &str) -> Result<EngineOutput, SttError> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.response.clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
