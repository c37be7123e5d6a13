//! Transcription adapter — recorded clip in, transcript outcome out.
//!
//! The adapter sits between the recorder and the question detector.  It
//! applies the silence guard (the engine is never invoked for silent clips),
//! resamples to the engine's 16 kHz contract, and derives transcript-level
//! confidence from per-segment no-speech probabilities.

use std::sync::Arc;

use crate::audio::{resample_linear, RecordedClip, STT_SAMPLE_RATE};

use super::engine::{EngineOutput, SpeechEngine, SttError};

// ---------------------------------------------------------------------------
// Outcome types
// ---------------------------------------------------------------------------

/// A finished transcript with derived metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptResult {
    /// Concatenated segment text, trimmed.
    pub text: String,
    /// Language of the transcript (engine-detected, or the configured hint).
    pub language: String,
    /// Mean of `1 − no_speech_prob` over all segments; `0.5` when the engine
    /// produced no segments.
    pub confidence: f32,
}

/// Result of running one recorded clip through the adapter.
///
/// `Silence` and `EngineFailed` are distinct on purpose: silence is a normal
/// skip, an engine failure is logged and the session loop carries on.
#[derive(Debug, Clone)]
pub enum TranscriptOutcome {
    /// Clip RMS was below the silence floor; the engine was not invoked.
    Silence,
    /// The engine returned an error.
    EngineFailed(SttError),
    /// The engine produced a transcript.
    Transcript(TranscriptResult),
}

impl TranscriptOutcome {
    /// The transcript, when one was produced.
    pub fn transcript(&self) -> Option<&TranscriptResult> {
        match self {
            Self::Transcript(result) => Some(result),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Transcriber
// ---------------------------------------------------------------------------

/// Drives a [`SpeechEngine`] with the silence guard and resampling applied.
pub struct Transcriber {
    engine: Arc<dyn SpeechEngine>,
    /// Language hint passed to the engine and echoed into results when the
    /// engine does not report a detected language.
    language: String,
    /// RMS floor below which a clip is treated as silence.
    silence_rms: f32,
}

impl Transcriber {
    pub fn new(engine: Arc<dyn SpeechEngine>, language: impl Into<String>, silence_rms: f32) -> Self {
        Self {
            engine,
            language: language.into(),
            silence_rms,
        }
    }

    /// Transcribe one recorded clip.
    ///
    /// The silence check runs on the clip at its native rate; resampling to
    /// 16 kHz happens only when the engine will actually be called.
    pub fn transcribe(&self, clip: &RecordedClip) -> TranscriptOutcome {
        let level = clip.rms();
        if level < self.silence_rms {
            log::debug!("clip below silence floor (rms {level:.6}), skipping engine");
            return TranscriptOutcome::Silence;
        }

        let audio = resample_linear(&clip.samples, clip.sample_rate, STT_SAMPLE_RATE);

        match self.engine.transcribe(&audio, &self.language) {
            Ok(output) => TranscriptOutcome::Transcript(self.collect(output)),
            Err(err) => {
                log::warn!("speech engine failed: {err}");
                TranscriptOutcome::EngineFailed(err)
            }
        }
    }

    fn collect(&self, output: EngineOutput) -> TranscriptResult {
        let mut text = String::new();
        for segment in &output.segments {
            text.push_str(&segment.text);
        }

        let confidence = if output.segments.is_empty() {
            0.5
        } else {
            let sum: f32 = output
                .segments
                .iter()
                .map(|s| 1.0 - s.no_speech_prob)
                .sum();
            sum / output.segments.len() as f32
        };

        let language = output.language.unwrap_or_else(|| self.language.clone());

        TranscriptResult {
            text: text.trim().to_string(),
            language,
            confidence,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stt::engine::MockEngine;

    fn clip(samples: Vec<f32>, sample_rate: u32) -> RecordedClip {
        RecordedClip {
            samples,
            sample_rate,
        }
    }

    fn transcriber(engine: Arc<MockEngine>) -> Transcriber {
        Transcriber::new(engine, "en", 1e-4)
    }

    #[test]
    fn silent_clip_never_reaches_the_engine() {
        let engine = Arc::new(MockEngine::with_segments(&[("should not appear", 0.0)]));
        let t = transcriber(Arc::clone(&engine));

        // A clip of pure zeros, and one with sub-floor noise.
        for samples in [vec![0.0_f32; 48_000], vec![5e-5_f32; 48_000]] {
            let outcome = t.transcribe(&clip(samples, 48_000));
            assert!(matches!(outcome, TranscriptOutcome::Silence));
        }
        assert_eq!(engine.calls(), 0);
    }

    #[test]
    fn audible_clip_is_transcribed() {
        let engine = Arc::new(MockEngine::with_segments(&[(" Hello world.", 0.2)]));
        let t = transcriber(Arc::clone(&engine));

        let outcome = t.transcribe(&clip(vec![0.1_f32; 48_000], 48_000));
        let result = outcome.transcript().expect("transcript");
        assert_eq!(result.text, "Hello world.");
        assert_eq!(result.language, "en");
        assert!((result.confidence - 0.8).abs() < 1e-6);
        assert_eq!(engine.calls(), 1);
    }

    #[test]
    fn confidence_is_mean_over_segments() {
        let engine = Arc::new(MockEngine::with_segments(&[
            ("First. ", 0.1),
            ("Second.", 0.3),
        ]));
        let t = transcriber(engine);

        let outcome = t.transcribe(&clip(vec![0.2_f32; 16_000], 16_000));
        let result = outcome.transcript().expect("transcript");
        // mean(1-0.1, 1-0.3) = 0.8
        assert!((result.confidence - 0.8).abs() < 1e-6);
        assert_eq!(result.text, "First. Second.");
    }

    #[test]
    fn no_segments_yields_half_confidence() {
        let engine = Arc::new(MockEngine::empty());
        let t = transcriber(engine);

        let outcome = t.transcribe(&clip(vec![0.2_f32; 16_000], 16_000));
        let result = outcome.transcript().expect("transcript");
        assert_eq!(result.text, "");
        assert!((result.confidence - 0.5).abs() < 1e-6);
    }

    #[test]
    fn engine_failure_is_not_silence() {
        let engine = Arc::new(MockEngine::failing(SttError::Inference("boom".into())));
        let t = transcriber(Arc::clone(&engine));

        let outcome = t.transcribe(&clip(vec![0.2_f32; 16_000], 16_000));
        assert!(matches!(outcome, TranscriptOutcome::EngineFailed(_)));
        assert_eq!(engine.calls(), 1);
    }

    #[test]
    fn near_empty_clip_counts_as_silence() {
        // The recorder's "no frames" clip is a single zero sample.
        let engine = Arc::new(MockEngine::empty());
        let t = transcriber(Arc::clone(&engine));

        let outcome = t.transcribe(&clip(vec![0.0], 48_000));
        assert!(matches!(outcome, TranscriptOutcome::Silence));
        assert_eq!(engine.calls(), 0);
    }
}
