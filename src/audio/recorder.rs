//! Flag-gated frame accumulation between explicit start/stop marks.
//!
//! The ingest thread drains [`AudioChunk`]s from the capture channel and
//! feeds them to a shared [`Recorder`]; frames are only kept while the
//! atomic recording flag is set, so capture can run continuously while the
//! session decides which stretches of audio matter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::capture::AudioChunk;
use super::level::rms;
use super::resample::downmix_mono;

// ---------------------------------------------------------------------------
// RecordedClip
// ---------------------------------------------------------------------------

/// A finished mono recording, as returned by [`Recorder::stop`].
#[derive(Debug, Clone)]
pub struct RecordedClip {
    /// Mono PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of the samples in Hz.
    pub sample_rate: u32,
}

impl RecordedClip {
    /// Clip length in seconds.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// RMS level of the clip.
    pub fn rms(&self) -> f32 {
        rms(&self.samples)
    }
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// Accumulates downmixed mono frames while the recording flag is set.
///
/// All methods take `&self`; the recorder is shared between the ingest
/// thread and the session loop behind an `Arc`.  Exactly one recording can
/// be in flight at a time — `start` while already recording simply restarts
/// the accumulation from scratch.
pub struct Recorder {
    recording: Arc<AtomicBool>,
    frames: Mutex<Vec<f32>>,
    sample_rate: u32,
}

impl Recorder {
    /// Create a recorder for frames arriving at `sample_rate` Hz.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            recording: Arc::new(AtomicBool::new(false)),
            frames: Mutex::new(Vec::new()),
            sample_rate,
        }
    }

    /// Clear any previously accumulated frames and begin recording.
    pub fn start(&self) {
        if let Ok(mut frames) = self.frames.lock() {
            frames.clear();
        }
        self.recording.store(true, Ordering::SeqCst);
    }

    /// Whether frames are currently being accumulated.
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    /// Shared handle to the recording flag (for the ingest thread).
    pub fn recording_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.recording)
    }

    /// Feed one captured chunk. Frames are downmixed to mono and appended
    /// only while the recording flag is set; chunks arriving outside a
    /// recording window are dropped.
    pub fn ingest(&self, chunk: &AudioChunk) {
        if !self.recording.load(Ordering::SeqCst) {
            return;
        }
        let mono = downmix_mono(&chunk.samples, chunk.channels);
        if let Ok(mut frames) = self.frames.lock() {
            frames.extend_from_slice(&mono);
        }
    }

    /// Stop recording and return the accumulated clip.
    ///
    /// When no frames arrived the clip holds a single zero-valued sample so
    /// downstream duration checks see a near-zero, never-empty clip.
    pub fn stop(&self) -> RecordedClip {
        self.recording.store(false, Ordering::SeqCst);
        let mut samples = match self.frames.lock() {
            Ok(mut frames) => std::mem::take(&mut *frames),
            Err(_) => Vec::new(),
        };
        if samples.is_empty() {
            samples.push(0.0);
        }
        RecordedClip {
            samples,
            sample_rate: self.sample_rate,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(samples: Vec<f32>, channels: u16) -> AudioChunk {
        AudioChunk {
            samples,
            sample_rate: 48_000,
            channels,
        }
    }

    #[test]
    fn frames_outside_recording_window_are_dropped() {
        let rec = Recorder::new(48_000);

        rec.ingest(&chunk(vec![0.5; 480], 1)); // before start
        rec.start();
        rec.ingest(&chunk(vec![0.25; 480], 1));
        let clip = rec.stop();
        rec.ingest(&chunk(vec![0.5; 480], 1)); // after stop

        assert_eq!(clip.samples.len(), 480);
        assert!((clip.samples[0] - 0.25).abs() < 1e-6);

        // The post-stop chunk must not leak into the next recording.
        rec.start();
        let next = rec.stop();
        assert_eq!(next.samples.len(), 1);
    }

    #[test]
    fn stereo_chunks_are_downmixed() {
        let rec = Recorder::new(48_000);
        rec.start();
        rec.ingest(&chunk(vec![1.0, -1.0, 0.5, 0.5], 2));
        let clip = rec.stop();

        assert_eq!(clip.samples.len(), 2);
        assert!(clip.samples[0].abs() < 1e-6);
        assert!((clip.samples[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn empty_recording_yields_single_zero_sample() {
        let rec = Recorder::new(48_000);
        rec.start();
        let clip = rec.stop();

        assert_eq!(clip.samples, vec![0.0]);
        assert!(clip.duration_secs() < 0.001);
    }

    #[test]
    fn start_clears_previous_frames() {
        let rec = Recorder::new(48_000);
        rec.start();
        rec.ingest(&chunk(vec![0.5; 100], 1));
        rec.start(); // restart discards the 100 frames
        rec.ingest(&chunk(vec![0.1; 50], 1));
        let clip = rec.stop();

        assert_eq!(clip.samples.len(), 50);
        assert!((clip.samples[0] - 0.1).abs() < 1e-6);
    }

    #[test]
    fn clip_duration_and_rms() {
        let rec = Recorder::new(16_000);
        rec.start();
        rec.ingest(&chunk(vec![0.5; 16_000], 1));
        let clip = rec.stop();

        assert!((clip.duration_secs() - 1.0).abs() < 1e-3);
        assert!((clip.rms() - 0.5).abs() < 1e-4);
    }

    #[test]
    fn recording_flag_is_shared() {
        let rec = Recorder::new(48_000);
        let flag = rec.recording_flag();
        assert!(!flag.load(std::sync::atomic::Ordering::SeqCst));
        rec.start();
        assert!(flag.load(std::sync::atomic::Ordering::SeqCst));
        rec.stop();
        assert!(!flag.load(std::sync::atomic::Ordering::SeqCst));
    }
}
