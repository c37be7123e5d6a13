//! Audio pipeline — device selection → capture → recorder → resampling.
//!
//! # Pipeline
//!
//! ```text
//! pick_device → AudioCapture → AudioChunk (mpsc) → Recorder (flag-gated)
//!            → RecordedClip → downmix_mono / resample_linear → STT
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::mpsc;
//! use interview_copilot::audio::{pick_device, AudioChunk, CpalProbe, Recorder};
//! use interview_copilot::config::AudioConfig;
//!
//! let probe = CpalProbe::new();
//! let handle = pick_device(&probe, &AudioConfig::default()).unwrap();
//! let capture = probe.open(&handle).unwrap();
//!
//! let (tx, rx) = mpsc::channel::<AudioChunk>();
//! let _stream = capture.start(tx).unwrap(); // drops handle → stops stream
//!
//! let recorder = Recorder::new(capture.sample_rate());
//! recorder.start();
//! while let Ok(chunk) = rx.try_recv() {
//!     recorder.ingest(&chunk);
//! }
//! let clip = recorder.stop();
//! println!("recorded {:.2}s", clip.duration_secs());
//! ```

pub mod capture;
pub mod device;
pub mod level;
pub mod recorder;
pub mod resample;

pub use capture::{AudioCapture, AudioChunk, CaptureError, StreamHandle};
pub use device::{
    pick_device, CpalProbe, DeviceError, DeviceHandle, DeviceKind, DeviceProbe,
    VIRTUAL_INPUT_PATTERN,
};
pub use level::{peak, rms};
pub use recorder::{RecordedClip, Recorder};
pub use resample::{downmix_mono, resample_linear, STT_SAMPLE_RATE};
