//! System-audio capture via `cpal`.
//!
//! [`AudioCapture`] wraps the cpal device/stream lifecycle for either an
//! ordinary input device or a loopback-capable output device (WASAPI
//! loopback, PulseAudio monitors exposed as inputs, virtual cables).  Call
//! [`AudioCapture::start`] to begin streaming [`AudioChunk`]s over an mpsc
//! channel.  The returned [`StreamHandle`] is a RAII guard — dropping it
//! stops the underlying cpal stream.

use cpal::traits::{DeviceTrait, StreamTrait};
use std::sync::mpsc;
use thiserror::Error;

// ---------------------------------------------------------------------------
// AudioChunk
// ---------------------------------------------------------------------------

/// A single buffer of raw audio as delivered by the cpal callback.
///
/// Samples are interleaved `f32` in the range `[-1.0, 1.0]`.
/// Use [`crate::audio::downmix_mono`] to collapse channels and
/// [`crate::audio::resample_linear`] to convert rates before passing audio
/// to the STT engine.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Interleaved PCM samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    /// Sample rate of this chunk in Hz (e.g. 44100, 48000, 16000).
    pub sample_rate: u32,
    /// Number of interleaved channels (1 = mono, 2 = stereo, …).
    pub channels: u16,
}

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps the cpal stream alive.
///
/// Dropping this value calls `cpal::Stream::drop` which pauses/stops the
/// underlying hardware stream.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// CaptureError
// ---------------------------------------------------------------------------

/// Errors that can occur while setting up or running audio capture.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("failed to query device name: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error("failed to query default stream config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build input stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// AudioCapture
// ---------------------------------------------------------------------------

/// Capture wrapper around a single cpal device.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::mpsc;
/// use cpal::traits::HostTrait;
/// use interview_copilot::audio::{AudioCapture, AudioChunk};
///
/// let host = cpal::default_host();
/// let device = host.default_input_device().unwrap();
/// let (tx, rx) = mpsc::channel::<AudioChunk>();
/// let capture = AudioCapture::from_input_device(device).unwrap();
/// let _handle = capture.start(tx).unwrap();
/// // `_handle` keeps the stream alive; drop it to stop capturing.
/// ```
pub struct AudioCapture {
    device: cpal::Device,
    config: cpal::StreamConfig,
    /// Native sample rate reported by the device (Hz).
    sample_rate: u32,
    /// Number of interleaved channels reported by the device.
    channels: u16,
    /// Whether this capture taps an output device (loopback).
    is_loopback: bool,
}

impl AudioCapture {
    /// Wrap an input device using its preferred stream configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::DefaultConfig`] when the device cannot report
    /// a default input configuration.
    pub fn from_input_device(device: cpal::Device) -> Result<Self, CaptureError> {
        let supported = device.default_input_config()?;
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
            is_loopback: false,
        })
    }

    /// Wrap an output device for loopback capture using its preferred
    /// output configuration.
    ///
    /// Whether the platform actually honours an input stream opened on an
    /// output device (WASAPI loopback does, most others do not) is only
    /// known once [`AudioCapture::start`] is called — a rejection surfaces
    /// there as [`CaptureError::BuildStream`].
    pub fn from_output_device(device: cpal::Device) -> Result<Self, CaptureError> {
        let supported = device.default_output_config()?;
        let channels = supported.channels();
        let sample_rate = supported.sample_rate().0;
        let config: cpal::StreamConfig = supported.into();

        Ok(Self {
            device,
            config,
            sample_rate,
            channels,
            is_loopback: true,
        })
    }

    /// Start capturing and send [`AudioChunk`]s to `tx`.
    ///
    /// The cpal callback runs on a dedicated audio thread; each time the
    /// platform delivers a buffer the raw `f32` samples are wrapped in an
    /// [`AudioChunk`] and forwarded over the channel.  Send errors (receiver
    /// dropped) are silently ignored so the audio thread never panics.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::BuildStream`] or [`CaptureError::PlayStream`]
    /// if the platform rejects the stream configuration.
    pub fn start(&self, tx: mpsc::Sender<AudioChunk>) -> Result<StreamHandle, CaptureError> {
        let sample_rate = self.sample_rate;
        let channels = self.channels;

        let stream = self.device.build_input_stream(
            &self.config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let chunk = AudioChunk {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                };
                // Ignore send errors; the receiver may have been dropped.
                let _ = tx.send(chunk);
            },
            |err: cpal::StreamError| {
                log::error!("cpal stream error: {err}");
            },
            None, // no timeout
        )?;

        stream.play()?;
        Ok(StreamHandle { _stream: stream })
    }

    /// Device name as reported by the platform.
    pub fn device_name(&self) -> Result<String, CaptureError> {
        Ok(self.device.name()?)
    }

    /// Native sample rate of the capture stream in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels in each [`AudioChunk`].
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Whether this capture taps an output device (loopback).
    pub fn is_loopback(&self) -> bool {
        self.is_loopback
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
