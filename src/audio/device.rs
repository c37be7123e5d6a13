//! Capture-device selection.
//!
//! Interview audio arrives through whatever the OS can expose: WASAPI
//! loopback on an output device, a virtual-cable input (VB-Audio, Stereo
//! Mix, PulseAudio monitors), or as a last resort a plain microphone.
//! [`pick_device`] probes the candidates in priority order:
//!
//! 1. a loopback-capable output device whose probe capture carries signal,
//! 2. an input device whose name matches the virtual-cable pattern and
//!    whose test stream opens,
//! 3. any input device whose test stream opens,
//! 4. the OS default input.
//!
//! Enumeration and probing go through the [`DeviceProbe`] trait so the
//! selection logic is testable without hardware; [`CpalProbe`] is the
//! production implementation.

use std::sync::mpsc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait};
use regex::Regex;
use thiserror::Error;

use crate::config::AudioConfig;

use super::capture::{AudioCapture, AudioChunk, CaptureError};
use super::level::rms;

/// Input-device names that indicate a virtual cable or monitor source.
pub const VIRTUAL_INPUT_PATTERN: &str =
    r"(?i)(cable output|vb-audio|voicemeeter out|stereo mix|virtual|monitor)";

// ---------------------------------------------------------------------------
// DeviceHandle
// ---------------------------------------------------------------------------

/// How the selected device is opened for capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceKind {
    /// Output device captured via loopback.
    Loopback,
    /// Ordinary (or virtual-cable) input device.
    Input,
}

/// A selected capture device, as returned by [`pick_device`].
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceHandle {
    /// Platform device name.
    pub name: String,
    /// Whether to open the device as loopback or input.
    pub kind: DeviceKind,
    /// Native sample rate observed while probing, in Hz.
    pub sample_rate: u32,
}

impl DeviceHandle {
    /// Whether this device taps system output rather than a microphone.
    pub fn is_loopback(&self) -> bool {
        self.kind == DeviceKind::Loopback
    }
}

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Errors raised during device selection. `Unavailable` is fatal to the
/// session and never auto-retried.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No loopback, virtual or plain input device could be opened.
    #[error("no usable capture device (tried loopback, virtual inputs and microphones)")]
    Unavailable,

    /// A device named during selection disappeared before it was opened.
    #[error("capture device not found: {0}")]
    NotFound(String),

    #[error("invalid device-name pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

// ---------------------------------------------------------------------------
// DeviceProbe
// ---------------------------------------------------------------------------

/// Enumeration and probing backend for [`pick_device`].
pub trait DeviceProbe {
    /// Names of loopback-capable output devices, in enumeration order.
    fn loopback_candidates(&self) -> Vec<String>;

    /// Names of input devices, in enumeration order.
    fn input_candidates(&self) -> Vec<String>;

    /// Capture roughly `probe_secs` of audio from the named output device
    /// via loopback and return `(rms, native_sample_rate)`.
    fn probe_loopback(&self, name: &str, probe_secs: f32) -> Result<(f32, u32), DeviceError>;

    /// Open a short test stream on the named input device and return its
    /// native sample rate.
    fn probe_input(&self, name: &str) -> Result<u32, DeviceError>;

    /// Name and native rate of the OS default input device, if any.
    fn default_input(&self) -> Option<(String, u32)>;
}

// Picker logic must stay usable behind a trait object.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn DeviceProbe>) {}
};

// ---------------------------------------------------------------------------
// pick_device
// ---------------------------------------------------------------------------

/// Select the best available capture device.
///
/// Loopback candidates are accepted only when the probe capture's RMS
/// exceeds `config.probe_noise_floor` — a loopback that opens but carries
/// no signal is skipped.  Virtual inputs and plain inputs are accepted as
/// soon as a test stream opens.  Within each tier a working candidate whose
/// native rate equals `config.preferred_rate` wins immediately; otherwise
/// the first working candidate of the tier is used.
///
/// # Errors
///
/// Returns [`DeviceError::Unavailable`] when every candidate fails; callers
/// treat that as fatal and end the session.
pub fn pick_device(probe: &dyn DeviceProbe, config: &AudioConfig) -> Result<DeviceHandle, DeviceError> {
    // 1. Working loopback on an output device.
    let mut first_working: Option<DeviceHandle> = None;
    for name in probe.loopback_candidates() {
        match probe.probe_loopback(&name, config.probe_secs) {
            Ok((level, rate)) if level > config.probe_noise_floor => {
                let handle = DeviceHandle {
                    name,
                    kind: DeviceKind::Loopback,
                    sample_rate: rate,
                };
                if rate == config.preferred_rate {
                    log::info!(
                        "selected loopback device '{}' (rms {level:.6}, {rate} Hz)",
                        handle.name
                    );
                    return Ok(handle);
                }
                if first_working.is_none() {
                    first_working = Some(handle);
                }
            }
            Ok((level, _)) => {
                log::debug!("loopback '{name}' opened but carries no audio (rms {level:.8})");
            }
            Err(err) => {
                log::debug!("loopback '{name}' not usable: {err}");
            }
        }
    }
    if let Some(handle) = first_working {
        log::info!(
            "selected loopback device '{}' ({} Hz)",
            handle.name,
            handle.sample_rate
        );
        return Ok(handle);
    }

    // 2. Virtual-cable / monitor inputs by name.
    let virtual_re = Regex::new(VIRTUAL_INPUT_PATTERN)?;
    let mut first_working: Option<DeviceHandle> = None;
    for name in probe.input_candidates() {
        if !virtual_re.is_match(&name) {
            continue;
        }
        match probe.probe_input(&name) {
            Ok(rate) => {
                let handle = DeviceHandle {
                    name,
                    kind: DeviceKind::Input,
                    sample_rate: rate,
                };
                if rate == config.preferred_rate {
                    log::info!("selected virtual input '{}' ({rate} Hz)", handle.name);
                    return Ok(handle);
                }
                if first_working.is_none() {
                    first_working = Some(handle);
                }
            }
            Err(err) => {
                log::debug!("virtual input '{name}' not usable: {err}");
            }
        }
    }
    if let Some(handle) = first_working {
        log::info!(
            "selected virtual input '{}' ({} Hz)",
            handle.name,
            handle.sample_rate
        );
        return Ok(handle);
    }

    // 3. Any input that opens.
    let mut first_working: Option<DeviceHandle> = None;
    for name in probe.input_candidates() {
        match probe.probe_input(&name) {
            Ok(rate) => {
                let handle = DeviceHandle {
                    name,
                    kind: DeviceKind::Input,
                    sample_rate: rate,
                };
                if rate == config.preferred_rate {
                    log::info!("selected input '{}' ({rate} Hz)", handle.name);
                    return Ok(handle);
                }
                if first_working.is_none() {
                    first_working = Some(handle);
                }
            }
            Err(err) => {
                log::debug!("input '{name}' not usable: {err}");
            }
        }
    }
    if let Some(handle) = first_working {
        log::info!(
            "selected input '{}' ({} Hz)",
            handle.name,
            handle.sample_rate
        );
        return Ok(handle);
    }

    // 4. OS default input.
    if let Some((name, rate)) = probe.default_input() {
        log::info!("falling back to default input '{name}' ({rate} Hz)");
        return Ok(DeviceHandle {
            name,
            kind: DeviceKind::Input,
            sample_rate: rate,
        });
    }

    Err(DeviceError::Unavailable)
}

// ---------------------------------------------------------------------------
// CpalProbe
// ---------------------------------------------------------------------------

/// Production [`DeviceProbe`] backed by the default cpal host.
pub struct CpalProbe {
    host: cpal::Host,
}

impl CpalProbe {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    fn find_output(&self, name: &str) -> Result<cpal::Device, DeviceError> {
        self.host
            .output_devices()
            .ok()
            .and_then(|mut devices| {
                devices.find(|d| d.name().map(|n| n == name).unwrap_or(false))
            })
            .ok_or_else(|| DeviceError::NotFound(name.to_string()))
    }

    fn find_input(&self, name: &str) -> Result<cpal::Device, DeviceError> {
        self.host
            .input_devices()
            .ok()
            .and_then(|mut devices| {
                devices.find(|d| d.name().map(|n| n == name).unwrap_or(false))
            })
            .ok_or_else(|| DeviceError::NotFound(name.to_string()))
    }

    /// Open the selected device for capture.
    pub fn open(&self, handle: &DeviceHandle) -> Result<AudioCapture, DeviceError> {
        let capture = match handle.kind {
            DeviceKind::Loopback => AudioCapture::from_output_device(self.find_output(&handle.name)?)?,
            DeviceKind::Input => AudioCapture::from_input_device(self.find_input(&handle.name)?)?,
        };
        Ok(capture)
    }
}

impl Default for CpalProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceProbe for CpalProbe {
    fn loopback_candidates(&self) -> Vec<String> {
        self.host
            .output_devices()
            .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
            .unwrap_or_default()
    }

    fn input_candidates(&self) -> Vec<String> {
        self.host
            .input_devices()
            .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
            .unwrap_or_default()
    }

    fn probe_loopback(&self, name: &str, probe_secs: f32) -> Result<(f32, u32), DeviceError> {
        let capture = AudioCapture::from_output_device(self.find_output(name)?)?;
        let rate = capture.sample_rate();

        let (tx, rx) = mpsc::channel::<AudioChunk>();
        let _handle = capture.start(tx)?;

        // Collect whatever arrives during the probe window.
        let deadline = Instant::now() + Duration::from_secs_f32(probe_secs);
        let mut samples = Vec::new();
        while let Some(remaining) = deadline.checked_duration_since(Instant::now()) {
            match rx.recv_timeout(remaining) {
                Ok(chunk) => samples.extend_from_slice(&chunk.samples),
                Err(_) => break,
            }
        }

        Ok((rms(&samples), rate))
    }

    fn probe_input(&self, name: &str) -> Result<u32, DeviceError> {
        let capture = AudioCapture::from_input_device(self.find_input(name)?)?;
        let rate = capture.sample_rate();

        // The stream must actually open and play; the data is discarded.
        let (tx, _rx) = mpsc::channel::<AudioChunk>();
        let handle = capture.start(tx)?;
        drop(handle);

        Ok(rate)
    }

    fn default_input(&self) -> Option<(String, u32)> {
        let device = self.host.default_input_device()?;
        let name = device.name().ok()?;
        let rate = device.default_input_config().ok()?.sample_rate().0;
        Some((name, rate))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
