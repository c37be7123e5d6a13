//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::AppPaths;

// ---------------------------------------------------------------------------
// LlmConfig
// ---------------------------------------------------------------------------

/// Settings for the answer-generation backends.
///
/// Two providers are configured at once: a hosted chat-completions API
/// (preferred, requires an API key) and a local JSON-lines streaming API
/// (fallback, no auth). Which one actually serves a request is decided by
/// the provider state machine in [`crate::llm::StreamingClient`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the hosted OpenAI-compatible API, up to but not
    /// including `/v1/...` (e.g. `https://api.groq.com/openai`).
    pub remote_base_url: String,
    /// API key for the hosted provider — `None` disables it entirely.
    pub remote_api_key: Option<String>,
    /// Model identifier sent to the hosted API.
    pub remote_model: String,
    /// Base URL of the local engine (e.g. `http://localhost:11434`).
    pub local_base_url: String,
    /// Model tag sent to the local engine.
    pub local_model: String,
    /// Sampling temperature (0.0 – 1.0).  Lower = more deterministic.
    pub temperature: f32,
    /// Hard cap on generated tokens per answer.
    pub max_tokens: u32,
    /// Nucleus-sampling mass (0.0 – 1.0).
    pub top_p: f32,
    /// Maximum seconds to wait for a provider response.  A timeout counts
    /// as a provider failure and follows the fallback policy.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            remote_base_url: "https://api.groq.com/openai".into(),
            remote_api_key: None,
            remote_model: "llama-3.3-70b-versatile".into(),
            local_base_url: "http://localhost:11434".into(),
            local_model: "llama3.2:3b".into(),
            temperature: 0.3,
            max_tokens: 400,
            top_p: 0.9,
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// SttConfig
// ---------------------------------------------------------------------------

/// Settings for the Whisper STT engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    /// GGML model name / file stem (e.g. `"base"`, `"large-v3"`).
    pub model: String,
    /// Primary speech language as an ISO-639-1 code, or `"auto"` for
    /// Whisper's built-in language detection.
    pub language: String,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model: "base".into(),
            language: "en".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AudioConfig
// ---------------------------------------------------------------------------

/// Settings for device selection and the capture path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Capture rate requested from the device picker in Hz.
    pub preferred_rate: u32,
    /// RMS floor below which a recorded clip is treated as silence and the
    /// transcription engine is never invoked.
    pub silence_rms: f32,
    /// RMS a loopback device must exceed during the probe capture to count
    /// as actually carrying audio.
    pub probe_noise_floor: f32,
    /// Duration of the loopback probe capture in seconds.
    pub probe_secs: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            preferred_rate: 48_000,
            silence_rms: 1e-4,
            probe_noise_floor: 1e-6,
            probe_secs: 0.3,
        }
    }
}

// ---------------------------------------------------------------------------
// DetectorConfig
// ---------------------------------------------------------------------------

/// Keyword lists driving question-type classification.
///
/// The regex probes in [`crate::detect::QuestionDetector`] decide *whether*
/// something is a question; these lists only decide the type tag.  The
/// behavioral list is checked before the technical one; the first
/// containment hit wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Phrases indicating a behavioral question (checked first).
    pub behavioral_keywords: Vec<String>,
    /// Phrases indicating a technical question.
    pub technical_keywords: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            behavioral_keywords: [
                "tell me about a time",
                "describe a situation",
                "give me an example",
                "experience with",
                "challenge you faced",
                "conflict",
                "team",
                "leadership",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            technical_keywords: [
                "how does",
                "explain",
                "implement",
                "algorithm",
                "system design",
                "architecture",
                "code",
                "database",
                "api",
                "performance",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

/// Settings for the interview session loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum prior Q/A pairs kept for prompt context.
    pub history_window: usize,
    /// Profile name loaded from the profiles directory.
    pub profile: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_window: 3,
            profile: "default".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use interview_copilot::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Answer-generation backend settings.
    pub llm: LlmConfig,
    /// STT engine settings.
    pub stt: SttConfig,
    /// Device selection / capture settings.
    pub audio: AudioConfig,
    /// Question-type keyword lists.
    pub detector: DetectorConfig,
    /// Session loop settings.
    pub session: SessionConfig,
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
