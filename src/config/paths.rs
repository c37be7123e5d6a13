//! Cross-platform application paths using the `dirs` crate.
//!
//! Layout:
//!
//! Config dir (settings + profiles):
//!   Windows: %APPDATA%\interview-copilot\
//!   macOS:   ~/Library/Application Support/interview-copilot/
//!   Linux:   ~/.config/interview-copilot/
//!
//! Data dir (models):
//!   Windows: %LOCALAPPDATA%\interview-copilot\
//!   macOS:   ~/Library/Application Support/interview-copilot/
//!   Linux:   ~/.local/share/interview-copilot/

use std::path::PathBuf;

/// Holds all resolved application directory/file paths.
#[derive(Debug, Clone)]
pub struct AppPaths {
    /// Directory for `settings.toml` and the profiles directory.
    pub config_dir: PathBuf,
    /// Full path to `settings.toml`.
    pub settings_file: PathBuf,
    /// Directory for candidate profile JSON files.
    pub profiles_dir: PathBuf,
    /// Directory for downloaded GGML model files.
    pub models_dir: PathBuf,
}

impl AppPaths {
    const APP_NAME: &'static str = "interview-copilot";

    /// Resolves all paths using the `dirs` crate.
    ///
    /// Falls back to the current directory if the platform cannot provide a
    /// standard path (should be extremely rare in practice).
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(Self::APP_NAME);

        let settings_file = config_dir.join("settings.toml");
        let profiles_dir = config_dir.join("profiles");
        let models_dir = data_dir.join("models");

        Self {
            config_dir,
            settings_file,
            profiles_dir,
            models_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
