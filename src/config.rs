//! TOML-backed configuration with environment overrides.

use crate::audio::AudioFormat;
use crate::defaults;
use crate::error::Result;
use crate::session::wire::Backoff;
use crate::session::{Credentials, SessionConfig, SessionOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub timeouts: TimeoutConfig,
}

/// Recognition service configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service hostname, without scheme.
    pub hostname: Option<String>,
    pub apikey: Option<String>,
    /// Path to a downloaded credentials JSON, used when the apikey or
    /// hostname is not given directly.
    pub credentials_file: Option<PathBuf>,
    pub model: Option<String>,
    pub interim_results: bool,
    pub inactivity_timeout: Option<i64>,
}

/// Audio source configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub chunk_frames: usize,
}

/// Timeout and retry configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub token_secs: u64,
    pub ready_secs: u64,
    pub connect_attempts: u32,
    pub connect_backoff_ms: u64,
    pub connect_backoff_cap_ms: u64,
    pub read_poll_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            apikey: None,
            credentials_file: None,
            model: None,
            interim_results: true,
            inactivity_timeout: None,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            chunk_frames: defaults::CHUNK_FRAMES,
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            token_secs: defaults::TOKEN_TIMEOUT.as_secs(),
            ready_secs: defaults::READY_TIMEOUT.as_secs(),
            connect_attempts: defaults::CONNECT_ATTEMPTS,
            connect_backoff_ms: defaults::CONNECT_BACKOFF.as_millis() as u64,
            connect_backoff_cap_ms: defaults::CONNECT_BACKOFF_CAP.as_millis() as u64,
            read_poll_ms: defaults::READ_TIMEOUT.as_millis() as u64,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Panics on invalid TOML so a typo never silently reverts settings.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(crate::error::VoxlineError::Io(e))
                if e.kind() == std::io::ErrorKind::NotFound =>
            {
                Self::default()
            }
            Err(e) => panic!("Failed to load config from {}: {}", path.display(), e),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOXLINE_HOSTNAME → service.hostname
    /// - VOXLINE_APIKEY → service.apikey
    /// - VOXLINE_MODEL → service.model
    /// - VOXLINE_DEVICE → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(hostname) = std::env::var("VOXLINE_HOSTNAME")
            && !hostname.is_empty()
        {
            self.service.hostname = Some(hostname);
        }

        if let Ok(apikey) = std::env::var("VOXLINE_APIKEY")
            && !apikey.is_empty()
        {
            self.service.apikey = Some(apikey);
        }

        if let Ok(model) = std::env::var("VOXLINE_MODEL")
            && !model.is_empty()
        {
            self.service.model = Some(model);
        }

        if let Ok(device) = std::env::var("VOXLINE_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/voxline/config.toml on Linux
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|dir| dir.join("voxline").join("config.toml"))
            .ok_or_else(|| crate::error::VoxlineError::Configuration {
                message: "could not determine config directory".to_string(),
            })
    }

    /// Rejects values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(crate::error::VoxlineError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.audio.chunk_frames == 0 {
            return Err(crate::error::VoxlineError::ConfigInvalidValue {
                key: "audio.chunk_frames".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.timeouts.connect_attempts == 0 {
            return Err(crate::error::VoxlineError::ConfigInvalidValue {
                key: "timeouts.connect_attempts".to_string(),
                message: "at least one attempt is required".to_string(),
            });
        }
        Ok(())
    }

    /// Audio format the session and sources will run at.
    pub fn audio_format(&self) -> AudioFormat {
        AudioFormat {
            sample_rate: self.audio.sample_rate,
            channels: defaults::CHANNELS,
        }
    }

    /// Credentials builder seeded from this configuration.
    pub fn credentials(&self) -> Credentials {
        let mut credentials = Credentials::new();
        if let Some(path) = &self.service.credentials_file {
            credentials = credentials.file(path);
        }
        if let (Some(apikey), Some(hostname)) = (&self.service.apikey, &self.service.hostname) {
            credentials = credentials.api_key(apikey, hostname);
        }
        credentials
    }

    /// Session parameters derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            recognize_path: defaults::RECOGNIZE_PATH.to_string(),
            model: self.service.model.clone(),
            options: SessionOptions {
                interim_results: Some(self.service.interim_results),
                inactivity_timeout: self.service.inactivity_timeout,
                ..Default::default()
            },
            audio: self.audio_format(),
            ready_timeout: Duration::from_secs(self.timeouts.ready_secs),
            backoff: Backoff {
                attempts: self.timeouts.connect_attempts.max(1),
                base: Duration::from_millis(self.timeouts.connect_backoff_ms),
                cap: Duration::from_millis(self.timeouts.connect_backoff_cap_ms),
            },
            read_timeout: Duration::from_millis(self.timeouts.read_poll_ms),
        }
    }
}
