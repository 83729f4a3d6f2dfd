//! Bootstrap configuration loading
//!
//! Encore reads a single TOML file at startup. The file is located by
//! priority:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. `<config dir>/encore/config.toml` (OS-dependent, via `dirs`)
//! 4. Built-in defaults (no file at all)
//!
//! Every key has a built-in default, so an empty file is a valid config.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "ENCORE_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// HTTP control API port
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub video: VideoConfig,

    #[serde(default)]
    pub audio_share: AudioShareConfig,

    #[serde(default)]
    pub http: HttpConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Per-guild playback behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Grace period before an empty voice channel is left
    #[serde(default = "default_idle_disconnect_secs")]
    pub idle_disconnect_secs: u64,

    /// Drop a track whose stream fails and continue with the next one.
    /// When false the engine halts in Errored at the broken head.
    #[serde(default)]
    pub skip_failed_tracks: bool,

    /// Number of ranked results offered by an interactive search
    #[serde(default = "default_search_results")]
    pub search_results: usize,

    /// How long a search offer stays selectable
    #[serde(default = "default_selection_timeout_secs")]
    pub selection_timeout_secs: u64,

    /// Per-guild event channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Which catalog answers streaming-video metadata, playlist and search queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VideoBackendKind {
    /// Invidious-compatible mirror API (no key required)
    Invidious,
    /// Official Data API v3 (requires `api_key`)
    DataApi,
}

/// Streaming-video backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default = "default_video_backend")]
    pub backend: VideoBackendKind,

    /// Data API key (required for `data-api`)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Data API base URL
    #[serde(default = "default_data_api_base")]
    pub data_api_base: String,

    /// Invidious instance used for catalog queries and stream extraction
    #[serde(default = "default_invidious_instance")]
    pub invidious_instance: String,

    /// Additional mirror hosts whose links are treated as video links
    #[serde(default = "default_mirror_hosts")]
    pub mirror_hosts: Vec<String>,

    /// Opaque credential blob sent as a `Cookie` header (read-only here)
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,
}

/// Audio-share backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioShareConfig {
    /// API client id; audio-share links are unsupported without one
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default = "default_audio_share_api_base")]
    pub api_base: String,
}

/// Outbound HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout for backend calls
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_port() -> u16 {
    5750
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_idle_disconnect_secs() -> u64 {
    30
}

fn default_search_results() -> usize {
    10
}

fn default_selection_timeout_secs() -> u64 {
    30
}

fn default_event_capacity() -> usize {
    100
}

fn default_video_backend() -> VideoBackendKind {
    VideoBackendKind::Invidious
}

fn default_data_api_base() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_invidious_instance() -> String {
    "https://yewtu.be".to_string()
}

fn default_mirror_hosts() -> Vec<String> {
    vec![
        "yewtu.be".to_string(),
        "invidious.nerdvpn.de".to_string(),
        "inv.nadeko.net".to_string(),
        "piped.video".to_string(),
    ]
}

fn default_audio_share_api_base() -> String {
    "https://api-v2.soundcloud.com".to_string()
}

fn default_http_timeout_secs() -> u64 {
    20
}

fn default_user_agent() -> String {
    concat!("Encore/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            logging: LoggingConfig::default(),
            playback: PlaybackConfig::default(),
            video: VideoConfig::default(),
            audio_share: AudioShareConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            idle_disconnect_secs: default_idle_disconnect_secs(),
            skip_failed_tracks: false,
            search_results: default_search_results(),
            selection_timeout_secs: default_selection_timeout_secs(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            backend: default_video_backend(),
            api_key: None,
            data_api_base: default_data_api_base(),
            invidious_instance: default_invidious_instance(),
            mirror_hosts: default_mirror_hosts(),
            cookie_file: None,
        }
    }
}

impl Default for AudioShareConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            api_base: default_audio_share_api_base(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl TomlConfig {
    /// Parse and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Locate and load the config file, falling back to built-in defaults
    ///
    /// An explicitly named file (CLI or environment) must exist; the
    /// OS-default location is optional.
    pub fn resolve(cli_arg: Option<&Path>) -> Result<(Self, Option<PathBuf>)> {
        let env_value = std::env::var(CONFIG_ENV_VAR).ok();
        match resolve_config_path(cli_arg, env_value.as_deref(), default_config_path()) {
            Some(path) => Ok((Self::load(&path)?, Some(path))),
            None => {
                debug!("No config file found, using built-in defaults");
                let config = Self::default();
                config.validate()?;
                Ok((config, None))
            }
        }
    }

    /// Reject configurations that cannot work at runtime
    pub fn validate(&self) -> Result<()> {
        if self.playback.idle_disconnect_secs == 0 {
            return Err(Error::Config(
                "playback.idle_disconnect_secs must be greater than zero".to_string(),
            ));
        }
        if self.playback.selection_timeout_secs == 0 {
            return Err(Error::Config(
                "playback.selection_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if !(1..=50).contains(&self.playback.search_results) {
            return Err(Error::Config(format!(
                "playback.search_results must be between 1 and 50 (got {})",
                self.playback.search_results
            )));
        }
        if self.video.backend == VideoBackendKind::DataApi
            && self.video.api_key.as_deref().map_or(true, str::is_empty)
        {
            return Err(Error::Config(
                "video.api_key is required when video.backend = \"data-api\"".to_string(),
            ));
        }
        for (key, value) in [
            ("video.invidious_instance", &self.video.invidious_instance),
            ("video.data_api_base", &self.video.data_api_base),
            ("audio_share.api_base", &self.audio_share.api_base),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "{} must be an http(s) URL (got '{}')",
                    key, value
                )));
            }
        }
        if self.http.timeout_secs == 0 {
            return Err(Error::Config(
                "http.timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl VideoConfig {
    /// Read the optional credential blob
    ///
    /// The blob is opaque to Encore; surrounding whitespace is trimmed and an
    /// empty file counts as no credentials.
    pub fn read_cookie(&self) -> Result<Option<String>> {
        let Some(path) = &self.cookie_file else {
            return Ok(None);
        };
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read cookie file {}: {}", path.display(), e))
        })?;
        let trimmed = content.trim();
        Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
    }
}

/// Pick the config file by priority: CLI, environment, OS default
///
/// The OS default is only used when it exists on disk.
pub fn resolve_config_path(
    cli_arg: Option<&Path>,
    env_value: Option<&str>,
    default_path: Option<PathBuf>,
) -> Option<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Some(path) = env_value.filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(path));
    }

    // Priority 3: OS-dependent default location
    default_path.filter(|p| p.exists())
}

/// `<config dir>/encore/config.toml` for the current platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("encore").join("config.toml"))
}
