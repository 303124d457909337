use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::geometry::{Origin, Rect};
use crate::player::EasingFunction;
use crate::validate_enum;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralSettings,

    #[serde(default)]
    pub playback: PlaybackSettings,

    #[serde(default)]
    pub display: DisplaySettings,

    #[serde(default)]
    pub backend: BackendSettings,
}

/// General daemon settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GeneralSettings {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Initial playback settings, all changeable by the host at runtime
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlaybackSettings {
    #[serde(default = "default_volume")]
    pub volume: f64,

    #[serde(default)]
    pub repeat: bool,

    #[serde(default)]
    pub stretch: bool,

    /// Duration of fade-up / fade-down
    #[serde(default = "default_fade_duration")]
    pub fade_duration_ms: u64,

    /// linear, ease-in, ease-out or ease-in-out
    #[serde(default = "default_fade_easing")]
    pub fade_easing: String,

    /// How often backend events are folded into the session
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            volume: default_volume(),
            repeat: false,
            stretch: false,
            fade_duration_ms: default_fade_duration(),
            fade_easing: default_fade_easing(),
            tick_interval_ms: default_tick_interval(),
        }
    }
}

fn default_volume() -> f64 {
    1.0
}
fn default_fade_duration() -> u64 {
    1000
}
fn default_fade_easing() -> String {
    "ease-in-out".to_string()
}
fn default_tick_interval() -> u64 {
    40
}

/// Render surface placement
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DisplaySettings {
    /// Coordinate origin of the windowing system the backend talks to
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Height of the main screen, used to flip coordinates for bottom-left origins
    #[serde(default = "default_screen_height")]
    pub screen_height: i32,

    #[serde(default)]
    pub x: i32,

    #[serde(default)]
    pub y: i32,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_true")]
    pub visible: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            screen_height: default_screen_height(),
            x: 0,
            y: 0,
            width: default_width(),
            height: default_height(),
            visible: true,
        }
    }
}

fn default_origin() -> String {
    "top-left".to_string()
}
fn default_screen_height() -> i32 {
    1080
}
fn default_width() -> u32 {
    1280
}
fn default_height() -> u32 {
    720
}
fn default_true() -> bool {
    true
}

/// Media backend selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendSettings {
    /// "gstreamer" or "headless"
    #[serde(default = "default_backend_kind")]
    pub kind: String,

    /// File extensions accepted by the headless backend
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Length the headless backend reports for every media file
    #[serde(default = "default_headless_duration")]
    pub headless_duration_secs: f64,

    #[serde(default = "default_media_width")]
    pub headless_media_width: u32,

    #[serde(default = "default_media_height")]
    pub headless_media_height: u32,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: default_backend_kind(),
            extensions: default_extensions(),
            headless_duration_secs: default_headless_duration(),
            headless_media_width: default_media_width(),
            headless_media_height: default_media_height(),
        }
    }
}

fn default_backend_kind() -> String {
    if cfg!(feature = "video") {
        "gstreamer".to_string()
    } else {
        "headless".to_string()
    }
}
fn default_extensions() -> Vec<String> {
    [
        "mp4", "m4v", "mov", "mkv", "webm", "avi", "mpg", "mpeg", "wmv", "flv", "ogv",
    ]
    .iter()
    .map(|ext| ext.to_string())
    .collect()
}
fn default_headless_duration() -> f64 {
    60.0
}
fn default_media_width() -> u32 {
    1920
}
fn default_media_height() -> u32 {
    1080
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::info!(
                "Config file not found at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("vidd");

        Ok(config_dir.join("config.toml"))
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        // Validate log level
        match self.general.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.general.log_level),
        }

        self.validate_origin(&self.display.origin)?;
        self.validate_backend_kind(&self.backend.kind)?;
        self.validate_easing(&self.playback.fade_easing)?;

        if !(0.0..=1.0).contains(&self.playback.volume) {
            anyhow::bail!(
                "Invalid volume: {} (must be 0.0-1.0)",
                self.playback.volume
            );
        }

        if self.playback.tick_interval_ms == 0 {
            anyhow::bail!("Invalid tick interval: must be at least 1ms");
        }

        if self.display.width == 0 || self.display.height == 0 {
            anyhow::bail!(
                "Invalid display size: {}x{}",
                self.display.width,
                self.display.height
            );
        }

        if self.backend.headless_duration_secs <= 0.0
            || Duration::try_from_secs_f64(self.backend.headless_duration_secs).is_err()
        {
            anyhow::bail!(
                "Invalid headless duration: {}",
                self.backend.headless_duration_secs
            );
        }

        Ok(())
    }

    fn validate_origin(&self, origin: &str) -> Result<()> {
        validate_enum!(origin, "top-left", "bottom-left")
    }

    fn validate_backend_kind(&self, kind: &str) -> Result<()> {
        validate_enum!(kind, "gstreamer", "headless")
    }

    fn validate_easing(&self, easing: &str) -> Result<()> {
        validate_enum!(easing, "linear", "ease-in", "ease-out", "ease-in-out")
    }

    /// Native origin of the configured windowing system
    pub fn origin(&self) -> Origin {
        Origin::from_str(&self.display.origin).unwrap_or_default()
    }

    /// Initial render surface rectangle in host coordinates
    pub fn initial_rect(&self) -> Rect {
        Rect::new(
            self.display.x,
            self.display.y,
            self.display.width,
            self.display.height,
        )
    }

    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.playback.fade_duration_ms)
    }

    pub fn fade_easing(&self) -> EasingFunction {
        EasingFunction::from_str(&self.playback.fade_easing).unwrap_or_default()
    }

    /// Length the headless backend reports, the default when out of range
    pub fn headless_duration(&self) -> Duration {
        Duration::try_from_secs_f64(self.backend.headless_duration_secs)
            .ok()
            .filter(|duration| !duration.is_zero())
            .unwrap_or_else(|| Duration::from_secs_f64(default_headless_duration()))
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.playback.tick_interval_ms)
    }
}
