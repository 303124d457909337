//! Common types and utilities for vidd.
//!
//! This crate defines the shared data structures and IPC protocol used for
//! communication between the player daemon (`vidd`) and its hosts: the
//! `vidctl` client, the projection software's native shim, or any other
//! process that can write JSON lines to a Unix socket.
//!
//! # IPC Protocol
//!
//! Communication happens over a Unix domain socket using JSON-serialized
//! messages, one per line. The host sends [`Command`] variants and receives
//! [`Response`] variants. Failures never surface as anything but a
//! [`Response::Error`] carrying a [`PlayerError`].
//!
//! # Examples
//!
//! ```no_run
//! use common::Command;
//!
//! // Load a video without starting it, keeping its aspect ratio
//! let cmd = Command::LoadVideo {
//!     path: "/media/worship/intro.mp4".to_string(),
//!     options: String::new(),
//!     stretch: false,
//! };
//!
//! // Serialize for sending over IPC
//! let json = serde_json::to_string(&cmd).unwrap();
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error taxonomy shared between hosts and the daemon.
///
/// All errors are serializable for transmission over IPC.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlayerError {
    /// The backend was never constructed, or the last load failed.
    #[error("Player not initialized: {0}")]
    NotInitialized(String),

    /// Out-of-range or non-finite argument (volume, percent, size, hue).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Transport call issued with no active session.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("IPC error: {0}")]
    Ipc(String),
}

impl From<std::io::Error> for PlayerError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

impl From<serde_json::Error> for PlayerError {
    fn from(e: serde_json::Error) -> Self {
        Self::Ipc(e.to_string())
    }
}

/// Commands sent from a host to the daemon via IPC.
///
/// There is one variant per player operation. Commands are serialized to JSON
/// and sent over a Unix socket.
///
/// # Examples
///
/// ```
/// use common::Command;
///
/// // Load and immediately play, stretched to the window
/// let cmd = Command::PlayPath {
///     path: "/media/loops/clouds.mov".to_string(),
///     options: String::new(), // reserved, ignored
///     stretch: true,
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Whether the backend is constructed and the last load succeeded
    IsInit,
    /// Fade the render surface in (playback untouched)
    FadeUp,
    /// Fade the render surface out, then stop playback
    FadeDown,
    /// Loop on natural end of media
    SetRepeat { repeat: bool },
    /// Load a video without starting playback.
    LoadVideo {
        /// File path or URL. A leading `~` is expanded, `www...` becomes `http://www...`
        path: String,
        /// Reserved load options; accepted and ignored
        options: String,
        /// Ignore the source aspect ratio and fill the surface
        stretch: bool,
    },
    /// Start or resume the loaded video
    Play,
    /// Load then play
    PlayPath {
        path: String,
        options: String,
        stretch: bool,
    },
    GetLastLocation,
    Pause,
    Stop,
    IsMute,
    SetMute { mute: bool },
    /// Playback position as a fraction of the duration
    GetProgress,
    /// Seek to a fraction of the duration (0.0-1.0)
    SetProgress { percent: f64 },
    IsPlaying,
    IsPaused,
    IsFinished,
    SetVisible { visible: bool },
    /// Volume between 0.0 and 1.0, clamped
    SetVolume { volume: f64 },
    GetVolume,
    /// Window position, origin at the top-left of the main screen
    SetLocation { x: i32, y: i32 },
    SetSize { width: i32, height: i32 },
    /// Hue rotation in radians (-pi to pi)
    SetHue { hue: f64 },
    GetHue,
    /// Duration of fade-up / fade-down in seconds
    SetFadeSpeed { seconds: f64 },
    /// Stretch mode for the next load (and the live surface)
    SetStretch { stretch: bool },
    /// Load options for the next load
    SetOptions { options: String },
    /// Elapsed playback time in seconds
    GetCurrentTime,
    /// Total media length in seconds
    GetTotalTime,
    /// Query daemon and session status
    Query,
    /// Ping the daemon
    Ping,
    /// Stop playback and shut the daemon down
    Kill,
}

/// Response from daemon to host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Error(PlayerError),
    Bool(bool),
    Number(f64),
    Text(String),
    Status(DaemonStatus),
    Pong,
}

impl From<Result<(), PlayerError>> for Response {
    fn from(result: Result<(), PlayerError>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(e) => Self::Error(e),
        }
    }
}

/// Daemon status information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub version: String,
    pub uptime_secs: u64,
    /// Name of the media backend in use
    pub backend: String,
    pub session: SessionStatus,
}

/// Snapshot of the single player session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub initialized: bool,
    pub state: TransportState,
    pub last_played_file: String,
    /// RFC 3339 timestamp of the last successful load
    pub loaded_at: Option<String>,
    pub current_time: f64,
    pub duration: f64,
    pub volume: f64,
    pub muted: bool,
    pub hue: f64,
    pub repeat: bool,
    pub stretch: bool,
    pub visible: bool,
    pub opacity: f64,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub first_load: bool,
    pub did_stop: bool,
}

/// Transport state of the session.
///
/// `Stopped` and `Finished` are terminal; `Finished` re-enters `Playing` when
/// repeat is on or the host plays again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TransportState {
    #[default]
    Uninitialized,
    Loaded,
    Playing,
    Paused,
    Stopped,
    Finished,
}

impl TransportState {
    /// Whether a session is loaded and not torn down
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Loaded | Self::Playing | Self::Paused | Self::Finished
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Loaded => "loaded",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Finished => "finished",
        }
    }
}

/// Convert a host hue slider value (0.0-1.0) to a hue rotation in radians.
///
/// Values above one half map onto `0..pi` counting down from 1.0, the rest
/// onto `0..-pi`, so both ends of the slider are the neutral hue.
///
/// ```
/// let neutral = common::hue_from_unit(0.0);
/// assert_eq!(neutral, 0.0);
/// assert!((common::hue_from_unit(0.75) - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
/// ```
pub fn hue_from_unit(unit: f64) -> f64 {
    use std::f64::consts::PI;

    if unit > 0.5 {
        (1.0 - unit) * 2.0 * PI
    } else {
        -(unit * 2.0 * PI)
    }
}

/// IPC socket path helper
pub fn get_socket_path() -> std::path::PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .unwrap_or_else(|_| format!("/run/user/{}", unsafe { libc::getuid() }));

    std::path::PathBuf::from(runtime_dir).join("vidd.sock")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_hue_from_unit_ends_are_neutral() {
        assert_eq!(hue_from_unit(0.0), 0.0);
        assert!(hue_from_unit(1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hue_from_unit_halves() {
        // Lower half rotates negatively
        assert!((hue_from_unit(0.25) + PI / 2.0).abs() < 1e-9);
        assert!((hue_from_unit(0.5) + PI).abs() < 1e-9);

        // Upper half rotates positively
        assert!((hue_from_unit(0.75) - PI / 2.0).abs() < 1e-9);
        assert!(hue_from_unit(0.51) > 0.0);
    }

    #[test]
    fn test_transport_state_active() {
        assert!(!TransportState::Uninitialized.is_active());
        assert!(TransportState::Loaded.is_active());
        assert!(TransportState::Playing.is_active());
        assert!(TransportState::Paused.is_active());
        assert!(TransportState::Finished.is_active());
        assert!(!TransportState::Stopped.is_active());
        assert_eq!(TransportState::default(), TransportState::Uninitialized);
    }

    #[test]
    fn test_response_from_result() {
        assert_eq!(Response::from(Ok(())), Response::Ok);

        let err = PlayerError::InvalidState("no session".to_string());
        assert_eq!(Response::from(Err(err.clone())), Response::Error(err));
    }

    #[test]
    fn test_command_serialization() {
        let cmd = Command::LoadVideo {
            path: "/tmp/sample.mp4".to_string(),
            options: ":no-audio".to_string(),
            stretch: true,
        };
        let json = serde_json::to_string(&cmd).unwrap();
        let deserialized: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, cmd);

        let cmd = Command::SetLocation { x: -1920, y: 40 };
        let json = serde_json::to_string(&cmd).unwrap();
        let deserialized: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, cmd);
    }

    #[test]
    fn test_player_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: PlayerError = io_err.into();
        assert!(matches!(err, PlayerError::Io(_)));

        let json_err = serde_json::from_str::<Command>("invalid json").unwrap_err();
        let err: PlayerError = json_err.into();
        assert!(matches!(err, PlayerError::Ipc(_)));
    }

    #[test]
    fn test_error_display() {
        let err = PlayerError::InvalidArgument("volume is NaN".to_string());
        assert_eq!(err.to_string(), "Invalid argument: volume is NaN");
    }

    #[test]
    fn test_socket_path() {
        let path = get_socket_path();
        assert!(path.to_str().unwrap().contains("vidd.sock"));
    }
}
