//! Native media backends.
//!
//! The facade never decodes, renders or colour-converts anything itself. It
//! drives a [`MediaBackend`], which wraps whatever media framework the target
//! platform provides:
//!
//! - `gstreamer`: `playbin` with a colour-balance / scaling video sink
//!   (cargo feature `video`)
//! - `headless`: a clock-driven simulation with no media stack at all
//!
//! # Events
//!
//! Backends run decode and render on their own threads. Anything they learn
//! asynchronously (end of stream, errors, a duration becoming known) is queued
//! and handed to the facade through [`MediaBackend::poll_events`], which is
//! only ever called from the thread that owns the facade.

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::Config;
use crate::geometry::{Origin, Rect};

#[cfg(feature = "video")]
mod gstreamer;
mod headless;

#[cfg(feature = "video")]
pub use gstreamer::GStreamerBackend;
pub use headless::{HeadlessBackend, HeadlessHandle};

/// A media location after host-side sanitising
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    File(PathBuf),
    Url(String),
}

impl MediaSource {
    /// Turn a host supplied location into a media source.
    ///
    /// Whitespace is trimmed, a leading `~` is expanded, bare `www.` hosts
    /// get an `http://` scheme and anything with a scheme is treated as a URL.
    pub fn parse(location: &str) -> Option<Self> {
        let location = location.trim();
        if location.is_empty() {
            return None;
        }

        if location.starts_with("www") {
            return Some(Self::Url(format!("http://{}", location)));
        }

        if location.contains("://") {
            return Some(Self::Url(location.to_string()));
        }

        let expanded = shellexpand::tilde(location);
        Some(Self::File(PathBuf::from(expanded.as_ref())))
    }

    /// The location as reported back to the host
    pub fn display(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Url(url) => url.clone(),
        }
    }
}

/// Something the backend observed on its own threads
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Playback reached the natural end of the media
    EndOfStream,
    /// The media length became known or changed
    DurationChanged(Duration),
    /// Playback failed irrecoverably
    Error(String),
}

/// Capabilities the facade needs from a native media framework.
///
/// All coordinates handed to a backend are already in its native
/// [`origin`](MediaBackend::origin).
pub trait MediaBackend: Send {
    /// Short name for logs and status queries
    fn name(&self) -> &'static str;

    /// Native coordinate origin of the windowing system the backend renders to
    fn origin(&self) -> Origin {
        Origin::TopLeft
    }

    /// Load media, paused at the start.
    ///
    /// `first_load` is true when no render surface exists yet; later loads
    /// reuse the surface created by the first one.
    fn load(&mut self, source: &MediaSource, first_load: bool) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    /// Halt playback and release transient render state
    fn stop(&mut self) -> Result<()>;

    fn seek(&mut self, position: Duration) -> Result<()>;

    /// Current playback position, if known
    fn position(&mut self) -> Option<Duration>;

    /// Media length, if known
    fn duration(&mut self) -> Option<Duration>;

    /// Volume between 0.0 and 1.0
    fn set_volume(&mut self, volume: f64) -> Result<()>;

    fn set_mute(&mut self, mute: bool) -> Result<()>;

    /// Place and size the render surface. With `stretch` the video fills the
    /// surface, otherwise it keeps its aspect ratio.
    fn set_geometry(&mut self, rect: Rect, stretch: bool) -> Result<()>;

    fn set_visible(&mut self, visible: bool) -> Result<()>;

    /// Surface opacity between 0.0 (black) and 1.0
    fn set_opacity(&mut self, opacity: f64) -> Result<()>;

    /// Hue rotation in radians
    fn set_hue(&mut self, hue: f64) -> Result<()>;

    /// Drain everything observed since the last call
    fn poll_events(&mut self) -> Vec<BackendEvent>;
}

/// Create the backend selected in the configuration
pub fn create(config: &Config) -> Result<Box<dyn MediaBackend>> {
    match config.backend.kind.as_str() {
        "headless" => Ok(Box::new(HeadlessBackend::from_config(config))),

        #[cfg(feature = "video")]
        "gstreamer" => Ok(Box::new(GStreamerBackend::new()?)),

        #[cfg(not(feature = "video"))]
        "gstreamer" => anyhow::bail!("GStreamer backend not compiled in (build with --features video)"),

        other => anyhow::bail!("Unknown backend: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_source_file() {
        assert_eq!(
            MediaSource::parse("  /media/intro.mp4 \n"),
            Some(MediaSource::File(PathBuf::from("/media/intro.mp4")))
        );
    }

    #[test]
    fn test_media_source_www_gets_scheme() {
        assert_eq!(
            MediaSource::parse("www.example.org/loop.mp4"),
            Some(MediaSource::Url("http://www.example.org/loop.mp4".to_string()))
        );
    }

    #[test]
    fn test_media_source_url() {
        assert_eq!(
            MediaSource::parse("rtsp://camera.local/stream"),
            Some(MediaSource::Url("rtsp://camera.local/stream".to_string()))
        );
    }

    #[test]
    fn test_media_source_tilde() {
        let source = MediaSource::parse("~/videos/a.mp4").unwrap();
        match source {
            MediaSource::File(path) => {
                assert!(!path.to_string_lossy().starts_with('~') || dirs::home_dir().is_none());
                assert!(path.ends_with("videos/a.mp4"));
            }
            MediaSource::Url(_) => panic!("Expected a file source"),
        }
    }

    #[test]
    fn test_media_source_empty() {
        assert_eq!(MediaSource::parse("   "), None);
    }

    #[test]
    fn test_create_headless() {
        let mut config = Config::default();
        config.backend.kind = "headless".to_string();
        let backend = create(&config).unwrap();
        assert_eq!(backend.name(), "headless");
    }
}
