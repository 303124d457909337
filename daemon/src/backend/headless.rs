//! Headless media backend.
//!
//! Simulates a player without any media stack: it checks that media is
//! readable and has a known extension, reports a fixed duration and advances
//! the playback position on a clock. Everything a real platform would have
//! been told (geometry, opacity, hue, volume) is recorded so hosts and tests
//! can inspect it through a [`HeadlessHandle`].

use anyhow::{Context, Result};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{BackendEvent, MediaBackend, MediaSource};
use crate::config::Config;
use crate::geometry::{Origin, Rect};

/// How the simulated playback position advances
#[derive(Debug, Clone, Copy)]
enum Clock {
    /// Follows wall-clock time, last observed at the given instant
    Realtime(Instant),
    /// Only moves through [`HeadlessHandle::advance`]
    Manual,
}

/// Simulated platform state shared with [`HeadlessHandle`]s
#[derive(Debug)]
struct HeadlessMedia {
    clock: Clock,
    loaded: Option<MediaSource>,
    surfaces_created: u32,
    playing: bool,
    position: Duration,
    duration: Duration,
    volume: f64,
    muted: bool,
    visible: bool,
    opacity: f64,
    hue: f64,
    geometry: Option<Rect>,
    content_area: Option<Rect>,
    events: Vec<BackendEvent>,
}

impl HeadlessMedia {
    fn advance(&mut self, elapsed: Duration) {
        if !self.playing || self.loaded.is_none() {
            return;
        }

        self.position += elapsed;
        if self.position >= self.duration {
            self.position = self.duration;
            self.playing = false;
            self.events.push(BackendEvent::EndOfStream);
            log::debug!("Headless playback reached end of stream");
        }
    }

    fn refresh(&mut self) {
        if let Clock::Realtime(last) = self.clock {
            let now = Instant::now();
            self.advance(now.duration_since(last));
            self.clock = Clock::Realtime(now);
        }
    }
}

/// Media backend without a media stack
pub struct HeadlessBackend {
    media: Arc<Mutex<HeadlessMedia>>,
    extensions: Vec<String>,
    media_duration: Duration,
    media_size: (u32, u32),
    origin: Origin,
}

impl HeadlessBackend {
    /// Create a backend whose clock only moves through its handle.
    ///
    /// Every loaded file reports `media_duration` as its length.
    pub fn new(media_duration: Duration) -> Self {
        Self::with_clock(Clock::Manual, media_duration)
    }

    /// Create a wall-clock driven backend from the daemon configuration
    pub fn from_config(config: &Config) -> Self {
        let settings = &config.backend;
        let mut backend = Self::with_clock(
            Clock::Realtime(Instant::now()),
            config.headless_duration(),
        )
        .with_media_size(settings.headless_media_width, settings.headless_media_height)
        .with_origin(config.origin());
        backend.extensions = normalize_extensions(&settings.extensions);
        backend
    }

    fn with_clock(clock: Clock, media_duration: Duration) -> Self {
        let media = HeadlessMedia {
            clock,
            loaded: None,
            surfaces_created: 0,
            playing: false,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            volume: 1.0,
            muted: false,
            visible: true,
            opacity: 1.0,
            hue: 0.0,
            geometry: None,
            content_area: None,
            events: Vec::new(),
        };

        Self {
            media: Arc::new(Mutex::new(media)),
            extensions: normalize_extensions(&Config::default().backend.extensions),
            media_duration,
            media_size: (1920, 1080),
            origin: Origin::TopLeft,
        }
    }

    /// Accept only files with these extensions
    pub fn with_extensions(mut self, extensions: &[String]) -> Self {
        self.extensions = normalize_extensions(extensions);
        self
    }

    /// Pretend the media has this native resolution
    pub fn with_media_size(mut self, width: u32, height: u32) -> Self {
        self.media_size = (width, height);
        self
    }

    /// Pretend to render to a windowing system with this origin
    pub fn with_origin(mut self, origin: Origin) -> Self {
        self.origin = origin;
        self
    }

    /// Handle for observing and driving the simulation
    pub fn handle(&self) -> HeadlessHandle {
        HeadlessHandle {
            media: Arc::clone(&self.media),
        }
    }

    fn media(&self) -> MutexGuard<'_, HeadlessMedia> {
        lock(&self.media)
    }

    fn check_readable(&self, source: &MediaSource) -> Result<()> {
        let MediaSource::File(path) = source else {
            // Remote media cannot be probed without a media stack
            return Ok(());
        };

        let metadata = std::fs::metadata(path)
            .with_context(|| format!("Cannot read media: {}", path.display()))?;
        if !metadata.is_file() {
            anyhow::bail!("Not a media file: {}", path.display());
        }
        std::fs::File::open(path)
            .with_context(|| format!("Cannot open media: {}", path.display()))?;

        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !self.extensions.contains(&extension) {
            anyhow::bail!(
                "Unsupported media format '{}': {}",
                extension,
                path.display()
            );
        }

        Ok(())
    }
}

impl MediaBackend for HeadlessBackend {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn origin(&self) -> Origin {
        self.origin
    }

    fn load(&mut self, source: &MediaSource, first_load: bool) -> Result<()> {
        self.check_readable(source)?;

        let duration = self.media_duration;
        let mut media = self.media();
        media.refresh();

        if first_load || media.surfaces_created == 0 {
            media.surfaces_created += 1;
            log::debug!("Headless render surface created");
        }

        media.loaded = Some(source.clone());
        media.playing = false;
        media.position = Duration::ZERO;
        media.duration = duration;
        media.events.push(BackendEvent::DurationChanged(duration));

        log::info!("Headless backend loaded {}", source.display());
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        let mut media = self.media();
        media.refresh();
        if media.loaded.is_none() {
            anyhow::bail!("Nothing loaded");
        }
        media.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        let mut media = self.media();
        media.refresh();
        media.playing = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut media = self.media();
        media.refresh();
        media.playing = false;
        media.position = Duration::ZERO;
        media.loaded = None;
        Ok(())
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let mut media = self.media();
        media.refresh();
        if media.loaded.is_none() {
            anyhow::bail!("Cannot seek, nothing loaded");
        }
        media.position = position.min(media.duration);
        Ok(())
    }

    fn position(&mut self) -> Option<Duration> {
        let mut media = self.media();
        media.refresh();
        media.loaded.as_ref()?;
        Some(media.position)
    }

    fn duration(&mut self) -> Option<Duration> {
        let media = self.media();
        media.loaded.as_ref()?;
        Some(media.duration)
    }

    fn set_volume(&mut self, volume: f64) -> Result<()> {
        self.media().volume = volume;
        Ok(())
    }

    fn set_mute(&mut self, mute: bool) -> Result<()> {
        self.media().muted = mute;
        Ok(())
    }

    fn set_geometry(&mut self, rect: Rect, stretch: bool) -> Result<()> {
        let (width, height) = self.media_size;
        let mut media = self.media();
        media.geometry = Some(rect);
        media.content_area = Some(rect.content_area(width, height, stretch));
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) -> Result<()> {
        self.media().visible = visible;
        Ok(())
    }

    fn set_opacity(&mut self, opacity: f64) -> Result<()> {
        self.media().opacity = opacity;
        Ok(())
    }

    fn set_hue(&mut self, hue: f64) -> Result<()> {
        self.media().hue = hue;
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<BackendEvent> {
        let mut media = self.media();
        media.refresh();
        std::mem::take(&mut media.events)
    }
}

/// Shared view into a [`HeadlessBackend`]
#[derive(Clone)]
pub struct HeadlessHandle {
    media: Arc<Mutex<HeadlessMedia>>,
}

impl HeadlessHandle {
    /// Move the simulated clock forward
    pub fn advance(&self, elapsed: Duration) {
        lock(&self.media).advance(elapsed);
    }

    /// Report a playback failure as the platform would
    pub fn fail(&self, message: &str) {
        let mut media = lock(&self.media);
        media.playing = false;
        media.events.push(BackendEvent::Error(message.to_string()));
    }

    pub fn position(&self) -> Duration {
        lock(&self.media).position
    }

    pub fn is_playing(&self) -> bool {
        lock(&self.media).playing
    }

    pub fn loaded(&self) -> Option<MediaSource> {
        lock(&self.media).loaded.clone()
    }

    pub fn surfaces_created(&self) -> u32 {
        lock(&self.media).surfaces_created
    }

    pub fn volume(&self) -> f64 {
        lock(&self.media).volume
    }

    pub fn muted(&self) -> bool {
        lock(&self.media).muted
    }

    pub fn visible(&self) -> bool {
        lock(&self.media).visible
    }

    pub fn opacity(&self) -> f64 {
        lock(&self.media).opacity
    }

    pub fn hue(&self) -> f64 {
        lock(&self.media).hue
    }

    /// Rectangle last handed to the backend, in its native origin
    pub fn geometry(&self) -> Option<Rect> {
        lock(&self.media).geometry
    }

    /// Area of the surface covered by video
    pub fn content_area(&self) -> Option<Rect> {
        lock(&self.media).content_area
    }
}

fn lock(media: &Mutex<HeadlessMedia>) -> MutexGuard<'_, HeadlessMedia> {
    media.lock().unwrap_or_else(PoisonError::into_inner)
}

fn normalize_extensions(extensions: &[String]) -> Vec<String> {
    extensions
        .iter()
        .map(|ext| ext.trim_start_matches('.').to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn media_file(dir: &Path, name: &str) -> MediaSource {
        let path = dir.join(name);
        std::fs::write(&path, b"not really a video").unwrap();
        MediaSource::File(path)
    }

    #[test]
    fn test_load_reports_duration() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = HeadlessBackend::new(Duration::from_secs(30));
        let source = media_file(dir.path(), "clip.mp4");

        backend.load(&source, true).unwrap();
        assert_eq!(backend.duration(), Some(Duration::from_secs(30)));
        assert_eq!(backend.position(), Some(Duration::ZERO));
        assert_eq!(
            backend.poll_events(),
            vec![BackendEvent::DurationChanged(Duration::from_secs(30))]
        );
        assert!(backend.poll_events().is_empty());
    }

    #[test]
    fn test_load_rejects_missing_and_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = HeadlessBackend::new(Duration::from_secs(30));

        let missing = MediaSource::File(dir.path().join("missing.mp4"));
        assert!(backend.load(&missing, true).is_err());

        let text = media_file(dir.path(), "notes.txt");
        assert!(backend.load(&text, true).is_err());

        assert!(backend.load(&MediaSource::File(dir.path().to_path_buf()), true).is_err());
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = HeadlessBackend::new(Duration::from_secs(30))
            .with_extensions(&[".MOV".to_string()]);

        assert!(backend.load(&media_file(dir.path(), "a.mov"), true).is_ok());
        assert!(backend.load(&media_file(dir.path(), "b.MOV"), false).is_ok());
        assert!(backend.load(&media_file(dir.path(), "c.mp4"), false).is_err());
    }

    #[test]
    fn test_manual_clock_reaches_end_of_stream() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = HeadlessBackend::new(Duration::from_secs(10));
        let handle = backend.handle();

        backend.load(&media_file(dir.path(), "clip.mp4"), true).unwrap();
        backend.poll_events();

        // Paused media does not advance
        handle.advance(Duration::from_secs(3));
        assert_eq!(handle.position(), Duration::ZERO);

        backend.play().unwrap();
        handle.advance(Duration::from_secs(4));
        assert_eq!(backend.position(), Some(Duration::from_secs(4)));

        handle.advance(Duration::from_secs(20));
        assert_eq!(backend.position(), Some(Duration::from_secs(10)));
        assert!(!handle.is_playing());
        assert_eq!(backend.poll_events(), vec![BackendEvent::EndOfStream]);
    }

    #[test]
    fn test_surface_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = HeadlessBackend::new(Duration::from_secs(10));
        let handle = backend.handle();

        backend.load(&media_file(dir.path(), "a.mp4"), true).unwrap();
        backend.load(&media_file(dir.path(), "b.mp4"), false).unwrap();
        assert_eq!(handle.surfaces_created(), 1);
    }

    #[test]
    fn test_stop_releases_media() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = HeadlessBackend::new(Duration::from_secs(10));
        let handle = backend.handle();

        backend.load(&media_file(dir.path(), "a.mp4"), true).unwrap();
        backend.play().unwrap();
        backend.stop().unwrap();

        assert!(handle.loaded().is_none());
        assert_eq!(backend.position(), None);
        assert!(backend.play().is_err());
        assert!(backend.seek(Duration::from_secs(1)).is_err());
    }

    #[test]
    fn test_geometry_records_content_area() {
        let mut backend = HeadlessBackend::new(Duration::from_secs(10)).with_media_size(640, 480);
        let handle = backend.handle();

        backend
            .set_geometry(Rect::new(10, 20, 1920, 1080), false)
            .unwrap();
        assert_eq!(handle.geometry(), Some(Rect::new(10, 20, 1920, 1080)));
        assert_eq!(handle.content_area(), Some(Rect::new(240, 0, 1440, 1080)));

        backend
            .set_geometry(Rect::new(10, 20, 1920, 1080), true)
            .unwrap();
        assert_eq!(handle.content_area(), Some(Rect::new(0, 0, 1920, 1080)));
    }

    #[test]
    fn test_fail_queues_error() {
        let mut backend = HeadlessBackend::new(Duration::from_secs(10));
        backend.handle().fail("decoder crashed");
        assert_eq!(
            backend.poll_events(),
            vec![BackendEvent::Error("decoder crashed".to_string())]
        );
    }
}
