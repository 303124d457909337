//! The player facade.
//!
//! [`PlayerFacade`] owns the single media [`Session`] and the
//! [`MediaBackend`] that renders it. Every host call lands here, from the IPC
//! service or the C ABI, and is answered synchronously.
//!
//! Backends report asynchronous happenings (end of stream, errors) as queued
//! events. The facade folds them into the session before answering any query
//! (`sync`) and on every [`tick`](PlayerFacade::tick), which also advances
//! fades and performs deferred repeat restarts.

mod fade;
mod session;

pub use fade::{EasingFunction, Fade, FadeDirection};
pub use session::Session;

use common::{PlayerError, SessionStatus, TransportState};
use std::time::{Duration, Instant};

use crate::backend::{self, BackendEvent, MediaBackend, MediaSource};
use crate::config::Config;
use crate::geometry::Rect;
use crate::options::LoadOptions;
use crate::{ensure_finite, log_and_continue};

type Result<T> = std::result::Result<T, PlayerError>;

fn backend_error(e: anyhow::Error) -> PlayerError {
    PlayerError::Backend(format!("{:#}", e))
}

/// Host-facing media player
pub struct PlayerFacade {
    backend: Option<Box<dyn MediaBackend>>,
    session: Session,

    volume: f64,
    muted: bool,
    /// Hue rotation in radians, carried over to every load
    hue: f64,
    repeat: bool,
    /// Stretch mode of the next load and the live surface
    stretch: bool,
    /// Stretch mode last pushed to the backend
    applied_stretch: bool,
    visible: bool,
    opacity: f64,

    /// Render surface in host (top-left origin) coordinates
    rect: Rect,
    screen_height: i32,

    fade_duration: Duration,
    fade_easing: EasingFunction,
    fade: Option<Fade>,

    /// Options of the last load, or set for the next one
    options: LoadOptions,
}

impl PlayerFacade {
    /// Create a facade around `backend`, `None` when it could not be constructed
    pub fn new(backend: Option<Box<dyn MediaBackend>>, config: &Config) -> Self {
        Self {
            backend,
            session: Session::default(),
            volume: config.playback.volume.clamp(0.0, 1.0),
            muted: false,
            hue: 0.0,
            repeat: config.playback.repeat,
            stretch: config.playback.stretch,
            applied_stretch: config.playback.stretch,
            visible: config.display.visible,
            opacity: 1.0,
            rect: config.initial_rect(),
            screen_height: config.display.screen_height,
            fade_duration: config.fade_duration(),
            fade_easing: config.fade_easing(),
            fade: None,
            options: LoadOptions::default(),
        }
    }

    /// Create a facade with the backend selected in `config`
    pub fn from_config(config: &Config) -> Self {
        let backend = match backend::create(config) {
            Ok(backend) => {
                log::info!("Media backend: {}", backend.name());
                Some(backend)
            }
            Err(e) => {
                log::error!("Failed to create media backend: {:#}", e);
                None
            }
        };

        Self::new(backend, config)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.as_ref().map_or("none", |backend| backend.name())
    }

    fn backend_mut(&mut self) -> Result<&mut Box<dyn MediaBackend>> {
        self.backend
            .as_mut()
            .ok_or_else(|| PlayerError::NotInitialized("No media backend available".to_string()))
    }

    fn require_session(&self, operation: &str) -> Result<()> {
        if self.session.state.is_active() {
            Ok(())
        } else {
            Err(PlayerError::InvalidState(format!(
                "Cannot {} with no loaded media ({})",
                operation,
                self.session.state.name()
            )))
        }
    }

    // ---- lifecycle ----

    /// Whether the backend exists and the last load succeeded
    pub fn is_init(&self) -> bool {
        self.backend.is_some() && !self.session.load_failed
    }

    /// Load media paused at the start, stopping whatever is active.
    ///
    /// Empty `options` keep the ones set earlier with `set_options`.
    pub fn load_vid(&mut self, path: &str, options: &str, stretch: bool) -> Result<()> {
        if !options.trim().is_empty() {
            self.set_options(options);
        }
        self.stretch = stretch;

        let was_active = self.session.state.is_active();
        let first_load = self.session.first_load;

        let Some(source) = MediaSource::parse(path) else {
            self.session.failed();
            return Err(PlayerError::NotInitialized(
                "Empty media location".to_string(),
            ));
        };

        let backend = self.backend_mut()?;
        if was_active {
            log_and_continue!(backend.stop(), "stop previous media");
        }

        if let Err(e) = backend.load(&source, first_load) {
            log::error!("Failed to load {}: {:#}", source.display(), e);
            self.session.failed();
            return Err(PlayerError::NotInitialized(format!("{:#}", e)));
        }

        log::info!("Loaded {}", source.display());
        self.session.loaded(source);
        self.apply_settings(first_load);
        self.sync();
        Ok(())
    }

    /// Push stored settings into the backend after a load
    fn apply_settings(&mut self, first_load: bool) {
        if self.fade.is_none() {
            self.opacity = 1.0;
        }

        let geometry = self.backend_rect();
        let Some(backend) = self.backend.as_mut() else {
            return;
        };

        if first_load || self.applied_stretch != self.stretch {
            log_and_continue!(backend.set_geometry(geometry, self.stretch), "apply geometry");
            self.applied_stretch = self.stretch;
        }
        log_and_continue!(backend.set_visible(self.visible), "apply visibility");
        log_and_continue!(backend.set_opacity(self.opacity), "apply opacity");
        log_and_continue!(backend.set_volume(self.volume), "apply volume");
        log_and_continue!(backend.set_mute(self.muted), "apply mute");
        log_and_continue!(backend.set_hue(self.hue), "apply hue");
    }

    // ---- transport ----

    /// Start or resume playback
    pub fn play(&mut self) -> Result<()> {
        self.sync();

        match self.session.state {
            TransportState::Playing => Ok(()),
            TransportState::Uninitialized | TransportState::Stopped => {
                Err(PlayerError::InvalidState(format!(
                    "Cannot play with no loaded media ({})",
                    self.session.state.name()
                )))
            }
            TransportState::Finished => self.restart(),
            TransportState::Loaded | TransportState::Paused => {
                self.backend_mut()?.play().map_err(backend_error)?;
                self.session.state = TransportState::Playing;
                log::info!("Playing {}", self.session.last_played_file);
                Ok(())
            }
        }
    }

    /// Load then play
    pub fn play_path(&mut self, path: &str, options: &str, stretch: bool) -> Result<()> {
        self.load_vid(path, options, stretch)?;
        self.play()
    }

    /// Play finished media again from the start
    fn restart(&mut self) -> Result<()> {
        let backend = self.backend_mut()?;
        backend.seek(Duration::ZERO).map_err(backend_error)?;
        backend.play().map_err(backend_error)?;

        self.session.current_time = Duration::ZERO;
        self.session.state = TransportState::Playing;
        log::info!("Restarted {}", self.session.last_played_file);
        Ok(())
    }

    pub fn pause_video(&mut self) -> Result<()> {
        self.sync();

        match self.session.state {
            TransportState::Uninitialized => Err(PlayerError::InvalidState(
                "Cannot pause with no loaded media".to_string(),
            )),
            TransportState::Paused | TransportState::Stopped | TransportState::Finished => Ok(()),
            TransportState::Loaded => {
                self.session.state = TransportState::Paused;
                Ok(())
            }
            TransportState::Playing => {
                let backend = self.backend_mut()?;
                backend.pause().map_err(backend_error)?;
                let position = backend.position();

                if let Some(position) = position {
                    self.session.set_position(position);
                }
                self.session.state = TransportState::Paused;
                log::info!(
                    "Paused at {:.2}s",
                    self.session.current_time.as_secs_f64()
                );
                Ok(())
            }
        }
    }

    /// Halt playback and release render state. Never fails for lack of a session.
    pub fn stop(&mut self) -> Result<()> {
        if !self.session.state.is_active() {
            return Ok(());
        }

        if let Some(backend) = self.backend.as_mut() {
            log_and_continue!(backend.stop(), "stop playback");
        }

        self.session.stopped();
        log::info!("Stopped {}", self.session.last_played_file);
        Ok(())
    }

    pub fn set_repeat(&mut self, repeat: bool) {
        self.repeat = repeat;
    }

    pub fn repeat(&self) -> bool {
        self.repeat
    }

    // ---- position ----

    /// Fraction of the media played, 0 while the duration is unknown
    pub fn progress_percent(&mut self) -> f64 {
        self.sync();
        self.session.progress()
    }

    /// Seek to a fraction of the duration, clamped to 0.0-1.0
    pub fn set_progress_percent(&mut self, percent: f64) -> Result<()> {
        ensure_finite!(percent, "progress");
        self.sync();
        self.require_session("seek")?;

        let percent = percent.clamp(0.0, 1.0);
        let known = self.session.duration;
        let duration = self.backend_mut()?.duration().unwrap_or(known);
        let target = duration.mul_f64(percent);

        self.backend_mut()?.seek(target).map_err(backend_error)?;

        self.session.duration = duration;
        self.session.set_position(target);
        if self.session.state == TransportState::Finished {
            self.session.state = TransportState::Paused;
            self.session.restart_pending = false;
        }

        log::debug!(
            "Seeked to {:.2}s ({:.1}%)",
            target.as_secs_f64(),
            percent * 100.0
        );
        Ok(())
    }

    /// Elapsed playback time in seconds
    pub fn current_time(&mut self) -> f64 {
        self.sync();
        self.session.current_time.as_secs_f64()
    }

    /// Media length in seconds, 0 while unknown
    pub fn total_time(&mut self) -> f64 {
        self.sync();
        self.session.duration.as_secs_f64()
    }

    // ---- queries ----

    pub fn is_playing(&mut self) -> bool {
        self.sync();
        self.session.state == TransportState::Playing
    }

    pub fn is_paused(&mut self) -> bool {
        self.sync();
        self.session.state == TransportState::Paused
    }

    pub fn is_finished(&mut self) -> bool {
        self.sync();
        self.session.state == TransportState::Finished
    }

    pub fn did_stop(&self) -> bool {
        self.session.did_stop
    }

    /// Location of the most recently loaded media
    pub fn last_location(&self) -> String {
        self.session.last_played_file.clone()
    }

    // ---- audio ----

    pub fn set_volume(&mut self, volume: f64) -> Result<()> {
        ensure_finite!(volume, "volume");
        self.volume = volume.clamp(0.0, 1.0);

        if let Some(backend) = self.backend.as_mut() {
            backend.set_volume(self.volume).map_err(backend_error)?;
        }
        Ok(())
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn set_mute(&mut self, mute: bool) -> Result<()> {
        self.muted = mute;

        if let Some(backend) = self.backend.as_mut() {
            backend.set_mute(mute).map_err(backend_error)?;
        }
        Ok(())
    }

    pub fn is_mute(&self) -> bool {
        self.muted
    }

    // ---- surface ----

    fn backend_rect(&self) -> Rect {
        let origin = self
            .backend
            .as_ref()
            .map(|backend| backend.origin())
            .unwrap_or_default();
        self.rect.to_origin(origin, self.screen_height)
    }

    fn push_geometry(&mut self) -> Result<()> {
        let rect = self.backend_rect();
        let stretch = self.stretch;

        if let Some(backend) = self.backend.as_mut() {
            backend.set_geometry(rect, stretch).map_err(backend_error)?;
            self.applied_stretch = stretch;
        }
        Ok(())
    }

    /// Move the surface, in top-left origin screen coordinates
    pub fn set_location(&mut self, x: i32, y: i32) -> Result<()> {
        self.rect.x = x;
        self.rect.y = y;
        self.push_geometry()
    }

    pub fn set_size(&mut self, width: i32, height: i32) -> Result<()> {
        if width <= 0 || height <= 0 {
            return Err(PlayerError::InvalidArgument(format!(
                "Size must be positive, got {}x{}",
                width, height
            )));
        }

        self.rect.width = width as u32;
        self.rect.height = height as u32;
        self.push_geometry()
    }

    /// Stretch mode for the next load, also applied to the live surface
    pub fn set_stretch(&mut self, stretch: bool) -> Result<()> {
        self.stretch = stretch;
        if self.session.state.is_active() {
            self.push_geometry()?;
        }
        Ok(())
    }

    pub fn set_visible(&mut self, visible: bool) -> Result<()> {
        self.visible = visible;

        if let Some(backend) = self.backend.as_mut() {
            backend.set_visible(visible).map_err(backend_error)?;
        }
        Ok(())
    }

    /// Hue rotation in radians
    pub fn set_hue(&mut self, hue: f64) -> Result<()> {
        ensure_finite!(hue, "hue");
        self.hue = hue;

        if let Some(backend) = self.backend.as_mut() {
            backend.set_hue(hue).map_err(backend_error)?;
        }
        Ok(())
    }

    pub fn hue(&self) -> f64 {
        self.hue
    }

    /// Replace the options used by the next load
    pub fn set_options(&mut self, options: &str) {
        self.options = LoadOptions::parse(options);
        self.options.log_ignored();
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    // ---- fades ----

    pub fn fade_up(&mut self) {
        self.start_fade(FadeDirection::Up);
    }

    /// Fade to black, stopping playback once the fade completes
    pub fn fade_down(&mut self) {
        self.start_fade(FadeDirection::Down);
    }

    fn start_fade(&mut self, direction: FadeDirection) {
        let now = Instant::now();
        log::info!(
            "Fading {:?} over {:.2}s",
            direction,
            self.fade_duration.as_secs_f64()
        );
        self.fade = Some(
            Fade::new(direction, self.opacity, self.fade_duration, now)
                .with_easing(self.fade_easing),
        );
        self.advance_fade(now);
    }

    /// Duration of subsequent fades
    pub fn set_fade_speed(&mut self, seconds: f64) -> Result<()> {
        ensure_finite!(seconds, "fade speed");
        if seconds < 0.0 {
            return Err(PlayerError::InvalidArgument(format!(
                "Fade speed must not be negative, got {}",
                seconds
            )));
        }

        self.fade_duration = Duration::try_from_secs_f64(seconds).map_err(|_| {
            PlayerError::InvalidArgument(format!("Fade speed is too large: {}", seconds))
        })?;
        Ok(())
    }

    pub fn fade_speed(&self) -> f64 {
        self.fade_duration.as_secs_f64()
    }

    fn advance_fade(&mut self, now: Instant) {
        let Some(fade) = &self.fade else {
            return;
        };

        let opacity = fade.opacity_at(now);
        let complete = fade.is_complete_at(now);
        let direction = fade.direction();

        self.opacity = opacity;
        if let Some(backend) = self.backend.as_mut() {
            log_and_continue!(backend.set_opacity(opacity), "apply fade opacity");
        }

        if complete {
            self.fade = None;
            log::debug!("Fade {:?} complete", direction);
            if direction == FadeDirection::Down {
                log_and_continue!(self.stop(), "stop after fade down");
            }
        }
    }

    // ---- event folding ----

    /// Fold queued backend events and the current position into the session
    pub fn sync(&mut self) {
        let Some(backend) = self.backend.as_mut() else {
            return;
        };

        let events = backend.poll_events();
        let position = backend.position();
        let duration = backend.duration();

        for event in events {
            match event {
                BackendEvent::EndOfStream => self.on_end_of_stream(),
                BackendEvent::DurationChanged(duration) => {
                    log::debug!("Duration is {:.2}s", duration.as_secs_f64());
                    self.session.duration = duration;
                }
                BackendEvent::Error(message) => {
                    log::error!("Playback failed: {}", message);
                    if self.session.state.is_active() {
                        self.session.state = TransportState::Stopped;
                        self.session.current_time = Duration::ZERO;
                        self.session.restart_pending = false;
                    }
                }
            }
        }

        if let Some(duration) = duration {
            self.session.duration = duration;
        }

        if matches!(
            self.session.state,
            TransportState::Loaded | TransportState::Playing | TransportState::Paused
        ) && let Some(position) = position
        {
            self.session.set_position(position);
        }
    }

    fn on_end_of_stream(&mut self) {
        if !matches!(
            self.session.state,
            TransportState::Playing | TransportState::Paused
        ) {
            return;
        }

        log::info!("Finished {}", self.session.last_played_file);
        self.session.state = TransportState::Finished;
        self.session.current_time = self.session.duration;
        self.session.restart_pending = self.repeat;
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// Fold backend events, perform a repeat restart found on an earlier
    /// pass, and advance any running fade to `now`
    pub fn tick_at(&mut self, now: Instant) {
        let restart = std::mem::take(&mut self.session.restart_pending);

        self.sync();

        if restart && self.session.state == TransportState::Finished {
            if self.repeat {
                log_and_continue!(self.restart(), "repeat media");
            } else {
                log::debug!("Repeat turned off before restart");
            }
        }

        self.advance_fade(now);
    }

    /// Serializable view of the session
    pub fn snapshot(&mut self) -> SessionStatus {
        self.sync();

        SessionStatus {
            initialized: self.is_init(),
            state: self.session.state,
            last_played_file: self.session.last_played_file.clone(),
            loaded_at: self.session.loaded_at.map(|t| t.to_rfc3339()),
            current_time: self.session.current_time.as_secs_f64(),
            duration: self.session.duration.as_secs_f64(),
            volume: self.volume,
            muted: self.muted,
            hue: self.hue,
            repeat: self.repeat,
            stretch: self.stretch,
            visible: self.visible,
            opacity: self.opacity,
            x: self.rect.x,
            y: self.rect.y,
            width: self.rect.width,
            height: self.rect.height,
            first_load: self.session.first_load,
            did_stop: self.session.did_stop,
        }
    }
}
