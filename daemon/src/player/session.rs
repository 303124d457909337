use chrono::{DateTime, Local};
use common::TransportState;
use std::time::Duration;

use crate::backend::MediaSource;

/// The single live media session of a facade
#[derive(Debug, Clone)]
pub struct Session {
    pub state: TransportState,

    /// Media of the last successful load, dropped by a failed one
    pub source: Option<MediaSource>,

    /// Sanitised location of the most recently loaded media, kept after stop
    pub last_played_file: String,

    pub loaded_at: Option<DateTime<Local>>,

    pub current_time: Duration,
    pub duration: Duration,

    /// The last load failed
    pub load_failed: bool,

    /// Set by an explicit stop, cleared by the next load
    pub did_stop: bool,

    /// No load has succeeded yet, so no render surface exists
    pub first_load: bool,

    /// Repeat restart deferred to the next tick
    pub restart_pending: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            state: TransportState::Uninitialized,
            source: None,
            last_played_file: String::new(),
            loaded_at: None,
            current_time: Duration::ZERO,
            duration: Duration::ZERO,
            load_failed: false,
            did_stop: false,
            first_load: true,
            restart_pending: false,
        }
    }
}

impl Session {
    /// Record a successful load, paused at the start
    pub fn loaded(&mut self, source: MediaSource) {
        self.last_played_file = source.display();
        self.source = Some(source);
        self.loaded_at = Some(Local::now());
        self.state = TransportState::Loaded;
        self.current_time = Duration::ZERO;
        self.duration = Duration::ZERO;
        self.load_failed = false;
        self.did_stop = false;
        self.first_load = false;
        self.restart_pending = false;
    }

    /// Tear the session down after a failed load
    pub fn failed(&mut self) {
        self.source = None;
        self.loaded_at = None;
        self.state = TransportState::Uninitialized;
        self.current_time = Duration::ZERO;
        self.duration = Duration::ZERO;
        self.load_failed = true;
        self.restart_pending = false;
    }

    pub fn stopped(&mut self) {
        self.state = TransportState::Stopped;
        self.current_time = Duration::ZERO;
        self.did_stop = true;
        self.restart_pending = false;
    }

    /// Fraction of the media played, 0 while the duration is unknown
    pub fn progress(&self) -> f64 {
        if self.duration.is_zero() {
            return 0.0;
        }
        (self.current_time.as_secs_f64() / self.duration.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Clamp a reported position into the known duration
    pub fn set_position(&mut self, position: Duration) {
        self.current_time = if self.duration.is_zero() {
            position
        } else {
            position.min(self.duration)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_new_session() {
        let session = Session::default();
        assert_eq!(session.state, TransportState::Uninitialized);
        assert!(session.first_load);
        assert!(session.last_played_file.is_empty());
        assert_eq!(session.progress(), 0.0);
    }

    #[test]
    fn test_load_stop_keeps_location() {
        let mut session = Session::default();
        session.loaded(MediaSource::File(PathBuf::from("/media/a.mp4")));
        session.duration = Duration::from_secs(10);
        session.set_position(Duration::from_secs(4));
        assert!((session.progress() - 0.4).abs() < 1e-9);

        session.stopped();
        assert_eq!(session.state, TransportState::Stopped);
        assert_eq!(session.current_time, Duration::ZERO);
        assert!(session.did_stop);
        assert_eq!(session.last_played_file, "/media/a.mp4");
        assert!(!session.first_load);
    }

    #[test]
    fn test_failed_load_tears_down() {
        let mut session = Session::default();
        session.loaded(MediaSource::Url("http://www.example.org/a.mp4".to_string()));
        session.failed();
        assert!(session.load_failed);
        assert!(session.source.is_none());
        assert_eq!(session.state, TransportState::Uninitialized);
        // The surface created by the earlier load still exists
        assert!(!session.first_load);
    }

    #[test]
    fn test_position_clamped_to_duration() {
        let mut session = Session::default();
        session.duration = Duration::from_secs(5);
        session.set_position(Duration::from_secs(9));
        assert_eq!(session.current_time, Duration::from_secs(5));
    }
}
