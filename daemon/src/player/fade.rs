use std::time::{Duration, Instant};

/// Easing functions for smooth fades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EasingFunction {
    /// Linear interpolation (constant speed)
    Linear,
    /// Ease in (slow start, fast end)
    EaseIn,
    /// Ease out (fast start, slow end)
    EaseOut,
    /// Ease in-out (slow start and end, fast middle)
    #[default]
    EaseInOut,
}

impl EasingFunction {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(Self::Linear),
            "ease-in" | "ease_in" => Some(Self::EaseIn),
            "ease-out" | "ease_out" => Some(Self::EaseOut),
            "ease-in-out" | "ease_in_out" => Some(Self::EaseInOut),
            _ => None,
        }
    }

    /// Apply easing to a linear progress value (0.0 to 1.0)
    pub fn apply(&self, t: f64) -> f64 {
        match self {
            Self::Linear => t,
            Self::EaseIn => t * t,
            Self::EaseOut => t * (2.0 - t),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    -1.0 + (4.0 - 2.0 * t) * t
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    /// Towards full opacity
    Up,
    /// Towards black, stopping playback at the end
    Down,
}

impl FadeDirection {
    fn target(&self) -> f64 {
        match self {
            Self::Up => 1.0,
            Self::Down => 0.0,
        }
    }
}

/// An opacity animation of the render surface
#[derive(Debug, Clone)]
pub struct Fade {
    direction: FadeDirection,
    easing: EasingFunction,
    /// Opacity when the fade started
    from: f64,
    /// Total duration of the fade
    duration: Duration,
    /// When the fade started
    start_time: Instant,
}

impl Fade {
    /// Start a fade from the current opacity at `now`
    pub fn new(direction: FadeDirection, from: f64, duration: Duration, now: Instant) -> Self {
        Self {
            direction,
            easing: EasingFunction::default(),
            from: from.clamp(0.0, 1.0),
            duration,
            start_time: now,
        }
    }

    pub fn with_easing(mut self, easing: EasingFunction) -> Self {
        self.easing = easing;
        self
    }

    pub fn direction(&self) -> FadeDirection {
        self.direction
    }

    /// Get the linear progress (0.0 to 1.0)
    fn raw_progress(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.start_time);
        if elapsed >= self.duration {
            1.0
        } else {
            elapsed.as_secs_f64() / self.duration.as_secs_f64()
        }
    }

    /// Opacity at `now`
    pub fn opacity_at(&self, now: Instant) -> f64 {
        let target = self.direction.target();
        let progress = self.easing.apply(self.raw_progress(now));
        self.from + (target - self.from) * progress
    }

    /// Check if the fade is complete at `now`
    pub fn is_complete_at(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.start_time) >= self.duration
    }
}
