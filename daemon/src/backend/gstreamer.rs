//! GStreamer media backend
//!
//! Plays media through `playbin`. Colour effects and scaling happen in a
//! custom video sink:
//!
//! ```text
//! videobalance ! videoscale ! capsfilter ! videoconvert ! autovideosink
//! ```
//!
//! - hue rotation maps onto `videobalance:hue`
//! - opacity fades contrast and saturation together, so 0.0 is black
//! - the aspect ratio is kept with `videoscale:add-borders`
//! - placement uses `GstVideoOverlay` render rectangles when the sink supports them

use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_video as gst_video;
use gstreamer_video::prelude::*;
use std::f64::consts::PI;
use std::sync::OnceLock;
use std::time::Duration;

use super::{BackendEvent, MediaBackend, MediaSource};
use crate::geometry::Rect;

const VIDEO_SINK: &str = "videobalance name=balance ! videoscale name=scaler ! \
     capsfilter name=sizer ! videoconvert ! autovideosink";

/// How long a load may take to preroll before it is reported as failed
const PREROLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize GStreamer (idempotent, safe to call multiple times)
pub fn initialize_gstreamer() -> Result<()> {
    static GSTREAMER_INITIALIZED: OnceLock<Result<(), String>> = OnceLock::new();

    GSTREAMER_INITIALIZED
        .get_or_init(|| {
            let result = gst::init().map_err(|e| e.to_string());
            if result.is_ok() {
                log::info!("GStreamer initialized");
            }
            result
        })
        .clone()
        .map_err(|e| anyhow::anyhow!("Failed to initialize GStreamer: {}", e))
}

/// Elements of the video sink that are adjusted at runtime
struct VideoSink {
    bin: gst::Bin,
    balance: gst::Element,
    scaler: gst::Element,
    sizer: gst::Element,
}

impl VideoSink {
    fn build() -> Result<Self> {
        let bin = gst::parse::bin_from_description(VIDEO_SINK, true)
            .context("Failed to build video sink")?;

        let balance = bin
            .by_name("balance")
            .context("Failed to get videobalance from video sink")?;
        let scaler = bin
            .by_name("scaler")
            .context("Failed to get videoscale from video sink")?;
        let sizer = bin
            .by_name("sizer")
            .context("Failed to get capsfilter from video sink")?;

        Ok(Self {
            bin,
            balance,
            scaler,
            sizer,
        })
    }

    fn overlay(&self) -> Option<gst_video::VideoOverlay> {
        self.bin
            .by_interface(gst_video::VideoOverlay::static_type())?
            .dynamic_cast::<gst_video::VideoOverlay>()
            .ok()
    }
}

/// Media backend built on `playbin`
pub struct GStreamerBackend {
    playbin: gst::Element,

    /// Created by the first load
    sink: Option<VideoSink>,

    geometry: Option<(Rect, bool)>,
    visible: bool,
    opacity: f64,
    hue: f64,
}

impl GStreamerBackend {
    pub fn new() -> Result<Self> {
        initialize_gstreamer()?;

        let playbin = gst::ElementFactory::make("playbin")
            .name("vidd-player")
            .build()
            .context("Failed to create playbin (is gst-plugins-base installed?)")?;

        log::info!("GStreamer backend ready");

        Ok(Self {
            playbin,
            sink: None,
            geometry: None,
            visible: true,
            opacity: 1.0,
            hue: 0.0,
        })
    }

    fn set_state(&self, state: gst::State) -> Result<()> {
        self.playbin
            .set_state(state)
            .with_context(|| format!("Failed to set pipeline to {:?} state", state))?;
        Ok(())
    }

    fn uri(source: &MediaSource) -> Result<String> {
        match source {
            MediaSource::Url(url) => Ok(url.clone()),
            MediaSource::File(path) => {
                let absolute = std::fs::canonicalize(path)
                    .with_context(|| format!("Cannot read media: {}", path.display()))?;
                let uri = gst::glib::filename_to_uri(&absolute, None)
                    .with_context(|| format!("Invalid media path: {}", absolute.display()))?;
                Ok(uri.to_string())
            }
        }
    }

    fn ensure_sink(&mut self) -> Result<()> {
        if self.sink.is_some() {
            return Ok(());
        }

        let sink = VideoSink::build()?;
        self.playbin.set_property("video-sink", &sink.bin);
        log::debug!("Video sink attached to playbin");
        self.sink = Some(sink);

        self.apply_balance();
        if let Some((rect, stretch)) = self.geometry {
            self.apply_geometry(rect, stretch);
        }
        Ok(())
    }

    /// Push hue and effective opacity into `videobalance`
    fn apply_balance(&self) {
        let Some(sink) = &self.sink else {
            return;
        };

        let level = if self.visible { self.opacity } else { 0.0 };
        sink.balance.set_property("contrast", level);
        sink.balance.set_property("saturation", level);
        sink.balance
            .set_property("hue", (self.hue / PI).clamp(-1.0, 1.0));
    }

    fn apply_geometry(&self, rect: Rect, stretch: bool) {
        let Some(sink) = &self.sink else {
            return;
        };

        sink.scaler.set_property("add-borders", !stretch);

        let caps = gst::Caps::builder("video/x-raw")
            .field("width", rect.width as i32)
            .field("height", rect.height as i32)
            .build();
        sink.sizer.set_property("caps", &caps);

        match sink.overlay() {
            Some(overlay) => {
                if let Err(e) = overlay.set_render_rectangle(
                    rect.x,
                    rect.y,
                    rect.width as i32,
                    rect.height as i32,
                ) {
                    log::warn!("Failed to place video surface: {}", e);
                }
            }
            None => log::debug!("Video sink cannot be placed, only resized"),
        }
    }

    /// Wait for a load to preroll, reporting the first bus error on failure
    fn wait_for_preroll(&self) -> Result<()> {
        let timeout = gst::ClockTime::from_nseconds(PREROLL_TIMEOUT.as_nanos() as u64);
        let (result, _, _) = self.playbin.state(Some(timeout));
        if result.is_ok() {
            return Ok(());
        }

        let reason = self
            .poll_bus()
            .into_iter()
            .find_map(|event| match event {
                BackendEvent::Error(message) => Some(message),
                _ => None,
            })
            .unwrap_or_else(|| "pipeline failed to preroll".to_string());

        anyhow::bail!("Failed to load media: {}", reason)
    }

    fn poll_bus(&self) -> Vec<BackendEvent> {
        let mut events = Vec::new();
        let Some(bus) = self.playbin.bus() else {
            return events;
        };

        while let Some(msg) = bus.pop() {
            match msg.view() {
                gst::MessageView::Eos(..) => {
                    log::debug!("End of stream");
                    events.push(BackendEvent::EndOfStream);
                }
                gst::MessageView::Error(err) => {
                    let message = match err.debug() {
                        Some(debug) => format!("{} ({})", err.error(), debug),
                        None => err.error().to_string(),
                    };
                    log::error!("GStreamer error: {}", message);
                    events.push(BackendEvent::Error(message));
                }
                gst::MessageView::DurationChanged(..) => {
                    if let Some(duration) = self.query_duration() {
                        events.push(BackendEvent::DurationChanged(duration));
                    }
                }
                _ => {}
            }
        }

        events
    }

    fn query_duration(&self) -> Option<Duration> {
        self.playbin
            .query_duration::<gst::ClockTime>()
            .map(|t| Duration::from_nanos(t.nseconds()))
    }
}

impl MediaBackend for GStreamerBackend {
    fn name(&self) -> &'static str {
        "gstreamer"
    }

    fn load(&mut self, source: &MediaSource, first_load: bool) -> Result<()> {
        let uri = Self::uri(source)?;
        log::info!("Loading media: {}", uri);

        if first_load {
            self.ensure_sink()?;
        }

        self.set_state(gst::State::Null)?;
        self.playbin.set_property("uri", uri.as_str());
        self.set_state(gst::State::Paused)?;
        self.wait_for_preroll()?;

        if let Some(duration) = self.query_duration() {
            log::info!("Media duration: {:.2}s", duration.as_secs_f64());
        }
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        log::info!("Starting video playback");
        self.set_state(gst::State::Playing)
    }

    fn pause(&mut self) -> Result<()> {
        log::info!("Pausing video playback");
        self.set_state(gst::State::Paused)
    }

    fn stop(&mut self) -> Result<()> {
        log::info!("Stopping video playback");
        self.set_state(gst::State::Null)
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        self.playbin
            .seek_simple(
                gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT,
                gst::ClockTime::from_nseconds(position.as_nanos() as u64),
            )
            .context("Failed to seek")?;
        Ok(())
    }

    fn position(&mut self) -> Option<Duration> {
        self.playbin
            .query_position::<gst::ClockTime>()
            .map(|t| Duration::from_nanos(t.nseconds()))
    }

    fn duration(&mut self) -> Option<Duration> {
        self.query_duration()
    }

    fn set_volume(&mut self, volume: f64) -> Result<()> {
        self.playbin.set_property("volume", volume);
        Ok(())
    }

    fn set_mute(&mut self, mute: bool) -> Result<()> {
        self.playbin.set_property("mute", mute);
        Ok(())
    }

    fn set_geometry(&mut self, rect: Rect, stretch: bool) -> Result<()> {
        self.geometry = Some((rect, stretch));
        self.apply_geometry(rect, stretch);
        Ok(())
    }

    fn set_visible(&mut self, visible: bool) -> Result<()> {
        self.visible = visible;
        self.apply_balance();
        Ok(())
    }

    fn set_opacity(&mut self, opacity: f64) -> Result<()> {
        self.opacity = opacity;
        self.apply_balance();
        Ok(())
    }

    fn set_hue(&mut self, hue: f64) -> Result<()> {
        self.hue = hue;
        self.apply_balance();
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<BackendEvent> {
        self.poll_bus()
    }
}

impl Drop for GStreamerBackend {
    fn drop(&mut self) {
        log::info!("GStreamerBackend::drop - Stopping pipeline and cleaning up resources");

        match self.playbin.set_state(gst::State::Null) {
            Ok(state_change) => {
                log::debug!("Pipeline state change result: {:?}", state_change);
            }
            Err(e) => {
                log::warn!("Failed to set pipeline state to Null: {}", e);
            }
        }

        // Drain pending messages from bus
        if let Some(bus) = self.playbin.bus() {
            let mut drained = 0;
            while bus.pop().is_some() {
                drained += 1;
            }
            if drained > 0 {
                log::debug!("Drained {} pending messages from bus", drained);
            }
        }
    }
}
