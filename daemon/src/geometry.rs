//! Render surface geometry.
//!
//! Hosts always speak in top-left origin screen coordinates. Backends declare
//! their native [`Origin`] and the facade converts before handing a [`Rect`]
//! over, so no backend ever receives host coordinates by accident.

use serde::{Deserialize, Serialize};

/// Screen coordinate origin of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
    /// Y grows downwards from the top of the main screen (X11, Wayland, Win32, host)
    #[default]
    TopLeft,
    /// Y grows upwards from the bottom of the main screen (Cocoa)
    BottomLeft,
}

impl Origin {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "top-left" | "top_left" | "topleft" => Some(Self::TopLeft),
            "bottom-left" | "bottom_left" | "bottomleft" => Some(Self::BottomLeft),
            _ => None,
        }
    }
}

/// Rectangle of the render surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert a host (top-left origin) rectangle into `origin` coordinates.
    ///
    /// `screen_height` is the height of the main screen, only needed for
    /// bottom-left origins. Positions beyond the `i32` range saturate.
    pub fn to_origin(self, origin: Origin, screen_height: i32) -> Self {
        match origin {
            Origin::TopLeft => self,
            Origin::BottomLeft => {
                let y = i64::from(screen_height) - i64::from(self.y) - i64::from(self.height);
                Self {
                    y: y.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
                    ..self
                }
            }
        }
    }

    /// Area of the surface actually covered by video.
    ///
    /// With `stretch` the whole frame is used. Otherwise the source is scaled
    /// to fit and centered, leaving borders on two sides. The result is
    /// relative to the surface, not the screen.
    pub fn content_area(&self, source_width: u32, source_height: u32, stretch: bool) -> Rect {
        if stretch || source_width == 0 || source_height == 0 {
            return Rect::new(0, 0, self.width, self.height);
        }

        let scale_x = self.width as f64 / source_width as f64;
        let scale_y = self.height as f64 / source_height as f64;
        let scale = scale_x.min(scale_y);

        let width = (source_width as f64 * scale).round() as u32;
        let height = (source_height as f64 * scale).round() as u32;

        Rect::new(
            ((self.width - width.min(self.width)) / 2) as i32,
            ((self.height - height.min(self.height)) / 2) as i32,
            width,
            height,
        )
    }
}
