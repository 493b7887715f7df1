mod store;

pub use store::{SAVE_DELAY, SaveScheduler, WindowStateStore};

use serde::{Deserialize, Serialize};

use crate::overlay::Frame;

pub const DEFAULT_WIDTH: f64 = 550.0;
pub const DEFAULT_HEIGHT: f64 = 580.0;
pub const MIN_WIDTH: f64 = 320.0;
pub const MIN_HEIGHT: f64 = 240.0;
pub const MIN_OPACITY: f64 = 0.2;
pub const MAX_OPACITY: f64 = 1.0;
pub const OPACITY_STEP: f64 = 0.1;

/// Gap kept between the default window and the bottom screen edge.
const SCREEN_PADDING: f64 = 20.0;

/// Persisted overlay geometry, opacity, service and visibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowState {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub opacity: f64,
    pub selected_service_id: String,
    pub visible: bool,
}

impl WindowState {
    pub fn frame(&self) -> Frame {
        Frame {
            x: self.x,
            y: self.y,
            width: self.width,
            height: self.height,
        }
    }

    pub fn set_frame(&mut self, frame: Frame) {
        self.x = frame.x;
        self.y = frame.y;
        self.width = frame.width;
        self.height = frame.height;
    }
}

/// Closed opacity range, `min <= max`, both within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OpacityBounds {
    pub min: f64,
    pub max: f64,
}

impl Default for OpacityBounds {
    fn default() -> Self {
        Self {
            min: MIN_OPACITY,
            max: MAX_OPACITY,
        }
    }
}

impl OpacityBounds {
    /// Returns `None` unless `0 <= min <= max <= 1`.
    pub fn new(min: f64, max: f64) -> Option<Self> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        (in_unit(min) && in_unit(max) && min <= max).then_some(Self { min, max })
    }

    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.max;
        }
        value.clamp(self.min, self.max)
    }
}

/// Screen dimensions for position calculations
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenInfo {
    pub width: f64,
    pub height: f64,
}

impl Default for ScreenInfo {
    fn default() -> Self {
        Self {
            width: 1920.0,
            height: 1080.0,
        }
    }
}

impl ScreenInfo {
    /// Bottom-centre placement for a window of the given size.
    pub fn bottom_center(&self, width: f64, height: f64) -> (f64, f64) {
        let x = (self.width - width) / 2.0;
        let y = self.height - height - SCREEN_PADDING;
        (x.max(0.0), y.max(0.0))
    }

    pub fn fit_width(&self, width: f64) -> f64 {
        clamp_extent(width, MIN_WIDTH, self.width)
    }

    pub fn fit_height(&self, height: f64) -> f64 {
        clamp_extent(height, MIN_HEIGHT, self.height)
    }

    /// Keep a window of `width` entirely on screen horizontally.
    pub fn fit_x(&self, x: f64, width: f64) -> f64 {
        x.clamp(0.0, (self.width - width).max(0.0))
    }

    /// Keep a window of `height` entirely on screen vertically.
    pub fn fit_y(&self, y: f64, height: f64) -> f64 {
        y.clamp(0.0, (self.height - height).max(0.0))
    }

    /// Clamp a finite frame to the minimum size and the screen.
    pub fn fit_frame(&self, frame: Frame) -> Frame {
        let width = self.fit_width(frame.width);
        let height = self.fit_height(frame.height);
        Frame {
            x: self.fit_x(frame.x, width),
            y: self.fit_y(frame.y, height),
            width,
            height,
        }
    }
}

fn clamp_extent(value: f64, min: f64, screen: f64) -> f64 {
    value.max(min).min(screen.max(min))
}

/// Everything needed to build and validate a [`WindowState`].
#[derive(Debug, Clone, PartialEq)]
pub struct StateLimits {
    pub bounds: OpacityBounds,
    pub default_opacity: f64,
    pub default_service: String,
    pub screen: ScreenInfo,
}

impl StateLimits {
    pub fn default_state(&self) -> WindowState {
        let width = DEFAULT_WIDTH.min(self.screen.width);
        let height = DEFAULT_HEIGHT.min(self.screen.height);
        let (x, y) = self.screen.bottom_center(width, height);
        WindowState {
            x,
            y,
            width,
            height,
            opacity: self.bounds.clamp(self.default_opacity),
            selected_service_id: self.default_service.clone(),
            visible: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> StateLimits {
        StateLimits {
            bounds: OpacityBounds::default(),
            default_opacity: MAX_OPACITY,
            default_service: "grok".to_string(),
            screen: ScreenInfo::default(),
        }
    }

    #[test]
    fn default_state_is_bottom_centered_and_hidden() {
        let state = limits().default_state();
        assert_eq!(state.width, 550.0);
        assert_eq!(state.height, 580.0);
        assert_eq!(state.x, 685.0);
        assert_eq!(state.y, 480.0);
        assert_eq!(state.opacity, 1.0);
        assert_eq!(state.selected_service_id, "grok");
        assert!(!state.visible);
    }

    #[test]
    fn fit_frame_keeps_window_on_screen() {
        let screen = ScreenInfo::default();
        let fitted = screen.fit_frame(Frame {
            x: 1800.0,
            y: -50.0,
            width: 100.0,
            height: 5000.0,
        });
        assert_eq!(fitted.width, MIN_WIDTH);
        assert_eq!(fitted.height, 1080.0);
        assert_eq!(fitted.x, 1920.0 - MIN_WIDTH);
        assert_eq!(fitted.y, 0.0);
    }

    #[test]
    fn bounds_reject_inverted_or_out_of_range() {
        assert!(OpacityBounds::new(0.5, 0.4).is_none());
        assert!(OpacityBounds::new(-0.1, 1.0).is_none());
        assert!(OpacityBounds::new(0.2, 1.5).is_none());
        assert!(OpacityBounds::new(0.3, 0.3).is_some());
    }

    #[test]
    fn clamp_handles_nan() {
        let bounds = OpacityBounds::default();
        assert_eq!(bounds.clamp(f64::NAN), 1.0);
        assert_eq!(bounds.clamp(0.05), 0.2);
        assert_eq!(bounds.clamp(3.0), 1.0);
        assert_eq!(bounds.clamp(0.6), 0.6);
    }

    #[test]
    fn state_serializes_camel_case() {
        let json = serde_json::to_value(limits().default_state()).unwrap();
        assert_eq!(json["selectedServiceId"], "grok");
        assert_eq!(json["visible"], false);
    }
}
