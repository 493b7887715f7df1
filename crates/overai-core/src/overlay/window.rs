use serde::{Deserialize, Serialize};

use crate::Result;

/// Window geometry in top-left origin screen points.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// The native window behind the overlay.
///
/// Implemented by the runtime on top of the platform window; every method
/// must be called from the main thread.
pub trait OverlaySurface {
    /// Raise the window to floating level and exclude it from screen
    /// capture. An error here is terminal for the application.
    fn configure_floating(&mut self) -> Result<()>;

    fn set_frame(&mut self, frame: Frame) -> Result<()>;

    fn set_alpha(&mut self, alpha: f64) -> Result<()>;

    /// Put the window on screen without activating the application.
    fn order_front(&mut self) -> Result<()>;

    fn order_out(&mut self) -> Result<()>;
}
