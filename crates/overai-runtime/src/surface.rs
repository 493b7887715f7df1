use overai_core::{Error, Frame, OverlaySurface, Result};
use tauri::{LogicalPosition, LogicalSize, WebviewWindow};

use crate::platform;

/// The overlay's tauri window seen through the core's surface seam.
pub struct TauriSurface {
    window: WebviewWindow,
}

impl TauriSurface {
    pub fn new(window: WebviewWindow) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &WebviewWindow {
        &self.window
    }
}

impl OverlaySurface for TauriSurface {
    fn configure_floating(&mut self) -> Result<()> {
        platform::configure_floating(&self.window)
    }

    fn set_frame(&mut self, frame: Frame) -> Result<()> {
        self.window
            .set_size(LogicalSize::new(frame.width, frame.height))
            .map_err(|e| Error::Surface(e.to_string()))?;
        self.window
            .set_position(LogicalPosition::new(frame.x, frame.y))
            .map_err(|e| Error::Surface(e.to_string()))
    }

    fn set_alpha(&mut self, alpha: f64) -> Result<()> {
        platform::set_alpha(&self.window, alpha)
    }

    fn order_front(&mut self) -> Result<()> {
        platform::order_front(&self.window)
    }

    fn order_out(&mut self) -> Result<()> {
        self.window.hide().map_err(|e| Error::Surface(e.to_string()))
    }
}
