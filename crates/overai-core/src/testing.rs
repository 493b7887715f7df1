//! In-memory stand-ins for the platform seams.

use std::sync::{Arc, Mutex};

use crate::hotkey::{HotkeyBinding, InputTap};
use crate::overlay::{Frame, OverlaySurface};
use crate::{Error, Result};

#[derive(Debug, Default)]
struct TapState {
    trusted: bool,
    installed: Option<HotkeyBinding>,
    installs: usize,
    removals: usize,
}

/// Input tap whose permission can be flipped from the test after it has
/// been moved into a listener.
#[derive(Debug, Clone, Default)]
pub struct FakeTap(Arc<Mutex<TapState>>);

impl FakeTap {
    pub fn trusted() -> Self {
        let tap = Self::default();
        tap.grant();
        tap
    }

    pub fn untrusted() -> Self {
        Self::default()
    }

    pub fn grant(&self) {
        self.0.lock().unwrap().trusted = true;
    }

    pub fn installs(&self) -> usize {
        self.0.lock().unwrap().installs
    }

    pub fn removals(&self) -> usize {
        self.0.lock().unwrap().removals
    }

    pub fn installed(&self) -> Option<HotkeyBinding> {
        self.0.lock().unwrap().installed
    }
}

impl InputTap for FakeTap {
    fn is_trusted(&self) -> bool {
        self.0.lock().unwrap().trusted
    }

    fn install(&mut self, binding: &HotkeyBinding) -> Result<()> {
        let mut state = self.0.lock().unwrap();
        state.installed = Some(*binding);
        state.installs += 1;
        Ok(())
    }

    fn remove(&mut self) {
        let mut state = self.0.lock().unwrap();
        if state.installed.take().is_some() {
            state.removals += 1;
        }
    }
}

/// Surface that records what the controller asked of the window server.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    pub floating: bool,
    pub deny_floating: bool,
    pub on_screen: bool,
    pub alpha: f64,
    pub frame: Option<Frame>,
    pub alpha_history: Vec<f64>,
    pub fail_alpha: bool,
}

impl RecordingSurface {
    pub fn denying_floating() -> Self {
        Self {
            deny_floating: true,
            ..Self::default()
        }
    }
}

impl OverlaySurface for RecordingSurface {
    fn configure_floating(&mut self) -> Result<()> {
        if self.deny_floating {
            return Err(Error::FloatingWindowDenied("test".to_string()));
        }
        self.floating = true;
        Ok(())
    }

    fn set_frame(&mut self, frame: Frame) -> Result<()> {
        self.frame = Some(frame);
        Ok(())
    }

    fn set_alpha(&mut self, alpha: f64) -> Result<()> {
        if self.fail_alpha {
            return Err(Error::Surface("alpha rejected".to_string()));
        }
        self.alpha = alpha;
        self.alpha_history.push(alpha);
        Ok(())
    }

    fn order_front(&mut self) -> Result<()> {
        self.on_screen = true;
        Ok(())
    }

    fn order_out(&mut self) -> Result<()> {
        self.on_screen = false;
        Ok(())
    }
}
