mod animation;
mod controller;
mod window;

pub use animation::{Easing, HIDE_DURATION, OpacityAnimation, SHOW_DURATION};
pub use controller::{OverlayController, Transition, Visibility};
pub use window::{Frame, OverlaySurface};
