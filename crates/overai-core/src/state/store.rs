use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{StateLimits, WindowState};
use crate::Result;
use crate::persist::write_json_atomic;

/// Trailing delay between the last change and the write to disk.
pub const SAVE_DELAY: Duration = Duration::from_millis(500);

/// Reads and writes `window_state.json`.
///
/// Loading never fails: a missing or unreadable file yields defaults and
/// every field is validated on its own, so one bad value does not discard
/// the rest.
#[derive(Debug, Clone)]
pub struct WindowStateStore {
    path: PathBuf,
    limits: StateLimits,
}

impl WindowStateStore {
    pub fn new(path: impl Into<PathBuf>, limits: StateLimits) -> Self {
        Self {
            path: path.into(),
            limits,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn limits(&self) -> &StateLimits {
        &self.limits
    }

    pub fn defaults(&self) -> WindowState {
        self.limits.default_state()
    }

    pub fn load(&self) -> WindowState {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No saved window state, using defaults");
                return self.defaults();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Window state unreadable, using defaults");
                return self.defaults();
            }
        };

        match serde_json::from_str::<serde_json::Value>(&content) {
            Ok(value) if value.is_object() => self.validate(&value),
            Ok(_) => {
                warn!(path = %self.path.display(), "Window state is not an object, using defaults");
                self.defaults()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Window state malformed, using defaults");
                self.defaults()
            }
        }
    }

    pub fn save(&self, state: &WindowState) -> Result<()> {
        write_json_atomic(&self.path, state)
    }

    fn validate(&self, value: &serde_json::Value) -> WindowState {
        let defaults = self.defaults();
        let screen = self.limits.screen;
        let number = |key: &str| value.get(key).and_then(|v| v.as_f64()).filter(|v| v.is_finite());

        let width = number("width")
            .map(|w| screen.fit_width(w))
            .unwrap_or(defaults.width);
        let height = number("height")
            .map(|h| screen.fit_height(h))
            .unwrap_or(defaults.height);

        let (default_x, default_y) = screen.bottom_center(width, height);
        let x = number("x")
            .map(|x| screen.fit_x(x, width))
            .unwrap_or(default_x);
        let y = number("y")
            .map(|y| screen.fit_y(y, height))
            .unwrap_or(default_y);

        let opacity = number("opacity")
            .map(|o| self.limits.bounds.clamp(o))
            .unwrap_or(defaults.opacity);

        let selected_service_id = value
            .get("selectedServiceId")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string())
            .unwrap_or(defaults.selected_service_id);

        let visible = value
            .get("visible")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        debug!(width, height, x, y, opacity, "Window state loaded");

        WindowState {
            x,
            y,
            width,
            height,
            opacity,
            selected_service_id,
            visible,
        }
    }
}

/// Coalesces bursts of state changes into a single trailing write.
#[derive(Debug, Clone)]
pub struct SaveScheduler {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Default for SaveScheduler {
    fn default() -> Self {
        Self::new(SAVE_DELAY)
    }
}

impl SaveScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Push the deadline out to `now + delay`.
    pub fn schedule(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    /// `true` once, when a scheduled save has come due.
    pub fn take_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{MIN_WIDTH, OpacityBounds, ScreenInfo};

    fn store(dir: &Path) -> WindowStateStore {
        WindowStateStore::new(
            dir.join("window_state.json"),
            StateLimits {
                bounds: OpacityBounds::default(),
                default_opacity: 1.0,
                default_service: "grok".to_string(),
                screen: ScreenInfo::default(),
            },
        )
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert_eq!(store.load(), store.defaults());
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load(), store.defaults());

        fs::write(store.path(), "[1, 2]").unwrap();
        assert_eq!(store.load(), store.defaults());
    }

    #[test]
    fn save_then_load_preserves_valid_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let state = WindowState {
            x: 100.0,
            y: 50.0,
            width: 600.0,
            height: 400.0,
            opacity: 0.7,
            selected_service_id: "claude".to_string(),
            visible: true,
        };
        store.save(&state).unwrap();
        assert_eq!(store.load(), state);
    }

    #[test]
    fn out_of_range_fields_are_clamped_individually() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::write(
            store.path(),
            r#"{"x": -400, "y": 99999, "width": 10, "height": 5000,
                "opacity": 7.5, "selectedServiceId": "gemini", "visible": "yes"}"#,
        )
        .unwrap();

        let state = store.load();
        assert_eq!(state.width, MIN_WIDTH);
        assert_eq!(state.height, 1080.0);
        assert_eq!(state.x, 0.0);
        assert_eq!(state.y, 0.0);
        assert_eq!(state.opacity, 1.0);
        assert_eq!(state.selected_service_id, "gemini");
        assert!(!state.visible);
    }

    #[test]
    fn missing_fields_fall_back_per_field() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::write(store.path(), r#"{"opacity": 0.5, "selectedServiceId": ""}"#).unwrap();

        let state = store.load();
        let defaults = store.defaults();
        assert_eq!(state.opacity, 0.5);
        assert_eq!(state.selected_service_id, "grok");
        assert_eq!(state.frame(), defaults.frame());
    }

    #[test]
    fn scheduler_coalesces_and_fires_once() {
        let start = Instant::now();
        let mut saves = SaveScheduler::default();
        assert!(!saves.take_due(start));

        saves.schedule(start);
        saves.schedule(start + Duration::from_millis(400));
        assert!(!saves.take_due(start + Duration::from_millis(600)));
        assert!(saves.take_due(start + Duration::from_millis(900)));
        assert!(!saves.take_due(start + Duration::from_millis(2000)));
        assert!(!saves.is_pending());
    }
}
