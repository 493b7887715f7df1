//! Startup, shutdown and recovery of the overlay.

mod crash;
mod memory;

pub use crash::{CRASH_THRESHOLD, CRASH_WINDOW, CrashHistory, CrashRecord, SessionMarker};
pub use memory::{MEMORY_SAMPLE_INTERVAL, MemoryMonitor, MemoryPressure, MemorySampler};

use std::time::{Instant, SystemTime};

use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::events::{OverlayEvent, SubscriptionId};
use crate::hotkey::{HotkeyListener, HotkeyToken, InputTap, KeyEvent};
use crate::overlay::{Frame, OverlayController, OverlaySurface};
use crate::paths::AppPaths;
use crate::state::{ScreenInfo, StateLimits, WindowStateStore};
use crate::{Error, Result};

/// Recoverable startup conditions the user should hear about once.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    PermissionRequired,
    CrashLoopRecovery { crashes: usize },
    ConfigFallback(Vec<String>),
}

impl Notice {
    pub fn title(&self) -> &'static str {
        match self {
            Notice::PermissionRequired => "Accessibility Permission Required",
            Notice::CrashLoopRecovery { .. } => "OverAI Recovered From Repeated Crashes",
            Notice::ConfigFallback(_) => "Configuration Problem",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notice::PermissionRequired => "OverAI needs Accessibility access to listen for its \
                 global hotkey.\n\nOpen System Settings > Privacy & Security > Accessibility, \
                 enable OverAI, then choose \"Enable Hotkey…\" from the menu bar icon."
                .to_string(),
            Notice::CrashLoopRecovery { crashes } => format!(
                "OverAI quit unexpectedly {crashes} times in the last minute. It has started \
                 with default window settings and animations turned off."
            ),
            Notice::ConfigFallback(warnings) => format!(
                "Some settings in config.json were ignored:\n\n{}",
                warnings.join("\n")
            ),
        }
    }
}

/// Inputs resolved by the host before the coordinator starts.
#[derive(Debug, Clone)]
pub struct StartupContext {
    pub config: AppConfig,
    pub config_warnings: Vec<String>,
    pub paths: AppPaths,
    pub screen: ScreenInfo,
}

type ReleaseHandler = Box<dyn FnMut(MemoryPressure) -> std::result::Result<(), String> + Send>;

/// Process-wide owner of the overlay, the hotkey and their persistence.
pub struct Coordinator<S: OverlaySurface, T: InputTap> {
    config: AppConfig,
    controller: OverlayController<S>,
    listener: HotkeyListener<T>,
    hotkey: Option<HotkeyToken>,
    store: WindowStateStore,
    crashes: CrashHistory,
    marker: SessionMarker,
    degraded: bool,
    release_handlers: Vec<(String, ReleaseHandler)>,
    shut_down: bool,
}

impl<S: OverlaySurface, T: InputTap> Coordinator<S, T> {
    /// Bring the overlay up hidden and arm the hotkey.
    ///
    /// Only a window that cannot be made floating is an error; everything
    /// else degrades into a [`Notice`].
    pub fn startup(
        ctx: StartupContext,
        surface: S,
        tap: T,
        now: Instant,
        wall: SystemTime,
    ) -> Result<(Self, Vec<Notice>)> {
        let StartupContext {
            config,
            config_warnings,
            paths,
            screen,
        } = ctx;
        let mut notices = Vec::new();
        if !config_warnings.is_empty() {
            notices.push(Notice::ConfigFallback(config_warnings));
        }

        let marker = SessionMarker::new(&paths.session_marker);
        let mut crashes = CrashHistory::load(&paths.crash_file);
        if let Some(started) = marker.previous_start(wall) {
            let uptime = wall.duration_since(started).unwrap_or_default();
            warn!(uptime_secs = uptime.as_secs(), "Previous session did not shut down cleanly");
            // Dated when detected: the crash itself happened after `started`.
            if let Err(e) = crashes.record(wall, "previous session ended without clean shutdown") {
                warn!(error = %e, "Failed to record crash");
            }
        }

        let degraded = crashes.is_crash_loop(wall);
        if degraded {
            let count = crashes.recent_count(wall);
            warn!("{}, starting in degraded mode", Error::CrashLoopDetected(count));
            notices.push(Notice::CrashLoopRecovery { crashes: count });
        }

        let limits = StateLimits {
            bounds: config.opacity,
            default_opacity: config.default_opacity,
            default_service: config.default_service().to_string(),
            screen,
        };
        let store = WindowStateStore::new(&paths.state_file, limits);
        let mut state = if degraded { store.defaults() } else { store.load() };
        if !config.has_service(&state.selected_service_id) {
            warn!(
                service = %state.selected_service_id,
                "Saved service is not configured, using {}",
                config.default_service()
            );
            state.selected_service_id = config.default_service().to_string();
        }

        let mut controller =
            OverlayController::new(surface, state.clone(), config.opacity, screen);
        controller.set_animations_enabled(!degraded);
        controller.apply_state(state)?;

        let mut listener = HotkeyListener::new(tap);
        let hotkey = match listener.register(config.hotkey) {
            Ok(token) => Some(token),
            Err(Error::PermissionDenied) => {
                notices.push(Notice::PermissionRequired);
                None
            }
            Err(e) => {
                error!(error = %e, "Failed to register global hotkey");
                None
            }
        };

        if let Err(e) = marker.begin(wall) {
            warn!(error = %e, "Failed to write session marker");
        }

        info!(degraded, hotkey = %config.hotkey, "Overlay started");
        Ok((
            Self {
                config,
                controller,
                listener,
                hotkey,
                store,
                crashes,
                marker,
                degraded,
                release_handlers: Vec::new(),
                shut_down: false,
            },
            notices,
        ))
    }

    /// Route a captured key event. Returns `true` if it toggled the overlay.
    pub fn handle_key_event(&mut self, event: &KeyEvent, now: Instant) -> bool {
        if !self.listener.handle_key_event(event, now) {
            return false;
        }
        self.controller.emit(OverlayEvent::ToggleRequested);
        self.controller.toggle(now);
        true
    }

    pub fn toggle(&mut self, now: Instant) {
        self.controller.toggle(now);
    }

    pub fn show(&mut self, now: Instant) {
        self.controller.show(now);
    }

    pub fn hide(&mut self, now: Instant) {
        self.controller.hide(now);
    }

    pub fn set_opacity(&mut self, value: f64, now: Instant) {
        self.controller.set_opacity(value, now);
    }

    pub fn adjust_opacity(&mut self, increase: bool, now: Instant) {
        self.controller.adjust_opacity(increase, now);
    }

    /// Switch to a configured service. Unknown ids are ignored.
    pub fn select_service(&mut self, id: &str, now: Instant) -> bool {
        if !self.config.has_service(id) {
            warn!(service = id, "Ignoring unknown service");
            return false;
        }
        self.controller.select_service(id, now);
        true
    }

    pub fn set_frame(&mut self, frame: Frame, now: Instant) {
        self.controller.set_frame(frame, now);
    }

    /// Advance animations and flush a due save. Returns `true` while more
    /// ticks are needed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let animating = self.controller.tick(now);
        if let Some(state) = self.controller.take_due_save(now) {
            match self.store.save(&state) {
                Ok(()) => debug!("Window state saved"),
                Err(e) => warn!(error = %e, "Failed to save window state"),
            }
        }
        animating || self.controller.has_pending_save()
    }

    /// Try to arm the hotkey again after the user granted permission.
    pub fn retry_hotkey(&mut self) -> Result<()> {
        if self.listener.is_registered() {
            return Ok(());
        }
        let token = self.listener.register(self.config.hotkey)?;
        self.hotkey = Some(token);
        Ok(())
    }

    pub fn register_release_handler(&mut self, name: impl Into<String>, handler: ReleaseHandler) {
        self.release_handlers.push((name.into(), handler));
    }

    /// Ask every release handler to drop what it can. Failures are logged
    /// and do not stop the remaining handlers.
    pub fn on_memory_pressure(&mut self, level: MemoryPressure) {
        info!(?level, handlers = self.release_handlers.len(), "Releasing memory");
        for (name, handler) in &mut self.release_handlers {
            if let Err(e) = handler(level) {
                warn!(handler = %name, error = %e, "Memory release handler failed");
            }
        }
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&OverlayEvent) + Send + 'static,
    {
        self.controller.subscribe(handler)
    }

    /// Tear down in order and record a clean exit. Safe to call twice.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;

        if let Some(token) = self.hotkey.take() {
            self.listener.unregister(token);
        }
        self.controller.hide_immediately();

        if let Err(e) = self.store.save(self.controller.state()) {
            error!(error = %e, "Failed to save final window state");
        }
        if let Err(e) = self.marker.clear() {
            warn!(error = %e, "Failed to clear session marker");
        }
        if let Err(e) = self.crashes.clear() {
            warn!(error = %e, "Failed to clear crash history");
        }
        info!("Overlay shut down cleanly");
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn controller(&self) -> &OverlayController<S> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut OverlayController<S> {
        &mut self.controller
    }

    /// URL of the service currently selected.
    pub fn current_service_url(&self) -> Option<&str> {
        self.config
            .service_url(&self.controller.state().selected_service_id)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn is_hotkey_registered(&self) -> bool {
        self.listener.is_registered()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }
}
