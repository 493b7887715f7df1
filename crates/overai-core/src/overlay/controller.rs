use std::time::Instant;

use tracing::{debug, info, warn};

use super::animation::{Easing, HIDE_DURATION, OpacityAnimation, SHOW_DURATION};
use super::{Frame, OverlaySurface};
use crate::Result;
use crate::events::{EventEmitter, OverlayEvent, SubscriptionId};
use crate::state::{OPACITY_STEP, OpacityBounds, SaveScheduler, ScreenInfo, WindowState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Showing,
    Hiding,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Hidden,
    Visible,
    Transitioning(Transition),
}

/// Owns the single overlay window and its in-memory [`WindowState`].
///
/// Show and hide are cancel-and-replace: a new request starts from the alpha
/// currently on screen and discards whatever animation was running.
pub struct OverlayController<S: OverlaySurface> {
    surface: S,
    state: WindowState,
    bounds: OpacityBounds,
    screen: ScreenInfo,
    visibility: Visibility,
    animation: Option<OpacityAnimation>,
    alpha: f64,
    animations_enabled: bool,
    events: EventEmitter,
    saves: SaveScheduler,
}

impl<S: OverlaySurface> OverlayController<S> {
    pub fn new(surface: S, state: WindowState, bounds: OpacityBounds, screen: ScreenInfo) -> Self {
        let mut state = state;
        state.opacity = bounds.clamp(state.opacity);
        state.visible = false;
        Self {
            surface,
            state,
            bounds,
            screen,
            visibility: Visibility::Hidden,
            animation: None,
            alpha: 0.0,
            animations_enabled: true,
            events: EventEmitter::new(),
            saves: SaveScheduler::default(),
        }
    }

    /// Level, position and size the window from `state`, leaving it hidden.
    ///
    /// Fails only when the window cannot be made floating.
    pub fn apply_state(&mut self, state: WindowState) -> Result<()> {
        self.surface.configure_floating()?;

        self.state = state;
        self.state.opacity = self.bounds.clamp(self.state.opacity);
        self.state.visible = false;
        self.animation = None;
        self.visibility = Visibility::Hidden;

        if let Err(e) = self.surface.set_frame(self.state.frame()) {
            warn!(error = %e, "Failed to apply window frame");
        }
        self.apply_alpha(0.0);
        if let Err(e) = self.surface.order_out() {
            warn!(error = %e, "Failed to order overlay out");
        }

        info!(
            frame = ?self.state.frame(),
            opacity = self.state.opacity,
            service = %self.state.selected_service_id,
            "Overlay state applied"
        );
        Ok(())
    }

    pub fn show(&mut self, now: Instant) {
        let from = match self.visibility {
            Visibility::Visible | Visibility::Transitioning(Transition::Showing) => return,
            Visibility::Hidden => {
                self.apply_alpha(0.0);
                if let Err(e) = self.surface.order_front() {
                    warn!(error = %e, "Failed to order overlay front");
                }
                0.0
            }
            Visibility::Transitioning(Transition::Hiding) => self.alpha,
        };

        let target = self.state.opacity;
        if self.animations_enabled {
            self.animation = Some(OpacityAnimation::new(
                from,
                target,
                now,
                SHOW_DURATION,
                Easing::EaseOut,
            ));
            self.visibility = Visibility::Transitioning(Transition::Showing);
        } else {
            self.animation = None;
            self.apply_alpha(target);
            self.visibility = Visibility::Visible;
        }

        debug!(from, target, "Showing overlay");
        self.state.visible = true;
        self.events.emit(OverlayEvent::VisibilityChanged(true));
        self.saves.schedule(now);
    }

    pub fn hide(&mut self, now: Instant) {
        match self.visibility {
            Visibility::Hidden | Visibility::Transitioning(Transition::Hiding) => return,
            Visibility::Visible | Visibility::Transitioning(Transition::Showing) => {}
        }

        let from = self.alpha;
        if self.animations_enabled {
            self.animation = Some(OpacityAnimation::new(
                from,
                0.0,
                now,
                HIDE_DURATION,
                Easing::EaseIn,
            ));
            self.visibility = Visibility::Transitioning(Transition::Hiding);
        } else {
            self.animation = None;
            self.finish_hide();
        }

        debug!(from, "Hiding overlay");
        self.state.visible = false;
        self.events.emit(OverlayEvent::VisibilityChanged(false));
        self.saves.schedule(now);
    }

    pub fn toggle(&mut self, now: Instant) {
        match self.visibility {
            Visibility::Visible | Visibility::Transitioning(Transition::Showing) => self.hide(now),
            Visibility::Hidden | Visibility::Transitioning(Transition::Hiding) => self.show(now),
        }
    }

    /// Take the window off screen without animating, e.g. during shutdown.
    pub fn hide_immediately(&mut self) {
        self.animation = None;
        self.saves.cancel();
        let was_hidden = self.visibility == Visibility::Hidden;
        self.finish_hide();
        if !was_hidden {
            self.state.visible = false;
            self.events.emit(OverlayEvent::VisibilityChanged(false));
        }
    }

    /// Advance any running animation. Returns `true` while one is still
    /// in flight.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some(animation) = self.animation else {
            return false;
        };

        self.apply_alpha(animation.value_at(now));
        if !animation.is_finished(now) {
            return true;
        }

        self.animation = None;
        match self.visibility {
            Visibility::Transitioning(Transition::Showing) => self.visibility = Visibility::Visible,
            Visibility::Transitioning(Transition::Hiding) => self.finish_hide(),
            Visibility::Hidden | Visibility::Visible => {}
        }
        false
    }

    pub fn set_opacity(&mut self, value: f64, now: Instant) {
        let opacity = self.bounds.clamp(value);
        if opacity == self.state.opacity {
            return;
        }
        self.state.opacity = opacity;

        match self.visibility {
            Visibility::Visible => self.apply_alpha(opacity),
            Visibility::Transitioning(Transition::Showing) => {
                if let Some(animation) = self.animation.as_mut() {
                    animation.retarget(opacity);
                }
            }
            Visibility::Hidden | Visibility::Transitioning(Transition::Hiding) => {}
        }

        debug!(opacity, "Overlay opacity changed");
        self.events.emit(OverlayEvent::OpacityChanged(opacity));
        self.saves.schedule(now);
    }

    /// Step opacity up or down by one notch.
    pub fn adjust_opacity(&mut self, increase: bool, now: Instant) {
        let step = if increase { OPACITY_STEP } else { -OPACITY_STEP };
        let next = ((self.state.opacity + step) * 100.0).round() / 100.0;
        self.set_opacity(next, now);
    }

    pub fn select_service(&mut self, id: &str, now: Instant) {
        self.state.selected_service_id = id.to_string();
        info!(service = id, "Service selected");
        self.events.emit(OverlayEvent::ServiceSelected(id.to_string()));
        self.saves.schedule(now);
    }

    /// Record a user move or resize, clamped to the minimum size and the
    /// screen.
    pub fn set_frame(&mut self, frame: Frame, now: Instant) {
        let finite = [frame.x, frame.y, frame.width, frame.height]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            warn!(?frame, "Ignoring non-finite window frame");
            return;
        }
        let frame = self.screen.fit_frame(frame);
        if frame == self.state.frame() {
            return;
        }
        self.state.set_frame(frame);
        if let Err(e) = self.surface.set_frame(frame) {
            warn!(error = %e, "Failed to apply window frame");
        }
        self.saves.schedule(now);
    }

    /// The state to write, once per quiet period.
    pub fn take_due_save(&mut self, now: Instant) -> Option<WindowState> {
        self.saves.take_due(now).then(|| self.state.clone())
    }

    pub fn has_pending_save(&self) -> bool {
        self.saves.is_pending()
    }

    pub fn set_animations_enabled(&mut self, enabled: bool) {
        self.animations_enabled = enabled;
    }

    pub fn animations_enabled(&self) -> bool {
        self.animations_enabled
    }

    pub fn is_animating(&self) -> bool {
        self.animation.is_some()
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&OverlayEvent) + Send + 'static,
    {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub fn emit(&mut self, event: OverlayEvent) {
        self.events.emit(event);
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn state(&self) -> &WindowState {
        &self.state
    }

    pub fn bounds(&self) -> OpacityBounds {
        self.bounds
    }

    /// Alpha most recently pushed to the window.
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    fn finish_hide(&mut self) {
        self.apply_alpha(0.0);
        if let Err(e) = self.surface.order_out() {
            warn!(error = %e, "Failed to order overlay out");
        }
        self.visibility = Visibility::Hidden;
    }

    fn apply_alpha(&mut self, alpha: f64) {
        if let Err(e) = self.surface.set_alpha(alpha) {
            warn!(alpha, error = %e, "Failed to set overlay alpha");
        }
        self.alpha = alpha;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::state::{ScreenInfo, StateLimits};
    use crate::testing::RecordingSurface;

    fn controller() -> OverlayController<RecordingSurface> {
        let limits = StateLimits {
            bounds: OpacityBounds::default(),
            default_opacity: 1.0,
            default_service: "grok".to_string(),
            screen: ScreenInfo::default(),
        };
        let state = limits.default_state();
        let mut controller = OverlayController::new(
            RecordingSurface::default(),
            state.clone(),
            limits.bounds,
            limits.screen,
        );
        controller.apply_state(state).unwrap();
        controller
    }

    #[test]
    fn apply_state_starts_hidden_and_floating() {
        let controller = controller();
        assert_eq!(controller.visibility(), Visibility::Hidden);
        assert!(controller.surface().floating);
        assert!(!controller.surface().on_screen);
        assert_eq!(controller.surface().frame, Some(controller.state().frame()));
    }

    #[test]
    fn apply_state_fails_when_floating_denied() {
        let limits_state = controller().state().clone();
        let mut controller = OverlayController::new(
            RecordingSurface::denying_floating(),
            limits_state.clone(),
            OpacityBounds::default(),
            ScreenInfo::default(),
        );
        let err = controller.apply_state(limits_state).unwrap_err();
        assert!(matches!(err, crate::Error::FloatingWindowDenied(_)));
    }

    #[test]
    fn show_ramps_to_stored_opacity() {
        let mut controller = controller();
        let start = Instant::now();

        controller.show(start);
        assert_eq!(controller.visibility(), Visibility::Transitioning(Transition::Showing));
        assert!(controller.surface().on_screen);

        assert!(controller.tick(start + Duration::from_millis(150)));
        let mid = controller.alpha();
        assert!(mid > 0.0 && mid < 1.0);

        assert!(!controller.tick(start + SHOW_DURATION));
        assert_eq!(controller.visibility(), Visibility::Visible);
        assert_eq!(controller.alpha(), 1.0);
        assert!(controller.state().visible);
    }

    #[test]
    fn hide_fades_then_orders_out() {
        let mut controller = controller();
        let start = Instant::now();
        controller.show(start);
        controller.tick(start + SHOW_DURATION);

        let later = start + Duration::from_secs(1);
        controller.hide(later);
        assert!(controller.surface().on_screen);
        controller.tick(later + HIDE_DURATION);

        assert_eq!(controller.visibility(), Visibility::Hidden);
        assert!(!controller.surface().on_screen);
        assert_eq!(controller.alpha(), 0.0);
    }

    #[test]
    fn double_toggle_returns_to_hidden_without_drift() {
        let mut controller = controller();
        let start = Instant::now();

        controller.toggle(start);
        controller.toggle(start + Duration::from_millis(50));
        controller.tick(start + Duration::from_secs(1));

        assert_eq!(controller.visibility(), Visibility::Hidden);
        assert_eq!(controller.alpha(), 0.0);
        assert!(!controller.surface().on_screen);
        assert_eq!(controller.state().opacity, 1.0);
        assert!(!controller.is_animating());
    }

    #[test]
    fn show_during_hide_starts_from_current_alpha() {
        let mut controller = controller();
        let start = Instant::now();
        controller.show(start);
        controller.tick(start + SHOW_DURATION);

        let hide_at = start + Duration::from_secs(1);
        controller.hide(hide_at);
        controller.tick(hide_at + Duration::from_millis(100));
        let partial = controller.alpha();
        assert!(partial > 0.0 && partial < 1.0);

        controller.show(hide_at + Duration::from_millis(100));
        assert_eq!(controller.visibility(), Visibility::Transitioning(Transition::Showing));
        controller.tick(hide_at + Duration::from_millis(100));
        assert_eq!(controller.alpha(), partial);
    }

    #[test]
    fn opacity_always_within_bounds() {
        let mut controller = controller();
        let now = Instant::now();
        controller.show(now);
        controller.tick(now + SHOW_DURATION);

        for value in [-3.0, 0.5, 9.0, f64::NAN, 0.1, 0.95] {
            controller.set_opacity(value, now);
            let opacity = controller.state().opacity;
            assert!((0.2..=1.0).contains(&opacity), "{opacity}");
            assert_eq!(controller.alpha(), opacity);
        }
        for _ in 0..20 {
            controller.adjust_opacity(false, now);
        }
        assert_eq!(controller.state().opacity, 0.2);
        controller.adjust_opacity(true, now);
        assert_eq!(controller.state().opacity, 0.3);
    }

    #[test]
    fn set_opacity_retargets_show_but_not_hide() {
        let mut controller = controller();
        let start = Instant::now();
        controller.show(start);
        controller.set_opacity(0.5, start);
        controller.tick(start + SHOW_DURATION);
        assert_eq!(controller.alpha(), 0.5);

        let hide_at = start + Duration::from_secs(1);
        controller.hide(hide_at);
        controller.set_opacity(0.8, hide_at);
        controller.tick(hide_at + HIDE_DURATION);
        assert_eq!(controller.alpha(), 0.0);
        assert_eq!(controller.state().opacity, 0.8);
    }

    #[test]
    fn disabled_animations_complete_immediately() {
        let mut controller = controller();
        controller.set_animations_enabled(false);
        let now = Instant::now();

        controller.show(now);
        assert_eq!(controller.visibility(), Visibility::Visible);
        assert_eq!(controller.alpha(), 1.0);

        controller.hide(now);
        assert_eq!(controller.visibility(), Visibility::Hidden);
        assert!(!controller.surface().on_screen);
    }

    #[test]
    fn events_follow_state_changes() {
        let mut controller = controller();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        controller.subscribe(move |e| sink.lock().unwrap().push(e.clone()));

        let now = Instant::now();
        controller.show(now);
        controller.set_opacity(0.6, now);
        controller.select_service("claude", now);
        controller.hide(now);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                OverlayEvent::VisibilityChanged(true),
                OverlayEvent::OpacityChanged(0.6),
                OverlayEvent::ServiceSelected("claude".to_string()),
                OverlayEvent::VisibilityChanged(false),
            ]
        );
    }

    #[test]
    fn changes_schedule_a_single_trailing_save() {
        let mut controller = controller();
        let now = Instant::now();
        assert!(controller.take_due_save(now + Duration::from_secs(5)).is_none());

        controller.set_opacity(0.5, now);
        controller.set_frame(
            Frame {
                x: 10.0,
                y: 10.0,
                width: 400.0,
                height: 300.0,
            },
            now + Duration::from_millis(100),
        );
        assert!(controller.take_due_save(now + Duration::from_millis(500)).is_none());

        let saved = controller.take_due_save(now + Duration::from_millis(600)).unwrap();
        assert_eq!(saved.opacity, 0.5);
        assert_eq!(saved.width, 400.0);
        assert!(!controller.has_pending_save());
    }

    #[test]
    fn user_frame_is_clamped_before_saving() {
        let mut controller = controller();
        let now = Instant::now();
        controller.set_frame(
            Frame {
                x: -200.0,
                y: 900.0,
                width: 50.0,
                height: 400.0,
            },
            now,
        );

        let expected = Frame {
            x: 0.0,
            y: 680.0,
            width: 320.0,
            height: 400.0,
        };
        assert_eq!(controller.state().frame(), expected);
        assert_eq!(controller.surface().frame, Some(expected));

        controller.set_frame(
            Frame {
                x: f64::NAN,
                y: 0.0,
                width: 400.0,
                height: 300.0,
            },
            now,
        );
        assert_eq!(controller.state().frame(), expected);

        let saved = controller.take_due_save(now + Duration::from_millis(600)).unwrap();
        assert_eq!(saved.frame(), expected);
    }

    #[test]
    fn surface_errors_do_not_escape() {
        let mut controller = controller();
        controller.surface_mut().fail_alpha = true;
        let now = Instant::now();
        controller.show(now);
        controller.tick(now + SHOW_DURATION);
        assert_eq!(controller.visibility(), Visibility::Visible);
    }

    #[test]
    fn hide_immediately_skips_animation() {
        let mut controller = controller();
        let now = Instant::now();
        controller.show(now);
        controller.hide_immediately();
        assert_eq!(controller.visibility(), Visibility::Hidden);
        assert!(!controller.surface().on_screen);
        assert!(!controller.state().visible);
        assert!(!controller.has_pending_save());
    }
}
