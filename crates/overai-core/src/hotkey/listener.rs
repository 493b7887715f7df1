use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{HotkeyBinding, KeyEvent};
use crate::{Error, Result};

/// Minimum spacing between two toggle emissions.
pub const HOTKEY_DEBOUNCE: Duration = Duration::from_millis(300);

/// Process-wide low-level input tap provided by the host platform.
pub trait InputTap {
    /// Whether the process has been granted input monitoring / accessibility.
    fn is_trusted(&self) -> bool;

    /// Start delivering key events for `binding`.
    fn install(&mut self, binding: &HotkeyBinding) -> Result<()>;

    /// Tear the tap down. Must be safe to call when nothing is installed.
    fn remove(&mut self);
}

/// Capability returned by [`HotkeyListener::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyToken(u64);

/// Watches the global key stream for one binding and reports debounced
/// toggle requests.
///
/// Without permission the listener stays inert: no tap is installed and
/// nothing is retried until [`register`](Self::register) is called again.
pub struct HotkeyListener<T: InputTap> {
    tap: T,
    active: Option<(HotkeyToken, HotkeyBinding)>,
    next_token: u64,
    debounce: Duration,
    last_fired: Option<Instant>,
}

impl<T: InputTap> HotkeyListener<T> {
    pub fn new(tap: T) -> Self {
        Self::with_debounce(tap, HOTKEY_DEBOUNCE)
    }

    pub fn with_debounce(tap: T, debounce: Duration) -> Self {
        Self {
            tap,
            active: None,
            next_token: 1,
            debounce,
            last_fired: None,
        }
    }

    pub fn register(&mut self, binding: HotkeyBinding) -> Result<HotkeyToken> {
        if !self.tap.is_trusted() {
            warn!(hotkey = %binding, "Input monitoring not granted, hotkey stays inactive");
            return Err(Error::PermissionDenied);
        }

        if let Some((previous, old)) = self.active.take() {
            debug!(?previous, hotkey = %old, "Replacing registered hotkey");
            self.tap.remove();
        }

        self.tap.install(&binding)?;

        let token = HotkeyToken(self.next_token);
        self.next_token += 1;
        self.active = Some((token, binding));
        self.last_fired = None;
        info!(hotkey = %binding, "Global hotkey registered");
        Ok(token)
    }

    pub fn unregister(&mut self, token: HotkeyToken) {
        match self.active {
            Some((active, binding)) if active == token => {
                self.tap.remove();
                self.active = None;
                info!(hotkey = %binding, "Global hotkey unregistered");
            }
            _ => warn!(?token, "Ignoring unregister with a stale hotkey token"),
        }
    }

    /// Feed one captured key event. Returns `true` when it should toggle
    /// the overlay.
    pub fn handle_key_event(&mut self, event: &KeyEvent, now: Instant) -> bool {
        let Some((_, binding)) = self.active else {
            return false;
        };
        if !binding.matches(event) {
            return false;
        }

        if let Some(last) = self.last_fired {
            if now.saturating_duration_since(last) < self.debounce {
                debug!("Hotkey repeat suppressed");
                return false;
            }
        }

        self.last_fired = Some(now);
        true
    }

    pub fn is_registered(&self) -> bool {
        self.active.is_some()
    }

    pub fn binding(&self) -> Option<&HotkeyBinding> {
        self.active.as_ref().map(|(_, binding)| binding)
    }

    pub fn tap(&self) -> &T {
        &self.tap
    }
}

impl<T: InputTap> Drop for HotkeyListener<T> {
    fn drop(&mut self) {
        if self.active.take().is_some() {
            self.tap.remove();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hotkey::Modifiers;
    use crate::testing::FakeTap;

    fn command_g() -> KeyEvent {
        KeyEvent {
            key_code: 5,
            modifiers: Modifiers::COMMAND,
        }
    }

    #[test]
    fn register_without_permission_is_denied_and_inert() {
        let tap = FakeTap::untrusted();
        let mut listener = HotkeyListener::new(tap.clone());

        let err = listener.register(HotkeyBinding::default()).unwrap_err();
        assert!(matches!(err, Error::PermissionDenied));
        assert!(!listener.is_registered());
        assert_eq!(tap.installs(), 0);
        assert!(!listener.handle_key_event(&command_g(), Instant::now()));
    }

    #[test]
    fn reregistering_after_permission_granted_installs_tap() {
        let tap = FakeTap::untrusted();
        let mut listener = HotkeyListener::new(tap.clone());
        assert!(listener.register(HotkeyBinding::default()).is_err());

        tap.grant();
        listener.register(HotkeyBinding::default()).unwrap();
        assert!(listener.is_registered());
        assert_eq!(tap.installs(), 1);
    }

    #[test]
    fn key_repeat_flood_emits_once() {
        let mut listener = HotkeyListener::new(FakeTap::trusted());
        listener.register(HotkeyBinding::default()).unwrap();

        let start = Instant::now();
        let fired = (0..20)
            .filter(|i| {
                let at = start + Duration::from_micros(2_500 * i);
                listener.handle_key_event(&command_g(), at)
            })
            .count();
        assert_eq!(fired, 1);
    }

    #[test]
    fn fires_again_after_debounce_window() {
        let mut listener = HotkeyListener::new(FakeTap::trusted());
        listener.register(HotkeyBinding::default()).unwrap();

        let start = Instant::now();
        assert!(listener.handle_key_event(&command_g(), start));
        assert!(!listener.handle_key_event(&command_g(), start + Duration::from_millis(299)));
        assert!(listener.handle_key_event(&command_g(), start + Duration::from_millis(300)));
    }

    #[test]
    fn ignores_non_matching_events() {
        let mut listener = HotkeyListener::new(FakeTap::trusted());
        listener.register(HotkeyBinding::default()).unwrap();

        let plain_g = KeyEvent {
            key_code: 5,
            modifiers: Modifiers::NONE,
        };
        assert!(!listener.handle_key_event(&plain_g, Instant::now()));
    }

    #[test]
    fn unregister_removes_tap_and_stale_token_is_ignored() {
        let tap = FakeTap::trusted();
        let mut listener = HotkeyListener::new(tap.clone());
        let first = listener.register(HotkeyBinding::default()).unwrap();
        let second = listener.register("Command+Shift+G".parse().unwrap()).unwrap();
        assert_eq!(tap.removals(), 1);

        listener.unregister(first);
        assert!(listener.is_registered());

        listener.unregister(second);
        assert!(!listener.is_registered());
        assert_eq!(tap.removals(), 2);
        assert!(!listener.handle_key_event(&command_g(), Instant::now()));
    }

    #[test]
    fn dropping_listener_tears_down_tap() {
        let tap = FakeTap::trusted();
        {
            let mut listener = HotkeyListener::new(tap.clone());
            listener.register(HotkeyBinding::default()).unwrap();
        }
        assert_eq!(tap.removals(), 1);
        assert!(tap.installed().is_none());
    }
}
