use overai_core::{Error, HotkeyBinding, InputTap, KeyEvent, Result};
use tauri::AppHandle;
use tauri_plugin_global_shortcut::{GlobalShortcutExt, Shortcut, ShortcutState};
use tracing::{debug, warn};

use crate::platform;

/// Input tap backed by the system global shortcut service.
///
/// Each press is forwarded to the coordinator as a [`KeyEvent`] for the
/// registered binding, where debouncing happens.
pub struct GlobalShortcutTap {
    app: AppHandle,
    shortcut: Option<Shortcut>,
}

impl GlobalShortcutTap {
    pub fn new(app: AppHandle) -> Self {
        Self {
            app,
            shortcut: None,
        }
    }
}

impl InputTap for GlobalShortcutTap {
    fn is_trusted(&self) -> bool {
        platform::accessibility_trusted()
    }

    fn install(&mut self, binding: &HotkeyBinding) -> Result<()> {
        let accelerator = binding
            .accelerator()
            .ok_or_else(|| Error::InvalidHotkey(binding.to_string()))?;
        let shortcut: Shortcut = accelerator
            .parse()
            .map_err(|e| Error::InvalidHotkey(format!("{accelerator}: {e}")))?;

        let event = KeyEvent {
            key_code: binding.key_code,
            modifiers: binding.modifiers,
        };
        self.app
            .global_shortcut()
            .on_shortcut(shortcut, move |app, _shortcut, shortcut_event| {
                if shortcut_event.state == ShortcutState::Pressed {
                    crate::on_hotkey(app, &event);
                }
            })
            .map_err(|e| Error::InvalidHotkey(format!("{accelerator}: {e}")))?;

        debug!(%accelerator, "Global shortcut installed");
        self.shortcut = Some(shortcut);
        Ok(())
    }

    fn remove(&mut self) {
        if let Some(shortcut) = self.shortcut.take() {
            if let Err(e) = self.app.global_shortcut().unregister(shortcut) {
                warn!(error = %e, "Failed to unregister global shortcut");
            }
        }
    }
}
