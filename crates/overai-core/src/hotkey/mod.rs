mod binding;
mod listener;

pub use binding::{HotkeyBinding, KeyEvent, Modifiers};
pub use listener::{HOTKEY_DEBOUNCE, HotkeyListener, HotkeyToken, InputTap};
