use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::Error;

/// Set of held modifier keys, stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const COMMAND: Modifiers = Modifiers(0b0001);
    pub const OPTION: Modifiers = Modifiers(0b0010);
    pub const CONTROL: Modifiers = Modifiers(0b0100);
    pub const SHIFT: Modifiers = Modifiers(0b1000);

    pub fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Modifier names in display order.
    fn names(self) -> impl Iterator<Item = &'static str> {
        [
            (Modifiers::COMMAND, "Command"),
            (Modifiers::OPTION, "Option"),
            (Modifiers::CONTROL, "Control"),
            (Modifiers::SHIFT, "Shift"),
        ]
        .into_iter()
        .filter(move |(m, _)| self.contains(*m))
        .map(|(_, name)| name)
    }

    fn parse_one(token: &str) -> Option<Modifiers> {
        match token.to_ascii_lowercase().as_str() {
            "command" | "cmd" | "super" | "meta" | "⌘" => Some(Modifiers::COMMAND),
            "option" | "opt" | "alt" | "⌥" => Some(Modifiers::OPTION),
            "control" | "ctrl" | "⌃" => Some(Modifiers::CONTROL),
            "shift" | "⇧" => Some(Modifiers::SHIFT),
            _ => None,
        }
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

/// A named key: display name, macOS virtual key code, accelerator token.
struct KeyName {
    name: &'static str,
    code: u16,
    accelerator: &'static str,
}

const fn key(name: &'static str, code: u16, accelerator: &'static str) -> KeyName {
    KeyName {
        name,
        code,
        accelerator,
    }
}

// ANSI layout virtual key codes (HIToolbox/Events.h).
const KEYS: &[KeyName] = &[
    key("A", 0, "A"),
    key("S", 1, "S"),
    key("D", 2, "D"),
    key("F", 3, "F"),
    key("H", 4, "H"),
    key("G", 5, "G"),
    key("Z", 6, "Z"),
    key("X", 7, "X"),
    key("C", 8, "C"),
    key("V", 9, "V"),
    key("B", 11, "B"),
    key("Q", 12, "Q"),
    key("W", 13, "W"),
    key("E", 14, "E"),
    key("R", 15, "R"),
    key("Y", 16, "Y"),
    key("T", 17, "T"),
    key("1", 18, "1"),
    key("2", 19, "2"),
    key("3", 20, "3"),
    key("4", 21, "4"),
    key("6", 22, "6"),
    key("5", 23, "5"),
    key("9", 25, "9"),
    key("7", 26, "7"),
    key("8", 28, "8"),
    key("0", 29, "0"),
    key("O", 31, "O"),
    key("U", 32, "U"),
    key("I", 34, "I"),
    key("P", 35, "P"),
    key("Return", 36, "Enter"),
    key("L", 37, "L"),
    key("J", 38, "J"),
    key("K", 40, "K"),
    key("N", 45, "N"),
    key("M", 46, "M"),
    key("Tab", 48, "Tab"),
    key("Space", 49, "Space"),
    key("Delete", 51, "Backspace"),
    key("Escape", 53, "Escape"),
    key("F5", 96, "F5"),
    key("F6", 97, "F6"),
    key("F7", 98, "F7"),
    key("F3", 99, "F3"),
    key("F8", 100, "F8"),
    key("F9", 101, "F9"),
    key("F11", 103, "F11"),
    key("F10", 109, "F10"),
    key("F12", 111, "F12"),
    key("Home", 115, "Home"),
    key("PageUp", 116, "PageUp"),
    key("ForwardDelete", 117, "Delete"),
    key("F4", 118, "F4"),
    key("End", 119, "End"),
    key("F2", 120, "F2"),
    key("PageDown", 121, "PageDown"),
    key("F1", 122, "F1"),
    key("Left", 123, "ArrowLeft"),
    key("Right", 124, "ArrowRight"),
    key("Down", 125, "ArrowDown"),
    key("Up", 126, "ArrowUp"),
];

fn lookup_name(token: &str) -> Option<&'static KeyName> {
    let canonical = match token.to_ascii_lowercase().as_str() {
        "enter" => "return",
        "esc" => "escape",
        "backspace" => "delete",
        "arrowleft" => "left",
        "arrowright" => "right",
        "arrowup" => "up",
        "arrowdown" => "down",
        other => return KEYS.iter().find(|k| k.name.eq_ignore_ascii_case(other)),
    };
    KEYS.iter().find(|k| k.name.eq_ignore_ascii_case(canonical))
}

fn lookup_code(code: u16) -> Option<&'static KeyName> {
    KEYS.iter().find(|k| k.code == code)
}

/// A single captured key-down event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key_code: u16,
    pub modifiers: Modifiers,
}

/// Global key combination that toggles the overlay.
///
/// Parsed from strings such as `"Command+G"` or `"Ctrl+Shift+Space"`.
/// Matching follows the event tap semantics: the key codes must be equal
/// and every required modifier must be held; extra modifiers are tolerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HotkeyBinding {
    pub modifiers: Modifiers,
    pub key_code: u16,
}

impl HotkeyBinding {
    pub const fn new(modifiers: Modifiers, key_code: u16) -> Self {
        Self {
            modifiers,
            key_code,
        }
    }

    pub fn matches(&self, event: &KeyEvent) -> bool {
        event.key_code == self.key_code && event.modifiers.contains(self.modifiers)
    }

    /// Accelerator string understood by the global shortcut backend,
    /// e.g. `"Command+Shift+Space"`.
    pub fn accelerator(&self) -> Option<String> {
        let key = lookup_code(self.key_code)?;
        let mut parts: Vec<&str> = self.modifiers.names().collect();
        parts.push(key.accelerator);
        Some(parts.join("+"))
    }
}

impl Default for HotkeyBinding {
    /// Command+G.
    fn default() -> Self {
        Self::new(Modifiers::COMMAND, 5)
    }
}

impl fmt::Display for HotkeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for name in self.modifiers.names() {
            write!(f, "{name}+")?;
        }
        match lookup_code(self.key_code) {
            Some(key) => write!(f, "{}", key.name),
            None => write!(f, "KeyCode{}", self.key_code),
        }
    }
}

impl FromStr for HotkeyBinding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut modifiers = Modifiers::NONE;
        let mut key_code = None;

        for token in s.split('+').map(str::trim) {
            if token.is_empty() {
                return Err(Error::InvalidHotkey(format!("'{s}' has an empty segment")));
            }
            if let Some(m) = Modifiers::parse_one(token) {
                modifiers = modifiers | m;
                continue;
            }
            let code = match lookup_name(token) {
                Some(k) => k.code,
                None => match token.strip_prefix("KeyCode").map(str::parse::<u16>) {
                    Some(Ok(code)) => code,
                    _ => return Err(Error::InvalidHotkey(format!("unknown key '{token}'"))),
                },
            };
            if key_code.replace(code).is_some() {
                return Err(Error::InvalidHotkey(format!("'{s}' names more than one key")));
            }
        }

        let key_code = key_code.ok_or_else(|| Error::InvalidHotkey(format!("'{s}' has no key")))?;
        Ok(Self::new(modifiers, key_code))
    }
}

impl Serialize for HotkeyBinding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for HotkeyBinding {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
