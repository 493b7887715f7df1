use std::fs;
use std::path::Path;

use indexmap::{IndexMap, IndexSet};
use tracing::{info, warn};

use crate::hotkey::HotkeyBinding;
use crate::state::{MAX_OPACITY, MIN_OPACITY, OpacityBounds};
use crate::{Error, Result};

pub const DEFAULT_SERVICES: [(&str, &str); 5] = [
    ("grok", "https://grok.com"),
    ("chatgpt", "https://chat.openai.com"),
    ("claude", "https://claude.ai/chat"),
    ("gemini", "https://gemini.google.com"),
    ("deepseek", "https://chat.deepseek.com"),
];

pub const DEFAULT_MEETING_APPS: [&str; 4] = ["zoom.us", "Microsoft Teams", "Webex", "FaceTime"];

/// User configuration read from `config.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Service id to start URL, in menu order.
    pub services: IndexMap<String, String>,
    pub hotkey: HotkeyBinding,
    pub opacity: OpacityBounds,
    /// Opacity for a freshly created window state.
    pub default_opacity: f64,
    /// Process-name substrings that should auto-hide the overlay.
    pub meeting_apps: IndexSet<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            services: DEFAULT_SERVICES
                .iter()
                .map(|(id, url)| (id.to_string(), url.to_string()))
                .collect(),
            hotkey: HotkeyBinding::default(),
            opacity: OpacityBounds::default(),
            default_opacity: MAX_OPACITY,
            meeting_apps: DEFAULT_MEETING_APPS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl AppConfig {
    /// Load the config file, falling back to defaults.
    ///
    /// Never fails. The returned messages describe every value that was
    /// ignored and should be shown to the user once.
    pub fn load(path: &Path) -> (Self, Vec<String>) {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No config file, using defaults");
                return (Self::default(), Vec::new());
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Config file unreadable, using defaults");
                return (Self::default(), vec![format!("Could not read {}: {e}", path.display())]);
            }
        };

        match Self::from_json_str(&content) {
            Ok((config, warnings)) => {
                for warning in &warnings {
                    warn!(path = %path.display(), "{warning}");
                }
                (config, warnings)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Using default configuration");
                (Self::default(), vec![e.to_string()])
            }
        }
    }

    /// Parse a config document. Only a document that is not a JSON object
    /// is an error; bad individual fields fall back one by one.
    pub fn from_json_str(content: &str) -> Result<(Self, Vec<String>)> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| Error::ConfigMalformed(e.to_string()))?;
        if !value.is_object() {
            return Err(Error::ConfigMalformed("top level is not an object".to_string()));
        }

        let defaults = Self::default();
        let mut warnings = Vec::new();

        let services = match value.get("services") {
            None => defaults.services,
            Some(raw) => parse_services(raw, &mut warnings).unwrap_or_else(|| {
                warnings.push("No usable entries in \"services\", using built-in services".to_string());
                defaults.services
            }),
        };

        let hotkey = match value.get("hotkey") {
            None => defaults.hotkey,
            Some(raw) => match raw.as_str().map(str::parse::<HotkeyBinding>) {
                Some(Ok(binding)) => binding,
                Some(Err(e)) => {
                    warnings.push(format!("{e}, using {}", defaults.hotkey));
                    defaults.hotkey
                }
                None => {
                    warnings.push(format!("\"hotkey\" must be a string, using {}", defaults.hotkey));
                    defaults.hotkey
                }
            },
        };

        let min = read_unit(&value, "minOpacity", MIN_OPACITY, &mut warnings);
        let max = read_unit(&value, "maxOpacity", MAX_OPACITY, &mut warnings);
        let opacity = OpacityBounds::new(min, max).unwrap_or_else(|| {
            warnings.push(format!(
                "minOpacity {min} is greater than maxOpacity {max}, using {MIN_OPACITY}..{MAX_OPACITY}"
            ));
            OpacityBounds::default()
        });

        let default_opacity = match value.get("defaultOpacity") {
            None => opacity.max,
            Some(raw) => match raw.as_f64().filter(|v| v.is_finite()) {
                Some(v) => opacity.clamp(v),
                None => {
                    warnings.push("\"defaultOpacity\" must be a number".to_string());
                    opacity.max
                }
            },
        };

        let meeting_apps = match value.get("meetingApps") {
            None => defaults.meeting_apps,
            Some(raw) => match raw.as_array() {
                Some(items) => items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| s.to_string())
                    .collect(),
                None => {
                    warnings.push("\"meetingApps\" must be a list of strings".to_string());
                    defaults.meeting_apps
                }
            },
        };

        Ok((
            Self {
                services,
                hotkey,
                opacity,
                default_opacity,
                meeting_apps,
            },
            warnings,
        ))
    }

    /// The service shown on first launch.
    pub fn default_service(&self) -> &str {
        self.services
            .keys()
            .next()
            .map(String::as_str)
            .unwrap_or(DEFAULT_SERVICES[0].0)
    }

    pub fn service_url(&self, id: &str) -> Option<&str> {
        self.services.get(id).map(String::as_str)
    }

    pub fn has_service(&self, id: &str) -> bool {
        self.services.contains_key(id)
    }
}

fn parse_services(
    raw: &serde_json::Value,
    warnings: &mut Vec<String>,
) -> Option<IndexMap<String, String>> {
    let Some(entries) = raw.as_object() else {
        warnings.push("\"services\" must be an object of name to URL".to_string());
        return None;
    };

    let services: IndexMap<String, String> = entries
        .iter()
        .filter_map(|(id, url)| match url.as_str() {
            Some(url) if is_web_url(url) && !id.trim().is_empty() => Some((id.clone(), url.to_string())),
            _ => {
                warnings.push(format!("Ignoring service {id:?}: expected an http(s) URL"));
                None
            }
        })
        .collect();

    (!services.is_empty()).then_some(services)
}

fn is_web_url(url: &str) -> bool {
    ["https://", "http://"]
        .iter()
        .any(|scheme| url.len() > scheme.len() && url.starts_with(scheme))
}

fn read_unit(value: &serde_json::Value, key: &str, default: f64, warnings: &mut Vec<String>) -> f64 {
    match value.get(key) {
        None => default,
        Some(raw) => match raw.as_f64().filter(|v| (0.0..=1.0).contains(v)) {
            Some(v) => v,
            None => {
                warnings.push(format!("\"{key}\" must be a number between 0 and 1, using {default}"));
                default
            }
        },
    }
}
