use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::Result;
use crate::persist::write_json_atomic;

/// Abnormal terminations within [`CRASH_WINDOW`] that trigger degraded mode.
pub const CRASH_THRESHOLD: usize = 3;
pub const CRASH_WINDOW: Duration = Duration::from_secs(60);

fn unix_seconds(at: SystemTime) -> f64 {
    at.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

fn from_unix_seconds(secs: f64) -> Option<SystemTime> {
    (secs.is_finite() && secs >= 0.0).then(|| UNIX_EPOCH + Duration::from_secs_f64(secs))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashRecord {
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
    pub reason: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CrashFile {
    #[serde(default)]
    crashes: Vec<CrashRecord>,
}

/// Rolling record of abnormal terminations, kept in `crash_history.json`.
#[derive(Debug, Clone)]
pub struct CrashHistory {
    path: PathBuf,
    crashes: Vec<CrashRecord>,
}

impl CrashHistory {
    /// Load the history. An unreadable file is treated as empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let crashes = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<CrashFile>(&content) {
                Ok(file) => file.crashes,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse crash history");
                    Vec::new()
                }
            },
            Err(_) => Vec::new(),
        };
        Self { path, crashes }
    }

    pub fn record(&mut self, at: SystemTime, reason: impl Into<String>) -> Result<()> {
        let timestamp = unix_seconds(at);
        let cutoff = timestamp - CRASH_WINDOW.as_secs_f64();
        self.crashes.retain(|c| c.timestamp > cutoff);
        self.crashes.push(CrashRecord {
            timestamp,
            reason: reason.into(),
        });
        write_json_atomic(
            &self.path,
            &CrashFile {
                crashes: self.crashes.clone(),
            },
        )
    }

    pub fn recent_count(&self, now: SystemTime) -> usize {
        let cutoff = unix_seconds(now) - CRASH_WINDOW.as_secs_f64();
        self.crashes.iter().filter(|c| c.timestamp > cutoff).count()
    }

    pub fn is_crash_loop(&self, now: SystemTime) -> bool {
        self.recent_count(now) >= CRASH_THRESHOLD
    }

    pub fn records(&self) -> &[CrashRecord] {
        &self.crashes
    }

    pub fn clear(&mut self) -> Result<()> {
        self.crashes.clear();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkerContents {
    pid: u32,
    started_at: f64,
}

/// File present for as long as a session is running. Finding one at
/// startup means the previous run never shut down cleanly.
#[derive(Debug, Clone)]
pub struct SessionMarker {
    path: PathBuf,
}

impl SessionMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Start time of a session that did not clear its marker, if any.
    ///
    /// A marker that exists but cannot be parsed still counts, dated
    /// `fallback`.
    pub fn previous_start(&self, fallback: SystemTime) -> Option<SystemTime> {
        let content = fs::read_to_string(&self.path).ok()?;
        let started = serde_json::from_str::<MarkerContents>(&content)
            .ok()
            .and_then(|m| from_unix_seconds(m.started_at));
        Some(started.unwrap_or(fallback))
    }

    pub fn begin(&self, now: SystemTime) -> Result<()> {
        write_json_atomic(
            &self.path,
            &MarkerContents {
                pid: std::process::id(),
                started_at: unix_seconds(now),
            },
        )?;
        info!(path = %self.path.display(), "Session marked as running");
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_only_recent_crashes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crash_history.json");
        let t0 = UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        let mut history = CrashHistory::load(&path);
        history.record(t0, "unclean exit").unwrap();
        history.record(t0 + Duration::from_secs(5), "unclean exit").unwrap();
        assert!(!history.is_crash_loop(t0 + Duration::from_secs(6)));

        history.record(t0 + Duration::from_secs(10), "unclean exit").unwrap();
        assert!(history.is_crash_loop(t0 + Duration::from_secs(11)));
        assert!(!history.is_crash_loop(t0 + Duration::from_secs(65)));

        let reloaded = CrashHistory::load(&path);
        assert_eq!(reloaded.records().len(), 3);
    }

    #[test]
    fn record_prunes_expired_entries() {
        let dir = tempfile::tempdir().unwrap();
        let t0 = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let mut history = CrashHistory::load(dir.path().join("crash_history.json"));
        history.record(t0, "a").unwrap();
        history.record(t0 + Duration::from_secs(120), "b").unwrap();
        assert_eq!(history.records().len(), 1);
    }

    #[test]
    fn corrupt_history_is_empty_and_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("crash_history.json");
        fs::write(&path, "garbage").unwrap();

        let mut history = CrashHistory::load(&path);
        assert!(history.records().is_empty());
        history.clear().unwrap();
        assert!(!path.exists());
        history.clear().unwrap();
    }

    #[test]
    fn marker_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let marker = SessionMarker::new(dir.path().join("session.lock"));
        let started = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let later = started + Duration::from_secs(30);

        assert_eq!(marker.previous_start(later), None);
        marker.begin(started).unwrap();
        assert_eq!(marker.previous_start(later), Some(started));

        fs::write(marker.path(), "??").unwrap();
        assert_eq!(marker.previous_start(later), Some(later));

        marker.clear().unwrap();
        assert_eq!(marker.previous_start(later), None);
    }
}
