use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Input monitoring permission has not been granted")]
    PermissionDenied,
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
    #[error("Malformed configuration: {0}")]
    ConfigMalformed(String),
    #[error("Crash loop detected: {0} abnormal terminations")]
    CrashLoopDetected(usize),
    #[error("The window server refused a floating window: {0}")]
    FloatingWindowDenied(String),
    #[error("Invalid hotkey {0}")]
    InvalidHotkey(String),
    #[error("Window surface error: {0}")]
    Surface(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
