//! Launch-at-login through a per-user LaunchAgent.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{info, warn};

use crate::paths::APP_NAME;
use crate::{Error, Result};

pub const AGENT_LABEL: &str = "com.overai.overlay";

/// A LaunchAgent that starts the overlay at login and restarts it if it
/// exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchAgent {
    pub label: String,
    pub program_arguments: Vec<String>,
    pub log_dir: PathBuf,
    pub plist_path: PathBuf,
}

impl LaunchAgent {
    /// Agent for the running executable under `~/Library/LaunchAgents`.
    pub fn for_current_exe() -> Result<Self> {
        let exe = std::env::current_exe()?;
        let home = dirs::home_dir().ok_or_else(|| {
            Error::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Could not find home directory",
            ))
        })?;

        Ok(Self {
            label: AGENT_LABEL.to_string(),
            program_arguments: vec![exe.to_string_lossy().into_owned()],
            log_dir: home.join("Library").join("Logs").join(APP_NAME),
            plist_path: home
                .join("Library")
                .join("LaunchAgents")
                .join(format!("{AGENT_LABEL}.plist")),
        })
    }

    pub fn render_plist(&self) -> String {
        let arguments: String = self
            .program_arguments
            .iter()
            .map(|arg| format!("        <string>{}</string>\n", escape_xml(arg)))
            .collect();
        let stdout = self.log_dir.join("launchd.out.log");
        let stderr = self.log_dir.join("launchd.err.log");

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{label}</string>
    <key>ProgramArguments</key>
    <array>
{arguments}    </array>
    <key>RunAtLoad</key>
    <true/>
    <key>KeepAlive</key>
    <true/>
    <key>StandardOutPath</key>
    <string>{stdout}</string>
    <key>StandardErrorPath</key>
    <string>{stderr}</string>
</dict>
</plist>
"#,
            label = escape_xml(&self.label),
            stdout = escape_xml(&stdout.to_string_lossy()),
            stderr = escape_xml(&stderr.to_string_lossy()),
        )
    }

    /// Write the plist, creating the agents and log directories.
    pub fn write_plist(&self) -> Result<()> {
        if let Some(parent) = self.plist_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&self.log_dir)?;
        fs::write(&self.plist_path, self.render_plist())?;
        info!(path = %self.plist_path.display(), "LaunchAgent written");
        Ok(())
    }

    pub fn install(&self) -> Result<()> {
        self.write_plist()?;
        launchctl("load", &self.plist_path)?;
        info!(label = %self.label, "Added to login items");
        Ok(())
    }

    /// Unload and remove the agent. Returns `false` if nothing was
    /// installed, which still counts as success.
    pub fn uninstall(&self) -> Result<bool> {
        if !self.plist_path.exists() {
            info!("No LaunchAgent installed");
            return Ok(false);
        }
        if let Err(e) = launchctl("unload", &self.plist_path) {
            warn!(error = %e, "launchctl unload failed, removing plist anyway");
        }
        self.remove_plist()?;
        info!(label = %self.label, "Removed from login items");
        Ok(true)
    }

    pub fn remove_plist(&self) -> Result<bool> {
        match fs::remove_file(&self.plist_path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_installed(&self) -> bool {
        self.plist_path.exists()
    }
}

fn launchctl(action: &str, plist: &Path) -> Result<()> {
    let output = Command::new("launchctl").arg(action).arg(plist).output()?;
    if output.status.success() {
        Ok(())
    } else {
        Err(Error::IoError(std::io::Error::other(format!(
            "launchctl {action} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        ))))
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
