use clap::Parser;
use overai_core::LaunchAgent;
use tracing::error;

use crate::platform;

/// OverAI: a floating AI chat overlay toggled with a global hotkey.
#[derive(Parser, Debug, Default)]
#[command(name = "overai", version, about)]
pub struct Args {
    /// Start OverAI automatically at login.
    #[arg(long, conflicts_with_all = ["uninstall_startup", "check_permissions"])]
    pub install_startup: bool,

    /// Stop starting OverAI at login.
    #[arg(long, conflicts_with = "check_permissions")]
    pub uninstall_startup: bool,

    /// Report whether Accessibility access has been granted.
    #[arg(long)]
    pub check_permissions: bool,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Args {
    /// Whether a one-shot maintenance command was requested.
    pub fn is_command(&self) -> bool {
        self.install_startup || self.uninstall_startup || self.check_permissions
    }
}

pub fn parse() -> Args {
    Args::parse()
}

/// Run the requested command and return the process exit code.
pub fn run_command(args: &Args) -> i32 {
    if args.check_permissions {
        return check_permissions();
    }

    let agent = match LaunchAgent::for_current_exe() {
        Ok(agent) => agent,
        Err(e) => {
            error!(error = %e, "Could not resolve LaunchAgent location");
            eprintln!("Could not resolve the startup item location: {e}");
            return 1;
        }
    };

    if args.install_startup {
        match agent.install() {
            Ok(()) => {
                println!("OverAI will start at login.");
                println!("   Config: {}", agent.plist_path.display());
                0
            }
            Err(e) => {
                error!(error = %e, "Failed to install LaunchAgent");
                eprintln!("Failed to add OverAI to startup items: {e}");
                1
            }
        }
    } else {
        match agent.uninstall() {
            Ok(true) => {
                println!("OverAI removed from startup items.");
                0
            }
            Ok(false) => {
                println!("No startup item found.");
                0
            }
            Err(e) => {
                error!(error = %e, "Failed to remove LaunchAgent");
                eprintln!("Failed to remove OverAI from startup items: {e}");
                1
            }
        }
    }
}

fn check_permissions() -> i32 {
    if platform::accessibility_trusted() {
        println!("Accessibility: granted");
        0
    } else {
        println!("Accessibility: not granted");
        println!("Open System Settings > Privacy & Security > Accessibility and enable OverAI.");
        1
    }
}
