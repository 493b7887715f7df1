//! Platform-specific overlay window configuration
//!
//! On macOS the overlay is driven through its `NSWindow`:
//! - Floating window level (above normal windows)
//! - Excluded from screenshots and screen sharing
//! - Visible on all spaces, alongside fullscreen apps
//! - Faded through the window alpha rather than the page
//!
//! Every function here must run on the main thread.

use overai_core::Error;
use tauri::WebviewWindow;

#[cfg(target_os = "macos")]
#[link(name = "ApplicationServices", kind = "framework")]
unsafe extern "C" {
    fn AXIsProcessTrusted() -> bool;
}

/// Whether the process has been granted Accessibility access.
pub fn accessibility_trusted() -> bool {
    #[cfg(target_os = "macos")]
    {
        // SAFETY: takes no arguments and only reads the TCC database.
        unsafe { AXIsProcessTrusted() }
    }

    #[cfg(not(target_os = "macos"))]
    {
        true
    }
}

/// Open the Accessibility pane of System Settings.
pub fn open_accessibility_settings() {
    #[cfg(target_os = "macos")]
    {
        let url = "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility";
        if let Err(e) = std::process::Command::new("open").arg(url).spawn() {
            tracing::warn!(error = %e, "Failed to open System Settings");
        }
    }
}

#[cfg(target_os = "macos")]
fn ns_window(
    window: &WebviewWindow,
) -> Result<objc2::rc::Retained<objc2_app_kit::NSWindow>, Error> {
    use objc2::rc::Retained;
    use objc2_app_kit::NSWindow;

    let ptr = window
        .ns_window()
        .map_err(|e| Error::Surface(format!("Failed to get NSWindow handle: {e}")))?;

    // SAFETY: the pointer stays valid while the tauri window exists and is
    // retained for the duration of the call.
    unsafe { Retained::retain(ptr as *mut NSWindow) }
        .ok_or_else(|| Error::Surface("NSWindow pointer was null".to_string()))
}

/// Raise the overlay to floating level and hide it from screen capture.
pub fn configure_floating(window: &WebviewWindow) -> Result<(), Error> {
    #[cfg(target_os = "macos")]
    {
        use objc2_app_kit::{NSFloatingWindowLevel, NSWindowCollectionBehavior, NSWindowSharingType};

        let ns_window = ns_window(window)
            .map_err(|e| Error::FloatingWindowDenied(e.to_string()))?;

        ns_window.setLevel(NSFloatingWindowLevel);
        if ns_window.level() != NSFloatingWindowLevel {
            return Err(Error::FloatingWindowDenied(format!(
                "window level is {} after requesting {}",
                ns_window.level(),
                NSFloatingWindowLevel
            )));
        }

        ns_window.setSharingType(NSWindowSharingType::None);
        ns_window.setCollectionBehavior(
            NSWindowCollectionBehavior::CanJoinAllSpaces
                | NSWindowCollectionBehavior::FullScreenAuxiliary
                | NSWindowCollectionBehavior::IgnoresCycle,
        );
        tracing::debug!("NSWindow set to floating level, sharing disabled");
    }

    #[cfg(not(target_os = "macos"))]
    {
        window
            .set_always_on_top(true)
            .map_err(|e| Error::FloatingWindowDenied(e.to_string()))?;
        window
            .set_content_protected(true)
            .map_err(|e| Error::Surface(e.to_string()))?;
    }

    Ok(())
}

pub fn set_alpha(window: &WebviewWindow, alpha: f64) -> Result<(), Error> {
    #[cfg(target_os = "macos")]
    {
        ns_window(window)?.setAlphaValue(alpha);
    }

    #[cfg(not(target_os = "macos"))]
    {
        window
            .eval(format!("document.documentElement.style.opacity = '{alpha}';"))
            .map_err(|e| Error::Surface(e.to_string()))?;
    }

    Ok(())
}

/// Bring the overlay on screen without activating the application.
pub fn order_front(window: &WebviewWindow) -> Result<(), Error> {
    #[cfg(target_os = "macos")]
    {
        ns_window(window)?.orderFrontRegardless();
    }

    #[cfg(not(target_os = "macos"))]
    {
        window.show().map_err(|e| Error::Surface(e.to_string()))?;
    }

    Ok(())
}

/// Drop every cached HTTP response held by the web view's URL loading
/// system.
pub fn purge_url_cache() {
    #[cfg(target_os = "macos")]
    {
        use objc2_foundation::NSURLCache;

        // SAFETY: the shared cache is a process-wide singleton.
        let cache = unsafe { NSURLCache::sharedURLCache() };
        unsafe { cache.removeAllCachedResponses() };
        tracing::debug!("Shared URL cache purged");
    }
}
