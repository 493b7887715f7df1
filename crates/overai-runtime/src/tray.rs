use std::time::Instant;

use overai_core::{AppConfig, Error};
use tauri::{
    App, AppHandle, Manager,
    image::Image,
    menu::{MenuBuilder, MenuItemBuilder, PredefinedMenuItem, SubmenuBuilder},
    tray::{TrayIconBuilder, TrayIconEvent},
};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tracing::{error, info, warn};

use crate::{OVERLAY_LABEL, driver, platform, with_coordinator};

const TRAY_ICON: &[u8] = include_bytes!("../icons/32x32.png");
const SERVICE_PREFIX: &str = "service:";

/// Menu label for a service id.
fn service_label(id: &str) -> String {
    match id {
        "grok" => "Grok".to_string(),
        "chatgpt" => "ChatGPT".to_string(),
        "claude" => "Claude".to_string(),
        "gemini" => "Gemini".to_string(),
        "deepseek" => "DeepSeek".to_string(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

pub fn setup_tray(app: &App, config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let show = MenuItemBuilder::with_id("show", "Show").build(app)?;
    let hide = MenuItemBuilder::with_id("hide", "Hide").build(app)?;
    let separator1 = PredefinedMenuItem::separator(app)?;

    let mut services = SubmenuBuilder::new(app, "Services");
    for id in config.services.keys() {
        services = services.item(
            &MenuItemBuilder::with_id(format!("{SERVICE_PREFIX}{id}"), service_label(id)).build(app)?,
        );
    }
    let services_submenu = services.build()?;

    let more_opaque = MenuItemBuilder::with_id("more_opaque", "More Opaque").build(app)?;
    let less_opaque = MenuItemBuilder::with_id("less_opaque", "Less Opaque").build(app)?;
    let separator2 = PredefinedMenuItem::separator(app)?;
    let enable_hotkey = MenuItemBuilder::with_id(
        "enable_hotkey",
        format!("Enable Hotkey ({})…", config.hotkey),
    )
    .build(app)?;
    let reload = MenuItemBuilder::with_id("reload", "Reload").build(app)?;
    let separator3 = PredefinedMenuItem::separator(app)?;
    let quit = MenuItemBuilder::with_id("quit", "Quit OverAI").build(app)?;

    let menu = MenuBuilder::new(app)
        .item(&show)
        .item(&hide)
        .item(&separator1)
        .item(&services_submenu)
        .item(&more_opaque)
        .item(&less_opaque)
        .item(&separator2)
        .item(&enable_hotkey)
        .item(&reload)
        .item(&separator3)
        .item(&quit)
        .build()?;

    let icon = Image::from_bytes(TRAY_ICON)?;

    let _tray = TrayIconBuilder::new()
        .icon(icon)
        .icon_as_template(true)
        .menu(&menu)
        .tooltip(format!("OverAI - press {} to toggle", config.hotkey))
        .on_menu_event(|app, event| {
            handle_menu_event(app, event.id.as_ref());
        })
        .on_tray_icon_event(|tray, event| {
            if let TrayIconEvent::DoubleClick { .. } = event {
                let app = tray.app_handle();
                with_coordinator(app, |c| c.toggle(Instant::now()));
                driver::kick(app);
            }
        })
        .build(app)?;

    Ok(())
}

fn handle_menu_event(app: &AppHandle, id: &str) {
    let now = Instant::now();
    match id {
        "show" => {
            with_coordinator(app, |c| c.show(now));
        }
        "hide" => {
            with_coordinator(app, |c| c.hide(now));
        }
        "more_opaque" => {
            with_coordinator(app, |c| c.adjust_opacity(true, now));
        }
        "less_opaque" => {
            with_coordinator(app, |c| c.adjust_opacity(false, now));
        }
        "enable_hotkey" => enable_hotkey(app),
        "reload" => {
            if let Some(window) = app.get_webview_window(OVERLAY_LABEL) {
                if let Err(e) = window.eval("window.location.reload();") {
                    warn!(error = %e, "Failed to reload overlay");
                }
            }
        }
        "quit" => {
            app.exit(0);
        }
        other => {
            if let Some(service) = other.strip_prefix(SERVICE_PREFIX) {
                with_coordinator(app, |c| c.select_service(service, now));
            }
        }
    }
    driver::kick(app);
}

fn enable_hotkey(app: &AppHandle) {
    match with_coordinator(app, |c| c.retry_hotkey()) {
        Some(Ok(())) => info!("Global hotkey enabled"),
        Some(Err(Error::PermissionDenied)) => {
            platform::open_accessibility_settings();
            app.dialog()
                .message(
                    "OverAI still does not have Accessibility access. Enable it in \
                     System Settings, then choose \"Enable Hotkey…\" again.",
                )
                .title("Accessibility Permission Required")
                .kind(MessageDialogKind::Warning)
                .show(|_| {});
        }
        Some(Err(e)) => error!(error = %e, "Failed to enable global hotkey"),
        None => {}
    }
}
