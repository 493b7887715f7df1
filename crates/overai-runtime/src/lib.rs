mod cli;
mod driver;
mod logging;
mod platform;
mod shortcut;
mod surface;
mod tray;

use std::sync::Mutex;
use std::time::{Instant, SystemTime};

use overai_core::{
    AppConfig, AppPaths, Coordinator, Frame, KeyEvent, Notice, OverlayEvent, ScreenInfo,
    StartupContext,
};
use tauri::{
    AppHandle, Emitter, Manager, RunEvent, WebviewUrl, WebviewWindow, WebviewWindowBuilder,
    WindowEvent, window::Color,
};
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};
use tracing::{error, info, warn};

pub use shortcut::GlobalShortcutTap;
pub use surface::TauriSurface;

pub const OVERLAY_LABEL: &str = "overlay";

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15";

pub type OverlayCoordinator = Coordinator<TauriSurface, GlobalShortcutTap>;

/// State wrapper for the process-wide coordinator
pub struct OverlayState(pub Mutex<OverlayCoordinator>);

/// Run `f` against the coordinator if it has been started.
pub fn with_coordinator<T>(
    app: &AppHandle,
    f: impl FnOnce(&mut OverlayCoordinator) -> T,
) -> Option<T> {
    let state = app.try_state::<OverlayState>()?;
    let mut coordinator = match state.0.lock() {
        Ok(coordinator) => coordinator,
        Err(e) => {
            error!("Failed to lock overlay coordinator: {}", e);
            return None;
        }
    };
    Some(f(&mut coordinator))
}

pub(crate) fn on_hotkey(app: &AppHandle, event: &KeyEvent) {
    if with_coordinator(app, |c| c.handle_key_event(event, Instant::now())) == Some(true) {
        driver::kick(app);
    }
}

fn build_overlay_window(app: &AppHandle, url: &str) -> Result<WebviewWindow, Box<dyn std::error::Error>> {
    let window = WebviewWindowBuilder::new(app, OVERLAY_LABEL, WebviewUrl::External(url.parse()?))
        .title("OverAI")
        .inner_size(overai_core::DEFAULT_WIDTH, overai_core::DEFAULT_HEIGHT)
        .min_inner_size(overai_core::MIN_WIDTH, overai_core::MIN_HEIGHT)
        .decorations(false)
        .transparent(true)
        .background_color(Color(0, 0, 0, 0))
        .always_on_top(true)
        .skip_taskbar(true)
        .resizable(true)
        .user_agent(USER_AGENT)
        .visible(false)
        .build()?;
    Ok(window)
}

fn primary_screen(window: &WebviewWindow) -> ScreenInfo {
    match window.primary_monitor() {
        Ok(Some(monitor)) => {
            let size = monitor.size().to_logical::<f64>(monitor.scale_factor());
            ScreenInfo {
                width: size.width,
                height: size.height,
            }
        }
        Ok(None) => ScreenInfo::default(),
        Err(e) => {
            warn!(error = %e, "Could not read primary monitor, assuming 1920x1080");
            ScreenInfo::default()
        }
    }
}

/// Current logical frame of the overlay window.
fn window_frame(window: &WebviewWindow) -> Option<Frame> {
    let scale = window.scale_factor().ok()?;
    let position = window.outer_position().ok()?.to_logical::<f64>(scale);
    let size = window.inner_size().ok()?.to_logical::<f64>(scale);
    Some(Frame {
        x: position.x,
        y: position.y,
        width: size.width,
        height: size.height,
    })
}

/// Mirror core events to the frontend and follow service switches.
fn forward_events(coordinator: &mut OverlayCoordinator, app: &AppHandle, window: &WebviewWindow) {
    let app = app.clone();
    let window = window.clone();
    let services = coordinator.config().services.clone();
    coordinator.subscribe(move |event| {
        if let Err(e) = app.emit(&format!("overai://{}", event.name()), event) {
            warn!(error = %e, "Failed to emit {}", event.name());
        }
        if let OverlayEvent::ServiceSelected(id) = event {
            let Some(url) = services.get(id) else {
                return;
            };
            match url.parse() {
                Ok(url) => {
                    if let Err(e) = window.navigate(url) {
                        warn!(error = %e, service = %id, "Failed to load service");
                    }
                }
                Err(e) => warn!(error = %e, service = %id, "Invalid service URL"),
            }
        }
    });
}

fn register_release_handlers(coordinator: &mut OverlayCoordinator, window: &WebviewWindow) {
    let webview = window.clone();
    coordinator.register_release_handler(
        "webview-gc",
        Box::new(move |_| {
            webview
                .eval("if (window.gc) { window.gc(); }")
                .map_err(|e| e.to_string())
        }),
    );
    coordinator.register_release_handler(
        "url-cache",
        Box::new(|_| {
            platform::purge_url_cache();
            Ok(())
        }),
    );
}

fn show_notice(app: &AppHandle, notice: &Notice) {
    let dialog = app
        .dialog()
        .message(notice.message())
        .title(notice.title())
        .kind(MessageDialogKind::Warning);

    if let Notice::PermissionRequired = notice {
        dialog
            .buttons(MessageDialogButtons::OkCancelCustom(
                "Open System Settings".to_string(),
                "Later".to_string(),
            ))
            .show(|open| {
                if open {
                    platform::open_accessibility_settings();
                }
            });
    } else {
        dialog.show(|_| {});
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    let args = cli::parse();

    let paths = match AppPaths::discover() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("OverAI: {e}");
            std::process::exit(1);
        }
    };
    let mut log_guard = logging::init(&paths.log_dir, args.log_level.as_deref());

    if args.is_command() {
        let code = cli::run_command(&args);
        drop(log_guard);
        std::process::exit(code);
    }

    info!("OverAI v{} starting...", env!("CARGO_PKG_VERSION"));
    let (config, config_warnings) = AppConfig::load(&paths.config_file);

    let app = tauri::Builder::default()
        .plugin(tauri_plugin_global_shortcut::Builder::new().build())
        .plugin(tauri_plugin_dialog::init())
        .setup(move |app| {
            #[cfg(target_os = "macos")]
            app.set_activation_policy(tauri::ActivationPolicy::Accessory);

            let handle = app.handle().clone();
            let initial_url = config.service_url(config.default_service()).unwrap_or_default().to_string();
            let window = build_overlay_window(&handle, &initial_url)?;
            let screen = primary_screen(&window);

            let ctx = StartupContext {
                config: config.clone(),
                config_warnings,
                paths,
                screen,
            };
            let (mut coordinator, notices) = match Coordinator::startup(
                ctx,
                TauriSurface::new(window.clone()),
                GlobalShortcutTap::new(handle.clone()),
                Instant::now(),
                SystemTime::now(),
            ) {
                Ok(started) => started,
                Err(e) => {
                    error!(error = %e, "Overlay window could not be created");
                    return Err(e.into());
                }
            };

            if let Some(url) = coordinator.current_service_url() {
                if url != initial_url {
                    window.navigate(url.parse()?)?;
                }
            }
            forward_events(&mut coordinator, &handle, &window);
            register_release_handlers(&mut coordinator, &window);
            app.manage(OverlayState(Mutex::new(coordinator)));

            tray::setup_tray(app, &config)?;
            driver::start(&handle);
            driver::watch_signals(&handle);

            for notice in &notices {
                warn!(title = notice.title(), "Startup notice");
                show_notice(&handle, notice);
            }
            Ok(())
        })
        .on_window_event(|window, event| {
            if window.label() != OVERLAY_LABEL {
                return;
            }
            let app = window.app_handle();
            match event {
                WindowEvent::CloseRequested { api, .. } => {
                    api.prevent_close();
                    with_coordinator(app, |c| c.hide(Instant::now()));
                    driver::kick(app);
                }
                WindowEvent::Moved(_) | WindowEvent::Resized(_) => {
                    let Some(webview) = app.get_webview_window(OVERLAY_LABEL) else {
                        return;
                    };
                    let Some(frame) = window_frame(&webview) else {
                        return;
                    };
                    // Geometry changes we applied ourselves arrive while the
                    // coordinator is locked.
                    let Some(state) = app.try_state::<OverlayState>() else {
                        return;
                    };
                    if let Ok(mut coordinator) = state.0.try_lock() {
                        coordinator.set_frame(frame, Instant::now());
                        driver::kick(app);
                    }
                }
                _ => {}
            }
        })
        .build(tauri::generate_context!());

    let app = match app {
        Ok(app) => app,
        Err(e) => {
            error!(error = %e, "Failed to start OverAI");
            drop(log_guard);
            std::process::exit(1);
        }
    };

    app.run(move |app, event| match event {
        RunEvent::ExitRequested { api, code, .. } => {
            if code.is_none() {
                api.prevent_exit();
            }
        }
        RunEvent::Exit => {
            with_coordinator(app, |c| c.shutdown());
            // The event loop exits the process without unwinding.
            drop(log_guard.take());
        }
        _ => {}
    });
}
