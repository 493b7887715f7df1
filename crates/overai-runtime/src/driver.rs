//! Background timers that feed the coordinator on the main thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use overai_core::{MEMORY_SAMPLE_INTERVAL, MemoryMonitor, MemorySampler};
use tauri::{AppHandle, Manager};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::with_coordinator;

/// Frame interval while an animation or a debounced save is pending.
const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Set whenever the coordinator may need ticking.
struct TickRequest(AtomicBool);

/// Request ticks until the coordinator reports it is idle again.
pub fn kick(app: &AppHandle) {
    if let Some(request) = app.try_state::<TickRequest>() {
        request.0.store(true, Ordering::Release);
    }
}

pub fn start(app: &AppHandle) {
    app.manage(TickRequest(AtomicBool::new(false)));

    let handle = app.clone();
    tauri::async_runtime::spawn(async move {
        let mut interval = tokio::time::interval(TICK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let pending = handle.state::<TickRequest>().0.swap(false, Ordering::AcqRel);
            if !pending {
                continue;
            }

            let main = handle.clone();
            let dispatched = handle.run_on_main_thread(move || {
                let busy = with_coordinator(&main, |c| c.tick(Instant::now())).unwrap_or(false);
                if busy {
                    kick(&main);
                }
            });
            if let Err(e) = dispatched {
                warn!(error = %e, "Event loop gone, stopping overlay ticks");
                break;
            }
        }
    });

    let handle = app.clone();
    tauri::async_runtime::spawn(async move {
        let mut sampler = MemorySampler::new();
        let mut monitor = MemoryMonitor::default();
        let mut interval = tokio::time::interval(MEMORY_SAMPLE_INTERVAL);
        loop {
            interval.tick().await;
            let Some(rss_mb) = sampler.sample_mb() else {
                continue;
            };
            debug!(rss_mb, "Memory sample");

            let Some(level) = monitor.evaluate(rss_mb) else {
                continue;
            };
            warn!(rss_mb, ?level, "Memory pressure");
            let main = handle.clone();
            if let Err(e) = handle.run_on_main_thread(move || {
                with_coordinator(&main, |c| c.on_memory_pressure(level));
            }) {
                warn!(error = %e, "Event loop gone, stopping memory monitor");
                break;
            }
        }
    });
}

/// Exit through the normal shutdown path on SIGTERM or SIGINT, so
/// `launchctl unload` and Ctrl+C leave a clean session behind.
pub fn watch_signals(app: &AppHandle) {
    let handle = app.clone();
    tauri::async_runtime::spawn(async move {
        match termination() {
            Ok(received) => {
                let signal = received.await;
                info!(signal, "Termination signal received, shutting down");
                handle.exit(0);
            }
            Err(e) => warn!(error = %e, "Could not listen for termination signals"),
        }
    });
}

/// Install the handlers now and resolve with the name of the first
/// termination signal.
#[cfg(unix)]
fn termination() -> std::io::Result<impl Future<Output = &'static str>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    Ok(async move {
        tokio::select! {
            _ = term.recv() => "SIGTERM",
            _ = int.recv() => "SIGINT",
        }
    })
}

#[cfg(windows)]
fn termination() -> std::io::Result<impl Future<Output = &'static str>> {
    let mut ctrl_c = tokio::signal::windows::ctrl_c()?;
    Ok(async move {
        ctrl_c.recv().await;
        "Ctrl+C"
    })
}
