use chrono::Local;
use regiontick::{load_toml_config, GlobalLoop, HostSettings, SchedulerBuilder};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

static HEARTBEATS: AtomicU32 = AtomicU32::new(0);

fn now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/// Host settings from `config/regiontick.toml`, or defaults without it
fn settings() -> HostSettings {
    match load_toml_config("config/regiontick.toml")
        .and_then(|config| HostSettings::from_config(&config))
    {
        Ok(settings) => settings,
        Err(e) => {
            warn!(error = %e, "No usable config/regiontick.toml, using default host settings");
            HostSettings::default()
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info".to_string())
        )
        .with_target(false)
        .init();

    let settings = settings();
    info!(?settings, "Starting global loop demo");

    let host = Arc::new(GlobalLoop::new(&settings)?);
    host.start()?;

    // No region host is linked into this binary, so the probe picks the global loop
    let scheduler = SchedulerBuilder::new(host.clone()).build();
    info!(backend = scheduler.capability().backend_name(), "Scheduler ready");

    scheduler.run_now(|| println!("[{}] [NOW] First thing on the next tick", now()));

    scheduler.run_later(
        || println!("[{}] [LATER] 40 ticks (2s) after submission", now()),
        40,
    );

    let heartbeat = scheduler.run_timer(
        || {
            let count = HEARTBEATS.fetch_add(1, Ordering::SeqCst) + 1;
            println!("[{}] [TIMER] Heartbeat #{}", now(), count);
        },
        0,
        10,
    );

    let report = scheduler.run_async_repeating(
        || {
            let thread = std::thread::current().name().unwrap_or("unnamed").to_string();
            println!("[{}] [ASYNC] Background report on {}", now(), thread);
        },
        20,
        30,
    );

    // Entity work runs on the tick thread here; there are no regions to own it
    let entity = host.spawn_entity();
    scheduler.run_at_entity_later(
        &entity,
        || println!("[{}] [ENTITY] Entity work on the global context", now()),
        5,
    );

    std::thread::sleep(Duration::from_secs(5));

    heartbeat.cancel();
    report.cancel();
    // cancelling again is harmless
    heartbeat.cancel();

    info!(
        heartbeats = HEARTBEATS.load(Ordering::SeqCst),
        tick = host.current_tick(),
        "Stopping"
    );
    host.shutdown();
    Ok(())
}
