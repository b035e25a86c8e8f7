use chrono::Local;
use regiontick::{GlobalLoop, HostSettings, RegionHost, SchedulerBuilder};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

fn thread() -> String {
    std::thread::current().name().unwrap_or("unnamed").to_string()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info".to_string())
        )
        .with_target(false)
        .init();

    let settings = HostSettings {
        regions: 3,
        ..HostSettings::default()
    };
    let host = Arc::new(RegionHost::new(&settings)?);
    host.start()?;

    // The region host is handed over as a surface; the scheduler only sees names
    let scheduler = SchedulerBuilder::new(host.clone())
        .surface(host.clone())
        .build();
    info!(backend = scheduler.capability().backend_name(), "Scheduler ready");

    let zombie = host.spawn_entity(0);
    let villager = host.spawn_entity(2);

    let patrol = scheduler.run_at_entity_timer(
        &villager,
        || println!("[{}] [VILLAGER] Patrolling on {}", now(), thread()),
        0,
        10,
    );

    scheduler.submit(
        regiontick::TaskSpec::builder(|| println!("[{}] [ZOMBIE] Burning in daylight", now()))
            .at_entity(zombie.clone())
            .delay(20)
            .period(20)
            .on_retired(|| println!("[{}] [ZOMBIE] Despawned before it could burn", now()))
            .build(),
    );

    scheduler.run_timer(
        || println!("[{}] [GLOBAL] Weather update on {}", now(), thread()),
        0,
        20,
    );
    scheduler.run_async(|| println!("[{}] [ASYNC] Saving chunks on {}", now(), thread()));

    std::thread::sleep(Duration::from_millis(1200));
    host.move_entity(&villager, 1);
    println!("[{}] Villager walked into region 1", now());

    host.remove_entity(&zombie);
    println!("[{}] Zombie removed", now());

    std::thread::sleep(Duration::from_millis(1200));
    patrol.cancel();

    // The same calls work unchanged against a single global loop
    let simple = Arc::new(GlobalLoop::new(&settings)?);
    let fallback = SchedulerBuilder::new(simple.clone()).build();
    fallback.run_now(|| println!("[{}] [SIMPLE] Same API on {}", now(), thread()));
    simple.tick();

    info!(tick = host.current_tick(), "Stopping");
    host.shutdown();
    simple.shutdown();
    Ok(())
}
