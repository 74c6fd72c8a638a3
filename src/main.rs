// archetype_pool demo
// Spawns a burst of projectiles, lets a frame loop expire them and prints
// the pool metrics. Run the fuller walkthrough with:
//   cargo run --example projectiles

use archetype_pool::{
    delay_from_secs, Archetype, FrameClock, Placement, PoolConfiguration, PoolInstance, PoolRegistry,
    RegistryConfiguration,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct Projectile {
    position: [f32; 3],
    visible: bool,
}

impl PoolInstance for Projectile {
    fn apply_placement(&mut self, placement: &Placement) {
        self.position = placement.position;
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.visible = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.visible
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let clock = Arc::new(FrameClock::new());
    let projectile = Archetype::from_fn("projectile", Projectile::default);
    let registry = PoolRegistry::new(
        RegistryConfiguration::new()
            .with_initial_pool(projectile.clone(), PoolConfiguration::new().with_prewarm(4).with_capacity(8))
            .with_clock(clock.clone()),
    );
    registry.initialize()?;

    let mut pending = Vec::new();
    for i in 0..10 {
        let handle = registry.spawn(&projectile, &Placement::at([i as f32, 0.0, 0.0]))?;
        if let Some(release) = registry.release_after(&handle, delay_from_secs(0.5)) {
            pending.push(release);
        }
    }
    println!("After burst: {:?}", registry.metrics(&projectile));

    // 60 fps for one second of game time
    for _ in 0..60 {
        clock.advance(Duration::from_millis(16));
        tokio::task::yield_now().await;
    }
    for release in pending {
        release.outcome().await;
    }

    if let Some(metrics) = registry.metrics(&projectile) {
        println!("After expiry:");
        let mut exported: Vec<_> = metrics.export().into_iter().collect();
        exported.sort();
        for (key, value) in exported {
            println!("  {}: {}", key, value);
        }
    }

    registry.shutdown();
    Ok(())
}
