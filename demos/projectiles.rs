//! Walkthrough of the pool lifecycle with projectiles and impact effects

use archetype_pool::{
    Archetype, DeferredOutcome, FrameClock, LifecycleHooks, Placement, PoolConfiguration, PoolInstance,
    PoolRegistry, RegistryConfiguration,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Projectile {
    position: [f32; 3],
    visible: bool,
    flights: u32,
}

impl LifecycleHooks for Projectile {
    fn on_acquire(&mut self) {
        self.flights += 1;
    }

    fn on_release(&mut self) {
        println!("   projectile landed at {:?}", self.position);
    }
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

    fn lifecycle_hooks(&mut self) -> Option<&mut dyn LifecycleHooks> {
        Some(self)
    }
}

#[tokio::main]
async fn main() {
    println!("=== archetype_pool - Projectiles ===\n");

    let projectile = Archetype::from_fn("projectile", Projectile::default);

    degraded_mode(&projectile);

    let clock = Arc::new(FrameClock::new());
    let registry = PoolRegistry::new(
        RegistryConfiguration::new()
            .with_initial_pool(projectile.clone(), PoolConfiguration::new().with_prewarm(2).with_capacity(2))
            .with_clock(clock.clone()),
    );
    registry.initialize().unwrap();

    burst(&registry, &projectile);
    deferred(&registry, &projectile, &clock).await;
    export(&registry);

    registry.shutdown();
}

fn degraded_mode(projectile: &Archetype<Projectile>) {
    println!("1. Spawning before initialization:");
    let registry = PoolRegistry::new(RegistryConfiguration::new());

    let handle = registry.spawn(projectile, &Placement::default()).unwrap();
    println!("   pooled: {}", handle.is_pooled());
    registry.release(&handle);
    println!("   destroyed on release: {}\n", handle.is_destroyed());
}

fn burst(registry: &PoolRegistry<Projectile>, projectile: &Archetype<Projectile>) {
    println!("2. Burst past capacity:");
    let handles: Vec<_> = (0..3)
        .map(|i| registry.spawn(projectile, &Placement::at([i as f32, 0.0, 0.0])).unwrap())
        .collect();
    println!("   live while firing: {}", registry.metrics(projectile).unwrap().live_objects);
    println!("   flights of the first projectile: {:?}", handles[0].with_instance(|p| p.flights));

    for handle in &handles {
        registry.release(handle);
    }
    let metrics = registry.metrics(projectile).unwrap();
    println!("   after landing: live {}, free {}\n", metrics.live_objects, metrics.free_objects);
}

async fn deferred(registry: &PoolRegistry<Projectile>, projectile: &Archetype<Projectile>, clock: &FrameClock) {
    println!("3. Deferred release racing a manual one:");
    let handle = registry.spawn(projectile, &Placement::at([0.0, 0.0, 10.0])).unwrap();
    let pending = registry.release_after(&handle, Duration::from_secs(2)).unwrap();

    clock.advance(Duration::from_millis(500));
    registry.release(&handle);
    clock.advance(Duration::from_millis(1500));

    let outcome = pending.outcome().await;
    println!("   deferred outcome: {:?}", outcome);
    assert_eq!(outcome, DeferredOutcome::Skipped);

    println!("4. Destroyed while waiting:");
    let handle = registry.spawn(projectile, &Placement::default()).unwrap();
    let pending = registry.release_after(&handle, Duration::from_secs(1)).unwrap();
    handle.destroy();
    println!("   deferred outcome: {:?}\n", pending.outcome().await);
}

fn export(registry: &PoolRegistry<Projectile>) {
    println!("5. Prometheus export:");
    let mut tags = HashMap::new();
    tags.insert("scene".to_string(), "demo".to_string());
    print!("{}", registry.export_metrics_prometheus(Some(&tags)));
}
