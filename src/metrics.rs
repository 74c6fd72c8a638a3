//! Metrics collection and export for archetype pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics snapshot for one archetype pool
///
/// # Examples
///
/// ```
/// use archetype_pool::{Archetype, Placement, PoolConfiguration, PoolRegistry, RegistryConfiguration};
/// # use archetype_pool::PoolInstance;
/// # #[derive(Default)]
/// # struct Crate { enabled: bool }
/// # impl PoolInstance for Crate {
/// #     fn apply_placement(&mut self, _: &Placement) {}
/// #     fn set_enabled(&mut self, enabled: bool) { self.enabled = enabled; }
/// #     fn is_enabled(&self) -> bool { self.enabled }
/// # }
///
/// let crate_archetype = Archetype::from_fn("crate", Crate::default);
/// let registry = PoolRegistry::new(
///     RegistryConfiguration::new()
///         .with_initial_pool(crate_archetype.clone(), PoolConfiguration::new().with_prewarm(3)),
/// );
/// registry.initialize().unwrap();
///
/// let _handle = registry.spawn(&crate_archetype, &Placement::default()).unwrap();
/// let metrics = registry.metrics(&crate_archetype).unwrap();
/// assert_eq!(metrics.live_objects, 3);
/// assert_eq!(metrics.active_objects, 1);
/// assert_eq!(metrics.free_objects, 2);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolMetrics {
    /// Total acquisitions served
    pub total_acquired: usize,

    /// Acquisitions served from the free list
    pub total_recycled: usize,

    /// Instances built by the factory
    pub total_created: usize,

    /// Releases that were carried out
    pub total_released: usize,

    /// Instances destroyed (capacity trim, teardown or external destroy)
    pub total_destroyed: usize,

    /// Releases absorbed because the handle was already inactive
    pub ignored_releases: usize,

    /// Instances currently alive (checked out + free)
    pub live_objects: usize,

    /// Instances currently checked out
    pub active_objects: usize,

    /// Instances currently idle in the free list
    pub free_objects: usize,

    /// Retention limit of the pool
    pub capacity: usize,

    /// `live_objects / capacity`; above 1.0 during a burst
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_acquired".to_string(), self.total_acquired.to_string());
        metrics.insert("total_recycled".to_string(), self.total_recycled.to_string());
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_released".to_string(), self.total_released.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("ignored_releases".to_string(), self.ignored_releases.to_string());
        metrics.insert("live_objects".to_string(), self.live_objects.to_string());
        metrics.insert("active_objects".to_string(), self.active_objects.to_string());
        metrics.insert("free_objects".to_string(), self.free_objects.to_string());
        metrics.insert("capacity".to_string(), self.capacity.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

struct Family {
    name: &'static str,
    help: &'static str,
    kind: &'static str,
    value: fn(&PoolMetrics) -> String,
}

const FAMILIES: &[Family] = &[
    Family {
        name: "archetype_pool_objects_live",
        help: "Instances currently alive",
        kind: "gauge",
        value: |m| m.live_objects.to_string(),
    },
    Family {
        name: "archetype_pool_objects_active",
        help: "Instances currently checked out",
        kind: "gauge",
        value: |m| m.active_objects.to_string(),
    },
    Family {
        name: "archetype_pool_objects_free",
        help: "Instances idle in the free list",
        kind: "gauge",
        value: |m| m.free_objects.to_string(),
    },
    Family {
        name: "archetype_pool_utilization",
        help: "Live instances relative to capacity",
        kind: "gauge",
        value: |m| format!("{:.2}", m.utilization),
    },
    Family {
        name: "archetype_pool_acquired_total",
        help: "Total acquisitions",
        kind: "counter",
        value: |m| m.total_acquired.to_string(),
    },
    Family {
        name: "archetype_pool_recycled_total",
        help: "Acquisitions served from the free list",
        kind: "counter",
        value: |m| m.total_recycled.to_string(),
    },
    Family {
        name: "archetype_pool_created_total",
        help: "Instances built by the factory",
        kind: "counter",
        value: |m| m.total_created.to_string(),
    },
    Family {
        name: "archetype_pool_released_total",
        help: "Releases carried out",
        kind: "counter",
        value: |m| m.total_released.to_string(),
    },
    Family {
        name: "archetype_pool_destroyed_total",
        help: "Instances destroyed",
        kind: "counter",
        value: |m| m.total_destroyed.to_string(),
    },
    Family {
        name: "archetype_pool_ignored_releases_total",
        help: "Releases of already inactive handles",
        kind: "counter",
        value: |m| m.ignored_releases.to_string(),
    },
];

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export one pool in Prometheus exposition format
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        archetype: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        Self::export_prometheus_many(&[(archetype.to_string(), metrics.clone())], tags)
    }

    /// Export several pools, one HELP/TYPE header per metric family
    pub fn export_prometheus_many(
        pools: &[(String, PoolMetrics)],
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();

        for family in FAMILIES {
            output.push_str(&format!("# HELP {} {}\n", family.name, family.help));
            output.push_str(&format!("# TYPE {} {}\n", family.name, family.kind));
            for (archetype, metrics) in pools {
                let labels = Self::format_labels(archetype, tags);
                output.push_str(&format!("{}{{{}}} {}\n", family.name, labels, (family.value)(metrics)));
            }
        }

        output
    }

    fn format_labels(archetype: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("archetype=\"{}\"", archetype)];

        if let Some(tags) = tags {
            let mut sorted: Vec<_> = tags.iter().collect();
            sorted.sort();
            for (key, value) in sorted {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
pub(crate) struct MetricsTracker {
    pub total_acquired: AtomicUsize,
    pub total_recycled: AtomicUsize,
    pub total_created: AtomicUsize,
    pub total_released: AtomicUsize,
    pub total_destroyed: AtomicUsize,
    pub ignored_releases: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            total_acquired: AtomicUsize::new(0),
            total_recycled: AtomicUsize::new(0),
            total_created: AtomicUsize::new(0),
            total_released: AtomicUsize::new(0),
            total_destroyed: AtomicUsize::new(0),
            ignored_releases: AtomicUsize::new(0),
        }
    }

    pub fn get_metrics(&self, live: usize, free: usize, capacity: usize) -> PoolMetrics {
        let utilization = if capacity > 0 {
            live as f64 / capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_acquired: self.total_acquired.load(Ordering::Relaxed),
            total_recycled: self.total_recycled.load(Ordering::Relaxed),
            total_created: self.total_created.load(Ordering::Relaxed),
            total_released: self.total_released.load(Ordering::Relaxed),
            total_destroyed: self.total_destroyed.load(Ordering::Relaxed),
            ignored_releases: self.ignored_releases.load(Ordering::Relaxed),
            live_objects: live,
            active_objects: live.saturating_sub(free),
            free_objects: free,
            capacity,
            utilization,
        }
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PoolMetrics {
        let tracker = MetricsTracker::new();
        tracker.total_acquired.fetch_add(7, Ordering::Relaxed);
        tracker.total_created.fetch_add(4, Ordering::Relaxed);
        tracker.get_metrics(4, 1, 8)
    }

    #[test]
    fn test_snapshot_gauges() {
        let metrics = sample();
        assert_eq!(metrics.active_objects, 3);
        assert_eq!(metrics.utilization, 0.5);

        let exported = metrics.export();
        assert_eq!(exported["total_acquired"], "7");
        assert_eq!(exported["utilization"], "0.50");
    }

    #[test]
    fn test_prometheus_headers_once_per_family() {
        let mut tags = HashMap::new();
        tags.insert("scene".to_string(), "arena".to_string());

        let pools = vec![("bullet".to_string(), sample()), ("spark".to_string(), sample())];
        let output = MetricsExporter::export_prometheus_many(&pools, Some(&tags));

        assert_eq!(output.matches("# TYPE archetype_pool_objects_live gauge").count(), 1);
        assert!(output.contains("archetype_pool_objects_live{archetype=\"bullet\",scene=\"arena\"} 4"));
        assert!(output.contains("archetype_pool_acquired_total{archetype=\"spark\",scene=\"arena\"} 7"));
    }

    #[test]
    fn test_zero_capacity_utilization() {
        let metrics = MetricsTracker::new().get_metrics(0, 0, 0);
        assert_eq!(metrics.utilization, 0.0);
    }
}
