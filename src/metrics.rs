// Copyright 2025 Cowboy AI, LLC.

//! Connection usage accounting and the optional Prometheus binding

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

/// Point-in-time view of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Connections handed out since startup
    pub acquired: u64,
    /// Connections returned since startup
    pub released: u64,
    /// Queries that failed
    pub failures: u64,
    /// Connections currently handed out
    pub in_use: i64,
    /// Configured pool ceiling
    pub max_pool_size: u32,
}

/// Counts connection usage of a single driver.
///
/// Created only when the pool settings enable metrics; the driver feeds
/// it on every query. Cheap enough to sit on the hot path.
#[derive(Debug)]
pub struct DriverMetricsRecorder {
    acquired: AtomicU64,
    released: AtomicU64,
    failures: AtomicU64,
    in_use: AtomicI64,
    max_pool_size: u32,
}

impl DriverMetricsRecorder {
    /// Create a recorder for a pool with the given ceiling
    pub fn new(max_pool_size: u32) -> Self {
        Self {
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            in_use: AtomicI64::new(0),
            max_pool_size,
        }
    }

    /// Mark a connection as handed out; the returned guard marks it
    /// returned when dropped
    pub fn acquire(recorder: &Arc<Self>) -> AcquiredConnection {
        recorder.acquired.fetch_add(1, Ordering::Relaxed);
        recorder.in_use.fetch_add(1, Ordering::Relaxed);
        AcquiredConnection {
            recorder: Arc::clone(recorder),
        }
    }

    /// Count a failed query
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Read all counters at once
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            acquired: self.acquired.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            in_use: self.in_use.load(Ordering::Relaxed),
            max_pool_size: self.max_pool_size,
        }
    }
}

/// Guard representing one handed-out connection
pub struct AcquiredConnection {
    recorder: Arc<DriverMetricsRecorder>,
}

impl Drop for AcquiredConnection {
    fn drop(&mut self) {
        self.recorder.released.fetch_add(1, Ordering::Relaxed);
        self.recorder.in_use.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(feature = "metrics")]
pub use self::prometheus::{bind_driver_metrics, bind_recorder_metrics};

#[cfg(feature = "metrics")]
mod prometheus {
    use super::DriverMetricsRecorder;
    use crate::driver::Driver;

    use prometheus_client::collector::Collector;
    use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric};
    use prometheus_client::metrics::counter::ConstCounter;
    use prometheus_client::metrics::gauge::ConstGauge;
    use prometheus_client::metrics::MetricType;
    use prometheus_client::registry::Registry;
    use std::sync::Arc;
    use tracing::{debug, info};

    /// Live collector over a driver's recorder
    #[derive(Debug)]
    struct PoolMetricsCollector {
        recorder: Arc<DriverMetricsRecorder>,
    }

    impl Collector for PoolMetricsCollector {
        fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), std::fmt::Error> {
            let snapshot = self.recorder.snapshot();

            let acquired = ConstCounter::new(snapshot.acquired);
            acquired.encode(encoder.encode_descriptor(
                "neo4j_driver_connections_acquired",
                "The amount of connections that have been acquired",
                None,
                MetricType::Counter,
            )?)?;

            let released = ConstCounter::new(snapshot.released);
            released.encode(encoder.encode_descriptor(
                "neo4j_driver_connections_released",
                "The amount of connections that have been returned",
                None,
                MetricType::Counter,
            )?)?;

            let failures = ConstCounter::new(snapshot.failures);
            failures.encode(encoder.encode_descriptor(
                "neo4j_driver_queries_failed",
                "The amount of queries that have failed",
                None,
                MetricType::Counter,
            )?)?;

            let in_use = ConstGauge::new(snapshot.in_use);
            in_use.encode(encoder.encode_descriptor(
                "neo4j_driver_connections_in_use",
                "The amount of connections that are currently in use",
                None,
                MetricType::Gauge,
            )?)?;

            let max = ConstGauge::new(i64::from(snapshot.max_pool_size));
            max.encode(encoder.encode_descriptor(
                "neo4j_driver_connections_max",
                "The configured maximum size of the connection pool",
                None,
                MetricType::Gauge,
            )?)?;

            Ok(())
        }
    }

    /// Bind a recorder's counters into a Prometheus registry
    pub fn bind_recorder_metrics(recorder: Arc<DriverMetricsRecorder>, registry: &mut Registry) {
        registry.register_collector(Box::new(PoolMetricsCollector { recorder }));
    }

    /// Bind the driver's pool metrics into a Prometheus registry.
    ///
    /// Returns false when the driver was built without metrics; callers
    /// treat that as a no-op, never as an error.
    pub fn bind_driver_metrics(driver: &Driver, registry: &mut Registry) -> bool {
        match driver.metrics() {
            None => {
                debug!(
                    "Driver for {} reports metrics disabled, nothing to bind",
                    driver.server_address()
                );
                false
            }
            Some(recorder) => {
                bind_recorder_metrics(Arc::clone(recorder), registry);
                info!("Bound driver metrics for {}", driver.server_address());
                true
            }
        }
    }
}
