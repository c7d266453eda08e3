// Copyright 2025 Cowboy AI, LLC.

//! Forwards driver log records into the tracing facade

use std::borrow::Cow;
use tracing::debug;

/// Namespace added to log targets that do not already carry it, so
/// driver-originated lines group together in a bigger application
const DRIVER_NAMESPACE: &str = "neo4rs";

fn prefixed(target: &str) -> Cow<'_, str> {
    if target.starts_with(DRIVER_NAMESPACE) {
        Cow::Borrowed(target)
    } else {
        Cow::Owned(format!("{DRIVER_NAMESPACE}::{target}"))
    }
}

struct DriverLogForwarder;

impl log::Log for DriverLogForwarder {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        let logger = prefixed(record.target());
        match record.level() {
            log::Level::Error => tracing::error!(logger = %logger, "{}", record.args()),
            log::Level::Warn => tracing::warn!(logger = %logger, "{}", record.args()),
            log::Level::Info => tracing::info!(logger = %logger, "{}", record.args()),
            log::Level::Debug => tracing::debug!(logger = %logger, "{}", record.args()),
            log::Level::Trace => tracing::trace!(logger = %logger, "{}", record.args()),
        }
    }

    fn flush(&self) {}
}

static FORWARDER: DriverLogForwarder = DriverLogForwarder;

/// Install the forwarder as the process-wide `log` consumer.
///
/// A second call, or a logger installed by the host application first,
/// leaves the existing one in place.
pub fn forward_driver_logs() {
    match log::set_logger(&FORWARDER) {
        Ok(()) => log::set_max_level(log::LevelFilter::Trace),
        Err(_) => debug!("A log consumer is already installed, driver logs are not forwarded"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_outside_the_driver_namespace_get_prefixed() {
        assert_eq!(prefixed("pool"), "neo4rs::pool");
        assert_eq!(prefixed("my_app::startup"), "neo4rs::my_app::startup");
    }

    #[test]
    fn driver_targets_are_kept_as_is() {
        assert_eq!(prefixed("neo4rs"), "neo4rs");
        assert_eq!(prefixed("neo4rs::connection"), "neo4rs::connection");
    }

    #[test]
    fn installing_twice_is_harmless() {
        forward_driver_logs();
        forward_driver_logs();
    }
}
