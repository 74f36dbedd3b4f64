pub mod access_log;

#[cfg(feature = "prometheus")]
pub mod metrics;

pub use access_log::AccessLogEntry;

#[cfg(feature = "prometheus")]
pub use metrics::MetricsCollector;
