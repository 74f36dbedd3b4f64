use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Service metrics, gated behind `enabled`.
///
/// A disabled collector allocates no registry and every recorder returns
/// immediately, so handlers can call it unconditionally.
pub struct MetricsCollector {
    enabled: bool,
    registry: Option<Registry>,
    pub http_requests_total: Option<IntCounterVec>,
    pub http_request_duration: Option<HistogramVec>,
    pub ingested_records_total: Option<IntCounterVec>,
    pub ingest_rejections_total: Option<IntCounterVec>,
    pub live_observers: Option<IntGauge>,
}

impl MetricsCollector {
    pub fn new(enabled: bool) -> anyhow::Result<Self> {
        if !enabled {
            return Ok(Self {
                enabled: false,
                registry: None,
                http_requests_total: None,
                http_request_duration: None,
                ingested_records_total: None,
                ingest_rejections_total: None,
                live_observers: None,
            });
        }

        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests").namespace("pulse"),
            &["method", "path", "status"],
        )?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "Request latency")
                .namespace("pulse")
                .buckets(vec![
                    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
                ]),
            &["path"],
        )?;

        let ingested_records_total = IntCounterVec::new(
            Opts::new("ingested_records_total", "Records accepted by ingestion")
                .namespace("pulse"),
            &["kind"],
        )?;

        let ingest_rejections_total = IntCounterVec::new(
            Opts::new("ingest_rejections_total", "Ingest calls rejected").namespace("pulse"),
            &["kind", "reason"],
        )?;

        let live_observers = IntGauge::with_opts(
            Opts::new("live_observers", "Connected stream observers").namespace("pulse"),
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(ingested_records_total.clone()))?;
        registry.register(Box::new(ingest_rejections_total.clone()))?;
        registry.register(Box::new(live_observers.clone()))?;

        Ok(Self {
            enabled: true,
            registry: Some(registry),
            http_requests_total: Some(http_requests_total),
            http_request_duration: Some(http_request_duration),
            ingested_records_total: Some(ingested_records_total),
            ingest_rejections_total: Some(ingest_rejections_total),
            live_observers: Some(live_observers),
        })
    }

    #[inline]
    pub fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        if !self.enabled {
            return;
        }
        if let Some(ref counter) = self.http_requests_total {
            let mut buf = itoa::Buffer::new();
            let status_str = buf.format(status);
            counter.with_label_values(&[method, path, status_str]).inc();
        }
        if let Some(ref hist) = self.http_request_duration {
            hist.with_label_values(&[path]).observe(duration_secs);
        }
    }

    /// `kind` is `log` or `speedtest`.
    #[inline]
    pub fn record_ingested(&self, kind: &str, count: usize) {
        if let Some(ref counter) = self.ingested_records_total {
            counter.with_label_values(&[kind]).inc_by(count as u64);
        }
    }

    /// `reason` is the error tag returned to the client.
    #[inline]
    pub fn record_rejection(&self, kind: &str, reason: &str) {
        if let Some(ref counter) = self.ingest_rejections_total {
            counter.with_label_values(&[kind, reason]).inc();
        }
    }

    pub fn observer_connected(&self) {
        if let Some(ref gauge) = self.live_observers {
            gauge.inc();
        }
    }

    pub fn observer_disconnected(&self) {
        if let Some(ref gauge) = self.live_observers {
            gauge.dec();
        }
    }

    /// Render prometheus text exposition format.
    pub fn render(&self) -> String {
        if let Some(ref registry) = self.registry {
            let encoder = TextEncoder::new();
            let metric_families = registry.gather();
            let mut buffer = Vec::new();
            encoder.encode(&metric_families, &mut buffer).unwrap_or(());
            String::from_utf8(buffer).unwrap_or_default()
        } else {
            String::new()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_collector_is_inert() {
        let mc = MetricsCollector::new(false).unwrap();
        assert!(!mc.is_enabled());
        assert!(mc.http_requests_total.is_none());
        assert!(mc.live_observers.is_none());
        mc.record_request("GET", "/api/logs", 200, 0.001);
        mc.record_ingested("log", 3);
        mc.record_rejection("log", "invalid_json");
        mc.observer_connected();
        assert_eq!(mc.render(), "");
    }

    #[test]
    fn enabled_collector_renders_all_families() {
        let mc = MetricsCollector::new(true).unwrap();
        mc.record_request("POST", "/api/logs", 201, 0.01);
        mc.record_ingested("log", 1);
        mc.record_rejection("speedtest", "duplicate_result_id");
        mc.observer_connected();
        let output = mc.render();
        assert!(output.contains("pulse_http_requests_total"));
        assert!(output.contains("pulse_http_request_duration_seconds"));
        assert!(output.contains("pulse_ingested_records_total"));
        assert!(output.contains("pulse_ingest_rejections_total"));
        assert!(output.contains("pulse_live_observers 1"));
    }

    #[test]
    fn request_counter_is_labelled_by_status() {
        let mc = MetricsCollector::new(true).unwrap();
        mc.record_request("GET", "/api/logs", 200, 0.001);
        mc.record_request("GET", "/api/logs", 200, 0.002);
        mc.record_request("GET", "/api/logs", 400, 0.002);

        let counter = mc.http_requests_total.as_ref().unwrap();
        assert_eq!(counter.with_label_values(&["GET", "/api/logs", "200"]).get(), 2);
        assert_eq!(counter.with_label_values(&["GET", "/api/logs", "400"]).get(), 1);
    }

    #[test]
    fn ingested_counter_adds_batch_sizes() {
        let mc = MetricsCollector::new(true).unwrap();
        mc.record_ingested("log", 5);
        mc.record_ingested("log", 2);
        mc.record_ingested("speedtest", 1);

        let counter = mc.ingested_records_total.as_ref().unwrap();
        assert_eq!(counter.with_label_values(&["log"]).get(), 7);
        assert_eq!(counter.with_label_values(&["speedtest"]).get(), 1);
    }

    #[test]
    fn observer_gauge_tracks_connects_and_disconnects() {
        let mc = MetricsCollector::new(true).unwrap();
        mc.observer_connected();
        mc.observer_connected();
        mc.observer_disconnected();
        assert_eq!(mc.live_observers.as_ref().unwrap().get(), 1);
    }
}
