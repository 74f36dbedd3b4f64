use serde::{Deserialize, Serialize};

/// Structured access log entry, emitted once per HTTP request.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub timestamp: String,
    pub request_id: String,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub latency_ms: f64,
}

impl AccessLogEntry {
    pub fn new(request_id: &str, method: &str, path: &str, status: u16, latency_ms: f64) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            request_id: request_id.to_string(),
            method: method.to_string(),
            path: path.to_string(),
            status,
            latency_ms,
        }
    }

    /// Write the entry to the `access` tracing target.
    pub fn emit(&self) {
        tracing::info!(
            target: "access",
            request_id = %self.request_id,
            method = %self.method,
            path = %self.path,
            status = self.status,
            latency_ms = self.latency_ms,
            "request"
        );
    }
}
