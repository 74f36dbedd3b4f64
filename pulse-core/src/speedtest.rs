use crate::error::ValidationError;
use crate::timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Latency {
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub iqm: f64,
    #[serde(default)]
    pub jitter: f64,
    #[serde(default)]
    pub low: f64,
}

/// Download or upload leg of a test. `bandwidth` is bytes per second.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    #[serde(default)]
    pub bandwidth: i64,
    #[serde(default)]
    pub bytes: i64,
    #[serde(default)]
    pub elapsed: i64,
    #[serde(default)]
    pub latency: Latency,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    #[serde(default)]
    pub external_ip: String,
    #[serde(default)]
    pub internal_ip: String,
    #[serde(default)]
    pub is_vpn: bool,
    #[serde(default)]
    pub mac_addr: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub jitter: f64,
    #[serde(default)]
    pub latency: f64,
    #[serde(default)]
    pub low: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Unique per submitted test.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub persisted: bool,
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Server {
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub port: i64,
}

/// One network-quality sample as produced by the speedtest agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedtestSample {
    #[serde(default)]
    pub download: Transfer,
    #[serde(default)]
    pub upload: Transfer,
    #[serde(default)]
    pub interface: Interface,
    #[serde(default)]
    pub isp: String,
    #[serde(default)]
    pub packet_loss: f64,
    #[serde(default)]
    pub ping: Ping,
    #[serde(default)]
    pub result: TestResult,
    #[serde(default)]
    pub server: Server,
    /// Client-supplied measurement time.
    pub timestamp: DateTime<Utc>,
    /// Server-assigned on insert.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub received_at: Option<DateTime<Utc>>,
    #[serde(rename = "type", default)]
    pub kind: String,
}

impl SpeedtestSample {
    /// Parse and validate an ingest body, stamping `receivedAt` with `now`.
    ///
    /// Any client-sent `receivedAt` is discarded.
    pub fn from_json(body: &[u8], now: DateTime<Utc>) -> Result<Self, ValidationError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(ValidationError::EmptyBody);
        }
        let mut value: Value =
            serde_json::from_slice(body).map_err(|_| ValidationError::InvalidJson)?;
        let obj = value.as_object_mut().ok_or(ValidationError::InvalidJson)?;
        obj.remove("receivedAt");

        let raw_ts = obj.remove("timestamp").unwrap_or(Value::Null);
        let ts = timestamp::normalize(&raw_ts)?.ok_or(ValidationError::TimestampRequired)?;
        obj.insert("timestamp".into(), Value::String(ts.to_rfc3339()));

        let mut sample: SpeedtestSample =
            serde_json::from_value(value).map_err(|_| ValidationError::InvalidJson)?;
        if sample.result.id.trim().is_empty() {
            return Err(ValidationError::ResultIdRequired);
        }
        sample.received_at = Some(now);
        Ok(sample)
    }
}
