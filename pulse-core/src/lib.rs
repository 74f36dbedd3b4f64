pub mod config;
pub mod error;
pub mod log;
pub mod range;
pub mod speedtest;
pub mod stats;
pub mod timestamp;

pub use config::PulseConfig;
pub use error::{PulseError, StoreError, ValidationError};
pub use log::LogRecord;
pub use range::TimeRange;
pub use speedtest::SpeedtestSample;
pub use stats::{StatusBucket, StatusClass};
