pub mod aggregate;
pub mod broadcast;
pub mod ingest;

pub use aggregate::{Aggregator, LogCounts, SpeedtestTrend};
pub use broadcast::{BroadcastRegistry, Observer, ObserverId};
pub use ingest::IngestPipeline;
