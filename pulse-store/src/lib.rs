pub mod journal;
pub mod memory;
pub mod store;

pub use memory::MemoryStore;
pub use pulse_core::StoreError;
pub use store::{Store, StoreResult};
