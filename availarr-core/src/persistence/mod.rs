//! Storage ports and their implementations.

pub mod memory;
pub mod ports;
#[cfg(feature = "database")]
pub mod postgres;

pub use memory::{
    InMemoryCheckpointStore, InMemoryFulfillmentCache, InMemoryRequestLedger,
    InMemoryStatusStore,
};
pub use ports::{FulfillmentCache, RequestLedger, ScanCheckpointStore, StatusStore};
#[cfg(feature = "database")]
pub use postgres::{
    PostgresCheckpointStore, PostgresFulfillmentCache, PostgresRequestLedger,
    PostgresStatusStore,
};
