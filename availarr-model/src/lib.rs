//! Core data model definitions shared across availarr crates.
//!
//! Everything here is plain data: identifiers, the availability status
//! lattice, persisted records and the ephemeral pass summaries handed back to
//! callers of the engine.

pub mod error;
pub mod events;
pub mod identity;
pub mod ids;
pub mod kind;
pub mod records;
pub mod request;
pub mod scan;
pub mod status;

pub use error::{ModelError, Result as ModelResult};
pub use events::MediaAvailableEvent;
pub use identity::ContentIdentity;
pub use ids::{CanonicalId, RecordId, RequestId, SourceId};
pub use kind::{MediaKind, Tier};
pub use records::{AvailabilityRecord, AvailabilityView, SeasonRecord};
pub use request::{MediaRequest, RequestStatus};
pub use scan::{
    SafetyNetSummary, ScanError, ScanErrorKind, ScanMode, ScanResult,
    SourceScanSummary,
};
pub use status::AvailabilityStatus;
