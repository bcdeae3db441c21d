//! Pure availability computation.
//!
//! Nothing in here performs I/O. The scan orchestrator and safety net feed
//! observations in and persist whatever [`plan_reconciliation`] returns.

pub mod observation;
pub mod plan;
pub mod rendition;
pub mod state_machine;

pub use observation::{ExpectedSeasons, Observation, TierCounts};
pub use plan::{ReconciledState, plan_reconciliation, promote_tier};
pub use rendition::{Rendition, RenditionPolicy, TierSet, classify_item, classify_rendition};
pub use state_machine::{
    EpisodeAirDate, expected_aired_count, reconcile_movie, reconcile_season, reconcile_show,
    settle,
};
