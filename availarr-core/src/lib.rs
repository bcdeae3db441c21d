//! # availarr core
//!
//! Reconciles what users asked for with what their media servers actually
//! hold. The crate resolves library items to canonical TMDB identities, walks
//! Plex and Jellyfin libraries in full or incremental passes, derives
//! show/season availability for two quality tiers and runs a periodic safety
//! net that promotes stalled `processing` titles once corroborating evidence
//! shows up.
//!
//! ## Architecture
//!
//! - [`identity`]: vendor identifier parsing, catalog lookups, fuzzy title
//!   matching and the persistent identity cache
//! - [`availability`]: the pure status state machine
//! - [`guard`]: per-title async mutual exclusion
//! - [`reconcile`]: read-modify-write of records, request cascade and events
//! - [`scan`]: the library scan orchestrator
//! - [`safety_net`]: the source-independent reconciliation pass
//! - [`scheduler`]: interval runners with per-task overlap protection
//! - [`service`]: the facade the rest of the platform calls
//!
//! External collaborators (sources, catalog, stores, event sink) are traits
//! in [`sources`], [`providers`], [`persistence`] and [`events`].
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod availability;
pub mod config;
pub mod error;
pub mod events;
pub mod guard;
pub mod identity;
pub mod persistence;
pub mod providers;
pub mod reconcile;
pub mod safety_net;
pub mod scan;
pub mod scheduler;
pub mod service;
pub mod sources;
pub mod timeout;

#[cfg(feature = "database")]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use availarr_model as model;
pub use error::{AvailarrError, Result};
