//! # availarr server
//!
//! Runs the reconciliation engine as a daemon: the incremental scan, full
//! scan and safety net on their intervals, plus a small HTTP surface for
//! status queries and manual triggers.

pub mod app_state;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod startup;
