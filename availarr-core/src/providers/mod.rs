//! Canonical catalog (TMDB) access.

pub mod catalog;
pub mod error;
pub mod tmdb;

pub use catalog::{CatalogLookup, CatalogMatch, ExternalId, SeasonEpisodes};
#[cfg(test)]
pub use catalog::MockCatalogLookup;
pub use error::ProviderError;
pub use tmdb::TmdbCatalog;
