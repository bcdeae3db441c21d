//! Media servers that hold the user's library.
//!
//! Each server kind implements [`MediaSource`]; the engine never branches on
//! the kind itself.

pub mod catalog;
pub mod error;
mod http;
pub mod jellyfin;
pub mod plex;
pub mod types;

use std::fmt;

use async_trait::async_trait;
use availarr_model::ContentIdentity;

pub use catalog::{SourceCatalog, StaticSourceCatalog};
pub use error::SourceError;
pub use jellyfin::JellyfinSource;
pub use plex::PlexSource;
pub use types::{
    ItemKind, LibraryItem, LibraryKind, LibraryPage, PageRequest, SourceDescriptor, SourceKind,
    SourceLibrary,
};

#[async_trait]
pub trait MediaSource: Send + Sync + fmt::Debug {
    fn descriptor(&self) -> &SourceDescriptor;

    /// Verifies credentials before a pass touches the libraries.
    async fn authenticate(&self) -> Result<(), SourceError>;

    async fn libraries(&self) -> Result<Vec<SourceLibrary>, SourceError>;

    /// One page of a library. With `added_after` set only items added since
    /// then are listed; for series libraries that means episodes.
    async fn library_page(
        &self,
        library: &SourceLibrary,
        page: PageRequest,
    ) -> Result<LibraryPage, SourceError>;

    /// Full metadata of one item, including every identifier it carries.
    async fn fetch_item(&self, key: &str) -> Result<LibraryItem, SourceError>;

    /// Seasons of a show, episodes of a season.
    async fn fetch_children(&self, key: &str) -> Result<Vec<LibraryItem>, SourceError>;

    /// Root items (movies or shows) matching `identity`, found without
    /// enumerating libraries. `hint` is a local key previously observed on
    /// this source.
    async fn find_by_identity(
        &self,
        identity: &ContentIdentity,
        hint: Option<&str>,
    ) -> Result<Vec<LibraryItem>, SourceError>;
}
