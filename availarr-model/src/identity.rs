use crate::ids::CanonicalId;
use crate::kind::MediaKind;

/// Canonical identity of a library item once resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContentIdentity {
    pub canonical_id: CanonicalId,
    pub kind: MediaKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub imdb_id: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub tvdb_id: Option<i64>,
}

impl ContentIdentity {
    pub fn new(canonical_id: CanonicalId, kind: MediaKind) -> Self {
        Self {
            canonical_id,
            kind,
            imdb_id: None,
            tvdb_id: None,
        }
    }

    pub fn with_imdb(mut self, imdb_id: Option<String>) -> Self {
        self.imdb_id = imdb_id;
        self
    }

    pub fn with_tvdb(mut self, tvdb_id: Option<i64>) -> Self {
        self.tvdb_id = tvdb_id;
        self
    }

    pub fn lock_key(&self) -> String {
        self.kind.lock_key(self.canonical_id)
    }
}
