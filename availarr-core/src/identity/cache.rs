use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use availarr_model::{ContentIdentity, SourceId};
use tokio::sync::RwLock;

use crate::error::{AvailarrError, Result};

/// Persistent `(source, local key) → identity` map.
///
/// Entries never expire; they disappear only through [`IdentityCache::invalidate`].
#[async_trait]
pub trait IdentityCache: Send + Sync + fmt::Debug {
    async fn get(&self, source: &SourceId, local_key: &str) -> Result<Option<ContentIdentity>>;
    async fn put(
        &self,
        source: &SourceId,
        local_key: &str,
        identity: &ContentIdentity,
    ) -> Result<()>;
    async fn invalidate(&self, source: &SourceId, local_key: &str) -> Result<()>;
}

fn cache_key(source: &SourceId, local_key: &str) -> String {
    format!("identity:v1:{}:{}", source.as_str(), local_key)
}

/// Identity cache stored with `cacache` under a directory that survives
/// restarts.
#[derive(Clone)]
pub struct CacacheIdentityCache {
    root: PathBuf,
}

impl fmt::Debug for CacacheIdentityCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CacacheIdentityCache").field(&self.root).finish()
    }
}

impl CacacheIdentityCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl IdentityCache for CacacheIdentityCache {
    async fn get(&self, source: &SourceId, local_key: &str) -> Result<Option<ContentIdentity>> {
        let key = cache_key(source, local_key);
        match cacache::read(&self.root, &key).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(cacache::Error::EntryNotFound(_, _)) => Ok(None),
            Err(cacache::Error::IntegrityError(err)) => Err(AvailarrError::Cache(format!(
                "identity entry {key} failed integrity check ({err})"
            ))),
            Err(cacache::Error::SizeMismatch(wanted, actual)) => Err(AvailarrError::Cache(
                format!("identity entry {key} size mismatch: wanted={wanted}, actual={actual}"),
            )),
            Err(cacache::Error::IoError(_, msg)) => Err(AvailarrError::Cache(format!(
                "cacache read I/O error: {msg}"
            ))),
            Err(cacache::Error::SerdeError(_, msg)) => Err(AvailarrError::Cache(format!(
                "cacache read serde error: {msg}"
            ))),
        }
    }

    async fn put(
        &self,
        source: &SourceId,
        local_key: &str,
        identity: &ContentIdentity,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(identity)?;
        cacache::write(&self.root, cache_key(source, local_key), bytes)
            .await
            .map_err(|e| AvailarrError::Cache(format!("cacache write failed: {e}")))?;
        Ok(())
    }

    async fn invalidate(&self, source: &SourceId, local_key: &str) -> Result<()> {
        cacache::remove(&self.root, cache_key(source, local_key))
            .await
            .map_err(|e| AvailarrError::Cache(format!("cacache remove failed: {e}")))
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentityCache {
    entries: Arc<RwLock<HashMap<String, ContentIdentity>>>,
}

impl InMemoryIdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl IdentityCache for InMemoryIdentityCache {
    async fn get(&self, source: &SourceId, local_key: &str) -> Result<Option<ContentIdentity>> {
        Ok(self
            .entries
            .read()
            .await
            .get(&cache_key(source, local_key))
            .cloned())
    }

    async fn put(
        &self,
        source: &SourceId,
        local_key: &str,
        identity: &ContentIdentity,
    ) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(cache_key(source, local_key), identity.clone());
        Ok(())
    }

    async fn invalidate(&self, source: &SourceId, local_key: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .remove(&cache_key(source, local_key));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use availarr_model::{CanonicalId, MediaKind};

    #[tokio::test]
    async fn disk_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let source = SourceId::from("plex-main");
        let identity = ContentIdentity::new(CanonicalId(603), MediaKind::Movie)
            .with_imdb(Some("tt0133093".into()));

        let cache = CacacheIdentityCache::new(dir.path());
        assert_eq!(cache.get(&source, "42").await.unwrap(), None);
        cache.put(&source, "42", &identity).await.unwrap();

        let reopened = CacacheIdentityCache::new(dir.path());
        assert_eq!(reopened.get(&source, "42").await.unwrap(), Some(identity));
        assert_eq!(
            reopened.get(&SourceId::from("jellyfin"), "42").await.unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let dir = tempfile::tempdir().unwrap();
        let source = SourceId::from("plex-main");
        let cache = CacacheIdentityCache::new(dir.path());
        cache
            .put(
                &source,
                "7",
                &ContentIdentity::new(CanonicalId(1399), MediaKind::Series),
            )
            .await
            .unwrap();
        cache.invalidate(&source, "7").await.unwrap();
        assert_eq!(cache.get(&source, "7").await.unwrap(), None);
    }
}
