use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use availarr_model::SourceId;

use super::MediaSource;
use crate::error::Result;

/// Supplies the sources a pass should poll. Failure aborts the pass.
#[async_trait]
pub trait SourceCatalog: Send + Sync + fmt::Debug {
    async fn enabled_sources(&self) -> Result<Vec<Arc<dyn MediaSource>>>;
}

/// Fixed set of sources built from configuration.
#[derive(Debug, Clone, Default)]
pub struct StaticSourceCatalog {
    sources: Vec<Arc<dyn MediaSource>>,
}

impl StaticSourceCatalog {
    pub fn new(sources: Vec<Arc<dyn MediaSource>>) -> Self {
        Self { sources }
    }

    pub fn get(&self, id: &SourceId) -> Option<Arc<dyn MediaSource>> {
        self.sources
            .iter()
            .find(|s| &s.descriptor().id == id)
            .cloned()
    }
}

#[async_trait]
impl SourceCatalog for StaticSourceCatalog {
    async fn enabled_sources(&self) -> Result<Vec<Arc<dyn MediaSource>>> {
        Ok(self
            .sources
            .iter()
            .filter(|s| s.descriptor().enabled)
            .cloned()
            .collect())
    }
}
