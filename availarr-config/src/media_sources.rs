//! Turns configured sources into live [`MediaSource`] clients.

use std::sync::Arc;

use availarr_core::sources::{
    JellyfinSource, MediaSource, PlexSource, SourceDescriptor, SourceError, SourceKind,
};
use availarr_model::SourceId;
use tracing::info;

use crate::models::SourceConfig;

/// Builds a client for every configured source, enabled or not. Disabled
/// sources stay in the list so the scan summary can name them.
pub fn build_sources(configs: &[SourceConfig]) -> Result<Vec<Arc<dyn MediaSource>>, SourceError> {
    configs.iter().map(build_source).collect()
}

fn build_source(config: &SourceConfig) -> Result<Arc<dyn MediaSource>, SourceError> {
    let descriptor = SourceDescriptor {
        id: SourceId::new(config.id.clone()),
        name: config.name.clone(),
        kind: config.kind,
        high_tier: config.high_tier,
        enabled: config.enabled,
    };
    info!(
        source = %config.id,
        kind = %config.kind,
        high_tier = config.high_tier,
        enabled = config.enabled,
        "media source configured"
    );
    let source: Arc<dyn MediaSource> = match config.kind {
        SourceKind::Plex => Arc::new(PlexSource::new(
            descriptor,
            config.base_url.as_str(),
            config.token.clone(),
        )?),
        SourceKind::Jellyfin => Arc::new(JellyfinSource::new(
            descriptor,
            config.base_url.as_str(),
            config.token.clone(),
        )?),
    };
    Ok(source)
}
