use async_trait::async_trait;
use availarr_model::ContentIdentity;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::http::{base_url, join, read_json};
use super::{
    ItemKind, LibraryItem, LibraryKind, LibraryPage, MediaSource, PageRequest, SourceDescriptor,
    SourceError, SourceLibrary,
};
use crate::availability::Rendition;

const CLIENT_IDENTIFIER: &str = "availarr";

// Plex `type` filter values.
const TYPE_MOVIE: &str = "1";
const TYPE_SHOW: &str = "2";
const TYPE_EPISODE: &str = "4";

/// Plex Media Server reached with an `X-Plex-Token`.
#[derive(Debug, Clone)]
pub struct PlexSource {
    descriptor: SourceDescriptor,
    client: Client,
    base_url: Url,
    token: String,
}

impl PlexSource {
    pub fn new(
        descriptor: SourceDescriptor,
        base_url_raw: &str,
        token: impl Into<String>,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(concat!("availarr/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            descriptor,
            client,
            base_url: base_url(base_url_raw)?,
            token: token.into(),
        })
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, SourceError> {
        Ok(self
            .client
            .get(join(&self.base_url, path)?)
            .header("Accept", "application/json")
            .header("X-Plex-Token", &self.token)
            .header("X-Plex-Client-Identifier", CLIENT_IDENTIFIER)
            .header("X-Plex-Product", CLIENT_IDENTIFIER))
    }

    async fn metadata(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<MetadataContainer, SourceError> {
        let response = self.get(path)?.query(query).send().await?;
        let envelope: Envelope<MetadataContainer> = read_json(response, path).await?;
        Ok(envelope.container)
    }
}

#[async_trait]
impl MediaSource for PlexSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn authenticate(&self) -> Result<(), SourceError> {
        let response = self.get("")?.send().await?;
        let _: Envelope<serde_json::Value> = read_json(response, "server root").await?;
        Ok(())
    }

    async fn libraries(&self) -> Result<Vec<SourceLibrary>, SourceError> {
        let response = self.get("library/sections")?.send().await?;
        let envelope: Envelope<SectionsContainer> =
            read_json(response, "library/sections").await?;
        Ok(envelope
            .container
            .directories
            .into_iter()
            .map(|dir| SourceLibrary {
                kind: match dir.kind.as_str() {
                    "movie" => LibraryKind::Movie,
                    "show" => LibraryKind::Series,
                    other => LibraryKind::Other(other.to_string()),
                },
                key: dir.key,
                title: dir.title,
            })
            .collect())
    }

    async fn library_page(
        &self,
        library: &SourceLibrary,
        page: PageRequest,
    ) -> Result<LibraryPage, SourceError> {
        let path = format!("library/sections/{}/all", library.key);
        let item_type = match (&library.kind, page.added_after) {
            (LibraryKind::Series, Some(_)) => TYPE_EPISODE,
            (LibraryKind::Series, None) => TYPE_SHOW,
            _ => TYPE_MOVIE,
        };
        let mut query = vec![
            ("type", item_type.to_string()),
            ("includeGuids", "1".to_string()),
            ("X-Plex-Container-Start", page.offset.to_string()),
            ("X-Plex-Container-Size", page.size.to_string()),
        ];
        if let Some(after) = page.added_after {
            query.push(("addedAt>>", after.timestamp().to_string()));
        }
        let container = self.metadata(&path, &query).await?;
        let items: Vec<LibraryItem> = container
            .metadata
            .into_iter()
            .map(PlexMetadata::into_item)
            .collect();
        let total = container.total_size.unwrap_or_else(|| {
            // Without a reported total, keep paging while pages come back full.
            let seen = page.offset + items.len();
            if items.len() >= page.size { seen + 1 } else { seen }
        });
        debug!(
            source = %self.descriptor.id,
            library = %library.title,
            offset = page.offset,
            returned = items.len(),
            total,
            "plex page"
        );
        Ok(LibraryPage { items, total })
    }

    async fn fetch_item(&self, key: &str) -> Result<LibraryItem, SourceError> {
        let path = format!("library/metadata/{key}");
        self.metadata(&path, &[("includeGuids", "1".to_string())])
            .await?
            .metadata
            .into_iter()
            .next()
            .map(PlexMetadata::into_item)
            .ok_or(SourceError::NotFound(path))
    }

    async fn fetch_children(&self, key: &str) -> Result<Vec<LibraryItem>, SourceError> {
        let path = format!("library/metadata/{key}/children");
        Ok(self
            .metadata(&path, &[("includeGuids", "1".to_string())])
            .await?
            .metadata
            .into_iter()
            .map(PlexMetadata::into_item)
            .collect())
    }

    async fn find_by_identity(
        &self,
        identity: &ContentIdentity,
        hint: Option<&str>,
    ) -> Result<Vec<LibraryItem>, SourceError> {
        // Plex has no server-side filter on external ids for modern agents,
        // so only a previously observed rating key can be checked directly.
        let Some(key) = hint else {
            debug!(source = %self.descriptor.id, canonical_id = %identity.canonical_id, "no plex key to check");
            return Ok(Vec::new());
        };
        match self.fetch_item(key).await {
            Ok(item) if item.is_root() && item.carries(identity) => Ok(vec![item]),
            Ok(_) | Err(SourceError::NotFound(_)) => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "MediaContainer")]
    container: T,
}

#[derive(Debug, Deserialize)]
struct SectionsContainer {
    #[serde(rename = "Directory", default)]
    directories: Vec<PlexDirectory>,
}

#[derive(Debug, Deserialize)]
struct PlexDirectory {
    key: String,
    title: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataContainer {
    total_size: Option<usize>,
    #[serde(rename = "Metadata", default)]
    metadata: Vec<PlexMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlexMetadata {
    rating_key: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    title: Option<String>,
    year: Option<i32>,
    index: Option<i32>,
    parent_index: Option<i32>,
    parent_rating_key: Option<String>,
    grandparent_rating_key: Option<String>,
    guid: Option<String>,
    #[serde(rename = "Guid", default)]
    guids: Vec<PlexGuid>,
    #[serde(rename = "Media", default)]
    media: Vec<PlexMedia>,
    added_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct PlexGuid {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlexMedia {
    width: Option<u32>,
    height: Option<u32>,
    video_resolution: Option<String>,
    video_codec: Option<String>,
}

impl PlexMetadata {
    fn into_item(self) -> LibraryItem {
        let kind = self.kind.as_deref().map(|k| match k {
            "movie" => ItemKind::Movie,
            "show" => ItemKind::Show,
            "season" => ItemKind::Season,
            "episode" => ItemKind::Episode,
            _ => ItemKind::Other,
        });
        let identifiers = self
            .guid
            .into_iter()
            .chain(self.guids.into_iter().map(|g| g.id))
            .collect();
        let renditions = self
            .media
            .into_iter()
            .map(|m| Rendition {
                width: m.width,
                height: m.height,
                resolution: m.video_resolution,
                video_codec: m.video_codec,
            })
            .collect();
        LibraryItem {
            key: self.rating_key,
            kind,
            title: self.title.unwrap_or_default(),
            year: self.year,
            index: self.index,
            parent_index: self.parent_index,
            parent_key: self.parent_rating_key,
            grandparent_key: self.grandparent_rating_key,
            identifiers,
            renditions,
            added_at: self
                .added_at
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        }
    }
}
