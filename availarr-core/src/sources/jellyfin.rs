use std::collections::HashMap;

use async_trait::async_trait;
use availarr_model::ContentIdentity;
use chrono::{DateTime, SecondsFormat, Utc};
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

const ITEM_FIELDS: &str = "ProviderIds,MediaSources,DateCreated,ProductionYear,ParentId";

/// Jellyfin (or Emby) server reached with an API key.
#[derive(Debug, Clone)]
pub struct JellyfinSource {
    descriptor: SourceDescriptor,
    client: Client,
    base_url: Url,
    token: String,
}

impl JellyfinSource {
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
            .header("X-Emby-Token", &self.token))
    }

    async fn items(&self, query: &[(&str, String)]) -> Result<ItemsResponse, SourceError> {
        let response = self
            .get("Items")?
            .query(&[("Fields", ITEM_FIELDS)])
            .query(query)
            .send()
            .await?;
        read_json(response, "Items").await
    }
}

#[async_trait]
impl MediaSource for JellyfinSource {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn authenticate(&self) -> Result<(), SourceError> {
        let response = self.get("System/Info")?.send().await?;
        let _: serde_json::Value = read_json(response, "System/Info").await?;
        Ok(())
    }

    async fn libraries(&self) -> Result<Vec<SourceLibrary>, SourceError> {
        let response = self.get("Library/MediaFolders")?.send().await?;
        let folders: ItemsResponse = read_json(response, "Library/MediaFolders").await?;
        Ok(folders
            .items
            .into_iter()
            .map(|folder| SourceLibrary {
                kind: match folder.collection_type.as_deref() {
                    Some("movies") => LibraryKind::Movie,
                    Some("tvshows") => LibraryKind::Series,
                    other => LibraryKind::Other(other.unwrap_or("mixed").to_string()),
                },
                key: folder.id,
                title: folder.name.unwrap_or_default(),
            })
            .collect())
    }

    async fn library_page(
        &self,
        library: &SourceLibrary,
        page: PageRequest,
    ) -> Result<LibraryPage, SourceError> {
        let item_types = match (&library.kind, page.added_after) {
            (LibraryKind::Series, Some(_)) => "Episode",
            (LibraryKind::Series, None) => "Series",
            _ => "Movie",
        };
        let mut query = vec![
            ("ParentId", library.key.clone()),
            ("Recursive", "true".to_string()),
            ("IncludeItemTypes", item_types.to_string()),
            ("SortBy", "DateCreated,SortName".to_string()),
            ("StartIndex", page.offset.to_string()),
            ("Limit", page.size.to_string()),
        ];
        if let Some(after) = page.added_after {
            // Last-saved also lists items whose metadata was refreshed, a
            // superset of those added since the cutoff.
            query.push((
                "MinDateLastSaved",
                after.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }
        let response = self.items(&query).await?;
        let total = response.total_record_count.unwrap_or(response.items.len());
        let items: Vec<LibraryItem> = response
            .items
            .into_iter()
            .map(JellyfinItem::into_item)
            .collect();
        debug!(
            source = %self.descriptor.id,
            library = %library.title,
            offset = page.offset,
            returned = items.len(),
            total,
            "jellyfin page"
        );
        Ok(LibraryPage { items, total })
    }

    async fn fetch_item(&self, key: &str) -> Result<LibraryItem, SourceError> {
        self.items(&[("Ids", key.to_string())])
            .await?
            .items
            .into_iter()
            .next()
            .map(JellyfinItem::into_item)
            .ok_or_else(|| SourceError::NotFound(format!("item {key}")))
    }

    async fn fetch_children(&self, key: &str) -> Result<Vec<LibraryItem>, SourceError> {
        Ok(self
            .items(&[("ParentId", key.to_string())])
            .await?
            .items
            .into_iter()
            .map(JellyfinItem::into_item)
            .collect())
    }

    async fn find_by_identity(
        &self,
        identity: &ContentIdentity,
        hint: Option<&str>,
    ) -> Result<Vec<LibraryItem>, SourceError> {
        if let Some(key) = hint {
            match self.fetch_item(key).await {
                Ok(item) if item.is_root() && item.carries(identity) => return Ok(vec![item]),
                Ok(_) | Err(SourceError::NotFound(_)) => {}
                Err(err) => return Err(err),
            }
        }
        let item_type = match identity.kind {
            availarr_model::MediaKind::Movie => "Movie",
            availarr_model::MediaKind::Series => "Series",
        };
        let response = self
            .items(&[
                ("Recursive", "true".to_string()),
                ("IncludeItemTypes", item_type.to_string()),
                (
                    "AnyProviderIdEquals",
                    format!("tmdb.{}", identity.canonical_id.get()),
                ),
            ])
            .await?;
        // Older servers ignore the provider filter; check ids ourselves.
        Ok(response
            .items
            .into_iter()
            .map(JellyfinItem::into_item)
            .filter(|item| item.is_root() && !item.identifiers.is_empty() && item.carries(identity))
            .collect())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<JellyfinItem>,
    total_record_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct JellyfinItem {
    id: String,
    name: Option<String>,
    #[serde(rename = "Type")]
    kind: Option<String>,
    collection_type: Option<String>,
    production_year: Option<i32>,
    index_number: Option<i32>,
    parent_index_number: Option<i32>,
    series_id: Option<String>,
    season_id: Option<String>,
    parent_id: Option<String>,
    #[serde(default)]
    provider_ids: HashMap<String, Option<String>>,
    #[serde(default)]
    media_sources: Vec<MediaSourceInfo>,
    date_created: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MediaSourceInfo {
    #[serde(default)]
    media_streams: Vec<MediaStream>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MediaStream {
    #[serde(rename = "Type")]
    kind: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    codec: Option<String>,
}

/// Provider id maps become current-generation guid strings.
fn provider_guids(ids: HashMap<String, Option<String>>) -> Vec<String> {
    let mut guids: Vec<String> = ids
        .into_iter()
        .filter_map(|(provider, value)| {
            let value = value?.trim().to_string();
            if value.is_empty() {
                return None;
            }
            let scheme = match provider.to_ascii_lowercase().as_str() {
                "tmdb" => "tmdb",
                "imdb" => "imdb",
                "tvdb" => "tvdb",
                _ => return None,
            };
            Some(format!("{scheme}://{value}"))
        })
        .collect();
    guids.sort();
    guids
}

impl JellyfinItem {
    fn into_item(self) -> LibraryItem {
        let kind = self.kind.as_deref().map(|k| match k {
            "Movie" => ItemKind::Movie,
            "Series" => ItemKind::Show,
            "Season" => ItemKind::Season,
            "Episode" => ItemKind::Episode,
            _ => ItemKind::Other,
        });
        let (parent_key, grandparent_key) = match kind {
            Some(ItemKind::Season) => (self.series_id.or(self.parent_id), None),
            Some(ItemKind::Episode) => (self.season_id.or(self.parent_id), self.series_id),
            _ => (self.parent_id, None),
        };
        let renditions = self
            .media_sources
            .into_iter()
            .filter_map(|source| {
                source
                    .media_streams
                    .into_iter()
                    .find(|stream| stream.kind.as_deref() == Some("Video"))
            })
            .map(|video| Rendition {
                width: video.width,
                height: video.height,
                resolution: None,
                video_codec: video.codec,
            })
            .collect();
        LibraryItem {
            key: self.id,
            kind,
            title: self.name.unwrap_or_default(),
            year: self.production_year,
            index: self.index_number,
            parent_index: self.parent_index_number,
            parent_key,
            grandparent_key,
            identifiers: provider_guids(self.provider_ids),
            renditions,
            added_at: self.date_created,
        }
    }
}
