use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::SourceError;

/// Parses a server base url, keeping any path prefix (reverse proxies).
pub(crate) fn base_url(raw: &str) -> Result<Url, SourceError> {
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&normalized).map_err(|e| SourceError::Config(format!("invalid base url {raw}: {e}")))
}

pub(crate) fn join(base: &Url, path: &str) -> Result<Url, SourceError> {
    base.join(path.trim_start_matches('/'))
        .map_err(|e| SourceError::Config(format!("invalid path {path}: {e}")))
}

pub(crate) async fn read_json<T: DeserializeOwned>(
    response: Response,
    what: &str,
) -> Result<T, SourceError> {
    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(SourceError::Unauthorized(format!("{what} returned {status}")));
        }
        StatusCode::NOT_FOUND => return Err(SourceError::NotFound(what.to_string())),
        s if !s.is_success() => {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Api {
                status: s.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }
        _ => {}
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| SourceError::Parse(format!("{what}: {e}")))
}
