use anyhow::Context;
use log::error;
use reqwest::{
    Client,
    header::{HeaderMap, LINK},
};
use serde::Deserialize;

use crate::{FetchError, Page, PageFetcher, PageToken, Record, SearchQuery, StdResult};

/// The production endpoint of the Software Heritage API.
pub const SOFTWARE_HERITAGE_ENDPOINT: &str = "https://archive.softwareheritage.org/api/1/";

const METADATA_SEARCH_PATH: &str = "origin/metadata-search/";

/// One search result: the origin URL and the indexed metadata.
///
/// The indexer wraps the CodeMeta document with its `mappings` and `tool`:
/// `{"url": .., "metadata": {"metadata": {"name": .., ..}, "mappings": .., "tool": ..}}`.
#[derive(Deserialize, Debug)]
struct OriginMetadata {
    url: String,
    #[serde(default)]
    metadata: serde_json::Value,
}

impl OriginMetadata {
    /// The CodeMeta document, falling back to an unwrapped one.
    fn document(&self) -> &serde_json::Value {
        match self.metadata.get("metadata") {
            Some(document) if document.is_object() => document,
            _ => &self.metadata,
        }
    }
}

impl From<OriginMetadata> for Record {
    fn from(origin: OriginMetadata) -> Self {
        let document = origin.document();
        let text = |key: &str| {
            document
                .get(key)
                .and_then(|value| value.as_str())
                .map(str::to_string)
        };

        Self {
            name: text("name"),
            description: text("description"),
            ..Record::new(&origin.url)
        }
    }
}

/// Extracts the `rel="next"` target of a `Link` header.
pub fn parse_next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .find_map(|link| {
            let (target, params) = link.split_once(';')?;
            params
                .split(';')
                .any(|param| param.trim().replace(' ', "") == r#"rel="next""#)
                .then(|| {
                    target
                        .trim()
                        .trim_start_matches('<')
                        .trim_end_matches('>')
                        .to_string()
                })
        })
}

/// Fetches origins from the Software Heritage metadata search, following `Link` headers.
///
/// The endpoint needs no authentication.
pub struct SoftwareHeritageFetcher {
    client: Client,
    endpoint: String,
}

impl SoftwareHeritageFetcher {
    /// Creates a new `SoftwareHeritageFetcher` for the given API endpoint.
    pub fn try_new(endpoint: &str) -> StdResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("repo-harvester/", env!("CARGO_PKG_VERSION")))
            .build()
            .with_context(|| "Failed to build the HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/", endpoint.trim_end_matches('/')),
        })
    }
}

#[async_trait::async_trait]
impl PageFetcher for SoftwareHeritageFetcher {
    async fn fetch(
        &self,
        query: &SearchQuery,
        token: &PageToken,
        page_size: u16,
    ) -> Result<Page, FetchError> {
        let request = match token {
            PageToken::Start => self
                .client
                .get(format!("{}{METADATA_SEARCH_PATH}", self.endpoint))
                .query(&[
                    ("fulltext", query.search_text()),
                    ("per_page", page_size.to_string()),
                ]),
            PageToken::Link(url) => self.client.get(url),
            other => return Err(FetchError::UnsupportedToken(other.to_string())),
        };
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            error!("Error during request: {status} {message}");
            return Err(FetchError::Status { status, message });
        }
        let next = parse_next_link(response.headers()).map(PageToken::Link);
        let raw_body = response.text().await?;
        let origins: Vec<serde_json::Value> = serde_json::from_str(&raw_body)
            .map_err(|e| FetchError::Parse(format!("Badly formatted metadata search: {e}")))?;
        let fetched = origins.len();
        let records = origins
            .into_iter()
            .filter_map(|origin| serde_json::from_value::<OriginMetadata>(origin).ok())
            .map(Record::from)
            .collect();

        Ok(Page::new(records, next, None).with_fetched(fetched))
    }
}
