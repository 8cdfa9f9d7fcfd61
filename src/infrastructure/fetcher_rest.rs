use std::sync::Arc;

use log::{debug, error};
use reqwest::Response;
use serde::Deserialize;

use crate::{FetchError, GitHubSession, Page, PageFetcher, PageToken, Record, SearchQuery};

const SEARCH_REPOSITORIES_PATH: &str = "/search/repositories";

#[derive(Deserialize, Debug)]
struct SearchRepositoriesBody {
    total_count: Option<u64>,
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RestRepository {
    name: String,
    owner: Option<RestOwner>,
    description: Option<String>,
    html_url: String,
    url: Option<String>,
    stargazers_count: Option<u32>,
    forks_count: Option<u32>,
    language: Option<String>,
    open_issues_count: Option<u32>,
}

#[derive(Deserialize, Debug)]
struct RestOwner {
    login: String,
}

impl From<RestRepository> for Record {
    fn from(repository: RestRepository) -> Self {
        Self {
            url: repository.html_url,
            name: Some(repository.name),
            owner: repository.owner.map(|owner| owner.login),
            description: repository.description,
            stars: repository.stargazers_count,
            forks: repository.forks_count,
            language: repository.language,
            open_issues: repository.open_issues_count,
            api_url: repository.url,
            ..Self::default()
        }
    }
}

#[derive(Deserialize, Debug)]
struct ErrorBody {
    message: Option<String>,
}

/// Converts a non success response into a `FetchError::Status`.
pub(crate) async fn status_error(response: Response) -> FetchError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or(body);

    FetchError::Status { status, message }
}

/// Fetches repository search results from the GitHub REST API, one numbered page at a time.
pub struct GitHubRestFetcher {
    session: Arc<GitHubSession>,
}

impl GitHubRestFetcher {
    /// Creates a new `GitHubRestFetcher` instance sharing the given session.
    pub fn new(session: Arc<GitHubSession>) -> Self {
        Self { session }
    }

    fn page_number(token: &PageToken) -> Result<u32, FetchError> {
        match token {
            PageToken::Start => Ok(1),
            PageToken::Offset(page) => Ok(*page),
            other => Err(FetchError::UnsupportedToken(other.to_string())),
        }
    }
}

#[async_trait::async_trait]
impl PageFetcher for GitHubRestFetcher {
    async fn fetch(
        &self,
        query: &SearchQuery,
        token: &PageToken,
        page_size: u16,
    ) -> Result<Page, FetchError> {
        let page = Self::page_number(token)?;
        let mut request = self.session.get(SEARCH_REPOSITORIES_PATH).query(&[
            ("q", query.search_text()),
            ("per_page", page_size.to_string()),
            ("page", page.to_string()),
        ]);
        if let Some(sort) = query.sort() {
            request = request.query(&[("sort", sort)]);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            let error = status_error(response).await;
            error!("Unable to fetch page {page} for '{}': {error}", query.text());
            return Err(error);
        }
        let raw_body = response.text().await?;
        let body: SearchRepositoriesBody = serde_json::from_str(&raw_body).map_err(|e| {
            FetchError::Parse(format!("Empty or badly formatted search response: {e}"))
        })?;
        let fetched = body.items.len();
        let records = body
            .items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<RestRepository>(item) {
                Ok(repository) => Some(Record::from(repository)),
                Err(e) => {
                    debug!("Skipping search item with unexpected shape: {e}");
                    None
                }
            })
            .collect::<Vec<_>>();

        Ok(Page::new(
            records,
            Some(PageToken::Offset(page + 1)),
            body.total_count,
        )
        .with_fetched(fetched))
    }
}
