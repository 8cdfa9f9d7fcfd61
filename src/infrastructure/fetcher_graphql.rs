#![allow(non_snake_case)]

use std::collections::HashMap;

use gql_client::{Client, GraphQLError};
use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::{FetchError, Page, PageFetcher, PageToken, Record, SearchQuery};

/// The GraphQL production endpoint for GitHub.
pub const GITHUB_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";

const SEARCH_QUERY: &str = r#"
query ($query: String!, $first: Int!, $after: String) {
  search(query: $query, type: REPOSITORY, first: $first, after: $after) {
    repositoryCount
    edges {
      cursor
      node {
        ... on Repository {
          name
          owner {
            login
          }
          description
          url
          stargazerCount
          forkCount
          primaryLanguage {
            name
          }
          issues(states: OPEN) {
            totalCount
          }
        }
      }
    }
  }
}
"#;

impl From<GraphQLError> for FetchError {
    fn from(error: GraphQLError) -> Self {
        let message = error.message().to_string();
        match message.contains("Failed to parse response") {
            true => FetchError::Parse(message),
            false => FetchError::Remote(message),
        }
    }
}

#[derive(Deserialize, Debug)]
struct SearchQueryData {
    search: SearchResult,
}

#[derive(Deserialize, Debug)]
struct SearchResult {
    repositoryCount: u64,
    edges: Vec<Option<SearchEdge>>,
}

#[derive(Deserialize, Debug)]
struct SearchEdge {
    cursor: String,
    node: Option<RepositoryNode>,
}

#[derive(Deserialize, Debug)]
struct RepositoryNode {
    name: Option<String>,
    owner: Option<Owner>,
    description: Option<String>,
    url: Option<String>,
    stargazerCount: Option<u32>,
    forkCount: Option<u32>,
    primaryLanguage: Option<Language>,
    issues: Option<Issues>,
}

#[derive(Deserialize, Debug)]
struct Owner {
    login: String,
}

#[derive(Deserialize, Debug)]
struct Language {
    name: String,
}

#[derive(Deserialize, Debug)]
struct Issues {
    totalCount: u32,
}

impl RepositoryNode {
    /// Maps the node to a record whose detail resource lives under `api_base`.
    fn into_record(self, api_base: &str) -> Option<Record> {
        let url = self.url?;
        let owner = self.owner.map(|owner| owner.login);
        let api_url = owner
            .as_ref()
            .zip(self.name.as_ref())
            .map(|(owner, name)| format!("{api_base}/repos/{owner}/{name}"));

        Some(Record {
            url,
            name: self.name,
            owner,
            description: self.description,
            stars: self.stargazerCount,
            forks: self.forkCount,
            language: self.primaryLanguage.map(|language| language.name),
            open_issues: self.issues.map(|issues| issues.totalCount),
            api_url,
            ..Record::default()
        })
    }
}

/// A GraphQL query for searching GitHub
#[derive(Debug, Serialize)]
struct GraphQlSearchQuery {
    /// The search query string.
    query: String,
    /// The number of repositories to return.
    first: u16,
    /// The cursor for pagination.
    after: Option<String>,
}

impl GraphQlSearchQuery {
    fn try_new(query: &SearchQuery, token: &PageToken, first: u16) -> Result<Self, FetchError> {
        let after = match token {
            PageToken::Start => None,
            PageToken::Cursor(cursor) => Some(cursor.to_owned()),
            other => return Err(FetchError::UnsupportedToken(other.to_string())),
        };
        let query = match query.sort() {
            Some(sort) => format!("{} sort:{sort}", query.search_text()),
            None => query.search_text(),
        };

        Ok(Self {
            query,
            first,
            after,
        })
    }
}

/// Fetches repository search results from the GitHub GraphQL API, following edge cursors.
pub struct GitHubGraphQlFetcher {
    client: Client,
    api_base: String,
}

impl GitHubGraphQlFetcher {
    /// Creates a new `GitHubGraphQlFetcher` for the given endpoint.
    ///
    /// `api_base` is the REST API base URL the detail resources of the records point to.
    pub fn new(endpoint: &str, token: Option<&str>, api_base: &str) -> Self {
        let mut headers = HashMap::from([("User-Agent".to_string(), "gql-client".to_string())]);
        match token {
            Some(token) => {
                headers.insert("Authorization".to_string(), format!("Bearer {token}"));
            }
            None => warn!("The GitHub GraphQL API rejects unauthenticated requests"),
        }
        let client = Client::new_with_headers(endpoint, headers);

        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl PageFetcher for GitHubGraphQlFetcher {
    async fn fetch(
        &self,
        query: &SearchQuery,
        token: &PageToken,
        page_size: u16,
    ) -> Result<Page, FetchError> {
        let variables = GraphQlSearchQuery::try_new(query, token, page_size)?;
        let fetched_data = self
            .client
            .query_with_vars_unwrap::<SearchQueryData, GraphQlSearchQuery>(SEARCH_QUERY, variables)
            .await
            .map_err(FetchError::from)
            .inspect_err(|e| error!("GraphQL search failed for '{}': {e}", query.text()))?;
        let fetched = fetched_data.search.edges.len();
        let edges = fetched_data
            .search
            .edges
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        let next = edges
            .last()
            .map(|edge| PageToken::Cursor(edge.cursor.to_owned()));
        let records = edges
            .into_iter()
            .filter_map(|edge| {
                edge.node
                    .and_then(|node| node.into_record(&self.api_base))
            })
            .collect();

        Ok(Page::new(
            records,
            next,
            Some(fetched_data.search.repositoryCount),
        )
        .with_fetched(fetched))
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use crate::GITHUB_API_ENDPOINT;

    use super::*;

    fn mock_json_value() -> serde_json::Value {
        json!({
            "data": {
                "search": {
                    "repositoryCount": 2,
                    "edges": [
                        {
                            "cursor": "cursor-1",
                            "node": {
                                "name": "repository-1",
                                "owner": { "login": "org-1" },
                                "description": "A digital twin",
                                "url": "https://github.com/org-1/repository-1",
                                "stargazerCount": 100,
                                "forkCount": 5,
                                "primaryLanguage": { "name": "Python" },
                                "issues": { "totalCount": 4 }
                            }
                        },
                        null,
                        {
                            "cursor": "cursor-2",
                            "node": {
                                "name": "repository-2",
                                "owner": { "login": "org-1" },
                                "description": null,
                                "url": "https://github.com/org-1/repository-2",
                                "stargazerCount": 200,
                                "forkCount": 0,
                                "primaryLanguage": null,
                                "issues": { "totalCount": 0 }
                            }
                        }
                    ]
                }
            }
        })
    }

    #[tokio::test]
    async fn fetch_maps_edges_and_returns_last_cursor() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/")
                    .header("Authorization", "Bearer credentials")
                    .body_contains("digital twin pushed:2014-01-01..2014-01-31 sort:updated-asc");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .json_body(mock_json_value());
            })
            .await;
        let fetcher = GitHubGraphQlFetcher::new(
            &server.url("/"),
            Some("credentials"),
            "https://github.example.com/api/v3/",
        );
        let window = crate::DateWindow::month_of(
            chrono::NaiveDate::from_ymd_opt(2014, 1, 1).unwrap(),
        );
        let query =
            SearchQuery::new("digital twin", Some("updated-asc".to_string())).with_window(window);

        let page = fetcher.fetch(&query, &PageToken::Start, 100).await.unwrap();

        mock.assert_async().await;
        assert_eq!(2, page.records().len());
        assert_eq!(3, page.fetched());
        assert_eq!(Some(2), page.total_count());
        assert_eq!(
            Some(&PageToken::Cursor("cursor-2".to_string())),
            page.next()
        );
        let record = &page.records()[0];
        assert_eq!("https://github.com/org-1/repository-1", record.url);
        assert_eq!(Some("Python".to_string()), record.language);
        assert_eq!(Some(4), record.open_issues);
        assert_eq!(
            Some("https://github.example.com/api/v3/repos/org-1/repository-1".to_string()),
            record.api_url
        );
    }

    #[tokio::test]
    async fn fetch_sends_cursor() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/").body_contains("cursor-1");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .json_body(json!({
                        "data": { "search": { "repositoryCount": 0, "edges": [] } }
                    }));
            })
            .await;
        let fetcher =
            GitHubGraphQlFetcher::new(&server.url("/"), Some("credentials"), GITHUB_API_ENDPOINT);

        let page = fetcher
            .fetch(
                &SearchQuery::dummy(),
                &PageToken::Cursor("cursor-1".to_string()),
                100,
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(page.records().is_empty());
        assert!(page.next().is_none());
    }

    #[tokio::test]
    async fn fetch_rejects_offset_tokens() {
        let fetcher =
            GitHubGraphQlFetcher::new("http://localhost:1/", None, GITHUB_API_ENDPOINT);

        let error = fetcher
            .fetch(&SearchQuery::dummy(), &PageToken::Offset(2), 100)
            .await
            .expect_err("Expected an unsupported token error");

        assert!(matches!(error, FetchError::UnsupportedToken(_)));
    }
}
