use anyhow::Context;
use log::warn;
use reqwest::{
    Client, RequestBuilder,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};

use crate::StdResult;

/// The REST production endpoint for GitHub.
pub const GITHUB_API_ENDPOINT: &str = "https://api.github.com";

const GITHUB_MEDIA_TYPE: &str = "application/vnd.github+json";

const USER_AGENT_VALUE: &str = concat!("repo-harvester/", env!("CARGO_PKG_VERSION"));

/// An HTTP session for the GitHub REST API: connection reuse plus default headers.
///
/// It is built once per run and only read afterwards.
#[derive(Debug, Clone)]
pub struct GitHubSession {
    client: Client,
    api_base: String,
    token: Option<String>,
}

impl GitHubSession {
    /// Creates a new `GitHubSession` for the given API base URL.
    ///
    /// Without a token, requests go out unauthenticated and are subject to the
    /// stricter anonymous rate limits.
    pub fn try_new(api_base: &str, token: Option<String>) -> StdResult<Self> {
        let token = token.filter(|token| !token.trim().is_empty());
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_MEDIA_TYPE));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        match &token {
            Some(token) => {
                let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .with_context(|| "Invalid characters in GitHub token")?;
                value.set_sensitive(true);
                headers.insert(AUTHORIZATION, value);
            }
            None => {
                warn!("No GitHub token provided, requests are sent unauthenticated");
            }
        }
        let client = Client::builder()
            .default_headers(headers)
            .build()
            .with_context(|| "Failed to build the HTTP client")?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Resolves a path against the API base URL. Absolute URLs are kept as is.
    pub fn url(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else {
            format!("{}/{}", self.api_base, path_or_url.trim_start_matches('/'))
        }
    }

    /// Starts a GET request.
    pub fn get(&self, path_or_url: &str) -> RequestBuilder {
        self.client.get(self.url(path_or_url))
    }

    /// Retrieves the token, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// Whether requests are authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;

    #[test]
    fn url_is_resolved_against_api_base() {
        let session = GitHubSession::try_new("https://api.github.com/", None).unwrap();

        assert_eq!(
            "https://api.github.com/rate_limit",
            session.url("/rate_limit")
        );
        assert_eq!(
            "https://api.github.com/repos/x/y/commits",
            session.url("https://api.github.com/repos/x/y/commits")
        );
    }

    #[test]
    fn blank_token_is_treated_as_missing() {
        let session = GitHubSession::try_new(GITHUB_API_ENDPOINT, Some("  ".to_string())).unwrap();

        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn requests_carry_default_headers() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rate_limit")
                    .header("Authorization", "Bearer credentials")
                    .header("Accept", GITHUB_MEDIA_TYPE);
                then.status(200);
            })
            .await;
        let session =
            GitHubSession::try_new(&server.base_url(), Some("credentials".to_string())).unwrap();

        let response = session.get("/rate_limit").send().await.unwrap();

        mock.assert_async().await;
        assert!(response.status().is_success());
    }
}
