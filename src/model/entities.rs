use std::{collections::HashMap, fmt::Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata of a collected repository.
///
/// Every field but the URL may be missing, depending on the source the record was
/// collected from and on whether it went through enrichment.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    /// The browsable URL of the repository, used as its identity.
    pub url: String,

    /// The name of the repository.
    pub name: Option<String>,

    /// The login of the repository owner.
    pub owner: Option<String>,

    /// The description of the repository.
    pub description: Option<String>,

    /// The number of stars.
    pub stars: Option<u32>,

    /// The number of forks.
    pub forks: Option<u32>,

    /// The main language.
    pub language: Option<String>,

    /// The number of contributors, resolved by enrichment.
    pub contributors: Option<u32>,

    /// The number of commits, resolved by enrichment.
    pub commits: Option<u32>,

    /// The number of open issues.
    pub open_issues: Option<u32>,

    /// The keyword whose search produced the record.
    pub search_keyword: Option<String>,

    /// The REST resource URL detail lookups are derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

impl Record {
    /// Creates a new `Record` with only its URL set.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }

    /// Returns the deduplication key of the record.
    pub fn key(&self) -> String {
        super::normalize_url(&self.url)
    }

    /// Fills the missing fields of the record with the ones of `other`.
    pub fn fill_from(&mut self, other: &Record) {
        fn fill<T: Clone>(target: &mut Option<T>, source: &Option<T>) {
            if target.is_none() {
                target.clone_from(source);
            }
        }

        fill(&mut self.name, &other.name);
        fill(&mut self.owner, &other.owner);
        fill(&mut self.description, &other.description);
        fill(&mut self.stars, &other.stars);
        fill(&mut self.forks, &other.forks);
        fill(&mut self.language, &other.language);
        fill(&mut self.contributors, &other.contributors);
        fill(&mut self.commits, &other.commits);
        fill(&mut self.open_issues, &other.open_issues);
        fill(&mut self.search_keyword, &other.search_keyword);
        fill(&mut self.api_url, &other.api_url);
    }

    /// Creates a dummy `Record` for testing purposes.
    #[cfg(test)]
    pub(crate) fn dummy(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            owner: Some("org-1".to_string()),
            stars: Some(10),
            ..Self::new(&format!("https://github.com/org-1/{name}"))
        }
    }
}

impl Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Record: {}, Name: {}, Stars: {}",
            self.url,
            self.name.as_deref().unwrap_or("-"),
            self.stars.map(|stars| stars.to_string()).unwrap_or("-".to_string())
        )
    }
}

/// A named quota bucket tracked independently by the remote API.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitCategory {
    /// General API calls.
    Core,
    /// Search API calls.
    Search,
    /// GraphQL API calls.
    #[serde(rename = "graphql")]
    GraphQl,
}

impl RateLimitCategory {
    /// The label of the category in the rate limit status payload.
    pub fn label(&self) -> &'static str {
        match self {
            RateLimitCategory::Core => "core",
            RateLimitCategory::Search => "search",
            RateLimitCategory::GraphQl => "graphql",
        }
    }
}

impl Display for RateLimitCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The quota of one rate limit category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitBucket {
    /// The maximum number of calls in the current period.
    pub limit: u32,
    /// The number of calls already made in the current period.
    pub used: u32,
    /// The number of calls left in the current period.
    pub remaining: u32,
    /// The time at which the quota resets.
    pub reset_at: DateTime<Utc>,
}

impl RateLimitBucket {
    /// Whether no call is left in the current period.
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    /// Creates a dummy `RateLimitBucket` for testing purposes.
    #[cfg(test)]
    pub fn dummy(remaining: u32, reset_at: DateTime<Utc>) -> Self {
        Self {
            limit: 30,
            used: 30 - remaining.min(30),
            remaining,
            reset_at,
        }
    }
}

impl Display for RateLimitBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "calls={}/{}, remaining={}, reset={}",
            self.used,
            self.limit,
            self.remaining,
            self.reset_at.to_rfc3339()
        )
    }
}

/// A read-only mirror of the remote rate limit state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateLimitStatus {
    buckets: HashMap<RateLimitCategory, RateLimitBucket>,
}

impl RateLimitStatus {
    /// Creates a new `RateLimitStatus` from its buckets.
    pub fn new(buckets: HashMap<RateLimitCategory, RateLimitBucket>) -> Self {
        Self { buckets }
    }

    /// Retrieves the bucket of a category.
    pub fn bucket(&self, category: RateLimitCategory) -> Option<&RateLimitBucket> {
        self.buckets.get(&category)
    }

    /// Creates a `RateLimitStatus` holding a single bucket for testing purposes.
    #[cfg(test)]
    pub fn single(category: RateLimitCategory, bucket: RateLimitBucket) -> Self {
        Self::new(HashMap::from([(category, bucket)]))
    }
}
