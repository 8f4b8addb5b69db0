//! Search types for `GET /search`.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::TaskId;

/// Result ordering understood by the search endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Relevance,
    DateDesc,
    DateAsc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Relevance => "relevance",
            SortOrder::DateDesc => "date_desc",
            SortOrder::DateAsc => "date_asc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(SortOrder::Relevance),
            "date_desc" => Ok(SortOrder::DateDesc),
            "date_asc" => Ok(SortOrder::DateAsc),
            other => Err(format!(
                "unknown sort order '{other}' (expected relevance, date_desc or date_asc)"
            )),
        }
    }
}

/// Filters and paging applied on top of the query text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct SearchOptions {
    pub completed: Option<bool>,
    pub sort: Option<SortOrder>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// One search request. Also the cache key for search results.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQuery {
    pub q: String,
    pub options: SearchOptions,
}

impl SearchQuery {
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            options: SearchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// Query-string pairs. `q` is always sent; the rest only when set,
    /// and `limit` / `offset` only when non-zero.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![("q", self.q.clone())];
        if let Some(completed) = self.options.completed {
            pairs.push(("completed", completed.to_string()));
        }
        if let Some(sort) = self.options.sort {
            pairs.push(("sort", sort.as_str().to_string()));
        }
        if let Some(limit) = self.options.limit.filter(|n| *n > 0) {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.options.offset.filter(|n| *n > 0) {
            pairs.push(("offset", offset.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Relevance score; higher is better.
    pub score: f64,
    /// field name -> highlighted fragments (`<mark>` wrapped).
    #[serde(default)]
    pub highlights: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total: u64,
    pub page: u32,
    pub total_pages: u32,
}
