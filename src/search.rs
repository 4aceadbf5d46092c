use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::config::Search as SearchConfig;
use crate::model::RemoteItem;

/// Page size used when a work unit does not configure one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery<'a> {
    pub term: &'a str,
    pub limit: u32,
    pub since: Option<&'a str>,
}

/// One fetched batch plus the high-water-mark the API reported for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub items: Vec<RemoteItem>,
    pub high_water_mark: Option<String>,
}

#[async_trait]
pub trait SearchSource: Send + Sync {
    async fn search(&self, query: &SearchQuery<'_>) -> Result<SearchPage>;
}

#[derive(Clone)]
pub struct SearchClient {
    http: Client,
    endpoint: Url,
}

impl fmt::Debug for SearchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl SearchClient {
    pub fn new(endpoint: Url, user_agent: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .context("failed to build search HTTP client")?;
        Ok(Self { http, endpoint })
    }

    pub fn from_config(cfg: &SearchConfig) -> Result<Self> {
        let endpoint = cfg.endpoint()?;
        Self::new(endpoint, cfg.user_agent.trim(), cfg.timeout())
    }

    pub fn build_request(&self, query: &SearchQuery<'_>) -> Result<reqwest::Request> {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("q", query.term);
            if let Some(since) = query.since {
                pairs.append_pair("since_id", since);
            }
            pairs.append_pair("rpp", &query.limit.to_string());
        }
        self.http
            .get(url)
            .header(ACCEPT, "application/json")
            .build()
            .context("failed to build search request")
    }
}

#[async_trait]
impl SearchSource for SearchClient {
    async fn search(&self, query: &SearchQuery<'_>) -> Result<SearchPage> {
        let request = self.build_request(query)?;
        debug!(url = %request.url(), "fetching search results");
        let res = self
            .http
            .execute(request)
            .await
            .context("failed to reach search API")?;

        if res.status() == StatusCode::TOO_MANY_REQUESTS {
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("received 429 from search API: {}", body));
        }
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(anyhow!("search API error {}: {}", status, body));
        }

        let body = res
            .text()
            .await
            .context("failed to read search response")?;
        parse_search_page(&body)
    }
}

/// Decode a search API response body. A missing `results` list is an empty
/// batch; a non-empty batch must carry `max_id_str`.
pub fn parse_search_page(body: &str) -> Result<SearchPage> {
    let payload: SearchResponse =
        serde_json::from_str(body).context("invalid search response JSON")?;
    let high_water_mark = payload.max_id_str.filter(|s| !s.is_empty());
    if !payload.results.is_empty() && high_water_mark.is_none() {
        return Err(anyhow!(
            "search response has {} results but no max_id_str",
            payload.results.len()
        ));
    }
    Ok(SearchPage {
        items: payload.results.into_iter().map(RemoteItem::from).collect(),
        high_water_mark,
    })
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
    #[serde(default)]
    max_id_str: Option<String>,
}

#[derive(Deserialize)]
struct SearchResult {
    id_str: String,
    from_user: String,
    #[serde(default)]
    from_user_name: Option<String>,
    #[serde(default)]
    text: String,
    #[serde(default)]
    created_at: String,
}

impl From<SearchResult> for RemoteItem {
    fn from(r: SearchResult) -> Self {
        RemoteItem {
            id: r.id_str,
            author: r.from_user,
            author_name: r.from_user_name,
            text: r.text,
            created_at: r.created_at,
        }
    }
}
