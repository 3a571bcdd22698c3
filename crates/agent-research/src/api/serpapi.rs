//! SerpAPI Google search client

use super::{SearchHit, SearchProvider, SearchScope, check_status, require};
use crate::config::WebSettings;
use crate::error::{ResearchError, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

const SEARCH_URL: &str = "https://serpapi.com/search.json";

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news_results: Vec<RawResult>,
    #[serde(default)]
    organic_results: Vec<RawResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    // a plain string on organic results, an object with `name` on news
    #[serde(default)]
    source: Option<Value>,
    #[serde(default)]
    date: Option<String>,
}

impl RawResult {
    fn source_name(&self) -> Option<String> {
        match self.source.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Object(map) => map.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        }
    }

    fn into_hit(self, scope: SearchScope, timestamp: &str) -> SearchHit {
        let source = self.source_name();
        match scope {
            SearchScope::News => SearchHit {
                kind: "news".to_string(),
                source: source.unwrap_or_default(),
                date: self.date.unwrap_or_default(),
                title: self.title,
                link: self.link,
                snippet: self.snippet,
                timestamp: timestamp.to_string(),
            },
            SearchScope::Web => SearchHit {
                kind: "trend".to_string(),
                source: source.unwrap_or_else(|| "website".to_string()),
                date: self.date.unwrap_or_else(|| "Recent".to_string()),
                title: self.title,
                link: self.link,
                snippet: self.snippet,
                timestamp: timestamp.to_string(),
            },
        }
    }
}

/// SerpAPI client with rate limiting
pub struct SerpApiClient {
    client: Client,
    settings: WebSettings,
    rate_limiter: SharedRateLimiter,
}

impl SerpApiClient {
    /// Create a new SerpAPI client
    pub fn new(settings: WebSettings, timeout: Duration) -> Result<Self> {
        let per_minute = NonZeroU32::new(settings.rate_limit).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            settings,
            rate_limiter,
        })
    }

    fn params(
        &self,
        api_key: &str,
        query: &str,
        scope: SearchScope,
        num: usize,
    ) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("api_key", api_key.to_string()),
            ("engine", "google".to_string()),
            ("q", query.to_string()),
            ("num", num.to_string()),
            ("tbs", "qdr:m".to_string()),
        ];
        if scope == SearchScope::News {
            params.push(("tbm", "nws".to_string()));
            params.push(("location", self.settings.location.clone()));
        }
        params
    }
}

#[async_trait]
impl SearchProvider for SerpApiClient {
    #[instrument(skip(self))]
    async fn search(&self, query: &str, scope: SearchScope, num: usize) -> Result<Vec<SearchHit>> {
        let api_key = require(self.settings.serpapi_key.as_ref(), "SERPAPI_API_KEY")?;
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(SEARCH_URL)
            .query(&self.params(api_key, query, scope, num))
            .send()
            .await
            .map_err(|e| ResearchError::Api(format!("SerpAPI request failed: {e}")))?;

        let body: SearchResponse = check_status("SerpAPI", response).await?.json().await?;
        parse_hits(body, scope, num)
    }
}

fn parse_hits(body: SearchResponse, scope: SearchScope, num: usize) -> Result<Vec<SearchHit>> {
    if let Some(error) = body.error {
        return Err(ResearchError::Api(format!("SerpAPI error: {error}")));
    }

    let raw = match scope {
        SearchScope::News => body.news_results,
        SearchScope::Web => body.organic_results,
    };
    let timestamp = chrono::Utc::now().to_rfc3339();
    let hits: Vec<SearchHit> = raw
        .into_iter()
        .take(num)
        .map(|r| r.into_hit(scope, &timestamp))
        .collect();
    debug!(count = hits.len(), ?scope, "search hits");
    Ok(hits)
}
