//! Backend clients
//!
//! Each external service sits behind a narrow trait so the graph can be
//! driven entirely by in-memory fakes in tests. The HTTP implementations
//! live in the submodules.

pub mod embeddings;
pub mod pinecone;
pub mod quickchart;
pub mod serpapi;
pub mod snowflake;
pub mod yahoo;

pub use embeddings::HttpEmbedder;
pub use pinecone::PineconeClient;
pub use quickchart::QuickChartRenderer;
pub use serpapi::SerpApiClient;
pub use snowflake::SnowflakeClient;
pub use yahoo::YahooQuotes;

use crate::error::{ResearchError, Result};
use crate::table::Table;
use agent_core::ChartKind;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Turns text into dense vectors
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, one vector per input
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Vector dimension produced by the model
    fn dimension(&self) -> usize;
}

/// Embed a single text
pub async fn embed_one(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    embedder
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| ResearchError::Api("embedding service returned no vectors".to_string()))
}

/// A scored match returned by a vector query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    /// Record id
    pub id: String,
    /// Similarity score
    #[serde(default)]
    pub score: f32,
    /// Stored metadata
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl VectorMatch {
    /// Metadata value rendered as a string; numbers are stringified
    pub fn meta(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// A vector to upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Record id
    pub id: String,
    /// Embedding
    pub values: Vec<f32>,
    /// Metadata stored alongside the vector
    pub metadata: Map<String, Value>,
}

/// Summary statistics of a vector index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Number of stored vectors
    pub total_vector_count: u64,
    /// Index dimension
    pub dimension: usize,
}

/// Similarity search over stored vectors
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Top-k matches for a vector, optionally constrained by a metadata filter
    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: Option<Value>,
    ) -> Result<Vec<VectorMatch>>;

    /// Insert or replace records
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize>;

    /// Index size and dimension
    async fn describe_stats(&self) -> Result<IndexStats>;
}

/// Executes SQL against the financial data warehouse
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Run one statement and return its rows
    async fn execute(&self, sql: &str) -> Result<Table>;
}

/// Which vertical a web search targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchScope {
    /// News vertical
    News,
    /// General web results
    Web,
}

/// One web search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    /// `news` or `trend`
    #[serde(rename = "type")]
    pub kind: String,
    /// Result title
    pub title: String,
    /// Target URL
    pub link: String,
    /// Snippet text
    pub snippet: String,
    /// Publisher
    pub source: String,
    /// Publication date as reported by the provider
    pub date: String,
    /// When the result was fetched (RFC 3339)
    pub timestamp: String,
}

/// Web search provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run a search and return up to `num` hits
    async fn search(&self, query: &str, scope: SearchScope, num: usize) -> Result<Vec<SearchHit>>;
}

/// A named series of values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Legend label
    pub name: String,
    /// One value per x label
    pub values: Vec<f64>,
}

/// Data needed to draw one chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Chart type
    pub kind: ChartKind,
    /// Title
    pub title: String,
    /// X-axis labels
    pub labels: Vec<String>,
    /// Plotted series
    pub series: Vec<Series>,
}

/// Renders a chart and returns a hosted image URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChartRenderer: Send + Sync {
    /// Render and host a chart
    async fn render(&self, spec: &ChartSpec) -> Result<String>;
}

/// One trading day of prices
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Rescale open, high and low so that the close becomes `adjclose`
    pub fn adjusted(self, adjclose: f64) -> Self {
        if self.close.abs() < f64::EPSILON || !adjclose.is_finite() {
            return self;
        }
        let factor = adjclose / self.close;
        Self {
            open: self.open * factor,
            high: self.high * factor,
            low: self.low * factor,
            close: adjclose,
            ..self
        }
    }
}

/// Daily price history provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Bars between `start` and `end`, oldest first
    async fn daily_history(
        &self,
        ticker: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>>;
}

/// Read an error body and turn a non-success response into [`ResearchError::Api`]
pub(crate) async fn check_status(
    service: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(ResearchError::Api(format!("{service} API error {status}: {body}")))
}

/// Fail fast when a credential is missing
pub(crate) fn require<'a>(value: Option<&'a String>, what: &str) -> Result<&'a str> {
    value
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ResearchError::Config(format!("{what} is not configured")))
}
