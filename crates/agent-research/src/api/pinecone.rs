//! Pinecone REST client
//!
//! Talks to the index data plane (`/query`, `/vectors/upsert`,
//! `/describe_index_stats`). When no data-plane host is configured, the host
//! is looked up once through the control plane by index name.

use super::{IndexStats, VectorIndex, VectorMatch, VectorRecord, check_status, require};
use crate::config::PineconeSettings;
use crate::error::{ResearchError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
const UPSERT_BATCH: usize = 100;

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    dimension: usize,
    #[serde(default)]
    total_vector_count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
}

/// Pinecone index client
pub struct PineconeClient {
    client: Client,
    settings: PineconeSettings,
    host: OnceCell<String>,
}

impl PineconeClient {
    /// Create a client with a request timeout
    pub fn new(settings: PineconeSettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let host = OnceCell::new_with(settings.index_host.as_deref().map(normalize_host));
        Ok(Self {
            client,
            settings,
            host,
        })
    }

    fn api_key(&self) -> Result<&str> {
        require(self.settings.api_key.as_ref(), "PINECONE_API_KEY")
    }

    async fn host(&self) -> Result<&str> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let description = self.describe_index().await?;
                Ok::<_, ResearchError>(normalize_host(&description.host))
            })
            .await?;
        Ok(host.as_str())
    }

    async fn describe_index(&self) -> Result<IndexDescription> {
        let url = format!("{CONTROL_PLANE_URL}/indexes/{}", self.settings.index_name);
        let response = self
            .client
            .get(&url)
            .header("Api-Key", self.api_key()?)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| ResearchError::Api(format!("Pinecone request failed: {e}")))?;

        let response = check_status("Pinecone", response).await?;
        Ok(response.json().await?)
    }

    /// Create the serverless index if it does not exist yet
    #[instrument(skip(self), fields(index = %self.settings.index_name))]
    pub async fn ensure_index(&self) -> Result<()> {
        let url = format!("{CONTROL_PLANE_URL}/indexes/{}", self.settings.index_name);
        let response = self
            .client
            .get(&url)
            .header("Api-Key", self.api_key()?)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .map_err(|e| ResearchError::Api(format!("Pinecone request failed: {e}")))?;

        if response.status().is_success() {
            info!("index already exists");
            return Ok(());
        }
        if response.status() != reqwest::StatusCode::NOT_FOUND {
            check_status("Pinecone", response).await?;
            return Ok(());
        }

        let body = json!({
            "name": self.settings.index_name,
            "dimension": self.settings.dimension,
            "metric": "cosine",
            "spec": {"serverless": {"cloud": "aws", "region": "us-east-1"}},
        });
        let response = self
            .client
            .post(format!("{CONTROL_PLANE_URL}/indexes"))
            .header("Api-Key", self.api_key()?)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResearchError::Api(format!("Pinecone request failed: {e}")))?;
        check_status("Pinecone", response).await?;
        info!("index created");
        Ok(())
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        let url = format!("{}{path}", self.host().await?);
        let response = self
            .client
            .post(&url)
            .header("Api-Key", self.api_key()?)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| ResearchError::Api(format!("Pinecone request failed: {e}")))?;
        check_status("Pinecone", response).await
    }

    fn query_body(&self, vector: Vec<f32>, top_k: usize, filter: Option<Value>) -> Value {
        let mut body = json!({
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
        });
        if let Some(filter) = filter {
            body["filter"] = filter;
        }
        if let Some(namespace) = &self.settings.namespace {
            body["namespace"] = json!(namespace);
        }
        body
    }
}

#[async_trait]
impl VectorIndex for PineconeClient {
    #[instrument(skip(self, vector, filter))]
    async fn query(
        &self,
        vector: Vec<f32>,
        top_k: usize,
        filter: Option<Value>,
    ) -> Result<Vec<VectorMatch>> {
        let body = self.query_body(vector, top_k, filter);
        let response: QueryResponse = self.post("/query", &body).await?.json().await?;
        debug!(matches = response.matches.len(), "pinecone query");
        Ok(response.matches)
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        let mut total = 0;
        for batch in records.chunks(UPSERT_BATCH) {
            let mut body = json!({ "vectors": batch });
            if let Some(namespace) = &self.settings.namespace {
                body["namespace"] = json!(namespace);
            }
            let response: UpsertResponse = self.post("/vectors/upsert", &body).await?.json().await?;
            total += response.upserted_count;
        }
        Ok(total)
    }

    async fn describe_stats(&self) -> Result<IndexStats> {
        let stats: StatsResponse = self
            .post("/describe_index_stats", &json!({}))
            .await?
            .json()
            .await?;
        Ok(IndexStats {
            total_vector_count: stats.total_vector_count,
            dimension: stats.dimension,
        })
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(namespace: Option<&str>) -> PineconeClient {
        let settings = PineconeSettings {
            api_key: Some("key".to_string()),
            index_host: Some("idx-abc.svc.pinecone.io".to_string()),
            namespace: namespace.map(str::to_string),
            ..PineconeSettings::default()
        };
        PineconeClient::new(settings, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_normalize_host() {
        assert_eq!(normalize_host("idx.pinecone.io/"), "https://idx.pinecone.io");
        assert_eq!(normalize_host("http://localhost:5080"), "http://localhost:5080");
    }

    #[tokio::test]
    async fn test_configured_host_skips_lookup() {
        let client = client(None);
        assert_eq!(client.host().await.unwrap(), "https://idx-abc.svc.pinecone.io");
    }

    #[test]
    fn test_query_body() {
        let filter = json!({"$or": [{"year": {"$eq": "2024"}}]});
        let body = client(Some("reports")).query_body(vec![0.1, 0.2], 20, Some(filter.clone()));
        assert_eq!(body["topK"], 20);
        assert_eq!(body["includeMetadata"], true);
        assert_eq!(body["filter"], filter);
        assert_eq!(body["namespace"], "reports");

        let body = client(None).query_body(vec![0.1], 5, None);
        assert!(body.get("filter").is_none());
        assert!(body.get("namespace").is_none());
    }

    #[test]
    fn test_missing_key() {
        let client =
            PineconeClient::new(PineconeSettings::default(), Duration::from_secs(5)).unwrap();
        assert!(matches!(client.api_key(), Err(ResearchError::Config(_))));
    }
}
