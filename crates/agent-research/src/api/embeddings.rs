//! Feature-extraction embedding client
//!
//! Any endpoint speaking the Hugging Face feature-extraction protocol works:
//! `{"inputs": [...]}` in, one vector per input out.

use super::{Embedder, check_status};
use crate::config::EmbeddingSettings;
use crate::error::{ResearchError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::instrument;

/// HTTP embedding client
pub struct HttpEmbedder {
    client: Client,
    settings: EmbeddingSettings,
    dimension: usize,
}

impl HttpEmbedder {
    /// Create a client for a model producing `dimension`-sized vectors
    pub fn new(settings: EmbeddingSettings, dimension: usize, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            settings,
            dimension,
        })
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self.client.post(&self.settings.url).json(&json!({
            "inputs": texts,
            "options": {"wait_for_model": true},
        }));
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ResearchError::Api(format!("Embedding request failed: {e}")))?;
        let vectors: Vec<Vec<f32>> = check_status("Embedding", response).await?.json().await?;

        check_vectors(&vectors, texts.len(), self.dimension)?;
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

fn check_vectors(vectors: &[Vec<f32>], expected: usize, dimension: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(ResearchError::Api(format!(
            "expected {expected} embeddings, got {}",
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(ResearchError::Api(format!(
            "embedding dimension {} does not match index dimension {dimension}",
            bad.len()
        )));
    }
    Ok(())
}
