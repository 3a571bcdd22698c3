//! Quarterly-report retrieval over the vector index

use super::{ToolAdapter, ToolOutput};
use crate::api::{Embedder, VectorIndex, VectorMatch, embed_one};
use crate::error::Result;
use crate::llm::LlmClient;
use crate::prompts::{Prompts, RAG_ANSWER};
use agent_core::{MetadataFilters, ToolKind};
use async_trait::async_trait;
use minijinja::context;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Reply when the filtered search finds nothing
pub const NO_MATCHES: &str = "No relevant information found for the specified year and quarters.";

const SAMPLE_TOP_K: usize = 500;
const SAMPLES_PER_QUARTER: usize = 3;
const PREVIEW_CHARS: usize = 200;

/// Year/quarter predicate: an OR over years, each matching its quarters
///
/// Years without quarters are skipped. `None` when nothing remains, in which
/// case the query runs unfiltered.
pub fn build_filter(filters: &MetadataFilters) -> Option<Value> {
    let clauses: Vec<Value> = filters
        .iter()
        .filter(|(_, quarters)| !quarters.is_empty())
        .map(|(year, quarters)| {
            json!({
                "year": {"$eq": year},
                "quarter": {"$in": quarters.iter().collect::<Vec<_>>()},
            })
        })
        .collect();

    if clauses.is_empty() {
        None
    } else {
        Some(json!({ "$or": clauses }))
    }
}

/// One sampled chunk in a data check
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkSample {
    pub id: String,
    pub score: f32,
    pub header: String,
    pub text_preview: String,
}

/// What the index holds, grouped year -> quarter
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSample {
    pub total_vectors: u64,
    pub data: BTreeMap<String, BTreeMap<String, Vec<ChunkSample>>>,
}

impl IndexSample {
    /// Years that have at least one chunk
    pub fn years_available(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }
}

/// Vector search over quarterly reports with an LLM answer on top
pub struct RagSearch {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    llm: LlmClient,
    prompts: Arc<Prompts>,
    top_k: usize,
}

impl RagSearch {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        llm: LlmClient,
        prompts: Arc<Prompts>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            llm,
            prompts,
            top_k,
        }
    }

    /// Answer a query from the report chunks matching the filters
    #[instrument(skip(self, filters))]
    pub async fn search(&self, query: &str, filters: &MetadataFilters) -> Result<String> {
        let vector = embed_one(self.embedder.as_ref(), query).await?;
        let filter = build_filter(filters);
        debug!(?filter, "vector filter");

        let matches = self.index.query(vector, self.top_k, filter).await?;
        if matches.is_empty() {
            warn!("no matches for the selected year/quarter combinations");
            return Ok(NO_MATCHES.to_string());
        }
        info!(matches = matches.len(), "retrieved report chunks");

        let context = matches.iter().map(context_line).collect::<Vec<_>>().join("\n");
        let prompt = self
            .prompts
            .render(RAG_ANSWER, context! { query, context })?;
        self.llm.generate(&prompt).await
    }

    /// Sample the index contents for diagnostics; `None` when it is empty
    pub async fn data_check(&self) -> Result<Option<IndexSample>> {
        let stats = self.index.describe_stats().await?;
        if stats.total_vector_count == 0 {
            return Ok(None);
        }

        let dimension = if stats.dimension > 0 {
            stats.dimension
        } else {
            self.embedder.dimension()
        };
        let matches = self
            .index
            .query(vec![0.0; dimension], SAMPLE_TOP_K, None)
            .await?;

        let mut data: BTreeMap<String, BTreeMap<String, Vec<ChunkSample>>> = BTreeMap::new();
        for m in &matches {
            let year = m.meta("year").unwrap_or_else(|| "Unknown".to_string());
            let quarter = m.meta("quarter").unwrap_or_else(|| "Unknown".to_string());
            let samples = data.entry(year).or_default().entry(quarter).or_default();
            if samples.len() < SAMPLES_PER_QUARTER {
                samples.push(sample(m));
            }
        }

        Ok(Some(IndexSample {
            total_vectors: stats.total_vector_count,
            data,
        }))
    }
}

fn context_line(m: &VectorMatch) -> String {
    format!(
        "Year: {}, Quarter: {} - {}",
        m.meta("year").unwrap_or_default(),
        m.meta("quarter").unwrap_or_default(),
        m.meta("text").unwrap_or_default()
    )
}

fn sample(m: &VectorMatch) -> ChunkSample {
    let text_preview = match m.meta("text") {
        Some(text) => format!("{}...", text.chars().take(PREVIEW_CHARS).collect::<String>()),
        None => "No text".to_string(),
    };
    ChunkSample {
        id: m.id.clone(),
        score: m.score,
        header: m.meta("header").unwrap_or_else(|| "No header".to_string()),
        text_preview,
    }
}

#[async_trait]
impl ToolAdapter for RagSearch {
    fn kind(&self) -> ToolKind {
        ToolKind::Rag
    }

    async fn run(&self, query: &str, filters: &MetadataFilters) -> Result<ToolOutput> {
        self.search(query, filters).await.map(ToolOutput::text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FixedEmbedder, MemoryIndex, ScriptedLlm, report_match};

    fn filters(entries: &[(&str, &[&str])]) -> MetadataFilters {
        entries
            .iter()
            .map(|(year, quarters)| {
                (
                    (*year).to_string(),
                    quarters.iter().map(|q| (*q).to_string()).collect(),
                )
            })
            .collect()
    }

    fn rag(index: Arc<MemoryIndex>, llm: &ScriptedLlm) -> RagSearch {
        RagSearch::new(
            Arc::new(FixedEmbedder(384)),
            index,
            llm.client(),
            Arc::new(Prompts::new("NVIDIA").unwrap()),
            20,
        )
    }

    #[test]
    fn test_build_filter() {
        let filter = build_filter(&filters(&[("2023", &["4"]), ("2024", &["1", "2"])])).unwrap();
        assert_eq!(
            filter,
            json!({"$or": [
                {"year": {"$eq": "2023"}, "quarter": {"$in": ["4"]}},
                {"year": {"$eq": "2024"}, "quarter": {"$in": ["1", "2"]}},
            ]})
        );
    }

    #[test]
    fn test_build_filter_skips_empty_years() {
        let filter = build_filter(&filters(&[("2023", &[]), ("2024", &["3"])])).unwrap();
        assert_eq!(filter["$or"].as_array().unwrap().len(), 1);
        assert!(build_filter(&filters(&[("2023", &[])])).is_none());
        assert!(build_filter(&MetadataFilters::new()).is_none());
    }

    #[tokio::test]
    async fn test_search_builds_context() {
        let index = Arc::new(MemoryIndex::with_matches(vec![
            report_match("2024_1_0", "2024", "1", "Data center revenue was $22.6 billion"),
            report_match("2024_1_1", "2024", "1", "Gaming revenue was $2.6 billion"),
        ]));
        let llm = ScriptedLlm::new("Data center drove growth.");
        let adapter = rag(index.clone(), &llm);

        let answer = adapter
            .search("data center revenue", &filters(&[("2024", &["1"])]))
            .await
            .unwrap();
        assert_eq!(answer, "Data center drove growth.");

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("Year: 2024, Quarter: 1 - Data center revenue was $22.6 billion"));
        assert!(prompt.contains("Question: data center revenue"));
        assert!(index.filters.lock().unwrap()[0].is_some());
    }

    #[tokio::test]
    async fn test_no_matches_skips_llm() {
        let llm = ScriptedLlm::new("unused");
        let adapter = rag(Arc::new(MemoryIndex::default()), &llm);
        let answer = adapter.search("q", &filters(&[("2024", &["1"])])).await.unwrap();
        assert_eq!(answer, NO_MATCHES);
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_data_check_groups_and_caps() {
        let matches = (0..5)
            .map(|i| report_match(&format!("2024_1_{i}"), "2024", "1", &"x".repeat(300)))
            .chain(std::iter::once(report_match("2023_4_0", "2023", "4", "short")))
            .collect();
        let adapter = rag(Arc::new(MemoryIndex::with_matches(matches)), &ScriptedLlm::new(""));

        let sample = adapter.data_check().await.unwrap().unwrap();
        assert_eq!(sample.total_vectors, 6);
        assert_eq!(sample.years_available(), vec!["2023", "2024"]);
        let q1 = &sample.data["2024"]["1"];
        assert_eq!(q1.len(), 3);
        assert_eq!(q1[0].text_preview.len(), 203);
        assert_eq!(sample.data["2023"]["4"][0].text_preview, "short...");
    }

    #[tokio::test]
    async fn test_data_check_empty_index() {
        let adapter = rag(Arc::new(MemoryIndex::default()), &ScriptedLlm::new(""));
        assert!(adapter.data_check().await.unwrap().is_none());
    }
}
