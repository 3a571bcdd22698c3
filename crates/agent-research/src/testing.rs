//! In-memory fakes shared by the unit tests

use crate::api::{
    ChartRenderer, ChartSpec, Embedder, IndexStats, SearchHit, SearchProvider, SearchScope,
    VectorIndex, VectorMatch, VectorRecord, Warehouse,
};
use crate::error::{ResearchError, Result};
use crate::llm::LlmClient;
use crate::table::Table;
use agent_llm::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, StopReason, TokenUsage,
};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::sync::{Arc, Mutex};

enum Reply {
    Text(String),
    Fail,
}

/// LLM that answers by matching substrings of the prompt
#[derive(Clone)]
pub struct ScriptedLlm {
    rules: Arc<Mutex<Vec<(String, Reply)>>>,
    default: String,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ScriptedLlm {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            rules: Arc::new(Mutex::new(Vec::new())),
            default: default.into(),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer `reply` to any prompt containing `needle`; first match wins
    pub fn reply(self, needle: &str, reply: &str) -> Self {
        self.rules
            .lock()
            .unwrap()
            .push((needle.to_string(), Reply::Text(reply.to_string())));
        self
    }

    /// Fail any prompt containing `needle`
    pub fn fail_on(self, needle: &str) -> Self {
        self.rules.lock().unwrap().push((needle.to_string(), Reply::Fail));
        self
    }

    pub fn client(&self) -> LlmClient {
        LlmClient::new(Arc::new(self.clone()), "test-model")
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn prompts_containing(&self, needle: &str) -> Vec<String> {
        self.prompts()
            .into_iter()
            .filter(|p| p.contains(needle))
            .collect()
    }
}

#[async_trait]
impl LLMProvider for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> agent_llm::Result<CompletionResponse> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt.clone());

        let rules = self.rules.lock().unwrap();
        let text = match rules.iter().find(|(needle, _)| prompt.contains(needle.as_str())) {
            Some((_, Reply::Fail)) => {
                return Err(LLMError::RequestFailed("scripted failure".to_string()));
            }
            Some((_, Reply::Text(text))) => text.clone(),
            None => self.default.clone(),
        };

        Ok(CompletionResponse {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage::default(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Embedder returning a constant vector
pub struct FixedEmbedder(pub usize);

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|_| vec![0.1; self.0]).collect())
    }

    fn dimension(&self) -> usize {
        self.0
    }
}

/// Vector index with canned matches that records what it was asked
#[derive(Default)]
pub struct MemoryIndex {
    pub matches: Vec<VectorMatch>,
    pub filters: Mutex<Vec<Option<Value>>>,
    pub upserted: Mutex<Vec<VectorRecord>>,
    pub fail: bool,
}

impl MemoryIndex {
    pub fn with_matches(matches: Vec<VectorMatch>) -> Self {
        Self {
            matches,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn query(
        &self,
        _vector: Vec<f32>,
        top_k: usize,
        filter: Option<Value>,
    ) -> Result<Vec<VectorMatch>> {
        if self.fail {
            return Err(ResearchError::Api("index unavailable".to_string()));
        }
        self.filters.lock().unwrap().push(filter);
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        let count = records.len();
        self.upserted.lock().unwrap().extend(records);
        Ok(count)
    }

    async fn describe_stats(&self) -> Result<IndexStats> {
        if self.fail {
            return Err(ResearchError::Api("index unavailable".to_string()));
        }
        Ok(IndexStats {
            total_vector_count: self.matches.len() as u64,
            dimension: 384,
        })
    }
}

/// Report-chunk match with the metadata written at ingestion time
pub fn report_match(id: &str, year: &str, quarter: &str, text: &str) -> VectorMatch {
    let mut metadata = Map::new();
    metadata.insert("year".to_string(), json!(year));
    metadata.insert("quarter".to_string(), json!(quarter));
    metadata.insert("text".to_string(), json!(text));
    metadata.insert("header".to_string(), json!("Revenue"));
    VectorMatch {
        id: id.to_string(),
        score: 0.8,
        metadata,
    }
}

/// Warehouse returning the same table for every statement
pub struct FixedWarehouse {
    pub table: Option<Table>,
    pub statements: Mutex<Vec<String>>,
}

impl FixedWarehouse {
    pub fn new(table: Table) -> Self {
        Self {
            table: Some(table),
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            table: None,
            statements: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Warehouse for FixedWarehouse {
    async fn execute(&self, sql: &str) -> Result<Table> {
        self.statements.lock().unwrap().push(sql.to_string());
        self.table
            .clone()
            .ok_or_else(|| ResearchError::Api("warehouse offline".to_string()))
    }
}

/// Daily price table shaped like the warehouse's
pub fn price_table() -> Table {
    Table::new(
        vec![
            "DATE".to_string(),
            "HIGH".to_string(),
            "LOW".to_string(),
            "CLOSE".to_string(),
            "Year".to_string(),
            "Quarter".to_string(),
        ],
        vec![
            vec![json!("2024-01-03"), json!(50.0), json!(47.0), json!(48.0), json!(2024), json!(1)],
            vec![json!("2024-01-02"), json!(49.0), json!(46.0), json!(48.5), json!(2024), json!(1)],
            vec![json!("2024-01-04"), json!(52.0), json!(48.0), json!(51.0), json!(2024), json!(1)],
        ],
    )
}

/// Search provider with canned hits per scope
#[derive(Default)]
pub struct CannedSearch {
    pub news: Option<Vec<SearchHit>>,
    pub web: Option<Vec<SearchHit>>,
    pub queries: Mutex<Vec<(String, SearchScope)>>,
}

impl CannedSearch {
    pub fn new(news: Vec<SearchHit>, web: Vec<SearchHit>) -> Self {
        Self {
            news: Some(news),
            web: Some(web),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SearchProvider for CannedSearch {
    async fn search(&self, query: &str, scope: SearchScope, num: usize) -> Result<Vec<SearchHit>> {
        self.queries.lock().unwrap().push((query.to_string(), scope));
        let hits = match scope {
            SearchScope::News => self.news.clone(),
            SearchScope::Web => self.web.clone(),
        };
        hits.map(|h| h.into_iter().take(num).collect())
            .ok_or_else(|| ResearchError::Api("search quota exhausted".to_string()))
    }
}

pub fn hit(kind: &str, title: &str, link: &str) -> SearchHit {
    SearchHit {
        kind: kind.to_string(),
        title: title.to_string(),
        link: link.to_string(),
        snippet: format!("{title} snippet"),
        source: "Reuters".to_string(),
        date: "1 day ago".to_string(),
        timestamp: "2024-05-01T00:00:00Z".to_string(),
    }
}

/// Chart renderer that hands out predictable URLs
#[derive(Default)]
pub struct FakeCharts {
    pub fail: bool,
    pub rendered: Mutex<Vec<ChartSpec>>,
}

#[async_trait]
impl ChartRenderer for FakeCharts {
    async fn render(&self, spec: &ChartSpec) -> Result<String> {
        if self.fail {
            return Err(ResearchError::Api("renderer down".to_string()));
        }
        let mut rendered = self.rendered.lock().unwrap();
        rendered.push(spec.clone());
        Ok(format!("https://charts.example/{}.png", rendered.len()))
    }
}
