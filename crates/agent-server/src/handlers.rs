//! HTTP request handlers

use agent_core::ToolKind;
use agent_research::adapters::soft_failure_message;
use agent_research::request::{available_quarters as quarter_labels, to_filters};
use agent_research::{
    ResearchConfig, ResearchRequest, ResearchServices, SummarizeRequest, WebSearchRequest,
};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::{Value, json};
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Shared state of the API server
pub struct AppState {
    /// Graph and adapters, built once per process
    pub services: &'static ResearchServices,
    /// Company under research
    pub company: String,
    /// Years listed by `/available_quarters`
    pub years: RangeInclusive<u32>,
}

impl AppState {
    pub fn new(services: &'static ResearchServices, config: &ResearchConfig) -> Self {
        Self {
            services,
            company: config.company.clone(),
            years: config.years.clone(),
        }
    }
}

/// Error responses
#[derive(Debug)]
pub enum ApiError {
    /// Rejected before any work started; `{"error": ..}` with 400
    BadRequest(String),
    /// Failure while serving; `{"detail": ..}` with 500
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            Self::Internal(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "detail": detail })),
            )
                .into_response(),
        }
    }
}

/// `NVIDIA` -> `Nvidia`
fn display_name(company: &str) -> String {
    let mut chars = company.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

pub async fn root(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "message": format!("{} Agentic Research Assistant", display_name(&state.company))
    }))
}

pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn available_quarters(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({ "quarters": quarter_labels(state.years.clone()) }))
}

/// Vector search answer without the graph; failures come back as text
pub async fn summarize_using_pinecone(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SummarizeRequest>,
) -> Json<Value> {
    let filters = to_filters(&request.year_quarter_dict);
    let response = match state.services.rag.search(&request.query, &filters).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "summarize failed");
            soft_failure_message(ToolKind::Rag, &e)
        }
    };
    Json(json!({ "response": response }))
}

/// Raw news results
pub async fn web_search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WebSearchRequest>,
) -> Result<Json<Value>, ApiError> {
    let results = state
        .services
        .web
        .news(&request.query, request.num_results)
        .await
        .map_err(|e| {
            error!(error = %e, "web search failed");
            ApiError::Internal(format!("Error searching web: {e}"))
        })?;
    Ok(Json(json!({ "status": "success", "results": results })))
}

/// Run the research graph
pub async fn research(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ResearchRequest>,
) -> Result<Json<Value>, ApiError> {
    let start = Instant::now();
    let validated = request
        .validate()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    info!(mode = %validated.mode, query = %validated.query, "research request");

    let result = state
        .services
        .graph
        .research(&validated.query, validated.filters, validated.mode)
        .await
        .map_err(|e| {
            error!(error = %e, "research workflow failed");
            ApiError::Internal(format!("Error running research workflow: {e}"))
        })?;

    let processing_time = start.elapsed().as_secs_f64();
    info!(processing_time, "research finished");
    Ok(Json(json!({
        "result": result,
        "processing_time": processing_time,
        "mode": validated.mode,
    })))
}

/// Sample what the vector index holds
pub async fn pinecone_data_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    match state.services.rag.data_check().await {
        Ok(None) => Json(json!({
            "status": "empty",
            "message": "No data found in Pinecone index.",
        })),
        Ok(Some(sample)) => Json(json!({
            "status": "success",
            "total_vectors": sample.total_vectors,
            "years_available": sample.years_available(),
            "data": sample.data,
        })),
        Err(e) => {
            warn!(error = %e, "pinecone data check failed");
            Json(json!({
                "status": "error",
                "message": format!("Error checking Pinecone data: {e}"),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::router;
    use agent_core::MetadataFilters;
    use agent_llm::{
        CompletionRequest, CompletionResponse, LLMProvider, Message, StopReason, TokenUsage,
    };
    use agent_research::api::{
        Embedder, IndexStats, SearchHit, SearchProvider, SearchScope, VectorIndex, VectorMatch,
        VectorRecord,
    };
    use agent_research::{
        Finalizer, LlmClient, RagSearch, ResearchError, ResearchGraph, ToolAdapter, ToolOutput,
        ToolRanker, WebSearch, prompts::Prompts,
    };
    use async_trait::async_trait;
    use axum::Router;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::Map;
    use tower::ServiceExt;

    struct CannedLlm;

    #[async_trait]
    impl LLMProvider for CannedLlm {
        async fn complete(
            &self,
            _request: CompletionRequest,
        ) -> agent_llm::Result<CompletionResponse> {
            Ok(CompletionResponse {
                message: Message::assistant("Report"),
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            })
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    struct ZeroEmbedder;

    #[async_trait]
    impl Embedder for ZeroEmbedder {
        async fn embed(&self, texts: &[String]) -> agent_research::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
        }

        fn dimension(&self) -> usize {
            4
        }
    }

    struct Index {
        matches: Vec<VectorMatch>,
        fail: bool,
    }

    #[async_trait]
    impl VectorIndex for Index {
        async fn query(
            &self,
            _vector: Vec<f32>,
            top_k: usize,
            _filter: Option<Value>,
        ) -> agent_research::Result<Vec<VectorMatch>> {
            if self.fail {
                return Err(ResearchError::Api("index unavailable".to_string()));
            }
            Ok(self.matches.iter().take(top_k).cloned().collect())
        }

        async fn upsert(&self, records: Vec<VectorRecord>) -> agent_research::Result<usize> {
            Ok(records.len())
        }

        async fn describe_stats(&self) -> agent_research::Result<IndexStats> {
            if self.fail {
                return Err(ResearchError::Api("index unavailable".to_string()));
            }
            Ok(IndexStats {
                total_vector_count: self.matches.len() as u64,
                dimension: 4,
            })
        }
    }

    struct News {
        fail: bool,
    }

    #[async_trait]
    impl SearchProvider for News {
        async fn search(
            &self,
            _query: &str,
            scope: SearchScope,
            _num: usize,
        ) -> agent_research::Result<Vec<SearchHit>> {
            if self.fail {
                return Err(ResearchError::Api("quota exceeded".to_string()));
            }
            let kind = if scope == SearchScope::News { "news" } else { "trend" };
            Ok(vec![SearchHit {
                kind: kind.to_string(),
                title: "NVIDIA beats estimates".to_string(),
                link: "https://news.example/a".to_string(),
                snippet: "Record data center revenue".to_string(),
                source: "Reuters".to_string(),
                date: "1 day ago".to_string(),
                timestamp: "2024-05-01T00:00:00Z".to_string(),
            }])
        }
    }

    struct Metrics;

    #[async_trait]
    impl ToolAdapter for Metrics {
        fn kind(&self) -> ToolKind {
            ToolKind::Snowflake
        }

        async fn run(
            &self,
            _query: &str,
            _filters: &MetadataFilters,
        ) -> agent_research::Result<ToolOutput> {
            Ok(ToolOutput::text("## Financial Data Analysis\n\nflat\n\n"))
        }
    }

    struct ReportsFirst;

    #[async_trait]
    impl ToolRanker for ReportsFirst {
        async fn rank(
            &self,
            _query: &str,
            _used: &[ToolKind],
            _candidates: &[ToolKind],
        ) -> agent_research::Result<String> {
            Ok("pinecone".to_string())
        }
    }

    fn chunk(id: &str) -> VectorMatch {
        let mut metadata = Map::new();
        metadata.insert("year".to_string(), json!("2024"));
        metadata.insert("quarter".to_string(), json!("1"));
        metadata.insert("header".to_string(), json!("# Revenue"));
        metadata.insert("text".to_string(), json!("Revenue was $26.0 billion"));
        VectorMatch {
            id: id.to_string(),
            score: 0.9,
            metadata,
        }
    }

    fn app(matches: Vec<VectorMatch>, index_fails: bool, search_fails: bool) -> Router {
        let llm = LlmClient::new(Arc::new(CannedLlm), "canned");
        let prompts = Arc::new(Prompts::new("NVIDIA").unwrap());
        let rag = Arc::new(RagSearch::new(
            Arc::new(ZeroEmbedder),
            Arc::new(Index {
                matches,
                fail: index_fails,
            }),
            llm.clone(),
            prompts.clone(),
            20,
        ));
        let web = Arc::new(WebSearch::new(
            Arc::new(News { fail: search_fails }),
            llm.clone(),
            prompts.clone(),
            "NVIDIA",
            5,
        ));
        let graph = ResearchGraph::builder()
            .ranker(Arc::new(ReportsFirst))
            .rag(rag.clone())
            .web(web.clone())
            .snowflake(Arc::new(Metrics))
            .finalizer(Finalizer::new(llm, prompts))
            .build()
            .unwrap();

        let services: &'static ResearchServices =
            Box::leak(Box::new(ResearchServices { graph, rag, web }));
        router(Arc::new(AppState::new(services, &ResearchConfig::default())))
    }

    fn default_app() -> Router {
        app(vec![chunk("2024_1_0")], false, false)
    }

    async fn call(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("NVIDIA"), "Nvidia");
        assert_eq!(display_name(""), "");
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let (status, body) = call(default_app(), "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Nvidia Agentic Research Assistant");

        let (_, body) = call(default_app(), "GET", "/health", None).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_available_quarters() {
        let (status, body) = call(default_app(), "GET", "/available_quarters", None).await;
        assert_eq!(status, StatusCode::OK);
        let quarters = body["quarters"].as_array().unwrap();
        assert_eq!(quarters.len(), 20);
        assert_eq!(quarters[0], "2021-Q1");
        assert_eq!(quarters[19], "2025-Q4");
    }

    #[tokio::test]
    async fn test_research_rejects_invalid_mode() {
        let body = json!({"query": "q", "year_quarter_dict": {"2024": ["1"]}, "mode": "hybrid"});
        let (status, body) = call(default_app(), "POST", "/research", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Invalid mode 'hybrid'. Must be one of: pinecone, web_search, snowflake, combined"
        );
    }

    #[tokio::test]
    async fn test_research_requires_quarters() {
        let body = json!({"query": "q", "year_quarter_dict": {}, "mode": "pinecone"});
        let (status, body) = call(default_app(), "POST", "/research", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "For pinecone search, at least one year and quarter must be selected"
        );
    }

    #[tokio::test]
    async fn test_research_combined() {
        let body = json!({
            "query": "How is revenue trending?",
            "year_quarter_dict": {"2024": ["1"]}
        });
        let (status, body) = call(default_app(), "POST", "/research", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["mode"], "combined");
        assert!(body["processing_time"].as_f64().unwrap() >= 0.0);
        let result = body["result"].as_str().unwrap();
        assert!(result.starts_with("Report"));
        assert!(result.contains("- [NVIDIA beats estimates](https://news.example/a)"));
    }

    #[tokio::test]
    async fn test_web_search() {
        let body = json!({"query": "earnings"});
        let (status, body) = call(default_app(), "POST", "/web_search", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["results"][0]["type"], "news");
        assert_eq!(body["results"][0]["source"], "Reuters");
    }

    #[tokio::test]
    async fn test_web_search_failure() {
        let app = app(Vec::new(), false, true);
        let (status, body) = call(app, "POST", "/web_search", Some(json!({"query": "q"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["detail"].as_str().unwrap().starts_with("Error searching web: "));
    }

    #[tokio::test]
    async fn test_summarize() {
        let body = json!({"query": "revenue", "year_quarter_dict": {"2024": ["1"]}});
        let (status, body) =
            call(default_app(), "POST", "/summarize_using_pinecone", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Report");

        let failing = app(Vec::new(), true, false);
        let body = Some(json!({"query": "q"}));
        let (status, body) = call(failing, "POST", "/summarize_using_pinecone", body).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["response"].as_str().unwrap().starts_with("Error searching Pinecone: "));
    }

    #[tokio::test]
    async fn test_pinecone_data_check() {
        let (_, body) = call(default_app(), "GET", "/pinecone_data_check", None).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["total_vectors"], 1);
        assert_eq!(body["years_available"], json!(["2024"]));
        assert_eq!(body["data"]["2024"]["1"][0]["header"], "# Revenue");

        let empty = app(Vec::new(), false, false);
        let (_, body) = call(empty, "GET", "/pinecone_data_check", None).await;
        assert_eq!(body["status"], "empty");
        assert_eq!(body["message"], "No data found in Pinecone index.");

        let failing = app(Vec::new(), true, false);
        let (_, body) = call(failing, "GET", "/pinecone_data_check", None).await;
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().starts_with("Error checking Pinecone data: "));
    }
}
