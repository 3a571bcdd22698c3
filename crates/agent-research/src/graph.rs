//! The research graph
//!
//! `oracle -> router -> {rag_search, web_search, snowflake_search} -> oracle`
//! cycles until the oracle picks `final_answer`, then the finalizer ends the
//! run. One graph is built per process and shared by every request; all
//! per-request data lives in the [`RunState`].

use crate::adapters::{RagSearch, SnowflakeSearch, ToolAdapter, ToolNode, WebSearch};
use crate::api::{HttpEmbedder, PineconeClient, QuickChartRenderer, SerpApiClient, SnowflakeClient};
use crate::config::ResearchConfig;
use crate::error::{ResearchError, Result};
use crate::finalizer::Finalizer;
use crate::llm::LlmClient;
use crate::oracle::{LlmRanker, Oracle, ToolRanker};
use crate::prompts::Prompts;
use crate::router::{NodeName, route};
use agent_core::{ActionKind, MetadataFilters, Mode, Node, RunState, ToolKind};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, instrument, warn};

/// Returned when a run ends without any narrative
pub const NO_RESULTS: &str =
    "No comprehensive results available. Please try again with a different query.";

/// Default cap on oracle decisions per run
pub const DEFAULT_MAX_STEPS: usize = 8;

/// Compiled research graph
pub struct ResearchGraph {
    oracle: Oracle,
    rag: ToolNode,
    web: ToolNode,
    snowflake: ToolNode,
    finalizer: Finalizer,
    max_steps: usize,
}

impl ResearchGraph {
    pub fn builder() -> ResearchGraphBuilder {
        ResearchGraphBuilder::default()
    }

    fn tool_node(&self, tool: ToolKind) -> &ToolNode {
        match tool {
            ToolKind::Rag => &self.rag,
            ToolKind::Web => &self.web,
            ToolKind::Snowflake => &self.snowflake,
        }
    }

    /// Drive a run from the oracle to the terminal action
    pub async fn run(&self, mut state: RunState) -> Result<RunState> {
        loop {
            let next = if state.decisions() >= self.max_steps {
                warn!(
                    max_steps = self.max_steps,
                    "step cap reached, finalizing"
                );
                NodeName::FinalAnswer
            } else {
                self.oracle.run(&mut state).await?;
                route(state.history())
            };
            info!(node = %next, "routing");

            match next.tool() {
                Some(tool) => self.tool_node(tool).run(&mut state).await?,
                None => {
                    self.finalizer.run(&mut state).await?;
                    return Ok(state);
                }
            }
        }
    }

    /// Answer a query, returning the final Markdown
    #[instrument(skip(self, filters))]
    pub async fn research(
        &self,
        query: &str,
        filters: MetadataFilters,
        mode: Mode,
    ) -> Result<String> {
        let state = self.run(RunState::new(query, mode, filters)).await?;
        Ok(final_text(&state))
    }
}

/// The run's output, else the last terminal log, else [`NO_RESULTS`]
pub fn final_text(state: &RunState) -> String {
    if let Some(output) = state.output() {
        return output.to_string();
    }
    state
        .history()
        .iter()
        .rev()
        .find(|action| action.kind() == ActionKind::FinalAnswerResult)
        .map_or_else(|| NO_RESULTS.to_string(), |action| action.log().to_string())
}

/// Builder for ResearchGraph
#[derive(Default)]
pub struct ResearchGraphBuilder {
    ranker: Option<Arc<dyn ToolRanker>>,
    rag: Option<Arc<dyn ToolAdapter>>,
    web: Option<Arc<dyn ToolAdapter>>,
    snowflake: Option<Arc<dyn ToolAdapter>>,
    finalizer: Option<Finalizer>,
    max_steps: Option<usize>,
}

impl ResearchGraphBuilder {
    /// Set the combined-mode ranker
    pub fn ranker(mut self, ranker: Arc<dyn ToolRanker>) -> Self {
        self.ranker = Some(ranker);
        self
    }

    /// Set the quarterly-report adapter
    pub fn rag(mut self, adapter: Arc<dyn ToolAdapter>) -> Self {
        self.rag = Some(adapter);
        self
    }

    /// Set the web adapter
    pub fn web(mut self, adapter: Arc<dyn ToolAdapter>) -> Self {
        self.web = Some(adapter);
        self
    }

    /// Set the warehouse adapter
    pub fn snowflake(mut self, adapter: Arc<dyn ToolAdapter>) -> Self {
        self.snowflake = Some(adapter);
        self
    }

    pub fn finalizer(mut self, finalizer: Finalizer) -> Self {
        self.finalizer = Some(finalizer);
        self
    }

    /// Set the cap on oracle decisions
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Build the graph; every node is required
    pub fn build(self) -> Result<ResearchGraph> {
        let missing = |what: &str| ResearchError::Config(format!("research graph needs a {what}"));
        let node = |adapter: Option<Arc<dyn ToolAdapter>>, tool: ToolKind| -> Result<ToolNode> {
            let adapter = adapter.ok_or_else(|| missing(tool.node_name()))?;
            if adapter.kind() != tool {
                return Err(ResearchError::Config(format!(
                    "{} adapter registered as {}",
                    adapter.kind().node_name(),
                    tool.node_name()
                )));
            }
            Ok(ToolNode::new(adapter))
        };

        let max_steps = self.max_steps.unwrap_or(DEFAULT_MAX_STEPS);
        if max_steps == 0 {
            return Err(ResearchError::Config("max_steps must be at least 1".to_string()));
        }

        Ok(ResearchGraph {
            oracle: Oracle::new(self.ranker.ok_or_else(|| missing("tool ranker"))?),
            rag: node(self.rag, ToolKind::Rag)?,
            web: node(self.web, ToolKind::Web)?,
            snowflake: node(self.snowflake, ToolKind::Snowflake)?,
            finalizer: self.finalizer.ok_or_else(|| missing("finalizer"))?,
            max_steps,
        })
    }
}

/// The graph plus the adapters the auxiliary endpoints call directly
pub struct ResearchServices {
    pub graph: ResearchGraph,
    pub rag: Arc<RagSearch>,
    pub web: Arc<WebSearch>,
}

impl ResearchServices {
    /// Wire the real backends from configuration
    pub fn from_config(config: &ResearchConfig) -> Result<Self> {
        config.validate()?;
        let timeout = config.request_timeout;

        let prompts = Arc::new(Prompts::new(config.company.clone())?);
        let llm = LlmClient::from_config(config)?;

        let embedder = Arc::new(HttpEmbedder::new(
            config.embeddings.clone(),
            config.pinecone.dimension,
            timeout,
        )?);
        let index = Arc::new(PineconeClient::new(config.pinecone.clone(), timeout)?);
        let rag = Arc::new(RagSearch::new(
            embedder,
            index,
            llm.clone(),
            prompts.clone(),
            config.pinecone.top_k,
        ));

        let search = Arc::new(SerpApiClient::new(config.web.clone(), timeout)?);
        let web = Arc::new(WebSearch::new(
            search,
            llm.clone(),
            prompts.clone(),
            config.company.clone(),
            config.web.num_results,
        ));

        let warehouse = Arc::new(SnowflakeClient::new(config.snowflake.clone(), timeout)?);
        let charts = Arc::new(QuickChartRenderer::new(config.charts.clone(), timeout)?);
        let snowflake = Arc::new(SnowflakeSearch::new(
            warehouse,
            charts,
            llm.clone(),
            prompts.clone(),
            config.snowflake.table.clone(),
        ));

        let graph = ResearchGraph::builder()
            .ranker(Arc::new(LlmRanker::new(llm.clone(), prompts.clone())))
            .rag(rag.clone())
            .web(web.clone())
            .snowflake(snowflake)
            .finalizer(Finalizer::new(llm, prompts))
            .max_steps(config.max_steps)
            .build()?;

        info!(company = %config.company, model = %config.llm.model, "research graph built");
        Ok(Self { graph, rag, web })
    }
}

static SERVICES: OnceCell<ResearchServices> = OnceCell::const_new();

/// Process-wide services, built from `config` on first use
pub async fn global_services(config: &ResearchConfig) -> Result<&'static ResearchServices> {
    global_services_with(|| async { ResearchServices::from_config(config) }).await
}

/// Process-wide services, built by `init` on first use
///
/// Later calls return the existing instance and never run their `init`.
pub async fn global_services_with<F, Fut>(init: F) -> Result<&'static ResearchServices>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<ResearchServices>>,
{
    SERVICES.get_or_try_init(init).await
}

/// Process-wide research graph
pub async fn global_graph(config: &ResearchConfig) -> Result<&'static ResearchGraph> {
    Ok(&global_services(config).await?.graph)
}
