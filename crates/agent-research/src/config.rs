//! Configuration for the research assistant
//!
//! Backend credentials are all optional. A missing key never stops the
//! process from starting; the adapter that needs it reports a soft error
//! when a request reaches it.

use crate::error::{ResearchError, Result};
use agent_llm::providers::GEMINI_OPENAI_API_BASE;
use agent_utils::Env;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::time::Duration;

/// Default Hugging Face feature-extraction endpoint for MiniLM embeddings
pub const DEFAULT_EMBEDDINGS_URL: &str = "https://api-inference.huggingface.co/pipeline/feature-extraction/sentence-transformers/all-MiniLM-L6-v2";

/// Default QuickChart service
pub const DEFAULT_QUICKCHART_URL: &str = "https://quickchart.io";

/// LLM endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    /// OpenAI-compatible base URL
    pub api_base: String,
    /// API key
    pub api_key: Option<String>,
    /// Model name
    pub model: String,
    /// Completion length cap
    pub max_tokens: usize,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            api_base: GEMINI_OPENAI_API_BASE.to_string(),
            api_key: None,
            model: "gemini-1.5-pro".to_string(),
            max_tokens: 2048,
            temperature: None,
        }
    }
}

/// Pinecone vector index settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PineconeSettings {
    /// API key
    pub api_key: Option<String>,
    /// Data-plane host; resolved from the index name when unset
    pub index_host: Option<String>,
    /// Index name
    pub index_name: String,
    /// Namespace to query and upsert into
    pub namespace: Option<String>,
    /// Number of passages retrieved per query
    pub top_k: usize,
    /// Embedding dimension of the index
    pub dimension: usize,
}

impl Default for PineconeSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            index_host: None,
            index_name: "nvidia-agentic-research-assistant".to_string(),
            namespace: None,
            top_k: 20,
            dimension: 384,
        }
    }
}

/// Embedding endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Feature-extraction endpoint
    pub url: String,
    /// Bearer token
    pub api_key: Option<String>,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            url: DEFAULT_EMBEDDINGS_URL.to_string(),
            api_key: None,
        }
    }
}

/// Snowflake SQL API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnowflakeSettings {
    /// Account identifier, e.g. `xy12345.us-east-1`
    pub account: Option<String>,
    /// OAuth or key-pair JWT token
    pub token: Option<String>,
    /// Value of `X-Snowflake-Authorization-Token-Type`
    pub token_type: String,
    /// Database
    pub database: String,
    /// Schema
    pub schema: String,
    /// Warehouse
    pub warehouse: Option<String>,
    /// Role
    pub role: Option<String>,
    /// Daily financial data table
    pub table: String,
    /// Ticker whose daily prices fill the table
    pub ticker: String,
    /// Years of daily history loaded by price ingestion
    pub history_years: u32,
}

impl Default for SnowflakeSettings {
    fn default() -> Self {
        Self {
            account: None,
            token: None,
            token_type: "OAUTH".to_string(),
            database: "NVIDIA_DB".to_string(),
            schema: "NVIDIA_SCHEMA".to_string(),
            warehouse: None,
            role: None,
            table: "NVIDIA_FIN_DATA".to_string(),
            ticker: "NVDA".to_string(),
            history_years: 5,
        }
    }
}

/// Web search settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSettings {
    /// SerpAPI key
    pub serpapi_key: Option<String>,
    /// Requests per minute
    pub rate_limit: u32,
    /// Results requested per search
    pub num_results: usize,
    /// Location passed to news searches
    pub location: String,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            serpapi_key: None,
            rate_limit: 30,
            num_results: 5,
            location: "United States".to_string(),
        }
    }
}

/// Chart rendering settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartSettings {
    /// QuickChart base URL
    pub quickchart_url: String,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            quickchart_url: DEFAULT_QUICKCHART_URL.to_string(),
            width: 1200,
            height: 600,
        }
    }
}

/// Configuration for the research assistant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Company the assistant researches
    pub company: String,

    /// LLM endpoint
    pub llm: LlmSettings,

    /// Vector index
    pub pinecone: PineconeSettings,

    /// Embedding model endpoint
    pub embeddings: EmbeddingSettings,

    /// Financial data warehouse
    pub snowflake: SnowflakeSettings,

    /// Web search
    pub web: WebSettings,

    /// Chart rendering
    pub charts: ChartSettings,

    /// Timeout applied to every outbound HTTP request
    pub request_timeout: Duration,

    /// Hard cap on oracle decisions per run
    pub max_steps: usize,

    /// Years offered by `/available_quarters`
    pub years: RangeInclusive<u32>,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            company: "NVIDIA".to_string(),
            llm: LlmSettings::default(),
            pinecone: PineconeSettings::default(),
            embeddings: EmbeddingSettings::default(),
            snowflake: SnowflakeSettings::default(),
            web: WebSettings::default(),
            charts: ChartSettings::default(),
            request_timeout: Duration::from_secs(60),
            max_steps: 8,
            years: 2021..=2025,
        }
    }
}

impl ResearchConfig {
    /// Create a new configuration builder
    pub fn builder() -> ResearchConfigBuilder {
        ResearchConfigBuilder::default()
    }

    /// Load configuration from the environment on top of the defaults
    pub fn from_env() -> Result<Self> {
        Self::from_source(&Env::process())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Self::from_source(&Env::from_lookup(lookup))
    }

    fn from_source<F>(env: &Env<F>) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(company) = env.var("RESEARCH_COMPANY") {
            config.company = company;
        }

        if let Some(base) = env.var("LLM_API_BASE") {
            config.llm.api_base = base;
        }
        config.llm.api_key = env.first(&["LLM_API_KEY", "GOOGLE_API_KEY", "GEMINI_API_KEY"]);
        if let Some(model) = env.var("LLM_MODEL") {
            config.llm.model = model;
        }
        if let Some(max_tokens) = env.parse("LLM_MAX_TOKENS")? {
            config.llm.max_tokens = max_tokens;
        }
        config.llm.temperature = env.parse("LLM_TEMPERATURE")?;

        config.pinecone.api_key = env.var("PINECONE_API_KEY");
        config.pinecone.index_host = env.var("PINECONE_INDEX_HOST");
        if let Some(name) = env.var("PINECONE_INDEX_NAME") {
            config.pinecone.index_name = name;
        }
        config.pinecone.namespace = env.var("PINECONE_NAMESPACE");

        if let Some(url) = env.var("EMBEDDINGS_URL") {
            config.embeddings.url = url;
        }
        config.embeddings.api_key = env.var("HF_API_TOKEN");

        config.snowflake.account = env.var("SNOWFLAKE_ACCOUNT");
        config.snowflake.token = env.var("SNOWFLAKE_TOKEN");
        if let Some(token_type) = env.var("SNOWFLAKE_TOKEN_TYPE") {
            config.snowflake.token_type = token_type;
        }
        config.snowflake.warehouse = env.var("SNOWFLAKE_WAREHOUSE");
        config.snowflake.role = env.var("SNOWFLAKE_ROLE");
        if let Some(ticker) = env.var("RESEARCH_TICKER") {
            config.snowflake.ticker = ticker.to_uppercase();
        }
        if let Some(years) = env.parse("RESEARCH_HISTORY_YEARS")? {
            config.snowflake.history_years = years;
        }

        config.web.serpapi_key = env.var("SERPAPI_API_KEY");

        if let Some(url) = env.var("QUICKCHART_URL") {
            config.charts.quickchart_url = url;
        }

        if let Some(secs) = env.parse::<u64>("REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(max_steps) = env.parse("RESEARCH_MAX_STEPS")? {
            config.max_steps = max_steps;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.company.trim().is_empty() {
            return Err(ResearchError::Config(
                "company name must not be empty".to_string(),
            ));
        }

        if self.pinecone.top_k == 0 {
            return Err(ResearchError::Config(
                "top_k must be greater than 0".to_string(),
            ));
        }

        if self.pinecone.dimension == 0 {
            return Err(ResearchError::Config(
                "embedding dimension must be greater than 0".to_string(),
            ));
        }

        if self.snowflake.history_years == 0 {
            return Err(ResearchError::Config(
                "history_years must be greater than 0".to_string(),
            ));
        }

        // three tool cycles plus the terminal decision
        if self.max_steps < 4 {
            return Err(ResearchError::Config(
                "max_steps must be at least 4".to_string(),
            ));
        }

        Ok(())
    }

    /// Quarter labels offered to clients, e.g. `2024-Q1`
    pub fn available_quarters(&self) -> Vec<String> {
        crate::request::available_quarters(self.years.clone())
    }
}

/// Builder for ResearchConfig
#[derive(Debug, Default)]
pub struct ResearchConfigBuilder {
    company: Option<String>,
    llm: Option<LlmSettings>,
    pinecone: Option<PineconeSettings>,
    embeddings: Option<EmbeddingSettings>,
    snowflake: Option<SnowflakeSettings>,
    web: Option<WebSettings>,
    charts: Option<ChartSettings>,
    request_timeout: Option<Duration>,
    max_steps: Option<usize>,
    years: Option<RangeInclusive<u32>>,
}

impl ResearchConfigBuilder {
    /// Set the company name
    pub fn company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    /// Set the LLM settings
    pub fn llm(mut self, llm: LlmSettings) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Set the Pinecone settings
    pub fn pinecone(mut self, pinecone: PineconeSettings) -> Self {
        self.pinecone = Some(pinecone);
        self
    }

    /// Set the embedding settings
    pub fn embeddings(mut self, embeddings: EmbeddingSettings) -> Self {
        self.embeddings = Some(embeddings);
        self
    }

    /// Set the Snowflake settings
    pub fn snowflake(mut self, snowflake: SnowflakeSettings) -> Self {
        self.snowflake = Some(snowflake);
        self
    }

    /// Set the web search settings
    pub fn web(mut self, web: WebSettings) -> Self {
        self.web = Some(web);
        self
    }

    /// Set the chart settings
    pub fn charts(mut self, charts: ChartSettings) -> Self {
        self.charts = Some(charts);
        self
    }

    /// Set request timeout
    pub fn request_timeout(mut self, duration: Duration) -> Self {
        self.request_timeout = Some(duration);
        self
    }

    /// Set the oracle decision cap
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Set the years offered to clients
    pub fn years(mut self, years: RangeInclusive<u32>) -> Self {
        self.years = Some(years);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ResearchConfig> {
        let defaults = ResearchConfig::default();

        let config = ResearchConfig {
            company: self.company.unwrap_or(defaults.company),
            llm: self.llm.unwrap_or(defaults.llm),
            pinecone: self.pinecone.unwrap_or(defaults.pinecone),
            embeddings: self.embeddings.unwrap_or(defaults.embeddings),
            snowflake: self.snowflake.unwrap_or(defaults.snowflake),
            web: self.web.unwrap_or(defaults.web),
            charts: self.charts.unwrap_or(defaults.charts),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            max_steps: self.max_steps.unwrap_or(defaults.max_steps),
            years: self.years.unwrap_or(defaults.years),
        };

        config.validate()?;
        Ok(config)
    }
}
