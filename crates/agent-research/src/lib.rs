//! Agentic research assistant
//!
//! Answers questions about one company's financials by routing a query
//! through up to three retrieval tools and asking an LLM to write the final
//! report:
//!
//! - quarterly-report text in a Pinecone vector index
//! - daily financial metrics in Snowflake, with QuickChart charts
//! - recent news and analysis through SerpAPI
//!
//! The [`ingest`] and [`prices`] modules fill the vector index and the
//! daily price table those tools read from.
//!
//! # Architecture
//!
//! The [`graph::ResearchGraph`] cycles `oracle -> router -> tool -> oracle`
//! until the [`oracle::Oracle`] decides to finish, then the
//! [`finalizer::Finalizer`] writes the answer. Every external service sits
//! behind a trait in [`api`], so the whole loop runs against fakes in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use agent_research::{ResearchConfig, global_graph};
//! use agent_core::Mode;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ResearchConfig::from_env()?;
//!     let graph = global_graph(&config).await?;
//!
//!     let mut filters = agent_core::MetadataFilters::new();
//!     filters.insert("2024".into(), ["1".into()].into_iter().collect());
//!
//!     let report = graph
//!         .research("How did data center revenue evolve?", filters, Mode::Combined)
//!         .await?;
//!     println!("{report}");
//!
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod api;
pub mod config;
pub mod error;
pub mod finalizer;
pub mod graph;
pub mod ingest;
pub mod llm;
pub mod oracle;
pub mod prices;
pub mod prompts;
pub mod request;
pub mod router;
pub mod table;

#[cfg(test)]
mod testing;

pub use adapters::{RagSearch, SnowflakeSearch, ToolAdapter, ToolNode, ToolOutput, WebSearch};
pub use config::ResearchConfig;
pub use error::{ResearchError, Result};
pub use finalizer::Finalizer;
pub use graph::{
    ResearchGraph, ResearchServices, global_graph, global_services, global_services_with,
};
pub use ingest::Ingestor;
pub use llm::LlmClient;
pub use oracle::{LlmRanker, Oracle, ToolRanker};
pub use prices::PriceLoader;
pub use request::{ResearchRequest, SummarizeRequest, ValidatedRequest, WebSearchRequest};
pub use router::{NodeName, route};
