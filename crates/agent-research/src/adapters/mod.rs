//! Retrieval tool adapters and the graph node that runs them
//!
//! Adapters return `Err` freely; [`ToolNode`] is the single place where an
//! error is turned into result text so the run always moves on.

pub mod vector;
pub mod warehouse;
pub mod web;

pub use vector::RagSearch;
pub use warehouse::SnowflakeSearch;
pub use web::WebSearch;

use crate::error::Result;
use agent_core::{Action, Chart, MetadataFilters, Node, RunState, ToolInput, ToolKind};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Text produced by a tool plus any chart artifacts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub text: String,
    pub charts: Vec<Chart>,
}

impl ToolOutput {
    /// Text-only output
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            charts: Vec::new(),
        }
    }
}

/// One retrieval backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolAdapter: Send + Sync {
    /// Which tool this adapter implements
    fn kind(&self) -> ToolKind;

    /// Run the tool for a query and its year/quarter filters
    async fn run(&self, query: &str, filters: &MetadataFilters) -> Result<ToolOutput>;
}

/// Result text recorded when a tool fails
pub fn soft_failure_message(tool: ToolKind, err: &dyn std::fmt::Display) -> String {
    match tool {
        ToolKind::Rag => format!("Error searching Pinecone: {err}"),
        ToolKind::Web => format!("Error searching web: {err}"),
        ToolKind::Snowflake => format!("Error searching Snowflake: {err}"),
    }
}

/// Graph node wrapping an adapter
#[derive(Clone)]
pub struct ToolNode {
    adapter: Arc<dyn ToolAdapter>,
}

impl ToolNode {
    pub fn new(adapter: Arc<dyn ToolAdapter>) -> Self {
        Self { adapter }
    }

    /// The tool this node runs
    pub fn kind(&self) -> ToolKind {
        self.adapter.kind()
    }
}

#[async_trait]
impl Node for ToolNode {
    async fn run(&self, state: &mut RunState) -> agent_core::Result<()> {
        let tool = self.adapter.kind();
        // the input travels on the selection that routed us here
        let input = state
            .last_action()
            .map_or_else(|| state.tool_input(), |action| action.tool_input().clone());
        let ToolInput {
            query,
            metadata_filters,
        } = &input;

        let action = match self.adapter.run(query, metadata_filters).await {
            Ok(output) => {
                info!(
                    node = tool.node_name(),
                    chars = output.text.len(),
                    charts = output.charts.len(),
                    "tool finished"
                );
                Action::result(tool, input.clone(), output.text).with_charts(output.charts)
            }
            Err(e) => {
                warn!(node = tool.node_name(), error = %e, "tool failed");
                Action::result(tool, input.clone(), soft_failure_message(tool, &e))
            }
        };

        state.push(action);
        Ok(())
    }

    fn name(&self) -> &str {
        self.adapter.kind().node_name()
    }
}
