//! Dispatch from the oracle's last selection to the next node

use agent_core::{Action, ActionKind, ToolKind};
use std::fmt;

/// Nodes the oracle can hand control to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeName {
    RagSearch,
    WebSearch,
    SnowflakeSearch,
    FinalAnswer,
}

impl NodeName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RagSearch => ToolKind::Rag.node_name(),
            Self::WebSearch => ToolKind::Web.node_name(),
            Self::SnowflakeSearch => ToolKind::Snowflake.node_name(),
            Self::FinalAnswer => "final_answer",
        }
    }

    /// The tool behind a tool node, `None` for the finalizer
    pub fn tool(self) -> Option<ToolKind> {
        match self {
            Self::RagSearch => Some(ToolKind::Rag),
            Self::WebSearch => Some(ToolKind::Web),
            Self::SnowflakeSearch => Some(ToolKind::Snowflake),
            Self::FinalAnswer => None,
        }
    }
}

impl From<ToolKind> for NodeName {
    fn from(tool: ToolKind) -> Self {
        match tool {
            ToolKind::Rag => Self::RagSearch,
            ToolKind::Web => Self::WebSearch,
            ToolKind::Snowflake => Self::SnowflakeSearch,
        }
    }
}

impl fmt::Display for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Next node for a history
///
/// Only a trailing selection routes to a tool; an empty history or any
/// other trailing action goes to the finalizer.
pub fn route(history: &[Action]) -> NodeName {
    match history.last().map(Action::kind) {
        Some(ActionKind::Select(tool)) => tool.into(),
        _ => NodeName::FinalAnswer,
    }
}
