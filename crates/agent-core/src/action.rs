//! Action records and the vocabulary they are built from
//!
//! An [`Action`] is one recorded step of a research run: either a tool
//! selection made by the oracle or a result produced by a tool node. Actions
//! are immutable once constructed; the only way to extend a run is to append
//! a new one to the [`RunState`](crate::RunState) history.

use serde::{Deserialize, Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Year to selected quarters, e.g. `{"2024": {"1", "2"}}`
pub type MetadataFilters = BTreeMap<String, BTreeSet<String>>;

/// The three real retrieval tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    /// Vector search over quarterly-report text
    Rag,
    /// Web news and trend search
    Web,
    /// Structured financial time-series warehouse
    Snowflake,
}

impl ToolKind {
    /// All tools in canonical order
    pub const ALL: [ToolKind; 3] = [ToolKind::Rag, ToolKind::Web, ToolKind::Snowflake];

    /// Name used on the oracle menu and in selection actions
    pub fn label(self) -> &'static str {
        match self {
            Self::Rag => "pinecone",
            Self::Web => "web_search",
            Self::Snowflake => "snowflake",
        }
    }

    /// Name of the graph node that executes this tool
    pub fn node_name(self) -> &'static str {
        match self {
            Self::Rag => "rag_search",
            Self::Web => "web_search",
            Self::Snowflake => "snowflake_search",
        }
    }

    /// Name recorded on result actions
    pub fn result_name(self) -> &'static str {
        match self {
            Self::Rag => "rag_search_result",
            Self::Web => "web_search_result",
            Self::Snowflake => "snowflake_search_result",
        }
    }

    /// Parse an oracle menu label
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.label() == label)
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Research mode requested by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Quarterly-report vector search only
    Pinecone,
    /// Web search only
    WebSearch,
    /// Warehouse query only
    Snowflake,
    /// Consult every tool before answering
    #[default]
    Combined,
}

impl Mode {
    /// All modes in their documented order
    pub const ALL: [Mode; 4] = [Mode::Pinecone, Mode::WebSearch, Mode::Snowflake, Mode::Combined];

    /// Wire name of the mode
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pinecone => "pinecone",
            Self::WebSearch => "web_search",
            Self::Snowflake => "snowflake",
            Self::Combined => "combined",
        }
    }

    /// The tool a single-tool mode is bound to, `None` for combined
    pub fn single_tool(self) -> Option<ToolKind> {
        match self {
            Self::Pinecone => Some(ToolKind::Rag),
            Self::WebSearch => Some(ToolKind::Web),
            Self::Snowflake => Some(ToolKind::Snowflake),
            Self::Combined => None,
        }
    }

    /// Whether the mode needs at least one year/quarter filter
    pub fn requires_filters(self) -> bool {
        !matches!(self, Self::WebSearch)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidMode(s.to_string()))
    }
}

/// Input echoed on every action: the query and the active filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInput {
    /// Original user query
    pub query: String,
    /// Year/quarter filters in effect
    pub metadata_filters: MetadataFilters,
}

impl ToolInput {
    /// Create a tool input
    pub fn new(query: impl Into<String>, metadata_filters: MetadataFilters) -> Self {
        Self {
            query: query.into(),
            metadata_filters,
        }
    }
}

/// What an action records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// The oracle chose a tool
    Select(ToolKind),
    /// A tool node produced its result
    Result(ToolKind),
    /// The oracle chose to terminate
    FinalAnswer,
    /// The finalizer produced the narrative
    FinalAnswerResult,
}

impl ActionKind {
    /// Wire name of the action kind
    pub fn name(self) -> &'static str {
        match self {
            Self::Select(tool) => tool.label(),
            Self::Result(tool) => tool.result_name(),
            Self::FinalAnswer => "final_answer",
            Self::FinalAnswerResult => "final_answer_result",
        }
    }

    /// True for oracle decisions (tool selections and `final_answer`)
    pub fn is_decision(self) -> bool {
        matches!(self, Self::Select(_) | Self::FinalAnswer)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for ActionKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Kind of chart a structured-data result can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    /// Line chart of metrics over time
    TimeSeries,
    /// Pairwise correlation of metrics
    Correlation,
}

/// A rendered chart hosted at a URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chart {
    /// Where the rendered image lives
    pub url: String,
    /// Human readable title
    pub title: String,
    /// Columns plotted
    pub columns: Vec<String>,
    /// Chart type
    pub kind: ChartKind,
}

impl Chart {
    /// Caption line shown under the image
    pub fn caption(&self) -> String {
        if self.columns.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.title, self.columns.join(", "))
        }
    }
}

/// A hyperlink found in a tool result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebLink {
    /// Link text
    pub title: String,
    /// Target URL
    pub url: String,
}

/// One recorded step of a research run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Action {
    #[serde(rename = "tool")]
    kind: ActionKind,
    tool_input: ToolInput,
    log: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    charts: Vec<Chart>,
}

impl Action {
    /// Build an action of any kind
    pub fn new(kind: ActionKind, tool_input: ToolInput, log: impl Into<String>) -> Self {
        Self {
            kind,
            tool_input,
            log: log.into(),
            charts: Vec::new(),
        }
    }

    /// Oracle selection of a tool
    pub fn select(tool: ToolKind, tool_input: ToolInput, log: impl Into<String>) -> Self {
        Self::new(ActionKind::Select(tool), tool_input, log)
    }

    /// Tool result
    pub fn result(tool: ToolKind, tool_input: ToolInput, log: impl Into<String>) -> Self {
        Self::new(ActionKind::Result(tool), tool_input, log)
    }

    /// Oracle decision to terminate
    pub fn final_answer(tool_input: ToolInput, log: impl Into<String>) -> Self {
        Self::new(ActionKind::FinalAnswer, tool_input, log)
    }

    /// Attach chart artifacts (consumes the action, so only before it is appended)
    pub fn with_charts(mut self, charts: Vec<Chart>) -> Self {
        self.charts = charts;
        self
    }

    /// What this action records
    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    /// Wire name of the action, e.g. `web_search_result`
    pub fn tool(&self) -> &'static str {
        self.kind.name()
    }

    /// Input the action was made with
    pub fn tool_input(&self) -> &ToolInput {
        &self.tool_input
    }

    /// Result or decision text
    pub fn log(&self) -> &str {
        &self.log
    }

    /// Chart artifacts carried by the action
    pub fn charts(&self) -> &[Chart] {
        &self.charts
    }
}
