//! Per-request run state
//!
//! [`RunState`] is the accumulator threaded through every graph step. Its
//! history is append-only: actions can be pushed but never edited or
//! removed, and `output` is only ever set together with the terminal
//! `final_answer_result` action.

use crate::{Action, ActionKind, MetadataFilters, Mode, ToolInput, ToolKind};
use serde::Serialize;
use std::collections::BTreeSet;

/// Mutable state of one research run
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    input: String,
    mode: Mode,
    metadata_filters: MetadataFilters,
    history: Vec<Action>,
    output: Option<String>,
}

impl RunState {
    /// Start a run for a query
    pub fn new(input: impl Into<String>, mode: Mode, metadata_filters: MetadataFilters) -> Self {
        Self {
            input: input.into(),
            mode,
            metadata_filters,
            history: Vec::new(),
            output: None,
        }
    }

    /// The original query
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Requested mode
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Year/quarter filters
    pub fn metadata_filters(&self) -> &MetadataFilters {
        &self.metadata_filters
    }

    /// Ordered history of actions
    pub fn history(&self) -> &[Action] {
        &self.history
    }

    /// Final narrative, once the run is complete
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Most recent action
    pub fn last_action(&self) -> Option<&Action> {
        self.history.last()
    }

    /// Input echoed on new actions
    pub fn tool_input(&self) -> ToolInput {
        ToolInput::new(self.input.clone(), self.metadata_filters.clone())
    }

    /// Append an action to the history
    pub fn push(&mut self, action: Action) {
        self.history.push(action);
    }

    /// Append the terminal action and set the output
    pub fn complete(&mut self, output: impl Into<String>) {
        let output = output.into();
        let input = ToolInput::new(self.input.clone(), MetadataFilters::new());
        self.history.push(Action::new(
            ActionKind::FinalAnswerResult,
            input,
            output.clone(),
        ));
        self.output = Some(output);
    }

    /// Whether the terminal action has been appended
    pub fn is_complete(&self) -> bool {
        self.output.is_some()
    }

    /// Real tools the oracle has already selected
    pub fn used_tools(&self) -> BTreeSet<ToolKind> {
        self.history
            .iter()
            .filter_map(|action| match action.kind() {
                ActionKind::Select(tool) => Some(tool),
                _ => None,
            })
            .collect()
    }

    /// Number of oracle decisions recorded so far
    pub fn decisions(&self) -> usize {
        self.history
            .iter()
            .filter(|action| action.kind().is_decision())
            .count()
    }

    /// Last result recorded for a tool
    pub fn latest_result(&self, tool: ToolKind) -> Option<&Action> {
        self.history
            .iter()
            .rev()
            .find(|action| action.kind() == ActionKind::Result(tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters() -> MetadataFilters {
        let mut filters = MetadataFilters::new();
        filters.insert(
            "2024".to_string(),
            ["1".to_string(), "2".to_string()].into_iter().collect(),
        );
        filters
    }

    #[test]
    fn test_new_state_is_empty() {
        let state = RunState::new("revenue growth", Mode::Combined, filters());
        assert_eq!(state.input(), "revenue growth");
        assert!(state.history().is_empty());
        assert!(state.output().is_none());
        assert!(state.used_tools().is_empty());
        assert!(state.last_action().is_none());
    }

    #[test]
    fn test_tool_input_echoes_query_and_filters() {
        let state = RunState::new("q", Mode::Pinecone, filters());
        let input = state.tool_input();
        assert_eq!(input.query, "q");
        assert_eq!(input.metadata_filters, filters());
    }

    #[test]
    fn test_used_tools_counts_only_selections() {
        let mut state = RunState::new("q", Mode::Combined, filters());
        let input = state.tool_input();
        state.push(Action::select(ToolKind::Web, input.clone(), "pick web"));
        state.push(Action::result(ToolKind::Web, input.clone(), "news"));
        state.push(Action::result(ToolKind::Rag, input, "stray result"));

        let used = state.used_tools();
        assert_eq!(used.len(), 1);
        assert!(used.contains(&ToolKind::Web));
        assert_eq!(state.decisions(), 1);
    }

    #[test]
    fn test_complete_sets_output_and_appends_terminal_action() {
        let mut state = RunState::new("q", Mode::WebSearch, MetadataFilters::new());
        state.complete("final text");

        assert!(state.is_complete());
        assert_eq!(state.output(), Some("final text"));
        let last = state.last_action().unwrap();
        assert_eq!(last.kind(), ActionKind::FinalAnswerResult);
        assert_eq!(last.log(), "final text");
    }

    #[test]
    fn test_latest_result() {
        let mut state = RunState::new("q", Mode::Combined, MetadataFilters::new());
        let input = state.tool_input();
        state.push(Action::result(ToolKind::Rag, input.clone(), "first"));
        state.push(Action::result(ToolKind::Rag, input, "second"));

        assert_eq!(state.latest_result(ToolKind::Rag).unwrap().log(), "second");
        assert!(state.latest_result(ToolKind::Web).is_none());
    }
}
