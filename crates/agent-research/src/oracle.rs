//! Tool-selection policy
//!
//! Single-tool modes are deterministic: run the mode's tool once, then
//! finish. Combined mode asks a [`ToolRanker`] for the next tool, maps the
//! free-text reply onto a tool, and repairs choices that are already used.

use crate::error::Result;
use crate::llm::LlmClient;
use crate::prompts::{ORACLE_FIRST_TOOL, ORACLE_NEXT_TOOL, Prompts};
use agent_core::{Action, Node, RunState, ToolKind};
use async_trait::async_trait;
use minijinja::context;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Ranks candidate tools for a query and replies in free text
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolRanker: Send + Sync {
    /// `used` is empty for the first choice
    async fn rank(&self, query: &str, used: &[ToolKind], candidates: &[ToolKind]) -> Result<String>;
}

/// Ranker backed by the LLM
pub struct LlmRanker {
    llm: LlmClient,
    prompts: Arc<Prompts>,
}

impl LlmRanker {
    pub fn new(llm: LlmClient, prompts: Arc<Prompts>) -> Self {
        Self { llm, prompts }
    }
}

fn labels(tools: &[ToolKind]) -> String {
    let quoted: Vec<String> = tools.iter().map(|t| format!("'{}'", t.label())).collect();
    format!("[{}]", quoted.join(", "))
}

#[async_trait]
impl ToolRanker for LlmRanker {
    async fn rank(
        &self,
        query: &str,
        used: &[ToolKind],
        candidates: &[ToolKind],
    ) -> Result<String> {
        let prompt = if used.is_empty() {
            self.prompts.render(ORACLE_FIRST_TOOL, context! { query })?
        } else {
            self.prompts.render(
                ORACLE_NEXT_TOOL,
                context! {
                    query,
                    used_tools => labels(used),
                    unused_tools => labels(candidates),
                },
            )?
        };
        self.llm.generate(&prompt).await
    }
}

/// What the oracle decided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Tool(ToolKind),
    Finish,
}

impl Decision {
    /// Menu label recorded in the history
    pub fn label(self) -> &'static str {
        match self {
            Self::Tool(tool) => tool.label(),
            Self::Finish => "final_answer",
        }
    }
}

/// Map a free-text reply onto a decision by substring, case-insensitively
pub fn normalize_choice(raw: &str) -> Decision {
    let choice = raw.trim().to_lowercase();
    if choice.contains("pinecone") {
        Decision::Tool(ToolKind::Rag)
    } else if choice.contains("web") {
        Decision::Tool(ToolKind::Web)
    } else if choice.contains("snow") {
        Decision::Tool(ToolKind::Snowflake)
    } else {
        Decision::Finish
    }
}

/// Keep a choice that is still unused, otherwise take the first unused tool
/// in canonical order; finish once nothing is left
pub fn repair(choice: Decision, unused: &BTreeSet<ToolKind>) -> Decision {
    match choice {
        Decision::Tool(tool) if unused.contains(&tool) => choice,
        _ => ToolKind::ALL
            .into_iter()
            .find(|tool| unused.contains(tool))
            .map_or(Decision::Finish, Decision::Tool),
    }
}

/// Decision node at the head of every cycle
pub struct Oracle {
    ranker: Arc<dyn ToolRanker>,
}

impl Oracle {
    pub fn new(ranker: Arc<dyn ToolRanker>) -> Self {
        Self { ranker }
    }

    async fn ask(&self, query: &str, used: &[ToolKind], candidates: &[ToolKind]) -> String {
        self.ranker
            .rank(query, used, candidates)
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "tool ranking failed, treating reply as empty");
                String::new()
            })
    }

    /// Choose the next tool or decide to finish
    pub async fn decide(&self, state: &RunState) -> Decision {
        let used = state.used_tools();

        if let Some(tool) = state.mode().single_tool() {
            return if used.is_empty() {
                Decision::Tool(tool)
            } else {
                Decision::Finish
            };
        }

        let unused: BTreeSet<ToolKind> = ToolKind::ALL
            .into_iter()
            .filter(|tool| !used.contains(tool))
            .collect();

        if used.is_empty() {
            let reply = self.ask(state.input(), &[], &ToolKind::ALL).await;
            info!(reply = %reply.trim(), "ranker chose first tool");
            normalize_choice(&reply)
        } else if unused.is_empty() {
            Decision::Finish
        } else {
            let used: Vec<ToolKind> = used.into_iter().collect();
            let candidates: Vec<ToolKind> = unused.iter().copied().collect();
            let reply = self.ask(state.input(), &used, &candidates).await;
            repair(normalize_choice(&reply), &unused)
        }
    }
}

#[async_trait]
impl Node for Oracle {
    async fn run(&self, state: &mut RunState) -> agent_core::Result<()> {
        let decision = self.decide(state).await;
        let log = format!("Selected {} based on mode: {}", decision.label(), state.mode());
        info!(decision = decision.label(), mode = %state.mode(), "oracle decided");

        let input = state.tool_input();
        let action = match decision {
            Decision::Tool(tool) => Action::select(tool, input, log),
            Decision::Finish => Action::final_answer(input, log),
        };
        state.push(action);
        Ok(())
    }

    fn name(&self) -> &str {
        "oracle"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{ActionKind, MetadataFilters, Mode};
    use mockall::predicate::always;

    fn state(mode: Mode) -> RunState {
        RunState::new("How did data center revenue evolve?", mode, MetadataFilters::new())
    }

    fn select(state: &mut RunState, tool: ToolKind) {
        let input = state.tool_input();
        state.push(Action::select(tool, input.clone(), "Selected"));
        state.push(Action::result(tool, input, "result"));
    }

    fn ranker(reply: &'static str) -> Arc<MockToolRanker> {
        let mut ranker = MockToolRanker::new();
        ranker
            .expect_rank()
            .returning(move |_, _, _| Ok(reply.to_string()));
        Arc::new(ranker)
    }

    #[test]
    fn test_normalize_choice() {
        assert_eq!(normalize_choice("Pinecone"), Decision::Tool(ToolKind::Rag));
        assert_eq!(normalize_choice("  \"web_search\"\n"), Decision::Tool(ToolKind::Web));
        assert_eq!(normalize_choice("SNOWFLAKE"), Decision::Tool(ToolKind::Snowflake));
        assert_eq!(normalize_choice("I would start with the reports"), Decision::Finish);
        assert_eq!(normalize_choice(""), Decision::Finish);
    }

    #[test]
    fn test_repair() {
        let unused: BTreeSet<ToolKind> = [ToolKind::Web, ToolKind::Snowflake].into_iter().collect();
        assert_eq!(
            repair(Decision::Tool(ToolKind::Snowflake), &unused),
            Decision::Tool(ToolKind::Snowflake)
        );
        assert_eq!(repair(Decision::Tool(ToolKind::Rag), &unused), Decision::Tool(ToolKind::Web));
        assert_eq!(repair(Decision::Finish, &unused), Decision::Tool(ToolKind::Web));
        assert_eq!(repair(Decision::Tool(ToolKind::Rag), &BTreeSet::new()), Decision::Finish);
    }

    #[tokio::test]
    async fn test_single_mode_never_asks_ranker() {
        let mut mock = MockToolRanker::new();
        mock.expect_rank().never();
        let oracle = Oracle::new(Arc::new(mock));

        let mut s = state(Mode::Snowflake);
        assert_eq!(oracle.decide(&s).await, Decision::Tool(ToolKind::Snowflake));
        select(&mut s, ToolKind::Snowflake);
        assert_eq!(oracle.decide(&s).await, Decision::Finish);
    }

    #[tokio::test]
    async fn test_combined_first_choice_is_not_repaired() {
        let oracle = Oracle::new(ranker("none of these"));
        assert_eq!(oracle.decide(&state(Mode::Combined)).await, Decision::Finish);

        let oracle = Oracle::new(ranker("web_search"));
        assert_eq!(oracle.decide(&state(Mode::Combined)).await, Decision::Tool(ToolKind::Web));
    }

    #[tokio::test]
    async fn test_combined_next_choice_is_repaired() {
        let oracle = Oracle::new(ranker("pinecone"));
        let mut s = state(Mode::Combined);
        select(&mut s, ToolKind::Rag);
        assert_eq!(oracle.decide(&s).await, Decision::Tool(ToolKind::Web));
    }

    #[tokio::test]
    async fn test_combined_passes_unused_candidates() {
        let mut mock = MockToolRanker::new();
        mock.expect_rank()
            .with(always(), always(), always())
            .times(1)
            .returning(|_, used, candidates| {
                assert_eq!(used, &[ToolKind::Web]);
                assert_eq!(candidates, &[ToolKind::Rag, ToolKind::Snowflake]);
                Ok("snowflake".to_string())
            });
        let oracle = Oracle::new(Arc::new(mock));
        let mut s = state(Mode::Combined);
        select(&mut s, ToolKind::Web);
        assert_eq!(oracle.decide(&s).await, Decision::Tool(ToolKind::Snowflake));
    }

    #[tokio::test]
    async fn test_combined_finishes_when_exhausted() {
        let mut mock = MockToolRanker::new();
        mock.expect_rank().never();
        let oracle = Oracle::new(Arc::new(mock));
        let mut s = state(Mode::Combined);
        for tool in ToolKind::ALL {
            select(&mut s, tool);
        }
        assert_eq!(oracle.decide(&s).await, Decision::Finish);
    }

    #[tokio::test]
    async fn test_ranker_error_is_empty_reply() {
        let mut mock = MockToolRanker::new();
        mock.expect_rank()
            .returning(|_, _, _| Err(crate::error::ResearchError::Api("down".to_string())));
        let oracle = Oracle::new(Arc::new(mock));

        assert_eq!(oracle.decide(&state(Mode::Combined)).await, Decision::Finish);

        let mut s = state(Mode::Combined);
        select(&mut s, ToolKind::Snowflake);
        assert_eq!(oracle.decide(&s).await, Decision::Tool(ToolKind::Rag));
    }

    #[tokio::test]
    async fn test_node_appends_selection() {
        let oracle = Oracle::new(ranker("snowflake please"));
        let mut s = state(Mode::Combined);
        oracle.run(&mut s).await.unwrap();

        let last = s.last_action().unwrap();
        assert_eq!(last.kind(), ActionKind::Select(ToolKind::Snowflake));
        assert_eq!(last.log(), "Selected snowflake based on mode: combined");
        assert_eq!(last.tool_input().query, s.input());
    }

    #[tokio::test]
    async fn test_node_appends_final_answer() {
        let oracle = Oracle::new(ranker("unused"));
        let mut s = state(Mode::WebSearch);
        select(&mut s, ToolKind::Web);
        oracle.run(&mut s).await.unwrap();
        assert_eq!(s.last_action().unwrap().kind(), ActionKind::FinalAnswer);
        assert_eq!(
            s.last_action().unwrap().log(),
            "Selected final_answer based on mode: web_search"
        );
    }

    #[tokio::test]
    async fn test_llm_ranker_prompts() {
        let llm = crate::testing::ScriptedLlm::new("pinecone");
        let ranker = LlmRanker::new(llm.client(), Arc::new(Prompts::new("NVIDIA").unwrap()));

        ranker.rank("q", &[], &ToolKind::ALL).await.unwrap();
        ranker.rank("q", &[ToolKind::Rag], &[ToolKind::Web, ToolKind::Snowflake]).await.unwrap();

        let prompts = llm.prompts();
        assert!(prompts[0].contains("decides which tool to use first"));
        assert!(prompts[1].contains("already used these tools: ['pinecone']"));
        assert!(prompts[1].contains(
            "remaining tools would be most valuable next: ['web_search', 'snowflake']?"
        ));
    }
}
