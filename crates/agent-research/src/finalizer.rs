//! Final narrative synthesis
//!
//! The finalizer gathers the last result of every tool, asks the LLM for one
//! report, then appends the source links and charts in fixed-format
//! sections. Appended sections are never fed back to the model.

use crate::error::{ResearchError, Result};
use crate::llm::LlmClient;
use crate::prompts::{
    FINAL_COMBINED, FINAL_FALLBACK, FINAL_PINECONE, FINAL_SNOWFLAKE, FINAL_WEB_SEARCH, Prompts,
};
use agent_core::{Action, ActionKind, Chart, Mode, Node, RunState, ToolKind, WebLink};
use async_trait::async_trait;
use minijinja::context;
use regex::Regex;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub const SOURCES_HEADER: &str = "\n\n## Sources and References\n\n";
pub const VISUALIZATIONS_HEADER: &str = "\n\n## Visualizations\n\n";

const NO_METRICS: &str = "No financial metrics data available.";
const NO_REPORTS: &str = "No historical financial data available.";
const NO_NEWS: &str = "No recent news data available.";

/// Last result per tool
#[derive(Debug, Default)]
pub struct Collected<'a> {
    pub rag: Option<&'a Action>,
    pub web: Option<&'a Action>,
    pub snowflake: Option<&'a Action>,
}

impl Collected<'_> {
    pub fn is_empty(&self) -> bool {
        self.rag.is_none() && self.web.is_none() && self.snowflake.is_none()
    }
}

/// Scan the history once, keeping the last result seen for each tool
pub fn collect(history: &[Action]) -> Collected<'_> {
    let mut collected = Collected::default();
    for action in history {
        if let ActionKind::Result(tool) = action.kind() {
            let slot = match tool {
                ToolKind::Rag => &mut collected.rag,
                ToolKind::Web => &mut collected.web,
                ToolKind::Snowflake => &mut collected.snowflake,
            };
            *slot = Some(action);
        }
    }
    collected
}

/// Markdown links with an http(s) target, deduplicated by URL
///
/// Image references (`![..](..)`) are not links.
pub fn extract_links(text: &str) -> Result<Vec<WebLink>> {
    let re = Regex::new(r"(!?)\[(.*?)\]\((https?://[^\s\)]+)\)")
        .map_err(|e| ResearchError::Other(format!("invalid link pattern: {e}")))?;

    let mut seen = HashSet::new();
    Ok(re
        .captures_iter(text)
        .filter(|caps| caps[1].is_empty())
        .filter(|caps| seen.insert(caps[3].to_string()))
        .map(|caps| WebLink {
            title: caps[2].to_string(),
            url: caps[3].to_string(),
        })
        .collect())
}

/// An image block from a `## Visualizations` section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Visualization {
    pub title: String,
    pub url: String,
    pub caption: String,
}

impl From<&Chart> for Visualization {
    fn from(chart: &Chart) -> Self {
        Self {
            title: chart.title.clone(),
            url: chart.url.clone(),
            caption: chart.caption(),
        }
    }
}

/// Image blocks following the first `## Visualizations` header
pub fn extract_visualizations(text: &str) -> Result<Vec<Visualization>> {
    let Some((_, section)) = text.split_once("## Visualizations") else {
        return Ok(Vec::new());
    };
    let re = Regex::new(r"!\[(.*?)\]\((.*?)\)\n\n\*(.*?)\*")
        .map_err(|e| ResearchError::Other(format!("invalid image pattern: {e}")))?;

    Ok(re
        .captures_iter(section)
        .map(|caps| Visualization {
            title: caps[1].to_string(),
            url: caps[2].to_string(),
            caption: caps[3].to_string(),
        })
        .collect())
}

/// Cut the text at the first appended section, if any
pub fn strip_appended_sections(text: &str) -> &str {
    [SOURCES_HEADER, VISUALIZATIONS_HEADER, "## Visualizations"]
        .iter()
        .filter_map(|header| text.find(header))
        .min()
        .map_or(text, |at| &text[..at])
}

/// Append the links and charts sections; sections already present are replaced
pub fn append_sections(text: &str, links: &[WebLink], visualizations: &[Visualization]) -> String {
    let mut out = strip_appended_sections(text).to_string();

    if !links.is_empty() {
        out.push_str(SOURCES_HEADER);
        for link in links {
            let _ = writeln!(out, "- [{}]({})", link.title, link.url);
        }
    }

    if !visualizations.is_empty() {
        out.push_str(VISUALIZATIONS_HEADER);
        for viz in visualizations {
            let _ = write!(out, "![{}]({})\n\n*{}*\n\n", viz.title, viz.url, viz.caption);
        }
    }

    out
}

fn template_for(mode: Mode, collected: &Collected<'_>) -> &'static str {
    if collected.is_empty() {
        return FINAL_FALLBACK;
    }
    match mode {
        Mode::Snowflake => FINAL_SNOWFLAKE,
        Mode::WebSearch => FINAL_WEB_SEARCH,
        Mode::Pinecone => FINAL_PINECONE,
        Mode::Combined => FINAL_COMBINED,
    }
}

fn result_text<'a>(action: Option<&'a Action>, placeholder: &'a str) -> &'a str {
    action
        .map(|a| strip_appended_sections(a.log()))
        .filter(|text| !text.trim().is_empty())
        .unwrap_or(placeholder)
}

/// Terminal node writing the final report
pub struct Finalizer {
    llm: LlmClient,
    prompts: Arc<Prompts>,
}

impl Finalizer {
    pub fn new(llm: LlmClient, prompts: Arc<Prompts>) -> Self {
        Self { llm, prompts }
    }

    /// Produce the final Markdown for a run
    #[instrument(skip(self, state), fields(mode = %state.mode()))]
    pub async fn finalize(&self, state: &RunState) -> Result<String> {
        let collected = collect(state.history());

        let links = match collected.web {
            Some(action) => extract_links(action.log())?,
            None => Vec::new(),
        };
        let visualizations: Vec<Visualization> = collected
            .snowflake
            .map(|action| action.charts().iter().map(Visualization::from).collect())
            .unwrap_or_default();
        info!(
            links = links.len(),
            charts = visualizations.len(),
            "collected references"
        );

        let template = template_for(state.mode(), &collected);
        let prompt = self.prompts.render(
            template,
            context! {
                query => state.input(),
                snowflake_result => result_text(collected.snowflake, NO_METRICS),
                rag_result => result_text(collected.rag, NO_REPORTS),
                web_result => result_text(collected.web, NO_NEWS),
            },
        )?;
        debug!(template, chars = prompt.len(), "final prompt");

        let answer = self.llm.generate(&prompt).await?;
        Ok(append_sections(&answer, &links, &visualizations))
    }
}

#[async_trait]
impl Node for Finalizer {
    async fn run(&self, state: &mut RunState) -> agent_core::Result<()> {
        let text = self
            .finalize(state)
            .await
            .map_err(|e| agent_core::Error::NodeFailed {
                node: self.name().to_string(),
                detail: e.to_string(),
            })?;
        state.complete(text);
        Ok(())
    }

    fn name(&self) -> &str {
        "final_answer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;
    use agent_core::{ChartKind, MetadataFilters};

    fn chart(n: usize) -> Chart {
        Chart {
            url: format!("https://charts.example/{n}.png"),
            title: "Key Metrics Time Series".to_string(),
            columns: vec!["HIGH".to_string(), "CLOSE".to_string()],
            kind: ChartKind::TimeSeries,
        }
    }

    fn run_with(mode: Mode, results: Vec<Action>) -> RunState {
        let mut state = RunState::new("How is NVIDIA doing?", mode, MetadataFilters::new());
        for action in results {
            state.push(action);
        }
        state
    }

    fn result(tool: ToolKind, text: &str) -> Action {
        Action::result(tool, Default::default(), text)
    }

    fn finalizer(llm: &ScriptedLlm) -> Finalizer {
        Finalizer::new(llm.client(), Arc::new(Prompts::new("NVIDIA").unwrap()))
    }

    #[test]
    fn test_collect_keeps_last_result() {
        let history = vec![
            result(ToolKind::Rag, "first"),
            Action::select(ToolKind::Web, Default::default(), "Selected"),
            result(ToolKind::Rag, "second"),
        ];
        let collected = collect(&history);
        assert_eq!(collected.rag.unwrap().log(), "second");
        assert!(collected.web.is_none());
        assert!(!collected.is_empty());
    }

    #[test]
    fn test_extract_links_dedups_by_url() {
        let text = "**1. [Beat](https://a.example/x)**\n🔗 [Reuters](https://a.example/x)\n[Docs](ftp://no)\n[B](http://b.example) ![img](https://i.example/1.png)";
        let links = extract_links(text).unwrap();
        assert_eq!(
            links,
            vec![
                WebLink { title: "Beat".to_string(), url: "https://a.example/x".to_string() },
                WebLink { title: "B".to_string(), url: "http://b.example".to_string() },
            ]
        );
    }

    #[test]
    fn test_extract_visualizations() {
        let text = "Summary\n\n## Visualizations\n\n![Trend](https://c/1.png)\n\n*Trend - CLOSE*\n\n![Corr](https://c/2.png)\n\n*Corr*\n\n";
        let viz = extract_visualizations(text).unwrap();
        assert_eq!(viz.len(), 2);
        assert_eq!(viz[0].caption, "Trend - CLOSE");
        assert_eq!(viz[1].url, "https://c/2.png");
        assert!(extract_visualizations("![x](y)\n\n*z*").unwrap().is_empty());
    }

    #[test]
    fn test_append_sections_layout() {
        let links = vec![WebLink { title: "A".to_string(), url: "https://a".to_string() }];
        let viz = vec![Visualization::from(&chart(1))];
        let out = append_sections("Report", &links, &viz);
        assert_eq!(
            out,
            "Report\n\n## Sources and References\n\n- [A](https://a)\n\n\n## Visualizations\n\n![Key Metrics Time Series](https://charts.example/1.png)\n\n*Key Metrics Time Series - HIGH, CLOSE*\n\n"
        );
        assert_eq!(append_sections("Report", &[], &[]), "Report");
    }

    #[test]
    fn test_appending_is_idempotent() {
        let links = vec![
            WebLink { title: "A".to_string(), url: "https://a".to_string() },
            WebLink { title: "B".to_string(), url: "https://b".to_string() },
        ];
        let viz = vec![Visualization::from(&chart(1)), Visualization::from(&chart(2))];
        let once = append_sections("Report body", &links, &viz);

        let relinked = extract_links(&once).unwrap();
        let reviz = extract_visualizations(&once).unwrap();
        assert_eq!(relinked.len(), links.len());
        assert_eq!(reviz, viz);

        let twice = append_sections(&once, &relinked, &reviz);
        assert_eq!(twice, once);
        assert_eq!(strip_appended_sections(&once), "Report body");
    }

    #[tokio::test]
    async fn test_snowflake_mode_reattaches_charts() {
        let llm = ScriptedLlm::new("Prices rose.");
        let state = run_with(
            Mode::Snowflake,
            vec![
                result(ToolKind::Snowflake, "## Financial Data Analysis\n\nup\n\n")
                    .with_charts(vec![chart(1)]),
            ],
        );

        let text = finalizer(&llm).finalize(&state).await.unwrap();
        assert!(text.starts_with("Prices rose.\n\n## Visualizations\n\n"));
        assert!(!text.contains("Sources and References"));

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains("specializing in NVIDIA financial metrics analysis"));
        assert!(prompt.contains("## Financial Data Analysis"));
        assert!(!prompt.contains("charts.example"));
    }

    #[tokio::test]
    async fn test_combined_uses_placeholders_and_links() {
        let llm = ScriptedLlm::new("Report");
        let state = run_with(
            Mode::Combined,
            vec![result(ToolKind::Web, "**1. [Beat](https://n.example/a)**")],
        );

        let text = finalizer(&llm).finalize(&state).await.unwrap();
        assert_eq!(text, "Report\n\n## Sources and References\n\n- [Beat](https://n.example/a)\n");

        let prompt = &llm.prompts()[0];
        assert!(prompt.contains(NO_METRICS));
        assert!(prompt.contains(NO_REPORTS));
        assert!(!prompt.contains(NO_NEWS));
    }

    #[tokio::test]
    async fn test_no_results_uses_fallback_template() {
        let llm = ScriptedLlm::new("Nothing found");
        let state = run_with(Mode::Pinecone, Vec::new());
        finalizer(&llm).finalize(&state).await.unwrap();
        assert!(llm.prompts()[0].contains("PRESERVE all markdown links"));
    }

    #[tokio::test]
    async fn test_node_completes_state() {
        let llm = ScriptedLlm::new("Done");
        let mut state = run_with(Mode::Pinecone, vec![result(ToolKind::Rag, "Q1 revenue grew")]);
        finalizer(&llm).run(&mut state).await.unwrap();

        assert_eq!(state.output(), Some("Done"));
        assert_eq!(state.last_action().unwrap().kind(), ActionKind::FinalAnswerResult);
        assert!(llm.prompts()[0].contains("QUARTERLY REPORT DATA:\nQ1 revenue grew"));
    }

    #[tokio::test]
    async fn test_llm_failure_propagates() {
        let llm = ScriptedLlm::new("").fail_on("QUERY");
        let mut state = run_with(Mode::Pinecone, vec![result(ToolKind::Rag, "x")]);
        let err = finalizer(&llm).run(&mut state).await.unwrap_err();
        assert!(matches!(
            err,
            agent_core::Error::NodeFailed { ref node, .. } if node == "final_answer"
        ));
        assert!(!state.is_complete());
    }
}
