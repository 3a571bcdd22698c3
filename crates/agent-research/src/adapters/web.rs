//! Web news and trend search

use super::{ToolAdapter, ToolOutput};
use crate::api::{SearchHit, SearchProvider, SearchScope};
use crate::error::{ResearchError, Result};
use crate::llm::LlmClient;
use crate::prompts::{Prompts, WEB_ANALYSIS};
use agent_core::{MetadataFilters, ToolKind};
use async_trait::async_trait;
use minijinja::context;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Text under the header when both searches come back empty
pub const NO_RESULTS: &str = "No relevant results found.";

/// News plus general-web search, summarised by the LLM
pub struct WebSearch {
    provider: Arc<dyn SearchProvider>,
    llm: LlmClient,
    prompts: Arc<Prompts>,
    company: String,
    num_results: usize,
}

impl WebSearch {
    pub fn new(
        provider: Arc<dyn SearchProvider>,
        llm: LlmClient,
        prompts: Arc<Prompts>,
        company: impl Into<String>,
        num_results: usize,
    ) -> Self {
        Self {
            provider,
            llm,
            prompts,
            company: company.into(),
            num_results,
        }
    }

    /// Recent news about the company and a topic
    pub async fn news(&self, query: &str, num: usize) -> Result<Vec<SearchHit>> {
        let q = format!("{} {query}", self.company);
        self.provider.search(&q, SearchScope::News, num).await
    }

    /// Trend and analysis articles
    pub async fn trends(&self, query: &str, num: usize) -> Result<Vec<SearchHit>> {
        let q = format!("{} {query} trends analysis research", self.company);
        self.provider.search(&q, SearchScope::Web, num).await
    }

    /// Run both searches and format them as Markdown with LLM insights
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str) -> Result<String> {
        let news = self.news(query, self.num_results).await;
        let trends = self.trends(query, self.num_results).await;

        let (news, trends) = match (news, trends) {
            (Err(news_err), Err(trends_err)) => {
                return Err(ResearchError::Api(format!(
                    "news search failed: {news_err}; trend search failed: {trends_err}"
                )));
            }
            (news, trends) => (
                news.unwrap_or_else(|e| {
                    warn!(error = %e, "news search failed");
                    Vec::new()
                }),
                trends.unwrap_or_else(|e| {
                    warn!(error = %e, "trend search failed");
                    Vec::new()
                }),
            ),
        };
        info!(news = news.len(), trends = trends.len(), "web search results");

        if news.is_empty() && trends.is_empty() {
            return Ok(format_markdown(&news, &trends, None));
        }

        let prompt = self.prompts.render(
            WEB_ANALYSIS,
            context! {
                news_context => news_context(&news),
                trends_context => trends_context(&trends),
            },
        )?;
        let insights = match self.llm.generate(&prompt).await {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(error = %e, "web insights failed, returning results only");
                None
            }
        };

        Ok(format_markdown(&news, &trends, insights.as_deref()))
    }
}

fn news_context(news: &[SearchHit]) -> String {
    news.iter()
        .map(|item| {
            format!(
                "NEWS ARTICLE:\nTitle: {}\nDate: {}\nSource: {}\nSummary: {}\n",
                item.title, item.date, item.source, item.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn trends_context(trends: &[SearchHit]) -> String {
    trends
        .iter()
        .map(|item| format!("MARKET TREND:\nTitle: {}\nSummary: {}\n", item.title, item.snippet))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Markdown block for the web result, with clickable links
pub fn format_markdown(news: &[SearchHit], trends: &[SearchHit], insights: Option<&str>) -> String {
    let mut out = String::from("### Recent News and Analysis\n\n");

    if news.is_empty() && trends.is_empty() {
        out.push_str(NO_RESULTS);
        return out;
    }

    if !news.is_empty() {
        out.push_str("#### 📰 Latest News\n\n");
        for (i, item) in news.iter().enumerate() {
            let _ = writeln!(out, "**{}. [{}]({})**", i + 1, item.title, item.link);
            let _ = writeln!(out, "📅 {} | 🔗 [{}]({})", item.date, item.source, item.link);
            let _ = write!(out, "Summary: {}\n\n", item.snippet);
        }
    }

    if !trends.is_empty() {
        out.push_str("#### 📈 Market Trends & Analysis\n\n");
        for (i, item) in trends.iter().enumerate() {
            let _ = writeln!(out, "**{}. [{}]({})**", i + 1, item.title, item.link);
            let _ = writeln!(out, "Source: [{}]({})", item.source, item.link);
            let _ = write!(out, "Key Points: {}\n\n", item.snippet);
        }
    }

    if let Some(insights) = insights {
        out.push_str("#### 🔍 Analysis\n\n");
        let _ = write!(out, "{insights}\n\n");
    }

    out
}

#[async_trait]
impl ToolAdapter for WebSearch {
    fn kind(&self) -> ToolKind {
        ToolKind::Web
    }

    async fn run(&self, query: &str, _filters: &MetadataFilters) -> Result<ToolOutput> {
        self.search(query).await.map(ToolOutput::text)
    }
}
