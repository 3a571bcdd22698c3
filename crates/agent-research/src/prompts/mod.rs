//! Prompt templates for the research graph
//!
//! Templates are rendered with minijinja. The company under research is a
//! global, so every template can refer to `{{ company }}`.

mod templates;

use crate::error::Result;
use minijinja::Environment;
use serde::Serialize;

pub const ORACLE_FIRST_TOOL: &str = "oracle.first_tool";
pub const ORACLE_NEXT_TOOL: &str = "oracle.next_tool";
pub const RAG_ANSWER: &str = "rag.answer";
pub const WEB_ANALYSIS: &str = "web.analysis";
pub const SNOWFLAKE_SQL: &str = "snowflake.sql";
pub const SNOWFLAKE_COLUMNS: &str = "snowflake.columns";
pub const SNOWFLAKE_SUMMARY: &str = "snowflake.summary";
pub const FINAL_SNOWFLAKE: &str = "final.snowflake";
pub const FINAL_WEB_SEARCH: &str = "final.web_search";
pub const FINAL_COMBINED: &str = "final.combined";
pub const FINAL_PINECONE: &str = "final.pinecone";
pub const FINAL_FALLBACK: &str = "final.fallback";

const TEMPLATES: [(&str, &str); 12] = [
    (ORACLE_FIRST_TOOL, templates::ORACLE_FIRST_TOOL),
    (ORACLE_NEXT_TOOL, templates::ORACLE_NEXT_TOOL),
    (RAG_ANSWER, templates::RAG_ANSWER),
    (WEB_ANALYSIS, templates::WEB_ANALYSIS),
    (SNOWFLAKE_SQL, templates::SNOWFLAKE_SQL),
    (SNOWFLAKE_COLUMNS, templates::SNOWFLAKE_COLUMNS),
    (SNOWFLAKE_SUMMARY, templates::SNOWFLAKE_SUMMARY),
    (FINAL_SNOWFLAKE, templates::FINAL_SNOWFLAKE),
    (FINAL_WEB_SEARCH, templates::FINAL_WEB_SEARCH),
    (FINAL_COMBINED, templates::FINAL_COMBINED),
    (FINAL_PINECONE, templates::FINAL_PINECONE),
    (FINAL_FALLBACK, templates::FINAL_FALLBACK),
];

/// Registry of compiled prompt templates
#[derive(Debug)]
pub struct Prompts {
    env: Environment<'static>,
}

impl Prompts {
    /// Compile all templates for a company
    pub fn new(company: impl Into<String>) -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        for (name, source) in TEMPLATES {
            env.add_template(name, source)?;
        }
        env.add_global("company", company.into());
        Ok(Self { env })
    }

    /// Render a template by name
    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String> {
        let template = self.env.get_template(name)?;
        Ok(template.render(ctx)?)
    }

    /// Names of all registered templates
    pub fn names(&self) -> Vec<&str> {
        self.env.templates().map(|(name, _)| name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use minijinja::context;

    #[test]
    fn test_all_templates_compile() {
        let prompts = Prompts::new("NVIDIA").unwrap();
        assert_eq!(prompts.names().len(), TEMPLATES.len());
    }

    #[test]
    fn test_company_global() {
        let prompts = Prompts::new("AMD").unwrap();
        let text = prompts
            .render(ORACLE_FIRST_TOOL, context! { query => "latest GPUs" })
            .unwrap();
        assert!(text.contains("query about AMD"));
        assert!(text.contains("The user's query is: latest GPUs"));
    }

    #[test]
    fn test_web_analysis_sections() {
        let prompts = Prompts::new("NVIDIA").unwrap();
        let text = prompts
            .render(
                WEB_ANALYSIS,
                context! { news_context => "NEWS ARTICLE", trends_context => "MARKET TREND" },
            )
            .unwrap();
        for section in ["KEY DEVELOPMENTS", "MARKET IMPACT", "INDUSTRY TRENDS", "FUTURE OUTLOOK"] {
            assert!(text.contains(section), "missing {section}");
        }
    }

    #[test]
    fn test_unknown_template() {
        let prompts = Prompts::new("NVIDIA").unwrap();
        assert!(prompts.render("final.unknown", context! {}).is_err());
    }
}
