//! Structured financial data from the warehouse
//!
//! The LLM writes two statements (aggregated and raw). The raw rows feed the
//! statistics and the charts; everything is then narrated by the LLM.

use super::{ToolAdapter, ToolOutput};
use crate::api::{ChartRenderer, ChartSpec, Series, Warehouse};
use crate::error::{ResearchError, Result};
use crate::llm::LlmClient;
use crate::prompts::{Prompts, SNOWFLAKE_COLUMNS, SNOWFLAKE_SQL, SNOWFLAKE_SUMMARY};
use crate::table::{Table, cell_text};
use agent_core::{Chart, ChartKind, MetadataFilters, ToolKind};
use async_trait::async_trait;
use minijinja::context;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const NON_METRIC_COLUMNS: [&str; 4] = ["DATE", "Date", "Year", "Quarter"];
const PRICE_COLUMNS: [&str; 4] = ["HIGH", "LOW", "CLOSE", "DOLLARVOLUME"];
const INDICATOR_COLUMNS: [&str; 4] = ["MA10", "MA30", "RSI", "VOLATILITY20D"];
const TIME_SERIES_TITLE: &str = "Key Metrics Time Series";
const CORRELATION_TITLE: &str = "Metrics Correlation Analysis";
const MAX_PLOTTED: usize = 3;
const SAMPLE_ROWS: usize = 5;

/// SQL statements in an LLM reply, in order, each ending at its semicolon
pub fn extract_sql(text: &str) -> Result<Vec<String>> {
    let re = Regex::new(r"(?i)(SELECT[\s\S]*?);")
        .map_err(|e| ResearchError::Other(format!("invalid SQL pattern: {e}")))?;
    Ok(re
        .captures_iter(text)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect())
}

/// Pick the columns to chart from the LLM's comma-separated answer
///
/// Names are kept only if they are metric columns of the table. Falls back
/// to price columns, then to technical indicators.
pub fn relevant_columns(answer: &str, available: &[String]) -> Vec<String> {
    let metrics: Vec<&String> = available
        .iter()
        .filter(|c| !NON_METRIC_COLUMNS.contains(&c.as_str()))
        .collect();

    let mut chosen: Vec<String> = Vec::new();
    let names = answer
        .split(',')
        .map(|s| s.trim().trim_matches(|c| c == '`' || c == '"' || c == '\''));
    for name in names {
        if metrics.iter().any(|c| c.as_str() == name) && !chosen.iter().any(|c| c == name) {
            chosen.push(name.to_string());
        }
    }
    if !chosen.is_empty() {
        return chosen;
    }

    for defaults in [PRICE_COLUMNS, INDICATOR_COLUMNS] {
        let found: Vec<String> = defaults
            .iter()
            .filter(|d| available.iter().any(|c| c == *d))
            .take(MAX_PLOTTED)
            .map(|d| (*d).to_string())
            .collect();
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

/// Correlation chart data: one series per column, one bar per other column
fn correlation_spec(table: &Table, columns: &[String]) -> ChartSpec {
    let series = columns
        .iter()
        .map(|a| Series {
            name: a.clone(),
            values: columns
                .iter()
                .map(|b| if a == b { 1.0 } else { table.correlation(a, b).unwrap_or(0.0) })
                .collect(),
        })
        .collect();
    ChartSpec {
        kind: ChartKind::Correlation,
        title: CORRELATION_TITLE.to_string(),
        labels: columns.to_vec(),
        series,
    }
}

fn time_series_spec(table: &Table, columns: &[String]) -> ChartSpec {
    let sorted = table.sorted_by("DATE");
    let labels = sorted
        .column("DATE")
        .into_iter()
        .map(|v| cell_text(Some(v)))
        .collect();
    let series = columns
        .iter()
        .map(|name| Series {
            name: name.clone(),
            values: sorted
                .numeric_column(name)
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect(),
        })
        .collect();
    ChartSpec {
        kind: ChartKind::TimeSeries,
        title: TIME_SERIES_TITLE.to_string(),
        labels,
        series,
    }
}

/// Warehouse-backed metrics analysis
pub struct SnowflakeSearch {
    warehouse: Arc<dyn Warehouse>,
    charts: Arc<dyn ChartRenderer>,
    llm: LlmClient,
    prompts: Arc<Prompts>,
    table: String,
}

impl SnowflakeSearch {
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        charts: Arc<dyn ChartRenderer>,
        llm: LlmClient,
        prompts: Arc<Prompts>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            warehouse,
            charts,
            llm,
            prompts,
            table: table.into(),
        }
    }

    async fn fetch(&self, sql: Option<&String>) -> Table {
        let Some(sql) = sql else {
            return Table::default();
        };
        match self.warehouse.execute(sql).await {
            Ok(table) => table,
            Err(e) => {
                warn!(error = %e, "statement failed, continuing with no rows");
                Table::default()
            }
        }
    }

    async fn chart_columns(&self, query: &str, raw: &Table) -> Vec<String> {
        let offered: Vec<&String> = raw
            .columns
            .iter()
            .filter(|c| !NON_METRIC_COLUMNS.contains(&c.as_str()))
            .collect();
        let offered = offered.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ");

        let answer = match self
            .prompts
            .render(SNOWFLAKE_COLUMNS, context! { query, columns => offered })
        {
            Ok(prompt) => self.llm.generate(&prompt).await.unwrap_or_else(|e| {
                warn!(error = %e, "column selection failed, using defaults");
                String::new()
            }),
            Err(e) => {
                warn!(error = %e, "column prompt failed, using defaults");
                String::new()
            }
        };

        let numeric = raw.numeric_columns();
        relevant_columns(&answer, &raw.columns)
            .into_iter()
            .filter(|c| numeric.contains(c))
            .collect()
    }

    async fn render(&self, spec: ChartSpec, columns: Vec<String>) -> Option<Chart> {
        match self.charts.render(&spec).await {
            Ok(url) => Some(Chart {
                url,
                title: spec.title,
                columns,
                kind: spec.kind,
            }),
            Err(e) => {
                warn!(error = %e, title = %spec.title, "chart rendering failed");
                None
            }
        }
    }

    async fn visualize(&self, query: &str, raw: &Table) -> Vec<Chart> {
        if raw.is_empty() || !raw.has_column("DATE") {
            return Vec::new();
        }

        let columns = self.chart_columns(query, raw).await;
        if columns.is_empty() {
            return Vec::new();
        }

        let plotted: Vec<String> = columns.iter().take(MAX_PLOTTED).cloned().collect();
        let mut charts = Vec::new();
        if let Some(chart) = self.render(time_series_spec(raw, &plotted), plotted).await {
            charts.push(chart);
        }
        if columns.len() > 1 {
            if let Some(chart) = self
                .render(correlation_spec(raw, &columns), columns.clone())
                .await
            {
                charts.push(chart);
            }
        }
        charts
    }

    /// Generate SQL, run it, chart it and summarise it
    #[instrument(skip(self, filters))]
    pub async fn analyze(&self, query: &str, filters: &MetadataFilters) -> Result<ToolOutput> {
        let year_quarter_dict = serde_json::to_string(filters)?;
        let prompt = self.prompts.render(
            SNOWFLAKE_SQL,
            context! { query, year_quarter_dict, table => &self.table },
        )?;
        let reply = self.llm.generate(&prompt).await?;

        let statements = extract_sql(&reply)?;
        debug!(count = statements.len(), "extracted SQL statements");
        let aggregated = self.fetch(statements.first()).await;
        let raw = self.fetch(statements.get(1)).await;

        let charts = self.visualize(query, &raw).await;
        info!(rows = raw.len(), charts = charts.len(), "warehouse data fetched");

        let stats: BTreeMap<_, _> = raw.stats();
        let prompt = self.prompts.render(
            SNOWFLAKE_SUMMARY,
            context! {
                query,
                aggregated => serde_json::to_string(&aggregated.records(usize::MAX))?,
                sample => serde_json::to_string(&raw.records(SAMPLE_ROWS))?,
                stats => serde_json::to_string(&stats)?,
            },
        )?;
        let summary = self.llm.generate(&prompt).await?;

        Ok(ToolOutput {
            text: format!("## Financial Data Analysis\n\n{summary}\n\n"),
            charts,
        })
    }
}

#[async_trait]
impl ToolAdapter for SnowflakeSearch {
    fn kind(&self) -> ToolKind {
        ToolKind::Snowflake
    }

    async fn run(&self, query: &str, filters: &MetadataFilters) -> Result<ToolOutput> {
        self.analyze(query, filters).await
    }
}
