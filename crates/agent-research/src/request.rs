//! Request payloads and their validation
//!
//! Validation runs before a [`RunState`](agent_core::RunState) exists, so a
//! rejected request never reaches the graph.

use crate::error::{ResearchError, Result};
use agent_core::{MetadataFilters, Mode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;

fn default_mode() -> String {
    Mode::Combined.as_str().to_string()
}

fn default_num_results() -> usize {
    5
}

/// Year to quarters as sent on the wire
pub type YearQuarterDict = BTreeMap<String, Vec<String>>;

/// Collapse the wire map into filters, dropping duplicate quarters
pub fn to_filters(dict: &YearQuarterDict) -> MetadataFilters {
    dict.iter()
        .map(|(year, quarters)| (year.clone(), quarters.iter().cloned().collect()))
        .collect()
}

/// Body of `POST /research`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchRequest {
    pub query: String,
    #[serde(default)]
    pub year_quarter_dict: YearQuarterDict,
    #[serde(default = "default_mode")]
    pub mode: String,
}

/// A request that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest {
    pub query: String,
    pub mode: Mode,
    pub filters: MetadataFilters,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>, mode: Mode) -> Self {
        Self {
            query: query.into(),
            year_quarter_dict: YearQuarterDict::new(),
            mode: mode.as_str().to_string(),
        }
    }

    /// Add quarters for a year
    pub fn with_quarters(mut self, year: impl Into<String>, quarters: &[&str]) -> Self {
        self.year_quarter_dict
            .entry(year.into())
            .or_default()
            .extend(quarters.iter().map(|q| (*q).to_string()));
        self
    }

    /// Check the mode and, for modes that read reports or metrics, that at
    /// least one quarter is selected
    pub fn validate(&self) -> Result<ValidatedRequest> {
        let mode: Mode = self.mode.parse()?;

        let any_quarter = self.year_quarter_dict.values().any(|q| !q.is_empty());
        if mode.requires_filters() && !any_quarter {
            return Err(ResearchError::Validation(format!(
                "For {mode} search, at least one year and quarter must be selected"
            )));
        }

        Ok(ValidatedRequest {
            query: self.query.clone(),
            mode,
            filters: to_filters(&self.year_quarter_dict),
        })
    }
}

/// Body of `POST /summarize_using_pinecone`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeRequest {
    pub query: String,
    #[serde(default)]
    pub year_quarter_dict: YearQuarterDict,
}

/// Body of `POST /web_search`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSearchRequest {
    pub query: String,
    #[serde(default = "default_num_results")]
    pub num_results: usize,
}

/// Sorted `YYYY-Qn` labels for every quarter of the given years
pub fn available_quarters(years: RangeInclusive<u32>) -> Vec<String> {
    let mut quarters: Vec<String> = years
        .flat_map(|year| (1..=4).map(move |q| format!("{year}-Q{q}")))
        .collect();
    quarters.sort();
    quarters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_json() {
        let request: ResearchRequest = serde_json::from_str(r#"{"query": "gpu demand"}"#).unwrap();
        assert_eq!(request.mode, "combined");
        assert!(request.year_quarter_dict.is_empty());

        let web: WebSearchRequest = serde_json::from_str(r#"{"query": "q"}"#).unwrap();
        assert_eq!(web.num_results, 5);
    }

    #[test]
    fn test_valid_request() {
        let validated = ResearchRequest::new("revenue", Mode::Pinecone)
            .with_quarters("2024", &["1", "2", "1"])
            .validate()
            .unwrap();
        assert_eq!(validated.mode, Mode::Pinecone);
        assert_eq!(validated.filters["2024"].len(), 2);
    }

    #[test]
    fn test_unknown_mode() {
        let mut request = ResearchRequest::new("q", Mode::Combined).with_quarters("2024", &["1"]);
        request.mode = "hybrid".to_string();
        let err = request.validate().unwrap_err();
        assert!(matches!(err, ResearchError::Validation(_)));
        assert_eq!(
            err.to_string(),
            "Invalid mode 'hybrid'. Must be one of: pinecone, web_search, snowflake, combined"
        );
    }

    #[test]
    fn test_filters_required_outside_web_mode() {
        let err = ResearchRequest::new("q", Mode::Pinecone).validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "For pinecone search, at least one year and quarter must be selected"
        );

        let all_empty = ResearchRequest::new("q", Mode::Combined).with_quarters("2024", &[]);
        assert!(all_empty.validate().is_err());

        assert!(ResearchRequest::new("q", Mode::WebSearch).validate().is_ok());
    }

    #[test]
    fn test_available_quarters() {
        let quarters = available_quarters(2021..=2025);
        assert_eq!(quarters.len(), 20);
        assert_eq!(quarters.first().map(String::as_str), Some("2021-Q1"));
        assert_eq!(quarters.last().map(String::as_str), Some("2025-Q4"));
    }
}
