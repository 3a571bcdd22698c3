//! QuickChart renderer
//!
//! Charts are described as Chart.js configurations and posted to
//! `/chart/create`, which stores the image and returns a short URL.

use super::{ChartRenderer, ChartSpec, check_status};
use crate::config::ChartSettings;
use crate::error::{ResearchError, Result};
use agent_core::ChartKind;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct CreateResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    url: Option<String>,
}

/// QuickChart client
pub struct QuickChartRenderer {
    client: Client,
    settings: ChartSettings,
}

impl QuickChartRenderer {
    /// Create a new renderer
    pub fn new(settings: ChartSettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, settings })
    }

    fn request_body(&self, spec: &ChartSpec) -> Value {
        json!({
            "chart": chart_config(spec),
            "width": self.settings.width,
            "height": self.settings.height,
            "format": "png",
            "backgroundColor": "white",
        })
    }
}

/// Chart.js configuration for a spec
pub fn chart_config(spec: &ChartSpec) -> Value {
    let (chart_type, fill) = match spec.kind {
        ChartKind::TimeSeries => ("line", false),
        ChartKind::Correlation => ("bar", true),
    };
    let datasets: Vec<Value> = spec
        .series
        .iter()
        .map(|series| {
            json!({
                "label": series.name,
                "data": series.values,
                "fill": fill,
            })
        })
        .collect();

    let mut config = json!({
        "type": chart_type,
        "data": {"labels": spec.labels, "datasets": datasets},
        "options": {
            "title": {"display": true, "text": spec.title},
            "legend": {"display": true},
        },
    });
    if spec.kind == ChartKind::Correlation {
        config["options"]["scales"] = json!({"yAxes": [{"ticks": {"min": -1, "max": 1}}]});
    }
    config
}

#[async_trait]
impl ChartRenderer for QuickChartRenderer {
    #[instrument(skip(self, spec), fields(title = %spec.title))]
    async fn render(&self, spec: &ChartSpec) -> Result<String> {
        let url = format!("{}/chart/create", self.settings.quickchart_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&self.request_body(spec))
            .send()
            .await
            .map_err(|e| ResearchError::Api(format!("QuickChart request failed: {e}")))?;

        let body: CreateResponse = check_status("QuickChart", response).await?.json().await?;
        match body.url {
            Some(url) if body.success => {
                debug!(%url, "chart rendered");
                Ok(url)
            }
            _ => Err(ResearchError::Api("QuickChart did not return a chart URL".to_string())),
        }
    }
}
