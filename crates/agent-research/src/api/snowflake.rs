//! Snowflake SQL API v2 client
//!
//! Statements are submitted to `/api/v2/statements`. Long-running statements
//! come back as `202 Accepted` and are polled until they finish; large
//! results are split into partitions that are fetched one by one. All cell
//! values arrive as strings and are converted using the column metadata.

use super::{Warehouse, check_status, require};
use crate::config::SnowflakeSettings;
use crate::error::{ResearchError, Result};
use crate::table::Table;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeDelta};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument};

const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ColumnType {
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    scale: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResultSetMetaData {
    #[serde(default)]
    row_type: Vec<ColumnType>,
    #[serde(default)]
    partition_info: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatementResponse {
    #[serde(default)]
    result_set_meta_data: Option<ResultSetMetaData>,
    #[serde(default)]
    data: Vec<Vec<Option<String>>>,
    #[serde(default)]
    statement_handle: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Snowflake SQL API client
pub struct SnowflakeClient {
    client: Client,
    settings: SnowflakeSettings,
    timeout: Duration,
}

impl SnowflakeClient {
    /// Create a new client
    pub fn new(settings: SnowflakeSettings, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            settings,
            timeout,
        })
    }

    fn base_url(&self) -> Result<String> {
        let account = require(self.settings.account.as_ref(), "SNOWFLAKE_ACCOUNT")?;
        Ok(format!("https://{account}.snowflakecomputing.com/api/v2/statements"))
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = require(self.settings.token.as_ref(), "SNOWFLAKE_TOKEN")?;
        Ok(builder
            .bearer_auth(token)
            .header("X-Snowflake-Authorization-Token-Type", &self.settings.token_type)
            .header("Accept", "application/json"))
    }

    fn statement_body(&self, sql: &str) -> Value {
        let mut body = json!({
            "statement": sql,
            "timeout": self.timeout.as_secs(),
            "database": self.settings.database,
            "schema": self.settings.schema,
        });
        if let Some(warehouse) = &self.settings.warehouse {
            body["warehouse"] = json!(warehouse);
        }
        if let Some(role) = &self.settings.role {
            body["role"] = json!(role);
        }
        body
    }

    async fn get_statement(
        &self,
        base: &str,
        handle: &str,
        partition: Option<usize>,
    ) -> Result<(StatusCode, StatementResponse)> {
        let mut builder = self.client.get(format!("{base}/{handle}"));
        if let Some(partition) = partition {
            builder = builder.query(&[("partition", partition)]);
        }
        let response = self
            .request(builder)?
            .send()
            .await
            .map_err(|e| ResearchError::Api(format!("Snowflake request failed: {e}")))?;
        let response = check_status("Snowflake", response).await?;
        let status = response.status();
        Ok((status, response.json().await?))
    }

    async fn wait_for(&self, base: &str, handle: &str) -> Result<StatementResponse> {
        let attempts = (self.timeout.as_millis() / POLL_INTERVAL.as_millis()).max(1);
        for _ in 0..attempts {
            tokio::time::sleep(POLL_INTERVAL).await;
            let (status, body) = self.get_statement(base, handle, None).await?;
            if status != StatusCode::ACCEPTED {
                return Ok(body);
            }
        }
        Err(ResearchError::Api(format!(
            "Snowflake statement {handle} did not finish within {}s",
            self.timeout.as_secs()
        )))
    }
}

#[async_trait]
impl Warehouse for SnowflakeClient {
    #[instrument(skip(self, sql))]
    async fn execute(&self, sql: &str) -> Result<Table> {
        let base = self.base_url()?;
        let response = self
            .request(self.client.post(&base))?
            .json(&self.statement_body(sql))
            .send()
            .await
            .map_err(|e| ResearchError::Api(format!("Snowflake request failed: {e}")))?;
        let response = check_status("Snowflake", response).await?;
        let status = response.status();
        let mut body: StatementResponse = response.json().await?;

        if status == StatusCode::ACCEPTED {
            let handle = body.statement_handle.clone().ok_or_else(|| {
                ResearchError::Api("Snowflake accepted the statement without a handle".to_string())
            })?;
            debug!(%handle, "statement still running");
            body = self.wait_for(&base, &handle).await?;
        }

        let meta = body.result_set_meta_data.take().ok_or_else(|| {
            ResearchError::Api(format!(
                "Snowflake returned no result set: {}",
                body.message.clone().unwrap_or_default()
            ))
        })?;

        let mut raw_rows = std::mem::take(&mut body.data);
        if meta.partition_info.len() > 1 {
            if let Some(handle) = body.statement_handle.as_deref() {
                for partition in 1..meta.partition_info.len() {
                    let (_, part) = self.get_statement(&base, handle, Some(partition)).await?;
                    raw_rows.extend(part.data);
                }
            }
        }

        let table = build_table(&meta.row_type, raw_rows);
        debug!(rows = table.len(), columns = table.columns.len(), "statement finished");
        Ok(table)
    }
}

fn build_table(columns: &[ColumnType], rows: Vec<Vec<Option<String>>>) -> Table {
    let names = columns.iter().map(|c| c.name.clone()).collect();
    let rows = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(columns)
                .map(|(cell, column)| convert_cell(cell.as_deref(), column))
                .collect()
        })
        .collect();
    Table::new(names, rows)
}

fn convert_cell(cell: Option<&str>, column: &ColumnType) -> Value {
    let Some(raw) = cell else {
        return Value::Null;
    };
    let kind = column.kind.to_ascii_lowercase();
    match kind.as_str() {
        "fixed" if column.scale.unwrap_or(0) == 0 => raw
            .parse::<i64>()
            .map_or_else(|_| json!(raw), |n| json!(n)),
        "fixed" | "real" => raw
            .parse::<f64>()
            .map_or_else(|_| json!(raw), |n| json!(n)),
        "boolean" => json!(raw.eq_ignore_ascii_case("true")),
        "date" => raw
            .parse::<i64>()
            .ok()
            .and_then(epoch_days_to_date)
            .map_or_else(|| json!(raw), |d| json!(d)),
        k if k.starts_with("timestamp") => epoch_seconds_to_text(raw)
            .map_or_else(|| json!(raw), |d| json!(d)),
        _ => json!(raw),
    }
}

fn epoch_days_to_date(days: i64) -> Option<String> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    let date = epoch.checked_add_signed(TimeDelta::try_days(days)?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

// "1704067200.000000000" or, for TIMESTAMP_TZ, "1704067200.000000000 1440"
fn epoch_seconds_to_text(raw: &str) -> Option<String> {
    let seconds = raw.split_whitespace().next()?;
    let (secs, frac) = seconds.split_once('.').unwrap_or((seconds, "0"));
    let secs: i64 = secs.parse().ok()?;
    let nanos: u32 = format!("{frac:0<9}").get(..9)?.parse().ok()?;
    let ts = DateTime::from_timestamp(secs, nanos)?.naive_utc();
    if ts.time() == chrono::NaiveTime::MIN {
        Some(ts.format("%Y-%m-%d").to_string())
    } else {
        Some(ts.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}
