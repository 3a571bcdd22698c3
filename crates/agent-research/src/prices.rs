//! Daily price ingestion into the financial data table
//!
//! Fetches adjusted daily bars for one ticker, derives the columns the SQL
//! prompts describe (moving averages, annualised volatility, RSI, calendar
//! quarter) and replaces the warehouse table with the result.

use crate::api::{PriceBar, QuoteSource, SnowflakeClient, Warehouse, YahooQuotes};
use crate::config::ResearchConfig;
use crate::error::{ResearchError, Result};
use chrono::{DateTime, Datelike, TimeDelta, Utc};
use serde::Serialize;
use std::sync::Arc;
use ta::Next;
use ta::indicators::{SimpleMovingAverage, StandardDeviation};
use tracing::{info, instrument};

const SHORT_MA: usize = 10;
const LONG_MA: usize = 30;
const RSI_WINDOW: usize = 14;
const VOLATILITY_WINDOW: usize = 20;
const TRADING_DAYS: f64 = 252.0;

/// Rows per INSERT statement
pub const INSERT_BATCH: usize = 500;

/// Table columns in insert order
pub const COLUMNS: [(&str, &str); 16] = [
    ("Ticker", "STRING"),
    ("Date", "TIMESTAMP"),
    ("Open", "FLOAT"),
    ("High", "FLOAT"),
    ("Low", "FLOAT"),
    ("Close", "FLOAT"),
    ("Volume", "INT"),
    ("DailyChange", "FLOAT"),
    ("DailyChangePercent", "FLOAT"),
    ("DollarVolume", "FLOAT"),
    ("MA10", "FLOAT"),
    ("MA30", "FLOAT"),
    ("Volatility20D", "FLOAT"),
    ("RSI", "FLOAT"),
    ("Year", "INT"),
    ("Quarter", "INT"),
];

/// One row of the financial data table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceRow {
    pub ticker: String,
    pub date: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub daily_change: f64,
    pub daily_change_percent: f64,
    pub dollar_volume: f64,
    pub ma10: f64,
    pub ma30: f64,
    /// Annualised standard deviation of daily returns; `None` on the first day
    pub volatility_20d: Option<f64>,
    pub rsi: f64,
    pub year: i32,
    pub quarter: u32,
}

fn indicator_error(e: impl std::fmt::Display) -> ResearchError {
    ResearchError::Ingest(format!("indicator setup failed: {e}"))
}

/// RSI from average gain and loss; a zero loss is treated as epsilon
pub fn rsi(avg_gain: f64, avg_loss: f64) -> f64 {
    let avg_loss = if avg_loss.abs() < f64::EPSILON {
        f64::EPSILON
    } else {
        avg_loss
    };
    100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
}

/// Derive table rows from bars ordered oldest first
///
/// Rolling windows use whatever history exists until they fill up, so the
/// first rows average over fewer days. Volatility is the sample standard
/// deviation of daily returns, with the first return counted as zero.
pub fn compute_rows(ticker: &str, bars: &[PriceBar]) -> Result<Vec<PriceRow>> {
    let mut ma10 = SimpleMovingAverage::new(SHORT_MA).map_err(indicator_error)?;
    let mut ma30 = SimpleMovingAverage::new(LONG_MA).map_err(indicator_error)?;
    let mut gains = SimpleMovingAverage::new(RSI_WINDOW).map_err(indicator_error)?;
    let mut losses = SimpleMovingAverage::new(RSI_WINDOW).map_err(indicator_error)?;
    let mut returns = StandardDeviation::new(VOLATILITY_WINDOW).map_err(indicator_error)?;

    let window = VOLATILITY_WINDOW as f64;
    let mut seen = 0.0_f64;
    let mut previous_close: Option<f64> = None;
    let mut rows = Vec::with_capacity(bars.len());

    for bar in bars {
        let (daily_return, delta) = match previous_close {
            Some(prev) if prev.abs() > f64::EPSILON => (bar.close / prev - 1.0, bar.close - prev),
            Some(prev) => (0.0, bar.close - prev),
            None => (0.0, 0.0),
        };
        previous_close = Some(bar.close);

        let avg_gain = gains.next(delta.max(0.0));
        let avg_loss = losses.next((-delta).max(0.0));

        // ta reports the population deviation over the filled window
        let population = returns.next(daily_return);
        seen = (seen + 1.0).min(window);
        let volatility_20d =
            (seen > 1.0).then(|| population * (seen / (seen - 1.0)).sqrt() * TRADING_DAYS.sqrt());

        rows.push(PriceRow {
            ticker: ticker.to_string(),
            date: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            daily_change: bar.close - bar.open,
            daily_change_percent: (bar.close / bar.open - 1.0) * 100.0,
            dollar_volume: bar.volume as f64 * bar.close,
            ma10: ma10.next(bar.close),
            ma30: ma30.next(bar.close),
            volatility_20d,
            rsi: rsi(avg_gain, avg_loss),
            year: bar.date.year(),
            quarter: bar.date.month0() / 3 + 1,
        });
    }

    Ok(rows)
}

fn check_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(ResearchError::Config(format!("invalid table name '{table}'")))
    }
}

fn sql_float(value: f64) -> String {
    if value.is_finite() {
        value.to_string()
    } else {
        "NULL".to_string()
    }
}

fn sql_text(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// DDL that replaces the table
pub fn create_table_sql(table: &str) -> String {
    let columns = COLUMNS
        .iter()
        .map(|(name, kind)| format!("{name} {kind}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE OR REPLACE TABLE {table} ({columns})")
}

/// One multi-row INSERT; non-finite and missing values become NULL
pub fn insert_sql(table: &str, rows: &[PriceRow]) -> String {
    let columns = COLUMNS
        .iter()
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ");
    let values = rows
        .iter()
        .map(|row| {
            let fields = [
                sql_text(&row.ticker),
                sql_text(&row.date.format("%Y-%m-%d %H:%M:%S").to_string()),
                sql_float(row.open),
                sql_float(row.high),
                sql_float(row.low),
                sql_float(row.close),
                row.volume.to_string(),
                sql_float(row.daily_change),
                sql_float(row.daily_change_percent),
                sql_float(row.dollar_volume),
                sql_float(row.ma10),
                sql_float(row.ma30),
                row.volatility_20d.map_or_else(|| "NULL".to_string(), sql_float),
                sql_float(row.rsi),
                row.year.to_string(),
                row.quarter.to_string(),
            ];
            format!("({})", fields.join(", "))
        })
        .collect::<Vec<_>>()
        .join(", ");
    format!("INSERT INTO {table} ({columns}) VALUES {values}")
}

/// Outcome of one price load
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceLoadReport {
    pub ticker: String,
    pub rows: usize,
    pub statements: usize,
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
}

/// Loads daily prices into the warehouse
pub struct PriceLoader {
    quotes: Arc<dyn QuoteSource>,
    warehouse: Arc<dyn Warehouse>,
    table: String,
    batch_size: usize,
}

impl PriceLoader {
    pub fn new(
        quotes: Arc<dyn QuoteSource>,
        warehouse: Arc<dyn Warehouse>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            quotes,
            warehouse,
            table: table.into(),
            batch_size: INSERT_BATCH,
        }
    }

    /// Yahoo Finance quotes written through the Snowflake SQL API
    pub fn from_config(config: &ResearchConfig) -> Result<Self> {
        let warehouse = SnowflakeClient::new(config.snowflake.clone(), config.request_timeout)?;
        Ok(Self::new(
            Arc::new(YahooQuotes::new()),
            Arc::new(warehouse),
            config.snowflake.table.clone(),
        ))
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Replace the table with `years` of daily history for `ticker`
    #[instrument(skip(self), fields(table = %self.table))]
    pub async fn load(&self, ticker: &str, years: u32) -> Result<PriceLoadReport> {
        check_table_name(&self.table)?;

        let end = Utc::now();
        let start = end - TimeDelta::days(365 * i64::from(years));
        let mut bars = self.quotes.daily_history(ticker, start, end).await?;
        bars.sort_by_key(|bar| bar.date);

        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            return Err(ResearchError::Ingest(format!(
                "no daily prices returned for {ticker}"
            )));
        };
        let (first, last) = (first.date, last.date);

        let rows = compute_rows(ticker, &bars)?;

        self.warehouse
            .execute(&create_table_sql(&self.table))
            .await?;
        let mut statements = 1;
        for batch in rows.chunks(self.batch_size) {
            self.warehouse
                .execute(&insert_sql(&self.table, batch))
                .await?;
            statements += 1;
        }

        info!(rows = rows.len(), statements, "daily prices loaded");

        Ok(PriceLoadReport {
            ticker: ticker.to_string(),
            rows: rows.len(),
            statements,
            first,
            last,
        })
    }
}
