//! Yahoo Finance daily history

use super::{PriceBar, QuoteSource};
use crate::error::{ResearchError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use time::OffsetDateTime;
use tracing::{debug, instrument};
use yahoo_finance_api as yahoo;

/// Daily bars from Yahoo Finance, adjusted for splits and dividends
#[derive(Debug, Default, Clone, Copy)]
pub struct YahooQuotes;

impl YahooQuotes {
    pub fn new() -> Self {
        Self
    }
}

fn yahoo_error(e: impl std::fmt::Display) -> ResearchError {
    ResearchError::Api(format!("Yahoo Finance error: {e}"))
}

fn to_offset(at: DateTime<Utc>) -> Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp(at.timestamp())
        .map_err(|e| ResearchError::Api(format!("Invalid timestamp {at}: {e}")))
}

#[async_trait]
impl QuoteSource for YahooQuotes {
    #[instrument(skip(self))]
    async fn daily_history(
        &self,
        ticker: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<PriceBar>> {
        let provider = yahoo::YahooConnector::new().map_err(yahoo_error)?;

        let response = provider
            .get_quote_history(ticker, to_offset(start)?, to_offset(end)?)
            .await
            .map_err(yahoo_error)?;

        let quotes = response.quotes().map_err(yahoo_error)?;
        debug!(quotes = quotes.len(), "fetched daily quotes");

        Ok(quotes
            .iter()
            .filter_map(|q| {
                let date = DateTime::from_timestamp(q.timestamp as i64, 0)?;
                let bar = PriceBar {
                    date,
                    open: q.open,
                    high: q.high,
                    low: q.low,
                    close: q.close,
                    volume: q.volume,
                };
                Some(bar.adjusted(q.adjclose))
            })
            .collect())
    }
}
