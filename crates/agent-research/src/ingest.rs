//! Quarterly-report ingestion
//!
//! A report is a Markdown file named like `2022_Fourth_Quarter.md`. It is
//! split into header-delimited chunks, embedded and upserted with the year
//! and quarter taken from the file name.

use crate::api::{Embedder, HttpEmbedder, PineconeClient, VectorIndex, VectorRecord};
use crate::config::ResearchConfig;
use crate::error::{ResearchError, Result};
use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use url::Url;

/// Ideal chunk size in words
pub const IDEAL_WORDS: usize = 500;

const EMBED_BATCH: usize = 32;

/// A header-delimited slice of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub content: String,
    /// Full header line, e.g. `## Revenue`
    pub header: Option<String>,
    /// Number of `#` characters
    pub level: Option<usize>,
    /// 1 or 2 when an oversized chunk was halved
    pub part: Option<u8>,
}

/// Split Markdown at header lines
///
/// Chunks longer than one and a half times `ideal_words` are split into two
/// halves that share the header.
pub fn chunk_markdown(text: &str, ideal_words: usize) -> Result<Vec<Chunk>> {
    let re = Regex::new(r"(?m)^(#{1,6})\s*(.+)$")
        .map_err(|e| ResearchError::Other(format!("invalid header pattern: {e}")))?;
    let threshold = ideal_words * 3 / 2;

    let headers: Vec<_> = re.captures_iter(text).collect();
    if headers.is_empty() {
        return Ok(vec![Chunk {
            content: text.trim().to_string(),
            header: None,
            level: None,
            part: None,
        }]);
    }

    let mut chunks = Vec::new();
    for (i, caps) in headers.iter().enumerate() {
        let (Some(whole), Some(hashes)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let end = headers
            .get(i + 1)
            .and_then(|next| next.get(0))
            .map_or(text.len(), |m| m.start());
        let body = text[whole.start()..end].trim();
        let header = Some(whole.as_str().trim().to_string());
        let level = Some(hashes.as_str().len());

        let words: Vec<&str> = body.split_whitespace().collect();
        if words.len() > threshold {
            let mid = words.len() / 2;
            for (part, half) in [(1, &words[..mid]), (2, &words[mid..])] {
                chunks.push(Chunk {
                    content: half.join(" "),
                    header: header.clone(),
                    level,
                    part: Some(part),
                });
            }
        } else {
            chunks.push(Chunk {
                content: body.to_string(),
                header,
                level,
                part: None,
            });
        }
    }
    Ok(chunks)
}

/// Year and quarter parsed from a report file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportName {
    pub filename: String,
    pub year: String,
    pub quarter: String,
}

fn quarter_number(word: &str) -> &'static str {
    match word.to_lowercase().as_str() {
        "first" => "1",
        "second" => "2",
        "third" => "3",
        "fourth" => "4",
        _ => "Unknown",
    }
}

/// Parse `YYYY_<Ordinal>_...` from a URL or a path; query strings are ignored
pub fn parse_report_name(source: &str) -> ReportName {
    let path = match Url::parse(source) {
        Ok(url) if url.scheme().starts_with("http") => url.path().to_string(),
        _ => source.to_string(),
    };
    let path = Path::new(&path);
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();

    let parts: Vec<&str> = stem.split('_').collect();
    let (year, quarter) = match parts.as_slice() {
        [year, quarter, ..] => ((*year).to_string(), quarter_number(quarter).to_string()),
        _ => ("Unknown".to_string(), "Unknown".to_string()),
    };

    ReportName {
        filename,
        year,
        quarter,
    }
}

/// Vector records for a report's chunks; one embedding per chunk
pub fn records(
    report: &ReportName,
    chunks: &[Chunk],
    embeddings: Vec<Vec<f32>>,
) -> Result<Vec<VectorRecord>> {
    if chunks.len() != embeddings.len() {
        return Err(ResearchError::Ingest(format!(
            "{}: {} chunks but {} embeddings",
            report.filename,
            chunks.len(),
            embeddings.len()
        )));
    }

    let records = chunks
        .iter()
        .zip(embeddings)
        .enumerate()
        .map(|(i, (chunk, values))| {
            let mut metadata = Map::new();
            let mut put = |key: &str, value: String| {
                metadata.insert(key.to_string(), Value::String(value));
            };
            put("text", chunk.content.clone());
            put("header", chunk.header.clone().unwrap_or_else(|| "No Header".to_string()));
            put("level", chunk.level.map_or_else(|| "Unknown".to_string(), |l| l.to_string()));
            put("part", chunk.part.map_or_else(|| "None".to_string(), |p| p.to_string()));
            put("year", report.year.clone());
            put("quarter", report.quarter.clone());
            put("filename", report.filename.clone());

            VectorRecord {
                id: format!("{}_{}_{i}", report.year, report.quarter),
                values,
                metadata,
            }
        })
        .collect();
    Ok(records)
}

/// Outcome of ingesting one report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub report: ReportName,
    pub chunks: usize,
    pub upserted: usize,
}

/// Reads reports, embeds their chunks and writes them to the index
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    client: Client,
    ideal_words: usize,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            embedder,
            index,
            client,
            ideal_words: IDEAL_WORDS,
        })
    }

    /// Real embedding endpoint and Pinecone index, creating the index if needed
    pub async fn from_config(config: &ResearchConfig) -> Result<Self> {
        let timeout = config.request_timeout;
        let embedder = Arc::new(HttpEmbedder::new(
            config.embeddings.clone(),
            config.pinecone.dimension,
            timeout,
        )?);
        let index = PineconeClient::new(config.pinecone.clone(), timeout)?;
        index.ensure_index().await?;
        Self::new(embedder, Arc::new(index), timeout)
    }

    pub fn with_ideal_words(mut self, ideal_words: usize) -> Self {
        self.ideal_words = ideal_words;
        self
    }

    async fn read(&self, source: &str) -> Result<String> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let response = self.client.get(source).send().await?;
            let response = crate::api::check_status("report download", response).await?;
            Ok(response.text().await?)
        } else {
            Ok(tokio::fs::read_to_string(source).await?)
        }
    }

    async fn embed_all(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let batches: Vec<Vec<String>> = chunks
            .chunks(EMBED_BATCH)
            .map(|batch| batch.iter().map(|c| c.content.clone()).collect())
            .collect();
        let futures = batches.iter().map(|batch| self.embedder.embed(batch));
        let results = futures::future::join_all(futures).await;

        let mut embeddings = Vec::with_capacity(chunks.len());
        for result in results {
            embeddings.extend(result?);
        }
        Ok(embeddings)
    }

    /// Ingest a local path or an http(s) URL
    #[instrument(skip(self))]
    pub async fn ingest_source(&self, source: &str) -> Result<IngestReport> {
        let report = parse_report_name(source);
        if report.quarter == "Unknown" {
            warn!(filename = %report.filename, "could not parse quarter from file name");
        }

        let text = self.read(source).await?;
        let chunks: Vec<Chunk> = chunk_markdown(&text, self.ideal_words)?
            .into_iter()
            .filter(|chunk| !chunk.content.is_empty())
            .collect();
        if chunks.is_empty() {
            warn!("no chunks extracted, skipping");
            return Ok(IngestReport {
                report,
                chunks: 0,
                upserted: 0,
            });
        }

        let embeddings = self.embed_all(&chunks).await?;
        let upserted = self.index.upsert(records(&report, &chunks, embeddings)?).await?;
        info!(chunks = chunks.len(), upserted, "report ingested");

        Ok(IngestReport {
            chunks: chunks.len(),
            report,
            upserted,
        })
    }
}
