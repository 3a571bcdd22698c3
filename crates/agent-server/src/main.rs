//! Research assistant server and command-line interface

mod handlers;
mod server;

use agent_core::Mode;
use agent_research::request::YearQuarterDict;
use agent_research::{Ingestor, PriceLoader, ResearchConfig, ResearchRequest, global_services};
use agent_utils::LogFormat;
use anyhow::Context;
use clap::{Parser, Subcommand};
use handlers::AppState;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "research-server")]
#[command(about = "Agentic research assistant for company financials", long_about = None)]
struct Cli {
    /// Log output format (text or json); defaults to LOG_FORMAT
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
    /// Run one research job and print the report
    Ask {
        query: String,
        /// pinecone, web_search, snowflake or combined
        #[arg(long, default_value = "combined")]
        mode: Mode,
        /// Year and quarters, e.g. 2024=1,2 (repeatable)
        #[arg(long = "filter", value_parser = parse_filter)]
        filters: Vec<(String, Vec<String>)>,
    },
    /// Chunk, embed and index quarterly reports
    Ingest {
        /// Local paths or http(s) URLs named like 2022_Fourth_Quarter.md
        #[arg(required = true)]
        sources: Vec<String>,
    },
    /// Replace the warehouse price table with daily history and indicators
    IngestPrices {
        /// Defaults to RESEARCH_TICKER
        #[arg(long)]
        ticker: Option<String>,
        /// Years of history; defaults to RESEARCH_HISTORY_YEARS
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        years: Option<u32>,
    },
    /// Print the selectable quarters
    Quarters,
}

/// `2024=1,2` -> ("2024", ["1", "2"])
fn parse_filter(raw: &str) -> Result<(String, Vec<String>), String> {
    let (year, quarters) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected YEAR=Q[,Q...], got '{raw}'"))?;
    let year = year.trim();
    if year.is_empty() || !year.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("invalid year '{year}'"));
    }
    let quarters = quarters
        .split(',')
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(|q| {
            let q = q.trim_start_matches(['Q', 'q']);
            match q {
                "1" | "2" | "3" | "4" => Ok(q.to_string()),
                other => Err(format!("invalid quarter '{other}'")),
            }
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((year.to_string(), quarters))
}

fn request_for(query: String, mode: Mode, filters: Vec<(String, Vec<String>)>) -> ResearchRequest {
    let mut year_quarter_dict = YearQuarterDict::new();
    for (year, quarters) in filters {
        year_quarter_dict.entry(year).or_default().extend(quarters);
    }
    ResearchRequest {
        query,
        year_quarter_dict,
        mode: mode.as_str().to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    agent_utils::load_dotenv();
    let cli = Cli::parse();
    agent_utils::init_tracing_with(cli.log_format.unwrap_or_else(LogFormat::from_env));

    let config = ResearchConfig::from_env().context("invalid configuration")?;

    match cli.command {
        Command::Serve { host, port } => {
            info!(company = %config.company, "starting research server");
            let services = global_services(&config)
                .await
                .context("failed to initialise research graph")?;
            let state = Arc::new(AppState::new(services, &config));
            server::serve(state, &host, port).await?;
        }
        Command::Ask {
            query,
            mode,
            filters,
        } => {
            let request = request_for(query, mode, filters).validate()?;
            let services = global_services(&config).await?;
            let report = services
                .graph
                .research(&request.query, request.filters, request.mode)
                .await?;
            println!("{report}");
        }
        Command::Ingest { sources } => {
            let ingestor = Ingestor::from_config(&config).await?;
            let mut failed = 0usize;
            for source in &sources {
                match ingestor.ingest_source(source).await {
                    Ok(report) => println!(
                        "{}: {} chunks, {} upserted ({} Q{})",
                        report.report.filename,
                        report.chunks,
                        report.upserted,
                        report.report.year,
                        report.report.quarter
                    ),
                    Err(e) => {
                        error!(source = %source, error = %e, "ingestion failed");
                        failed += 1;
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} of {} sources failed to ingest", sources.len());
            }
        }
        Command::IngestPrices { ticker, years } => {
            let ticker = ticker
                .map_or_else(|| config.snowflake.ticker.clone(), |t| t.to_uppercase());
            let years = years.unwrap_or(config.snowflake.history_years);
            let report = PriceLoader::from_config(&config)?.load(&ticker, years).await?;
            println!(
                "{}: {} rows from {} to {} in {} statements",
                report.ticker,
                report.rows,
                report.first.date_naive(),
                report.last.date_naive(),
                report.statements
            );
        }
        Command::Quarters => {
            for quarter in config.available_quarters() {
                println!("{quarter}");
            }
        }
    }

    Ok(())
}
