// src/main.rs
mod config;
mod edgar;
mod engine;
mod extractors;
mod screening;
mod storage;
mod utils;

use clap::Parser;
use config::EngineConfig;
use edgar::{EdgarClient, FactSource};
use engine::ScreeningEngine;
use extractors::EntityId;
use screening::Verdict;
use std::path::PathBuf;
use storage::{StorageManager, SummaryRow};
use utils::error::EdgarError;
use utils::AppError;

/// Resolves SEC companyfacts into annual records and screens EBITDA / free cash flow trends
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CIK of an entity to screen (repeatable)
    #[arg(short, long)]
    cik: Vec<EntityId>,

    /// Ticker symbol of an entity to screen (repeatable, resolved via the SEC ticker map)
    #[arg(short, long)]
    ticker: Vec<String>,

    /// Directory of CIK##########.json companyfacts files; every file is screened
    /// when no --cik/--ticker is given. Without it, facts come from the SEC API.
    #[arg(long)]
    facts_dir: Option<PathBuf>,

    /// Output directory for year records, trend reports and the run summary
    #[arg(short, long, default_value = "./output")]
    output_dir: PathBuf,

    /// Engine config (TOML); the built-in default catalog is used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// User-Agent sent to the SEC (name and contact email)
    #[arg(long, env = "SEC_USER_AGENT")]
    user_agent: Option<String>,

    /// Debug logging (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn edgar_client(args: &Args) -> Result<EdgarClient, AppError> {
    let user_agent = args.user_agent.as_deref().ok_or_else(|| {
        AppError::Usage("SEC access needs --user-agent or SEC_USER_AGENT (name and email)".to_string())
    })?;
    Ok(EdgarClient::new(user_agent)?)
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Parse CLI Arguments, setup logging (reads RUST_LOG env var)
    let args = Args::parse();
    utils::logging::setup_logging(args.verbose);
    tracing::info!("Starting screening run for args: {:?}", args);

    // 2. Configuration problems are fatal before any entity is touched
    let config = EngineConfig::load(args.config.as_deref())?;

    // 3. Entities and fact source; a ticker that does not resolve becomes a failed summary row
    let mut ciks = args.cik.clone();
    let mut rows = Vec::new();
    let mut failure_count = 0;
    if !args.ticker.is_empty() {
        let client = edgar_client(&args)?;
        let unresolved: Vec<(String, String)> = match client.resolve_tickers(&args.ticker).await {
            Ok(lookup) => {
                ciks.extend(lookup.resolved.into_iter().map(|(_, cik)| cik));
                lookup
                    .unresolved
                    .into_iter()
                    .map(|ticker| {
                        let error = EdgarError::TickerNotFound(ticker.clone()).to_string();
                        (ticker, error)
                    })
                    .collect()
            }
            Err(e) => {
                tracing::error!("Ticker lookup failed: {}", e);
                args.ticker.iter().map(|t| (t.trim().to_uppercase(), e.to_string())).collect()
            }
        };
        for (ticker, error) in unresolved {
            failure_count += 1;
            rows.push(SummaryRow::unresolved_ticker(ticker, error));
        }
    }
    let source = match &args.facts_dir {
        Some(dir) => {
            if ciks.is_empty() && args.ticker.is_empty() {
                ciks = edgar::list_local_entities(dir).await?;
            }
            FactSource::LocalDir(dir.clone())
        }
        None => FactSource::Sec(edgar_client(&args)?),
    };
    ciks.sort_unstable();
    ciks.dedup();
    if ciks.is_empty() && rows.is_empty() {
        return Err(AppError::Usage("No entities to screen: give --cik, --ticker or a non-empty --facts-dir".to_string()));
    }
    tracing::info!("Screening {} entities from {}", ciks.len(), source.describe());

    // 4. Initialize storage and engine
    let storage = StorageManager::new(&args.output_dir)?;
    let engine = ScreeningEngine::new(&config);

    // 5. Process each entity; Ctrl-C stops before the next one is persisted
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    rows.reserve(ciks.len());
    let mut interrupted = false;

    for cik in ciks {
        let loaded = tokio::select! {
            _ = &mut shutdown => {
                tracing::warn!("Interrupted; CIK {:010} and later entities were not processed", cik);
                interrupted = true;
                break;
            }
            loaded = source.load(cik) => loaded,
        };

        let company = match loaded {
            Ok(company) => company,
            Err(e) => {
                tracing::error!("CIK {:010}: failed to load facts: {}", cik, e);
                failure_count += 1;
                rows.push(SummaryRow::failed(cik, e.to_string()));
                continue;
            }
        };

        if company.skipped_entries > 0 {
            tracing::warn!("CIK {:010}: skipped {} malformed companyfacts entries", cik, company.skipped_entries);
        }

        let outcome = engine.process_entity(company.entity_id, company.entity_name, &company.facts);
        match storage.save_entity(&outcome) {
            Ok(_) => rows.push(SummaryRow::from_outcome(&outcome)),
            Err(e) => {
                tracing::error!("CIK {:010}: failed to save results: {}", cik, e);
                failure_count += 1;
                rows.push(SummaryRow::failed(cik, e.to_string()));
            }
        }
    }

    // 6. Run summary
    storage.save_summary(&rows)?;
    let passed = rows.iter().filter(|r| r.verdict == Some(Verdict::Pass)).count();
    tracing::info!(
        "Processing finished. Screened: {}, Passed: {}, Failures: {}{}",
        rows.len() - failure_count,
        passed,
        failure_count,
        if interrupted { " (interrupted)" } else { "" }
    );

    if rows.len() == failure_count && failure_count > 0 {
        return Err(AppError::Processing(format!("Failed to screen any of {} entities", failure_count)));
    }

    Ok(())
}
