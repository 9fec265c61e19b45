// src/edgar/client.rs
use crate::edgar::models::{lookup_tickers, parse_company_facts, parse_ticker_map, CompanyFacts, TickerLookup};
use crate::extractors::EntityId;
use crate::utils::error::EdgarError;
use reqwest::{header, StatusCode};
use std::time::Duration;

const COMPANY_TICKERS_URL: &str = "https://www.sec.gov/files/company_tickers.json";
const COMPANY_FACTS_BASE_URL: &str = "https://data.sec.gov/api/xbrl/companyfacts";

// SEC asks for 10 requests/second max. >100ms delay.
const EDGAR_REQUEST_DELAY_MS: u64 = 110;
const EDGAR_TIMEOUT_SECS: u64 = 30;
const MAX_RETRIES: u32 = 3;
const RETRY_BASE_DELAY_MS: u64 = 1000;

/// Companyfacts document URL for a CIK (zero-padded to 10 digits).
pub fn company_facts_url(cik: EntityId) -> String {
    format!("{}/CIK{:010}.json", COMPANY_FACTS_BASE_URL, cik)
}

/// Wait before retry `attempt` (0-based). Rate limiting backs off harder than server errors.
fn retry_delay(status: Option<StatusCode>, attempt: u32) -> Duration {
    let backoff = RETRY_BASE_DELAY_MS * 2u64.pow(attempt);
    match status {
        Some(StatusCode::TOO_MANY_REQUESTS) => Duration::from_millis(backoff + 5000 * (attempt as u64 + 1)),
        _ => Duration::from_millis(backoff),
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// HTTP client for the SEC EDGAR JSON APIs.
/// One instance per run; requests are sequential and spaced by a fixed delay.
pub struct EdgarClient {
    http: reqwest::Client,
    user_agent: String,
}

impl EdgarClient {
    /// SEC rejects requests without a descriptive User-Agent (name and contact email).
    pub fn new(user_agent: &str) -> Result<Self, EdgarError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(EDGAR_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            user_agent: user_agent.to_string(),
        })
    }

    /// GET with rate-limit spacing and retries on 429, 5xx and transport errors.
    /// 403 and 404 are never retried.
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, EdgarError> {
        tracing::debug!("Using User-Agent: {}", self.user_agent);
        let mut attempt = 0;
        loop {
            tokio::time::sleep(Duration::from_millis(EDGAR_REQUEST_DELAY_MS)).await;

            let result = self
                .http
                .get(url)
                .header(header::ACCEPT, "application/json")
                .send()
                .await;

            let (error, status) = match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response.bytes().await?;
                        tracing::debug!("Downloaded {} bytes from {}", body.len(), url);
                        return Ok(body.to_vec());
                    }
                    if status == StatusCode::FORBIDDEN {
                        tracing::warn!("Received 403 Forbidden - check User-Agent and rate limits.");
                        return Err(EdgarError::RateLimited);
                    }
                    if !is_retryable(status) {
                        return Err(EdgarError::Http(status));
                    }
                    (EdgarError::Http(status), Some(status))
                }
                Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => (EdgarError::Network(e), None),
                Err(e) => return Err(EdgarError::Network(e)),
            };

            if attempt >= MAX_RETRIES {
                tracing::error!("Giving up on {} after {} attempts: {}", url, attempt + 1, error);
                return Err(error);
            }
            let wait = retry_delay(status, attempt);
            tracing::warn!("{} for {}. Retrying in {:?} ({}/{})", error, url, wait, attempt + 1, MAX_RETRIES);
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    /// Resolves ticker symbols to CIKs via the SEC ticker map, fetched once.
    /// Unknown tickers are returned, not raised.
    pub async fn resolve_tickers(&self, tickers: &[String]) -> Result<TickerLookup, EdgarError> {
        tracing::info!("Looking up CIKs for {} ticker(s)", tickers.len());
        let body = self.get_bytes(COMPANY_TICKERS_URL).await?;
        let map = parse_ticker_map(&body)?;
        Ok(lookup_tickers(&map, tickers))
    }

    /// Downloads and flattens the companyfacts document of one entity.
    pub async fn fetch_company_facts(&self, cik: EntityId) -> Result<CompanyFacts, EdgarError> {
        let url = company_facts_url(cik);
        tracing::info!("Fetching companyfacts from: {}", url);
        match self.get_bytes(&url).await {
            Ok(body) => parse_company_facts(&body, cik),
            Err(EdgarError::Http(StatusCode::NOT_FOUND)) => Err(EdgarError::FactsNotFound(cik)),
            Err(e) => Err(e),
        }
    }
}
