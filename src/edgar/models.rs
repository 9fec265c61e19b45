// src/edgar/models.rs
use crate::extractors::{EntityId, RawFact};
use crate::utils::error::EdgarError;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Structure of the SEC companyfacts document
/// Example: https://data.sec.gov/api/xbrl/companyfacts/CIK0000320193.json
///
/// Map levels stay as `serde_json::Map` so the document order of unit buckets survives.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompanyFactsDocument {
    cik: Option<Value>,
    entity_name: Option<String>,
    #[serde(default)]
    facts: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct TagFacts {
    #[serde(default)]
    units: Map<String, Value>,
}

/// One entry of a unit bucket. Every field may be missing upstream.
#[derive(Debug, Deserialize)]
struct FactEntry {
    val: Option<Value>,
    fy: Option<Value>,
    fp: Option<String>,
    form: Option<String>,
    filed: Option<String>,
    end: Option<String>,
}

/// One entry of https://www.sec.gov/files/company_tickers.json
#[derive(Debug, Clone, Deserialize)]
pub struct TickerEntry {
    pub cik_str: u64,
    pub ticker: String,
    pub title: String,
}

/// The ingested facts of one entity, in document order.
#[derive(Debug, Clone)]
pub struct CompanyFacts {
    pub entity_id: EntityId,
    pub entity_name: Option<String>,
    pub facts: Vec<RawFact>,
    /// Entries whose shape could not be read at all.
    pub skipped_entries: usize,
}

/// Flattens `facts.<taxonomy>.<tag>.units.<unit>[]` into raw facts.
///
/// Individual malformed entries are skipped; only a document that is not
/// companyfacts-shaped at all is an error.
pub fn parse_company_facts(bytes: &[u8], entity_id: EntityId) -> Result<CompanyFacts, EdgarError> {
    let document: CompanyFactsDocument = serde_json::from_slice(bytes)
        .map_err(|e| EdgarError::Parse(format!("companyfacts for CIK {}: {}", entity_id, e)))?;

    if let Some(doc_cik) = document.cik.as_ref().and_then(value_as_u64) {
        if doc_cik != entity_id {
            tracing::warn!(
                "companyfacts document reports CIK {} but was requested as {}",
                doc_cik,
                entity_id
            );
        }
    }

    let mut facts = Vec::new();
    let mut skipped_entries = 0;
    for (taxonomy, tags) in &document.facts {
        let Some(tags) = tags.as_object() else {
            skipped_entries += 1;
            continue;
        };
        for (tag, tag_facts) in tags {
            let Ok(tag_facts) = TagFacts::deserialize(tag_facts) else {
                skipped_entries += 1;
                continue;
            };
            for (unit, entries) in &tag_facts.units {
                let Some(entries) = entries.as_array() else {
                    skipped_entries += 1;
                    continue;
                };
                for entry in entries {
                    match FactEntry::deserialize(entry) {
                        Ok(entry) => facts.push(RawFact {
                            entity_id,
                            taxonomy: taxonomy.clone(),
                            tag: tag.clone(),
                            unit: unit.clone(),
                            value: entry.val.as_ref().and_then(value_as_text),
                            fiscal_year: entry.fy.as_ref().and_then(value_as_year),
                            fiscal_period: entry.fp,
                            form: entry.form,
                            filed_date: entry.filed,
                            period_end_date: entry.end,
                        }),
                        Err(e) => {
                            tracing::debug!("Skipping malformed entry under {}:{} [{}]: {}", taxonomy, tag, unit, e);
                            skipped_entries += 1;
                        }
                    }
                }
            }
        }
    }

    Ok(CompanyFacts {
        entity_id,
        entity_name: document.entity_name,
        facts,
        skipped_entries,
    })
}

/// Parses the ticker map into `ticker (uppercase) -> entry`.
pub fn parse_ticker_map(bytes: &[u8]) -> Result<BTreeMap<String, TickerEntry>, EdgarError> {
    let raw: BTreeMap<String, TickerEntry> = serde_json::from_slice(bytes)
        .map_err(|e| EdgarError::Parse(format!("company_tickers.json: {}", e)))?;
    Ok(raw
        .into_values()
        .map(|entry| (entry.ticker.to_uppercase(), entry))
        .collect())
}

/// Tickers split into those found in the map and those that are not.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct TickerLookup {
    /// (uppercase ticker, CIK), in request order.
    pub resolved: Vec<(String, EntityId)>,
    pub unresolved: Vec<String>,
}

pub fn lookup_tickers(map: &BTreeMap<String, TickerEntry>, tickers: &[String]) -> TickerLookup {
    let mut lookup = TickerLookup::default();
    for ticker in tickers {
        let ticker = ticker.trim().to_uppercase();
        match map.get(&ticker) {
            Some(entry) => {
                tracing::info!("Ticker {} -> CIK {:010} ({})", ticker, entry.cik_str, entry.title);
                lookup.resolved.push((ticker, entry.cik_str));
            }
            None => {
                tracing::warn!("Ticker {} not found in the SEC ticker map", ticker);
                lookup.unresolved.push(ticker);
            }
        }
    }
    lookup
}

// Keeps the provider's digits; parsing happens in the selector
fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn value_as_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
