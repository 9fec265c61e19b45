// src/storage/mod.rs
use crate::engine::{ConceptSource, EntityOutcome};
use crate::extractors::{DiscardReport, EntityId};
use crate::screening::{TrendResult, Verdict};
use crate::utils::error::StorageError;
use rust_decimal::Decimal;
use serde::Serialize;
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

const RECORDS_FILE: &str = "annual_records.json";
const TREND_FILE: &str = "trend.json";
const SUMMARY_FILE: &str = "screening_summary.json";

/// Per-entity resolution report stored next to the records.
#[derive(Serialize)]
struct EntityReport<'a> {
    entity_id: EntityId,
    company_name: Option<&'a str>,
    trend: &'a TrendResult,
    concepts: &'a [ConceptSource],
    unresolved_concepts: &'a [String],
    discards: &'a DiscardReport,
}

/// One line of the run summary. Entities that could not be loaded carry an error instead of a verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRow {
    /// `None` only for a requested ticker that did not resolve to a CIK.
    pub entity_id: Option<EntityId>,
    pub ticker: Option<String>,
    pub company_name: Option<String>,
    pub verdict: Option<Verdict>,
    pub is_turnaround: bool,
    pub cagr_percent: Option<f64>,
    pub earliest_year: Option<i32>,
    pub latest_year: Option<i32>,
    pub growth_latest: Option<Decimal>,
    pub fcf_latest: Option<Decimal>,
    pub reason: Option<String>,
    pub error: Option<String>,
}

impl SummaryRow {
    pub fn from_outcome(outcome: &EntityOutcome) -> Self {
        let trend = &outcome.trend;
        Self {
            entity_id: Some(outcome.entity_id),
            ticker: None,
            company_name: outcome.company_name.clone(),
            verdict: Some(trend.verdict),
            is_turnaround: trend.is_turnaround,
            cagr_percent: trend.cagr_percent,
            earliest_year: trend.earliest_year,
            latest_year: trend.latest_year,
            growth_latest: trend.growth_last,
            fcf_latest: trend.fcf_latest,
            reason: trend.reason.clone(),
            error: None,
        }
    }

    pub fn failed(entity_id: EntityId, error: String) -> Self {
        Self {
            entity_id: Some(entity_id),
            ..Self::unresolved_ticker(String::new(), error)
        }
    }

    pub fn unresolved_ticker(ticker: String, error: String) -> Self {
        Self {
            entity_id: None,
            ticker: (!ticker.is_empty()).then_some(ticker),
            company_name: None,
            verdict: None,
            is_turnaround: false,
            cagr_percent: None,
            earliest_year: None,
            latest_year: None,
            growth_latest: None,
            fcf_latest: None,
            reason: None,
            error: Some(error),
        }
    }
}

/// Passes first, turnarounds ahead of growers, then CAGR descending; errors last.
fn summary_order(a: &SummaryRow, b: &SummaryRow) -> Ordering {
    let verdict_rank = |row: &SummaryRow| row.verdict.map_or(u8::MAX, |v| v as u8);
    verdict_rank(a)
        .cmp(&verdict_rank(b))
        .then_with(|| b.is_turnaround.cmp(&a.is_turnaround))
        .then_with(|| match (a.cagr_percent, b.cagr_percent) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.entity_id.cmp(&b.entity_id))
        .then_with(|| a.ticker.cmp(&b.ticker))
}

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    pub fn entity_dir(&self, entity_id: EntityId) -> PathBuf {
        self.base_dir.join(format!("{:010}", entity_id))
    }

    /// Writes the year records and the trend report of one entity.
    ///
    /// Both files are staged first. The previous trend report is removed before the
    /// records are swapped in, so a trend report only ever sits next to its own records.
    pub fn save_entity(&self, outcome: &EntityOutcome) -> Result<PathBuf, StorageError> {
        let target_dir = self.entity_dir(outcome.entity_id);
        fs::create_dir_all(&target_dir).map_err(StorageError::IoError)?;
        let records_path = target_dir.join(RECORDS_FILE);
        let trend_path = target_dir.join(TREND_FILE);

        let report = EntityReport {
            entity_id: outcome.entity_id,
            company_name: outcome.company_name.as_deref(),
            trend: &outcome.trend,
            concepts: &outcome.concepts,
            unresolved_concepts: &outcome.unresolved_concepts,
            discards: &outcome.discards,
        };

        let records_tmp = stage_json(&records_path, &outcome.records)?;
        let trend_tmp = match stage_json(&trend_path, &report) {
            Ok(tmp) => tmp,
            Err(e) => {
                let _ = fs::remove_file(&records_tmp);
                return Err(e);
            }
        };

        let committed = remove_if_exists(&trend_path)
            .and_then(|_| fs::rename(&records_tmp, &records_path))
            .and_then(|_| fs::rename(&trend_tmp, &trend_path));
        if let Err(e) = committed {
            let _ = fs::remove_file(&records_tmp);
            let _ = fs::remove_file(&trend_tmp);
            return Err(StorageError::IoError(e));
        }

        tracing::info!("Saved {} year record(s) to {}", outcome.records.len(), target_dir.display());
        Ok(target_dir)
    }

    /// Writes the run summary, sorted for reading.
    pub fn save_summary(&self, rows: &[SummaryRow]) -> Result<PathBuf, StorageError> {
        let mut rows = rows.to_vec();
        rows.sort_by(summary_order);

        let file_path = self.base_dir.join(SUMMARY_FILE);
        write_json_atomic(&file_path, &rows)?;
        tracing::info!("Saved screening summary to {}", file_path.display());
        Ok(file_path)
    }
}

/// Serializes to a sibling `.tmp` file of `path` and returns the temp path.
fn stage_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf, StorageError> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, json).map_err(StorageError::IoError)?;
    Ok(tmp_path)
}

fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Serializes to a sibling temp file, then renames over `path`.
fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let tmp_path = stage_json(path, value)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(StorageError::IoError(e));
    }
    Ok(())
}
