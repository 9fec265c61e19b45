// src/extractors/facts.rs

// --- Imports ---
use crate::config::{ConceptCatalog, TagRef};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

/// Stable numeric entity id (SEC CIK).
pub type EntityId = u64;

/// Marker for a fact covering a full fiscal year.
pub const ANNUAL_PERIOD: &str = "FY";

// --- Data Structures ---

/// One disclosed data point, validated at the ingestion boundary.
/// Missing provider fields are `None`; nothing here has been parsed yet beyond the fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawFact {
    pub entity_id: EntityId,
    pub taxonomy: String,
    pub tag: String,
    pub unit: String,
    pub value: Option<String>,
    pub fiscal_year: Option<i32>,
    pub fiscal_period: Option<String>,
    pub form: Option<String>,
    pub filed_date: Option<String>,
    pub period_end_date: Option<String>,
}

impl RawFact {
    pub fn has_tag(&self, tag: &TagRef) -> bool {
        self.taxonomy == tag.taxonomy && self.tag == tag.name
    }
}

/// A resolved numeric value. Share counts are whole numbers, everything else is a decimal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FactValue {
    Shares(i64),
    Amount(Decimal),
}

impl FactValue {
    pub fn as_decimal(&self) -> Decimal {
        match self {
            FactValue::Shares(n) => Decimal::from(*n),
            FactValue::Amount(d) => *d,
        }
    }

    pub fn negated(self) -> Self {
        match self {
            FactValue::Shares(n) => FactValue::Shares(-n),
            FactValue::Amount(d) => FactValue::Amount(-d),
        }
    }

    pub fn is_positive(&self) -> bool {
        self.as_decimal() > Decimal::ZERO
    }
}

/// Where a value came from. Also the shared metadata block of a year record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilingMetadata {
    /// `None` when the provider gave no form; ranks below every annual-report form.
    pub form: Option<String>,
    pub filed_date: NaiveDate,
    pub period_end_date: Option<NaiveDate>,
}

impl FilingMetadata {
    /// Whether `self`, seen after `current`, replaces it:
    /// annual-report form first, then later filed date, then last seen.
    pub fn supersedes(&self, current: &FilingMetadata, catalog: &ConceptCatalog) -> bool {
        let mine = (catalog.form_priority(self.form.as_deref()), self.filed_date);
        let theirs = (catalog.form_priority(current.form.as_deref()), current.filed_date);
        mine >= theirs
    }
}

/// The single best fact chosen for a (concept, fiscal year).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedValue {
    pub value: FactValue,
    pub tag: String,
    #[serde(flatten)]
    pub filing: FilingMetadata,
}

/// Why a fact was dropped from consideration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum DiscardReason {
    NotAnnualPeriod,
    MissingFiscalYear,
    MissingFiledDate,
    UnparseableFiledDate(String),
    MissingValue,
    UnparseableValue(String),
}

impl DiscardReason {
    pub fn kind(&self) -> &'static str {
        match self {
            DiscardReason::NotAnnualPeriod => "not_annual_period",
            DiscardReason::MissingFiscalYear => "missing_fiscal_year",
            DiscardReason::MissingFiledDate => "missing_filed_date",
            DiscardReason::UnparseableFiledDate(_) => "unparseable_filed_date",
            DiscardReason::MissingValue => "missing_value",
            DiscardReason::UnparseableValue(_) => "unparseable_value",
        }
    }

    /// Parse failures are kept individually; period filtering is only counted.
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            DiscardReason::UnparseableFiledDate(_) | DiscardReason::UnparseableValue(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FactDiscard {
    pub concept: String,
    pub tag: String,
    pub fiscal_year: Option<i32>,
    pub reason: DiscardReason,
}

/// Aggregated per-fact discards for one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscardReport {
    pub counts: BTreeMap<String, usize>,
    pub parse_failures: Vec<FactDiscard>,
}

impl DiscardReport {
    pub fn record(&mut self, discard: FactDiscard) {
        *self.counts.entry(discard.reason.kind().to_string()).or_insert(0) += 1;
        if discard.reason.is_parse_failure() {
            self.parse_failures.push(discard);
        }
    }

    pub fn merge(&mut self, other: DiscardReport) {
        for (kind, n) in other.counts {
            *self.counts.entry(kind).or_insert(0) += n;
        }
        self.parse_failures.extend(other.parse_failures);
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

// --- Parsing helpers ---

pub fn parse_iso_date(text: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d").ok()
}

/// Plain or scientific decimal text.
pub fn parse_decimal(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()
}

/// Whole share count; the flag reports whether a fractional part was truncated.
pub fn parse_share_count(text: &str) -> Option<(i64, bool)> {
    let value = parse_decimal(text)?;
    let whole = value.trunc();
    let truncated = whole != value;
    whole.to_i64().map(|n| (n, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use rust_decimal_macros::dec;

    fn meta(form: &str, filed: &str) -> FilingMetadata {
        FilingMetadata {
            form: Some(form.to_string()),
            filed_date: parse_iso_date(filed).unwrap(),
            period_end_date: None,
        }
    }

    #[test]
    fn test_decimal_parsing() {
        assert_eq!(parse_decimal("1234.50"), Some(dec!(1234.50)));
        assert_eq!(parse_decimal(" -30 "), Some(dec!(-30)));
        assert_eq!(parse_decimal("1.5e10"), Some(dec!(15000000000)));
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("n/a"), None);
        assert_eq!(parse_decimal("NaN"), None);
    }

    #[test]
    fn test_share_count_truncates() {
        assert_eq!(parse_share_count("1000"), Some((1000, false)));
        assert_eq!(parse_share_count("1000.75"), Some((1000, true)));
        assert_eq!(parse_share_count("abc"), None);
    }

    #[test]
    fn test_supersedes_ordering() {
        let config = EngineConfig::load(None).unwrap();
        let catalog = &config.catalog;

        // annual form beats a later amendment
        assert!(meta("10-K", "2020-01-01").supersedes(&meta("10-K/A", "2021-01-01"), catalog));
        assert!(!meta("10-K/A", "2021-01-01").supersedes(&meta("10-K", "2020-01-01"), catalog));
        assert!(meta("20-F", "2020-01-01").supersedes(&meta("8-K", "2020-06-01"), catalog));

        // equal class: later filed wins
        assert!(meta("10-K", "2021-03-01").supersedes(&meta("20-F", "2021-02-01"), catalog));
        assert!(!meta("10-K", "2021-01-01").supersedes(&meta("10-K", "2021-02-01"), catalog));

        // full tie: last seen wins
        assert!(meta("10-K", "2021-02-01").supersedes(&meta("10-K", "2021-02-01"), catalog));

        // no form ranks with the non-annual forms
        let formless = FilingMetadata {
            form: None,
            ..meta("10-K", "2022-01-01")
        };
        assert!(!formless.supersedes(&meta("10-K", "2021-01-01"), catalog));
        assert!(formless.supersedes(&meta("8-K", "2021-01-01"), catalog));
    }

    #[test]
    fn test_discard_report_counts_and_keeps_parse_failures() {
        let mut report = DiscardReport::default();
        report.record(FactDiscard {
            concept: "revenue".into(),
            tag: "us-gaap:Revenues".into(),
            fiscal_year: Some(2021),
            reason: DiscardReason::NotAnnualPeriod,
        });
        report.record(FactDiscard {
            concept: "revenue".into(),
            tag: "us-gaap:Revenues".into(),
            fiscal_year: Some(2022),
            reason: DiscardReason::UnparseableValue("abc".into()),
        });

        assert_eq!(report.total(), 2);
        assert_eq!(report.counts.get("not_annual_period"), Some(&1));
        assert_eq!(report.parse_failures.len(), 1);
        assert_eq!(report.parse_failures[0].fiscal_year, Some(2022));
    }

    #[test]
    fn test_fact_value_sign() {
        assert!(FactValue::Shares(1).is_positive());
        assert!(!FactValue::Amount(Decimal::ZERO).is_positive());
        assert!(!FactValue::Amount(dec!(-0.01)).is_positive());
        assert_eq!(FactValue::Shares(42).as_decimal(), dec!(42));
        assert_eq!(FactValue::Amount(dec!(30)).negated(), FactValue::Amount(dec!(-30)));
    }
}
