// src/screening/trend.rs

// --- Imports ---
use crate::config::ScreeningConfig;
use crate::extractors::EntityId;
use crate::screening::derived::{DerivedYearRecord, FREE_CASH_FLOW};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

// --- Data Structures ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail,
    InsufficientData,
    NoData,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
            Verdict::InsufficientData => "insufficient data",
            Verdict::NoData => "no data",
        };
        f.write_str(label)
    }
}

/// Sign relationship between the first and last window values of the growth concept.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "case", rename_all = "snake_case")]
pub enum GrowthCase {
    BothNonPositive,
    /// Non-positive start, strictly positive end. No growth rate is defined.
    Turnaround,
    PositiveToNonPositive,
    BothPositive { cagr_percent: f64 },
}

impl GrowthCase {
    /// `periods` is the number of growth periods (window length - 1), at least 1.
    pub fn classify(first: Decimal, last: Decimal, periods: usize) -> Self {
        match (first > Decimal::ZERO, last > Decimal::ZERO) {
            (false, true) => GrowthCase::Turnaround,
            (false, false) => GrowthCase::BothNonPositive,
            (true, false) => GrowthCase::PositiveToNonPositive,
            (true, true) => {
                let ratio = growth_ratio(first, last);
                let cagr = ratio.powf(1.0 / periods as f64) - 1.0;
                GrowthCase::BothPositive {
                    cagr_percent: cagr * 100.0,
                }
            }
        }
    }

    pub fn is_turnaround(&self) -> bool {
        matches!(self, GrowthCase::Turnaround)
    }

    pub fn cagr_percent(&self) -> Option<f64> {
        match self {
            GrowthCase::BothPositive { cagr_percent } => Some(*cagr_percent),
            _ => None,
        }
    }
}

// Exact decimal division unless it overflows
fn growth_ratio(first: Decimal, last: Decimal) -> f64 {
    last.checked_div(first)
        .and_then(|r| r.to_f64())
        .unwrap_or_else(|| {
            let last = last.to_f64().unwrap_or(f64::MAX);
            let first = first.to_f64().unwrap_or(f64::MIN_POSITIVE);
            last / first
        })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositiveYearCheck {
    pub positive_years: usize,
    pub required: usize,
    pub met: bool,
}

/// Screening outcome for one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub entity_id: EntityId,
    pub verdict: Verdict,
    /// Why the verdict is not a pass.
    pub reason: Option<String>,
    pub window_years: usize,
    pub qualifying_years: usize,
    pub earliest_year: Option<i32>,
    pub latest_year: Option<i32>,
    pub growth_concept: String,
    pub growth_first: Option<Decimal>,
    pub growth_last: Option<Decimal>,
    pub fcf_latest: Option<Decimal>,
    pub growth: Option<GrowthCase>,
    pub is_turnaround: bool,
    pub cagr_percent: Option<f64>,
    pub positive_years: BTreeMap<String, PositiveYearCheck>,
}

impl TrendResult {
    fn empty(entity_id: EntityId, config: &ScreeningConfig, verdict: Verdict, reason: String) -> Self {
        Self {
            entity_id,
            verdict,
            reason: Some(reason),
            window_years: config.window_years,
            qualifying_years: 0,
            earliest_year: None,
            latest_year: None,
            growth_concept: config.growth_concept.clone(),
            growth_first: None,
            growth_last: None,
            fcf_latest: None,
            growth: None,
            is_turnaround: false,
            cagr_percent: None,
            positive_years: BTreeMap::new(),
        }
    }
}

// --- Classifier ---

pub struct TrendClassifier<'a> {
    config: &'a ScreeningConfig,
}

impl<'a> TrendClassifier<'a> {
    pub fn new(config: &'a ScreeningConfig) -> Self {
        Self { config }
    }

    pub fn classify(&self, entity_id: EntityId, records: &[DerivedYearRecord]) -> TrendResult {
        let n = self.config.window_years;
        let growth_concept = self.config.growth_concept.as_str();

        if records.is_empty() {
            return TrendResult::empty(entity_id, self.config, Verdict::NoData, "no annual records".to_string());
        }

        // 1. Years carrying both the growth concept and free cash flow
        let mut qualifying: Vec<&DerivedYearRecord> = records
            .iter()
            .filter(|r| r.get(growth_concept).is_some() && r.get(FREE_CASH_FLOW).is_some())
            .collect();
        qualifying.sort_by_key(|r| r.fiscal_year());

        if qualifying.len() < n {
            let mut result = TrendResult::empty(
                entity_id,
                self.config,
                Verdict::InsufficientData,
                format!(
                    "{} qualifying year(s) with {} and {}, {} required",
                    qualifying.len(),
                    growth_concept,
                    FREE_CASH_FLOW,
                    n
                ),
            );
            result.qualifying_years = qualifying.len();
            return result;
        }
        let window = &qualifying[qualifying.len() - n..];

        // 2. Positive-year minimums
        let mut failures = Vec::new();
        let mut positive_years = BTreeMap::new();
        for (concept, &required) in &self.config.min_positive_years {
            let count = window
                .iter()
                .filter(|r| r.get(concept).map_or(false, |v| v.is_positive()))
                .count();
            let met = count >= required;
            if !met {
                failures.push(format!("{} positive in {}/{} years, {} required", concept, count, n, required));
            }
            positive_years.insert(
                concept.clone(),
                PositiveYearCheck {
                    positive_years: count,
                    required,
                    met,
                },
            );
        }

        // 3. Growth case over the window ends
        let value_of = |r: &DerivedYearRecord, concept: &str| r.get(concept).map(|v| v.as_decimal());
        let first = value_of(window[0], growth_concept).unwrap_or_default();
        let last = value_of(window[n - 1], growth_concept).unwrap_or_default();
        let growth = GrowthCase::classify(first, last, n - 1);

        let growth_ok = match growth {
            GrowthCase::Turnaround => true,
            GrowthCase::BothPositive { cagr_percent } => {
                let ok = cagr_percent >= self.config.min_cagr_percent;
                if !ok {
                    failures.push(format!(
                        "{} CAGR {:.2}% below {:.2}%",
                        growth_concept, cagr_percent, self.config.min_cagr_percent
                    ));
                }
                ok
            }
            GrowthCase::BothNonPositive => {
                failures.push(format!("{} non-positive at both window ends", growth_concept));
                false
            }
            GrowthCase::PositiveToNonPositive => {
                failures.push(format!("{} turned non-positive", growth_concept));
                false
            }
        };

        // 4. Verdict
        let minimums_met = positive_years.values().all(|c: &PositiveYearCheck| c.met);
        let verdict = if minimums_met && growth_ok {
            Verdict::Pass
        } else {
            Verdict::Fail
        };

        TrendResult {
            entity_id,
            verdict,
            reason: if failures.is_empty() { None } else { Some(failures.join("; ")) },
            window_years: n,
            qualifying_years: qualifying.len(),
            earliest_year: Some(window[0].fiscal_year()),
            latest_year: Some(window[n - 1].fiscal_year()),
            growth_concept: growth_concept.to_string(),
            growth_first: Some(first),
            growth_last: Some(last),
            fcf_latest: value_of(window[n - 1], FREE_CASH_FLOW),
            growth: Some(growth),
            is_turnaround: growth.is_turnaround(),
            cagr_percent: growth.cagr_percent(),
            positive_years,
        }
    }
}
