// src/screening/derived.rs
use crate::extractors::{CanonicalYearRecord, FactValue};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

pub const FREE_CASH_FLOW: &str = "free_cash_flow";
pub const EBITDA: &str = "ebitda";

pub const OPERATING_CASH_FLOW: &str = "operating_cash_flow";
pub const CAPITAL_EXPENDITURE: &str = "capital_expenditure";
pub const OPERATING_INCOME: &str = "operating_income_loss";
pub const DEPRECIATION_AND_AMORTIZATION: &str = "depreciation_and_amortization";

/// Concepts this module can fill in without a catalog entry.
pub fn is_derived(concept: &str) -> bool {
    concept == FREE_CASH_FLOW || concept == EBITDA
}

/// A canonical record with calculated concepts filled where direct figures were missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedYearRecord {
    #[serde(flatten)]
    pub canonical: CanonicalYearRecord,
    /// Concepts whose value was calculated rather than disclosed.
    pub calculated: BTreeSet<String>,
}

impl DerivedYearRecord {
    pub fn fiscal_year(&self) -> i32 {
        self.canonical.fiscal_year
    }

    pub fn get(&self, concept: &str) -> Option<FactValue> {
        self.canonical.get(concept)
    }
}

/// Fills free cash flow and EBITDA from their components when not disclosed directly.
///
/// Both formulas read only disclosed values, so neither depends on the other.
pub fn derive(canonical: CanonicalYearRecord) -> DerivedYearRecord {
    // operating cash flow + capex; capex keeps its disclosed sign
    let fcf = fill(&canonical.values, FREE_CASH_FLOW, OPERATING_CASH_FLOW, CAPITAL_EXPENDITURE);
    let ebitda = fill(&canonical.values, EBITDA, OPERATING_INCOME, DEPRECIATION_AND_AMORTIZATION);

    let mut record = DerivedYearRecord {
        canonical,
        calculated: BTreeSet::new(),
    };
    for (concept, value) in [(FREE_CASH_FLOW, fcf), (EBITDA, ebitda)] {
        if let Some(value) = value {
            record.canonical.values.insert(concept.to_string(), value);
            record.calculated.insert(concept.to_string());
        }
    }
    record
}

/// `Some` only when `target` is absent and both operands are present.
fn fill(
    values: &BTreeMap<String, FactValue>,
    target: &str,
    lhs: &str,
    rhs: &str,
) -> Option<FactValue> {
    if values.contains_key(target) {
        return None;
    }
    let lhs = values.get(lhs)?.as_decimal();
    let rhs = values.get(rhs)?.as_decimal();
    Some(FactValue::Amount(lhs + rhs))
}
