// src/extractors/selector.rs

// --- Imports ---
use crate::config::{Concept, ConceptCatalog, TagRef, UnitClass};
use crate::extractors::facts::{
    parse_decimal, parse_iso_date, parse_share_count, DiscardReason, DiscardReport, FactDiscard,
    FactValue, FilingMetadata, RawFact, ResolvedValue, ANNUAL_PERIOD,
};
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

// --- Data Structures ---

/// The tag and unit bucket a concept was resolved from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagChoice {
    pub tag: String,
    pub unit: String,
    /// The expected unit was absent and the first available bucket was used instead.
    pub degraded_unit: bool,
}

/// Everything the selector learned about one concept for one entity.
#[derive(Debug, Clone)]
pub struct ConceptResolution {
    pub concept: String,
    /// `None` when no candidate tag is present at all.
    pub choice: Option<TagChoice>,
    pub values: BTreeMap<i32, ResolvedValue>,
    pub discards: DiscardReport,
}

// --- Selector ---

pub struct FactSelector<'a> {
    catalog: &'a ConceptCatalog,
}

impl<'a> FactSelector<'a> {
    pub fn new(catalog: &'a ConceptCatalog) -> Self {
        Self { catalog }
    }

    /// Resolves one concept to its best annual value per fiscal year.
    ///
    /// Only the first candidate tag present in `facts` is ever used, even when a
    /// lower-priority tag would cover years this one lacks.
    pub fn resolve(&self, facts: &[RawFact], concept: &Concept) -> ConceptResolution {
        let mut resolution = ConceptResolution {
            concept: concept.name.clone(),
            choice: None,
            values: BTreeMap::new(),
            discards: DiscardReport::default(),
        };

        // 1. First candidate tag present anywhere
        let Some(tag) = concept
            .tags
            .iter()
            .find(|tag| facts.iter().any(|f| f.has_tag(tag)))
        else {
            tracing::debug!("Concept '{}': no candidate tag present", concept.name);
            return resolution;
        };
        let tag_label = tag.to_string();

        // 2. Unit bucket
        let expected_unit = self.catalog.unit_key(concept.unit_class);
        let Some((unit, degraded_unit)) = choose_unit(facts, tag, &expected_unit) else {
            return resolution;
        };
        if degraded_unit {
            tracing::warn!(
                "Concept '{}', tag {}: expected unit '{}' not present, using '{}'",
                concept.name,
                tag_label,
                expected_unit,
                unit
            );
        }

        // 3-5. Filter, parse and keep the best entry per fiscal year
        for fact in facts.iter().filter(|f| f.has_tag(tag) && f.unit == unit) {
            match self.evaluate(fact, concept, &tag_label) {
                Ok((year, candidate)) => match resolution.values.entry(year) {
                    Entry::Vacant(slot) => {
                        slot.insert(candidate);
                    }
                    Entry::Occupied(mut slot) => {
                        if candidate.filing.supersedes(&slot.get().filing, self.catalog) {
                            slot.insert(candidate);
                        }
                    }
                },
                Err(reason) => {
                    if reason.is_parse_failure() {
                        tracing::debug!(
                            "Concept '{}', tag {}, FY {:?}: discarded fact ({:?})",
                            concept.name,
                            tag_label,
                            fact.fiscal_year,
                            reason
                        );
                    }
                    resolution.discards.record(FactDiscard {
                        concept: concept.name.clone(),
                        tag: tag_label.clone(),
                        fiscal_year: fact.fiscal_year,
                        reason,
                    });
                }
            }
        }

        tracing::debug!(
            "Concept '{}' resolved via {} ({}): {} year(s), {} discarded",
            concept.name,
            tag_label,
            unit,
            resolution.values.len(),
            resolution.discards.total()
        );

        resolution.choice = Some(TagChoice {
            tag: tag_label,
            unit,
            degraded_unit,
        });
        resolution
    }

    /// Turns one raw fact into a candidate, or says why it cannot be one.
    fn evaluate(
        &self,
        fact: &RawFact,
        concept: &Concept,
        tag_label: &str,
    ) -> Result<(i32, ResolvedValue), DiscardReason> {
        if fact.fiscal_period.as_deref().map(str::trim) != Some(ANNUAL_PERIOD) {
            return Err(DiscardReason::NotAnnualPeriod);
        }
        let year = fact.fiscal_year.ok_or(DiscardReason::MissingFiscalYear)?;
        let form = fact
            .form
            .as_deref()
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string);
        let filed_raw = fact.filed_date.as_deref().ok_or(DiscardReason::MissingFiledDate)?;
        let filed_date = parse_iso_date(filed_raw)
            .ok_or_else(|| DiscardReason::UnparseableFiledDate(filed_raw.to_string()))?;

        let value = parse_value(fact, concept, tag_label, year)?;

        // An unparseable period end only loses that field
        let period_end_date = fact.period_end_date.as_deref().and_then(parse_iso_date);

        Ok((
            year,
            ResolvedValue {
                value,
                tag: tag_label.to_string(),
                filing: FilingMetadata {
                    form,
                    filed_date,
                    period_end_date,
                },
            },
        ))
    }
}

/// Expected unit if present, otherwise the first bucket seen for the tag.
fn choose_unit(facts: &[RawFact], tag: &TagRef, expected: &str) -> Option<(String, bool)> {
    let mut first_seen: Option<&str> = None;
    for fact in facts.iter().filter(|f| f.has_tag(tag)) {
        if fact.unit == expected {
            return Some((fact.unit.clone(), false));
        }
        first_seen.get_or_insert(fact.unit.as_str());
    }
    first_seen.map(|unit| (unit.to_string(), true))
}

fn parse_value(
    fact: &RawFact,
    concept: &Concept,
    tag_label: &str,
    year: i32,
) -> Result<FactValue, DiscardReason> {
    let raw = fact.value.as_deref().ok_or(DiscardReason::MissingValue)?;
    let value = match concept.unit_class {
        UnitClass::Shares => {
            let (count, truncated) = parse_share_count(raw)
                .ok_or_else(|| DiscardReason::UnparseableValue(raw.to_string()))?;
            if truncated {
                tracing::warn!(
                    "Concept '{}', tag {}, FY {}: share count '{}' has a fractional part, truncated to {}",
                    concept.name,
                    tag_label,
                    year,
                    raw,
                    count
                );
            }
            FactValue::Shares(count)
        }
        UnitClass::Currency | UnitClass::PerShare => parse_decimal(raw)
            .map(FactValue::Amount)
            .ok_or_else(|| DiscardReason::UnparseableValue(raw.to_string()))?,
    };
    Ok(if concept.negate { value.negated() } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use rust_decimal_macros::dec;

    fn fact(tag: &str, unit: &str, value: &str, fy: i32, form: &str, filed: &str) -> RawFact {
        let (taxonomy, name) = tag.split_once(':').unwrap();
        RawFact {
            entity_id: 320193,
            taxonomy: taxonomy.to_string(),
            tag: name.to_string(),
            unit: unit.to_string(),
            value: Some(value.to_string()),
            fiscal_year: Some(fy),
            fiscal_period: Some("FY".to_string()),
            form: Some(form.to_string()),
            filed_date: Some(filed.to_string()),
            period_end_date: Some(format!("{}-12-31", fy)),
        }
    }

    fn resolve(config: &EngineConfig, concept: &str, facts: &[RawFact]) -> ConceptResolution {
        let concept = config.catalog.get(concept).unwrap();
        FactSelector::new(&config.catalog).resolve(facts, concept)
    }

    fn amount(resolution: &ConceptResolution, year: i32) -> Option<FactValue> {
        resolution.values.get(&year).map(|v| v.value)
    }

    #[test]
    fn test_first_present_tag_wins_even_when_sparser() {
        let config = EngineConfig::load(None).unwrap();
        let facts = vec![
            fact("us-gaap:SalesRevenueNet", "USD", "90", 2019, "10-K", "2020-02-01"),
            fact("us-gaap:SalesRevenueNet", "USD", "95", 2020, "10-K", "2021-02-01"),
            fact("us-gaap:Revenues", "USD", "100", 2020, "10-K", "2021-02-01"),
        ];

        let resolution = resolve(&config, "revenue", &facts);

        assert_eq!(resolution.choice.as_ref().unwrap().tag, "us-gaap:Revenues");
        assert_eq!(resolution.values.len(), 1, "2019 must not be filled from a lower-priority tag");
        assert_eq!(amount(&resolution, 2020), Some(FactValue::Amount(dec!(100))));
        assert!(resolution.values.values().all(|v| v.tag == "us-gaap:Revenues"));
    }

    #[test]
    fn test_annual_form_wins_regardless_of_order() {
        let config = EngineConfig::load(None).unwrap();
        let annual = fact("us-gaap:Revenues", "USD", "100", 2021, "10-K", "2022-01-15");
        let other = fact("us-gaap:Revenues", "USD", "999", 2021, "8-K", "2022-06-01");

        for facts in [vec![annual.clone(), other.clone()], vec![other, annual]] {
            let resolution = resolve(&config, "revenue", &facts);
            let chosen = resolution.values.get(&2021).unwrap();
            assert_eq!(chosen.filing.form.as_deref(), Some("10-K"));
            assert_eq!(chosen.value, FactValue::Amount(dec!(100)));
        }
    }

    #[test]
    fn test_later_filed_wins_within_same_class() {
        let config = EngineConfig::load(None).unwrap();
        let facts = vec![
            fact("us-gaap:Revenues", "USD", "110", 2021, "10-K", "2023-02-01"),
            fact("us-gaap:Revenues", "USD", "100", 2021, "10-K", "2022-02-01"),
            fact("us-gaap:Revenues", "USD", "120", 2021, "20-F", "2022-08-01"),
        ];
        let resolution = resolve(&config, "revenue", &facts);
        assert_eq!(amount(&resolution, 2021), Some(FactValue::Amount(dec!(110))));

        // full tie: last seen in input wins
        let tied = vec![
            fact("us-gaap:Revenues", "USD", "1", 2021, "10-K", "2022-02-01"),
            fact("us-gaap:Revenues", "USD", "2", 2021, "10-K", "2022-02-01"),
        ];
        let resolution = resolve(&config, "revenue", &tied);
        assert_eq!(amount(&resolution, 2021), Some(FactValue::Amount(dec!(2))));
    }

    #[test]
    fn test_non_annual_and_unparseable_facts_are_discarded() {
        let config = EngineConfig::load(None).unwrap();
        let mut quarterly = fact("us-gaap:Revenues", "USD", "25", 2021, "10-Q", "2021-05-01");
        quarterly.fiscal_period = Some("Q1".to_string());
        let mut no_year = fact("us-gaap:Revenues", "USD", "50", 2021, "10-K", "2022-02-01");
        no_year.fiscal_year = None;
        let bad_date = fact("us-gaap:Revenues", "USD", "60", 2021, "10-K", "02/01/2022");
        let bad_value = fact("us-gaap:Revenues", "USD", "lots", 2022, "10-K", "2023-02-01");
        let good = fact("us-gaap:Revenues", "USD", "70", 2021, "10-K/A", "2022-03-01");

        let resolution = resolve(&config, "revenue", &[quarterly, no_year, bad_date, bad_value, good]);

        assert_eq!(amount(&resolution, 2021), Some(FactValue::Amount(dec!(70))));
        assert!(!resolution.values.contains_key(&2022), "parse failure must not become a value");
        assert_eq!(resolution.discards.total(), 4);
        assert_eq!(resolution.discards.counts.get("not_annual_period"), Some(&1));
        assert_eq!(resolution.discards.counts.get("missing_fiscal_year"), Some(&1));
        assert_eq!(resolution.discards.parse_failures.len(), 2);
    }

    #[test]
    fn test_unparseable_better_candidate_keeps_previous_best() {
        let config = EngineConfig::load(None).unwrap();
        let facts = vec![
            fact("us-gaap:Revenues", "USD", "100", 2021, "10-K", "2022-02-01"),
            fact("us-gaap:Revenues", "USD", "oops", 2021, "10-K", "2023-02-01"),
        ];
        let resolution = resolve(&config, "revenue", &facts);
        assert_eq!(amount(&resolution, 2021), Some(FactValue::Amount(dec!(100))));
    }

    #[test]
    fn test_unit_fallback_is_flagged_degraded() {
        let config = EngineConfig::load(None).unwrap();
        let facts = vec![
            fact("ifrs-full:Revenue", "EUR", "80", 2021, "20-F", "2022-04-01"),
            fact("ifrs-full:Revenue", "GBP", "70", 2021, "20-F", "2022-04-01"),
        ];
        let resolution = resolve(&config, "revenue", &facts);
        let choice = resolution.choice.unwrap();
        assert_eq!(choice.unit, "EUR");
        assert!(choice.degraded_unit);
        assert_eq!(resolution.values.len(), 1);

        let expected = vec![
            fact("us-gaap:Revenues", "EUR", "80", 2021, "10-K", "2022-04-01"),
            fact("us-gaap:Revenues", "USD", "90", 2021, "10-K", "2022-04-01"),
        ];
        let resolution = resolve(&config, "revenue", &expected);
        assert_eq!(resolution.choice.as_ref().unwrap().unit, "USD");
        assert!(!resolution.choice.unwrap().degraded_unit);
    }

    #[test]
    fn test_share_counts_are_truncated_integers() {
        let config = EngineConfig::load(None).unwrap();
        let facts = vec![fact(
            "dei:EntityCommonStockSharesOutstanding",
            "shares",
            "15550061000.6",
            2022,
            "10-K",
            "2022-10-28",
        )];
        let resolution = resolve(&config, "shares_outstanding", &facts);
        assert_eq!(amount(&resolution, 2022), Some(FactValue::Shares(15550061000)));
    }

    #[test]
    fn test_negated_concept_flips_disclosed_sign() {
        let config = EngineConfig::load(None).unwrap();
        let facts = vec![fact(
            "us-gaap:PaymentsToAcquirePropertyPlantAndEquipment",
            "USD",
            "30",
            2022,
            "10-K",
            "2023-02-01",
        )];
        let resolution = resolve(&config, "capital_expenditure", &facts);
        assert_eq!(amount(&resolution, 2022), Some(FactValue::Amount(dec!(-30))));
    }

    #[test]
    fn test_formless_fact_is_kept_below_annual_forms() {
        let config = EngineConfig::load(None).unwrap();
        let mut formless = fact("us-gaap:Revenues", "USD", "50", 2020, "10-K", "2021-06-01");
        formless.form = None;
        let resolution = resolve(&config, "revenue", &[formless.clone()]);
        let chosen = resolution.values.get(&2020).unwrap();
        assert_eq!(chosen.filing.form, None);
        assert_eq!(resolution.discards.total(), 0);

        let annual = fact("us-gaap:Revenues", "USD", "40", 2020, "10-K", "2021-02-01");
        let resolution = resolve(&config, "revenue", &[annual, formless]);
        assert_eq!(amount(&resolution, 2020), Some(FactValue::Amount(dec!(40))));
    }

    #[test]
    fn test_unresolved_concept_is_not_an_error() {
        let config = EngineConfig::load(None).unwrap();
        let facts = vec![fact("us-gaap:Revenues", "USD", "1", 2021, "10-K", "2022-02-01")];
        let resolution = resolve(&config, "dividends_paid", &facts);
        assert!(resolution.choice.is_none());
        assert!(resolution.values.is_empty());
        assert_eq!(resolution.discards.total(), 0);
    }
}
