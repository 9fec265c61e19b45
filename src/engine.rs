// src/engine.rs

// --- Imports ---
use crate::config::EngineConfig;
use crate::extractors::{DiscardReport, EntityId, FactSelector, RawFact, RecordAssembler};
use crate::screening::{derive, DerivedYearRecord, TrendClassifier, TrendResult};
use serde::Serialize;

// --- Data Structures ---

/// Which tag and unit bucket a concept was taken from for one entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConceptSource {
    pub concept: String,
    pub tag: String,
    pub unit: String,
    pub degraded_unit: bool,
    pub years: usize,
}

/// Everything produced for one entity. Always built, whatever the data looked like.
#[derive(Debug, Clone, Serialize)]
pub struct EntityOutcome {
    pub entity_id: EntityId,
    pub company_name: Option<String>,
    /// Ascending by fiscal year, one per year.
    pub records: Vec<DerivedYearRecord>,
    pub trend: TrendResult,
    pub concepts: Vec<ConceptSource>,
    pub unresolved_concepts: Vec<String>,
    pub discards: DiscardReport,
}

// --- Engine ---

/// Pure per-entity pipeline: select, assemble, derive, classify. No I/O.
pub struct ScreeningEngine<'a> {
    config: &'a EngineConfig,
}

impl<'a> ScreeningEngine<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    pub fn process_entity(
        &self,
        entity_id: EntityId,
        company_name: Option<String>,
        facts: &[RawFact],
    ) -> EntityOutcome {
        let span = tracing::info_span!("entity", cik = entity_id);
        let _guard = span.enter();

        let foreign = facts.iter().filter(|f| f.entity_id != entity_id).count();
        let owned: Vec<RawFact>;
        let facts = if foreign > 0 {
            tracing::warn!("Ignoring {} fact(s) belonging to other entities", foreign);
            owned = facts.iter().filter(|f| f.entity_id == entity_id).cloned().collect();
            &owned[..]
        } else {
            facts
        };
        tracing::debug!("Processing {} raw facts", facts.len());

        // 1. Resolve every concept, catalog order
        let selector = FactSelector::new(&self.config.catalog);
        let resolutions: Vec<_> = self
            .config
            .catalog
            .concepts()
            .iter()
            .map(|concept| selector.resolve(facts, concept))
            .collect();

        let mut concepts = Vec::new();
        let mut unresolved_concepts = Vec::new();
        let mut discards = DiscardReport::default();
        for resolution in &resolutions {
            match &resolution.choice {
                Some(choice) => concepts.push(ConceptSource {
                    concept: resolution.concept.clone(),
                    tag: choice.tag.clone(),
                    unit: choice.unit.clone(),
                    degraded_unit: choice.degraded_unit,
                    years: resolution.values.len(),
                }),
                None => unresolved_concepts.push(resolution.concept.clone()),
            }
            discards.merge(resolution.discards.clone());
        }
        if !unresolved_concepts.is_empty() {
            tracing::debug!("Unresolved concepts: {}", unresolved_concepts.join(", "));
        }
        if !discards.parse_failures.is_empty() {
            tracing::warn!("{} fact(s) discarded on parse failure", discards.parse_failures.len());
        }

        // 2. Join barrier: one record per fiscal year
        let canonical = RecordAssembler::new(&self.config.catalog).assemble(entity_id, &resolutions);

        // 3. Calculated metrics
        let records: Vec<DerivedYearRecord> = canonical.into_iter().map(derive).collect();

        // 4. Verdict
        let trend = TrendClassifier::new(&self.config.screening).classify(entity_id, &records);
        match &trend.reason {
            Some(reason) => tracing::info!(
                "{} year record(s), verdict: {} ({})",
                records.len(),
                trend.verdict,
                reason
            ),
            None => tracing::info!("{} year record(s), verdict: {}", records.len(), trend.verdict),
        }

        EntityOutcome {
            entity_id,
            company_name,
            records,
            trend,
            concepts,
            unresolved_concepts,
            discards,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screening::derived::{EBITDA, FREE_CASH_FLOW};
    use crate::screening::Verdict;
    use rust_decimal::Decimal;
    use std::collections::HashSet;

    const CIK: EntityId = 1750;

    fn fact(tag: &str, value: i64, fy: i32) -> RawFact {
        let (taxonomy, name) = tag.split_once(':').unwrap();
        RawFact {
            entity_id: CIK,
            taxonomy: taxonomy.to_string(),
            tag: name.to_string(),
            unit: "USD".to_string(),
            value: Some(value.to_string()),
            fiscal_year: Some(fy),
            fiscal_period: Some("FY".to_string()),
            form: Some("10-K".to_string()),
            filed_date: Some(format!("{}-02-15", fy + 1)),
            period_end_date: Some(format!("{}-12-31", fy)),
        }
    }

    /// Five growing years: EBITDA from operating income + D&A, FCF from OCF + capex.
    fn growing_entity() -> Vec<RawFact> {
        let mut facts = Vec::new();
        for (i, fy) in (2019..=2023).enumerate() {
            let i = i as i64;
            facts.push(fact("us-gaap:OperatingIncomeLoss", 80 + 20 * i, fy));
            facts.push(fact("us-gaap:DepreciationDepletionAndAmortization", 20, fy));
            facts.push(fact("us-gaap:NetCashProvidedByUsedInOperatingActivities", 150, fy));
            facts.push(fact("us-gaap:PaymentsToAcquirePropertyPlantAndEquipment", 50, fy));
            facts.push(fact("us-gaap:Revenues", 1000 + 100 * i, fy));
        }
        facts
    }

    #[test]
    fn test_growing_entity_passes() {
        let config = EngineConfig::load(None).unwrap();
        let outcome = ScreeningEngine::new(&config).process_entity(CIK, Some("Test Co".into()), &growing_entity());

        assert_eq!(outcome.records.len(), 5);
        let first = &outcome.records[0];
        assert!(first.calculated.contains(EBITDA));
        assert!(first.calculated.contains(FREE_CASH_FLOW));
        assert_eq!(first.get(EBITDA).map(|v| v.as_decimal()), Some(Decimal::from(100)));
        assert_eq!(first.get(FREE_CASH_FLOW).map(|v| v.as_decimal()), Some(Decimal::from(100)));

        // EBITDA 100 -> 180 over 4 periods, ~15.83%
        assert_eq!(outcome.trend.verdict, Verdict::Pass);
        assert!(outcome.trend.cagr_percent.unwrap() > 15.0);
        assert!(outcome.unresolved_concepts.contains(&"dividends_paid".to_string()));
        assert!(outcome.concepts.iter().any(|c| c.concept == "revenue" && c.tag == "us-gaap:Revenues"));
    }

    #[test]
    fn test_fcf_subtracts_positive_capex_payment() {
        let config = EngineConfig::load(None).unwrap();
        let facts = vec![
            fact("us-gaap:NetCashProvidedByUsedInOperatingActivities", 100, 2022),
            fact("us-gaap:PaymentsToAcquirePropertyPlantAndEquipment", 30, 2022),
        ];
        let outcome = ScreeningEngine::new(&config).process_entity(CIK, None, &facts);

        let record = &outcome.records[0];
        assert_eq!(record.get("capital_expenditure").map(|v| v.as_decimal()), Some(Decimal::from(-30)));
        assert_eq!(record.get(FREE_CASH_FLOW).map(|v| v.as_decimal()), Some(Decimal::from(70)));
    }

    #[test]
    fn test_year_keys_are_unique_and_ascending() {
        let config = EngineConfig::load(None).unwrap();
        let mut facts = growing_entity();
        // restated values for an existing year
        facts.push(fact("us-gaap:Revenues", 999, 2021));
        let outcome = ScreeningEngine::new(&config).process_entity(CIK, None, &facts);

        let keys: HashSet<_> = outcome
            .records
            .iter()
            .map(|r| (r.canonical.entity_id, r.fiscal_year()))
            .collect();
        assert_eq!(keys.len(), outcome.records.len());
        assert!(outcome.records.windows(2).all(|w| w[0].fiscal_year() < w[1].fiscal_year()));
    }

    #[test]
    fn test_identical_input_gives_identical_output() {
        let config = EngineConfig::load(None).unwrap();
        let engine = ScreeningEngine::new(&config);
        let facts = growing_entity();

        let a = serde_json::to_string(&engine.process_entity(CIK, None, &facts)).unwrap();
        let b = serde_json::to_string(&engine.process_entity(CIK, None, &facts)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_entity_without_facts_has_no_data() {
        let config = EngineConfig::load(None).unwrap();
        let outcome = ScreeningEngine::new(&config).process_entity(CIK, None, &[]);

        assert!(outcome.records.is_empty());
        assert_eq!(outcome.trend.verdict, Verdict::NoData);
        assert_eq!(outcome.unresolved_concepts.len(), config.catalog.concepts().len());
    }

    #[test]
    fn test_bad_facts_are_reported_not_fatal() {
        let config = EngineConfig::load(None).unwrap();
        let mut facts = growing_entity();
        let mut broken = fact("us-gaap:Revenues", 0, 2024);
        broken.value = Some("1,2,3".to_string());
        facts.push(broken);
        let mut other_entity = fact("us-gaap:Revenues", 5, 2024);
        other_entity.entity_id = CIK + 1;
        facts.push(other_entity);

        let outcome = ScreeningEngine::new(&config).process_entity(CIK, None, &facts);
        assert_eq!(outcome.discards.counts.get("unparseable_value"), Some(&1));
        assert!(outcome.records.iter().all(|r| r.fiscal_year() <= 2023));
    }
}
