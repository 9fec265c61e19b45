// src/extractors/assembler.rs
use crate::config::ConceptCatalog;
use crate::extractors::facts::{EntityId, FactValue, FilingMetadata};
use crate::extractors::selector::ConceptResolution;
use serde::Serialize;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// One canonical row per (entity, fiscal year).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalYearRecord {
    pub entity_id: EntityId,
    pub fiscal_year: i32,
    /// Shared metadata, taken wholesale from the best-ranked value of the year.
    #[serde(flatten)]
    pub metadata: FilingMetadata,
    /// Concept -> value. Unresolved concepts are absent.
    pub values: BTreeMap<String, FactValue>,
    /// Concept -> tag the value came from.
    pub sources: BTreeMap<String, String>,
}

impl CanonicalYearRecord {
    pub fn get(&self, concept: &str) -> Option<FactValue> {
        self.values.get(concept).copied()
    }
}

pub struct RecordAssembler<'a> {
    catalog: &'a ConceptCatalog,
}

impl<'a> RecordAssembler<'a> {
    pub fn new(catalog: &'a ConceptCatalog) -> Self {
        Self { catalog }
    }

    /// Joins every concept resolution of one entity into year records, ascending by year.
    ///
    /// `resolutions` must be in catalog order; on a full metadata tie the later concept wins.
    pub fn assemble(
        &self,
        entity_id: EntityId,
        resolutions: &[ConceptResolution],
    ) -> Vec<CanonicalYearRecord> {
        let mut years: BTreeMap<i32, CanonicalYearRecord> = BTreeMap::new();

        for resolution in resolutions {
            for (&year, resolved) in &resolution.values {
                match years.entry(year) {
                    Entry::Vacant(slot) => {
                        slot.insert(CanonicalYearRecord {
                            entity_id,
                            fiscal_year: year,
                            metadata: resolved.filing.clone(),
                            values: BTreeMap::from([(resolution.concept.clone(), resolved.value)]),
                            sources: BTreeMap::from([(
                                resolution.concept.clone(),
                                resolved.tag.clone(),
                            )]),
                        });
                    }
                    Entry::Occupied(mut slot) => {
                        let record = slot.get_mut();
                        record.values.insert(resolution.concept.clone(), resolved.value);
                        record.sources.insert(resolution.concept.clone(), resolved.tag.clone());
                        if resolved.filing.supersedes(&record.metadata, self.catalog) {
                            record.metadata = resolved.filing.clone();
                        }
                    }
                }
            }
        }

        years.into_values().collect()
    }
}
