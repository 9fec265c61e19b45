// src/config/catalog.rs
use crate::utils::error::ConfigError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// `taxonomy:Tag`, e.g. `us-gaap:NetIncomeLoss`, `ifrs-full:Revenue`, `dei:EntityCommonStockSharesOutstanding`
static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([a-z][a-z0-9\-]*):([A-Za-z][A-Za-z0-9_]*)$").expect("Failed to compile TAG_RE")
});

/// The kind of unit a concept is expected to be disclosed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitClass {
    Currency,
    Shares,
    PerShare,
}

/// A fully-qualified candidate tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagRef {
    pub taxonomy: String,
    pub name: String,
}

impl TagRef {
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = TAG_RE.captures(raw.trim())?;
        Some(Self {
            taxonomy: caps[1].to_string(),
            name: caps[2].to_string(),
        })
    }
}

impl fmt::Display for TagRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.taxonomy, self.name)
    }
}

#[derive(Debug, Clone)]
pub struct Concept {
    pub name: String,
    pub unit_class: UnitClass,
    /// Most to least preferred.
    pub tags: Vec<TagRef>,
    /// Flip the disclosed sign, e.g. capex reported as a positive payment.
    pub negate: bool,
}

/// Form priority class used by every "best entry" decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FormPriority {
    Other,
    AnnualReport,
}

/// Validated, immutable concept catalog.
#[derive(Debug, Clone)]
pub struct ConceptCatalog {
    reporting_currency: String,
    annual_forms: Vec<String>,
    concepts: Vec<Concept>,
}

// --- On-disk shape ---

#[derive(Debug, Deserialize)]
pub(crate) struct CatalogFile {
    #[serde(default = "default_reporting_currency")]
    reporting_currency: String,
    #[serde(default = "default_annual_forms")]
    annual_forms: Vec<String>,
    #[serde(default)]
    concepts: Vec<ConceptEntry>,
}

#[derive(Debug, Deserialize)]
struct ConceptEntry {
    name: String,
    unit: UnitClass,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    negate: bool,
}

fn default_reporting_currency() -> String {
    "USD".to_string()
}

fn default_annual_forms() -> Vec<String> {
    vec!["10-K".to_string(), "20-F".to_string()]
}

impl ConceptCatalog {
    pub(crate) fn from_file(file: CatalogFile) -> Result<Self, ConfigError> {
        if file.annual_forms.is_empty() {
            return Err(ConfigError::InvalidThreshold(
                "catalog.annual_forms must list at least one form".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut concepts = Vec::with_capacity(file.concepts.len());
        for entry in file.concepts {
            if !seen.insert(entry.name.clone()) {
                return Err(ConfigError::DuplicateConcept(entry.name));
            }
            if entry.tags.is_empty() {
                return Err(ConfigError::EmptyTagList(entry.name));
            }
            let tags = entry
                .tags
                .iter()
                .map(|raw| {
                    TagRef::parse(raw).ok_or_else(|| ConfigError::MalformedTag {
                        concept: entry.name.clone(),
                        tag: raw.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            concepts.push(Concept {
                name: entry.name,
                unit_class: entry.unit,
                tags,
                negate: entry.negate,
            });
        }

        Ok(Self {
            reporting_currency: file.reporting_currency,
            annual_forms: file.annual_forms,
            concepts,
        })
    }

    /// Concepts in catalog order. This order is also the tie-break order for record metadata.
    pub fn concepts(&self) -> &[Concept] {
        &self.concepts
    }

    pub fn get(&self, name: &str) -> Option<&Concept> {
        self.concepts.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The unit bucket key a concept of this class is expected under.
    pub fn unit_key(&self, class: UnitClass) -> String {
        match class {
            UnitClass::Currency => self.reporting_currency.clone(),
            UnitClass::Shares => "shares".to_string(),
            UnitClass::PerShare => format!("{}/shares", self.reporting_currency),
        }
    }

    pub fn form_priority(&self, form: Option<&str>) -> FormPriority {
        if form.map_or(false, |form| self.annual_forms.iter().any(|f| f == form)) {
            FormPriority::AnnualReport
        } else {
            FormPriority::Other
        }
    }
}
