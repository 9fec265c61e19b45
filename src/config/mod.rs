// src/config/mod.rs
pub mod catalog;
pub mod screening;

pub use catalog::{Concept, ConceptCatalog, TagRef, UnitClass};
pub use screening::ScreeningConfig;

use crate::screening::derived;
use crate::utils::error::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Shipped default catalog and thresholds.
const DEFAULT_CONFIG_TOML: &str = include_str!("../../config/default.toml");

/// Immutable configuration for one batch run. Built once at startup and shared by reference.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub catalog: ConceptCatalog,
    pub screening: ScreeningConfig,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    catalog: catalog::CatalogFile,
    #[serde(default)]
    screening: ScreeningConfig,
}

impl EngineConfig {
    /// Loads the config at `path`, or the embedded default when none is given.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                tracing::info!("Loading engine config from {}", path.display());
                Self::from_toml_str(&text)
            }
            None => {
                tracing::info!("Using built-in default engine config");
                Self::from_toml_str(DEFAULT_CONFIG_TOML)
            }
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(text)?;
        let catalog = ConceptCatalog::from_file(file.catalog)?;
        let screening = file.screening;
        screening.validate(|name| catalog.contains(name) || derived::is_derived(name))?;

        tracing::debug!(
            "Engine config: {} concepts, window {} years, growth concept '{}'",
            catalog.concepts().len(),
            screening.window_years,
            screening.growth_concept
        );
        Ok(Self { catalog, screening })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_default_is_valid() {
        let config = EngineConfig::load(None).expect("default config should load");
        for name in [
            "revenue",
            "net_income_loss",
            "operating_cash_flow",
            "capital_expenditure",
            "operating_income_loss",
            "depreciation_and_amortization",
            "shares_outstanding",
        ] {
            assert!(config.catalog.contains(name), "missing concept {}", name);
        }
        assert_eq!(
            config.catalog.get("shares_outstanding").map(|c| c.unit_class),
            Some(UnitClass::Shares)
        );
        assert_eq!(config.screening.growth_concept, "ebitda");
    }

    #[test]
    fn test_screening_may_reference_derived_concepts() {
        let config = EngineConfig::from_toml_str(
            r#"
            [catalog]
            [[catalog.concepts]]
            name = "revenue"
            unit = "currency"
            tags = ["us-gaap:Revenues"]

            [screening]
            growth_concept = "revenue"
            [screening.min_positive_years]
            free_cash_flow = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.screening.growth_concept, "revenue");
    }

    #[test]
    fn test_unknown_growth_concept_is_fatal() {
        let result = EngineConfig::from_toml_str(
            r#"
            [catalog]
            [[catalog.concepts]]
            name = "revenue"
            unit = "currency"
            tags = ["us-gaap:Revenues"]

            [screening]
            growth_concept = "gross_margin"
            "#,
        );
        assert!(matches!(result, Err(ConfigError::UnknownConcept(_))));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let result = EngineConfig::load(Some(Path::new("/nonexistent/engine.toml")));
        match result {
            Err(ConfigError::Read { path, .. }) => assert!(path.contains("engine.toml")),
            other => panic!("expected read error, got {:?}", other),
        }
    }
}
