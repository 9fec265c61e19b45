// src/config/screening.rs
use crate::utils::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trend classifier thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningConfig {
    /// Number of most recent qualifying years analysed (default: 5)
    #[serde(default = "default_window_years")]
    pub window_years: usize,

    /// Concept whose growth is tested (default: ebitda)
    #[serde(default = "default_growth_concept")]
    pub growth_concept: String,

    /// Minimum compound annual growth, in percent (default: 15.0)
    #[serde(default = "default_min_cagr_percent")]
    pub min_cagr_percent: f64,

    /// Minimum count of years with a strictly positive value, per concept
    #[serde(default = "default_min_positive_years")]
    pub min_positive_years: BTreeMap<String, usize>,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            window_years: default_window_years(),
            growth_concept: default_growth_concept(),
            min_cagr_percent: default_min_cagr_percent(),
            min_positive_years: default_min_positive_years(),
        }
    }
}

fn default_window_years() -> usize {
    5
}

fn default_growth_concept() -> String {
    "ebitda".to_string()
}

fn default_min_cagr_percent() -> f64 {
    15.0
}

fn default_min_positive_years() -> BTreeMap<String, usize> {
    BTreeMap::from([
        ("ebitda".to_string(), 3),
        ("free_cash_flow".to_string(), 3),
    ])
}

impl ScreeningConfig {
    /// `is_known` answers whether a concept name can ever appear in a derived record.
    pub fn validate(&self, is_known: impl Fn(&str) -> bool) -> Result<(), ConfigError> {
        // CAGR needs at least one growth period
        if self.window_years < 2 {
            return Err(ConfigError::InvalidThreshold(format!(
                "window_years must be at least 2, got {}",
                self.window_years
            )));
        }
        if !self.min_cagr_percent.is_finite() {
            return Err(ConfigError::InvalidThreshold(format!(
                "min_cagr_percent must be finite, got {}",
                self.min_cagr_percent
            )));
        }
        if !is_known(&self.growth_concept) {
            return Err(ConfigError::UnknownConcept(self.growth_concept.clone()));
        }
        for (concept, min) in &self.min_positive_years {
            if !is_known(concept) {
                return Err(ConfigError::UnknownConcept(concept.clone()));
            }
            if *min > self.window_years {
                return Err(ConfigError::InvalidThreshold(format!(
                    "min_positive_years.{} = {} exceeds window_years = {}",
                    concept, min, self.window_years
                )));
            }
        }
        Ok(())
    }
}
