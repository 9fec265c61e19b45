// src/screening/mod.rs
pub mod derived;
pub mod trend;

pub use derived::{derive, DerivedYearRecord};
pub use trend::{TrendClassifier, TrendResult, Verdict};
