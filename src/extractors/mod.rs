// src/extractors/mod.rs
pub mod assembler;
pub mod facts;
pub mod selector;

// Re-export key extraction types for convenience
pub use assembler::{CanonicalYearRecord, RecordAssembler};
pub use facts::{DiscardReport, EntityId, FactValue, RawFact};
pub use selector::FactSelector;
