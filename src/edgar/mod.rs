// src/edgar/mod.rs
pub mod client;
pub mod models;
pub mod source;

pub use client::EdgarClient;
pub use source::{list_local_entities, FactSource};
