// src/utils/error.rs
use thiserror::Error;

// Errors from the SEC fetch collaborator
#[derive(Error, Debug)]
pub enum EdgarError {
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error), // Automatically convert reqwest errors

    #[error("HTTP error: {0}")]
    Http(reqwest::StatusCode), // e.g., 404 Not Found, 403 Forbidden

    #[error("SEC Rate limit likely exceeded")]
    RateLimited,

    #[error("Could not find CIK for ticker {0}")]
    TickerNotFound(String),

    #[error("No companyfacts document for CIK {0}")]
    FactsNotFound(u64),

    #[error("Failed to read local companyfacts file {path}: {source}")]
    LocalFile {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse EDGAR response: {0}")]
    Parse(String),
}

// Startup-time configuration problems; never raised per entity
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config syntax: {0}")]
    Syntax(#[from] toml::de::Error),

    #[error("Concept '{0}' has an empty candidate tag list")]
    EmptyTagList(String),

    #[error("Concept '{concept}' has malformed tag '{tag}' (expected taxonomy:Tag)")]
    MalformedTag { concept: String, tag: String },

    #[error("Concept '{0}' is defined more than once")]
    DuplicateConcept(String),

    #[error("Invalid screening threshold: {0}")]
    InvalidThreshold(String),

    #[error("Unknown concept '{0}' referenced by screening config")]
    UnknownConcept(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error), // Automatically convert IO errors

    #[error("EDGAR interaction failed: {0}")]
    Edgar(#[from] EdgarError), // Automatically convert Edgar errors

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid arguments: {0}")]
    Usage(String),

    #[error("Data processing failed: {0}")]
    Processing(String),
}
