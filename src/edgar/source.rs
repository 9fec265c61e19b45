// src/edgar/source.rs
use crate::edgar::client::EdgarClient;
use crate::edgar::models::{parse_company_facts, CompanyFacts};
use crate::extractors::EntityId;
use crate::utils::error::EdgarError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

// File naming of the SEC bulk companyfacts extract
static FACTS_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^CIK(\d{10})\.json$").expect("Failed to compile FACTS_FILE_RE"));

pub fn facts_file_name(cik: EntityId) -> String {
    format!("CIK{:010}.json", cik)
}

/// Where companyfacts documents come from.
pub enum FactSource {
    /// Live SEC API.
    Sec(EdgarClient),
    /// A directory of `CIK##########.json` files, e.g. the unpacked bulk extract.
    LocalDir(PathBuf),
}

impl FactSource {
    pub async fn load(&self, cik: EntityId) -> Result<CompanyFacts, EdgarError> {
        match self {
            FactSource::Sec(client) => client.fetch_company_facts(cik).await,
            FactSource::LocalDir(dir) => load_local(dir, cik).await,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            FactSource::Sec(_) => "SEC companyfacts API".to_string(),
            FactSource::LocalDir(dir) => format!("local directory {}", dir.display()),
        }
    }
}

async fn load_local(dir: &Path, cik: EntityId) -> Result<CompanyFacts, EdgarError> {
    let path = dir.join(facts_file_name(cik));
    tracing::debug!("Reading companyfacts from {}", path.display());
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(EdgarError::FactsNotFound(cik)),
        Err(source) => {
            return Err(EdgarError::LocalFile {
                path: path.display().to_string(),
                source,
            })
        }
    };
    parse_company_facts(&bytes, cik)
}

/// Every CIK with a companyfacts file in `dir`, ascending.
pub async fn list_local_entities(dir: &Path) -> Result<Vec<EntityId>, EdgarError> {
    let to_error = |source: std::io::Error| EdgarError::LocalFile {
        path: dir.display().to_string(),
        source,
    };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(to_error)?;
    let mut ciks = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(to_error)? {
        let name = entry.file_name();
        let Some(caps) = name.to_str().and_then(|n| FACTS_FILE_RE.captures(n)) else {
            continue;
        };
        if let Ok(cik) = caps[1].parse::<EntityId>() {
            ciks.push(cik);
        }
    }
    ciks.sort_unstable();
    Ok(ciks)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{"cik": 1750, "entityName": "AAR CORP", "facts": {"us-gaap": {"Revenues": {"units": {"USD": [
        {"end": "2023-05-31", "val": 1990600000, "fy": 2023, "fp": "FY", "form": "10-K", "filed": "2023-07-20"}
    ]}}}}}"#;

    #[test]
    fn test_local_source_reads_padded_file_name() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("CIK0000001750.json"), DOC).unwrap();
        let source = FactSource::LocalDir(dir.path().to_path_buf());

        let facts = tokio_test::block_on(source.load(1750)).unwrap();
        assert_eq!(facts.entity_name.as_deref(), Some("AAR CORP"));
        assert_eq!(facts.facts.len(), 1);

        let missing = tokio_test::block_on(source.load(42));
        assert!(matches!(missing, Err(EdgarError::FactsNotFound(42))));
    }

    #[test]
    fn test_list_local_entities_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["CIK0000320193.json", "CIK0000001750.json", "notes.txt", "CIK123.json"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let ciks = tokio_test::block_on(list_local_entities(dir.path())).unwrap();
        assert_eq!(ciks, vec![1750, 320193]);
    }
}
