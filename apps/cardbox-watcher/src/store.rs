//! Document store and sidecar persistence.
//!
//! The extraction core never touches the filesystem; everything it needs
//! goes through the `DocumentStore` capability here. Extracted cards are
//! persisted as a JSON sidecar next to their source file, always carrying
//! the original content so the source can be reconstructed at any time.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cardbox_core::{ExtractionResult, FieldMap, StrategyKind};

/// Extension appended to a markdown file's path for its sidecar.
pub const SIDECAR_SUFFIX: &str = "cards.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid sidecar {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Read/write capability over the host document store.
pub trait DocumentStore: Send + Sync {
    fn read(&self, path: &Path) -> Result<String>;
    fn write(&self, path: &Path, text: &str) -> Result<()>;
    fn remove(&self, path: &Path) -> Result<()>;
}

/// Plain filesystem implementation.
#[derive(Debug, Default)]
pub struct FsDocumentStore;

impl FsDocumentStore {
    pub fn new() -> Self {
        Self
    }
}

impl DocumentStore for FsDocumentStore {
    fn read(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn write(&self, path: &Path, text: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, text).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn remove(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// One persisted card: only fields + method + confidence survive extraction,
/// plus the original block text for later integrity checks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCard {
    pub fields: FieldMap,
    pub method: StrategyKind,
    pub confidence: f64,
    pub original_content: String,
    /// 1-based line of the card's block in the source file.
    pub start_line: usize,
}

impl StoredCard {
    pub fn from_extraction(result: &ExtractionResult, original: &str, start_line: usize) -> Self {
        Self {
            fields: result.fields.clone(),
            method: result.method,
            confidence: result.confidence,
            original_content: original.to_string(),
            start_line,
        }
    }
}

/// Sidecar document stored next to each markdown file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sidecar {
    pub source_file: String,
    pub extracted_at: DateTime<Utc>,
    pub cards: Vec<StoredCard>,
}

/// Path of the sidecar for a markdown file (`notes.md` -> `notes.cards.json`).
pub fn sidecar_path(markdown: &Path) -> PathBuf {
    markdown.with_extension(SIDECAR_SUFFIX)
}

/// Serialize and persist a sidecar through the store.
pub fn write_sidecar(store: &dyn DocumentStore, markdown: &Path, sidecar: &Sidecar) -> Result<()> {
    let path = sidecar_path(markdown);
    let json = serde_json::to_string_pretty(sidecar).map_err(|source| StoreError::Json {
        path: path.clone(),
        source,
    })?;
    store.write(&path, &json)
}

/// Load a sidecar, if present.
pub fn load_sidecar(store: &dyn DocumentStore, sidecar_file: &Path) -> Result<Sidecar> {
    let json = store.read(sidecar_file)?;
    serde_json::from_str(&json).map_err(|source| StoreError::Json {
        path: sidecar_file.to_path_buf(),
        source,
    })
}

/// Recursively collect files under `root` with the given extension.
pub fn collect_files(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!(path = %dir.display(), error = %e, "skipping unreadable directory");
                continue;
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .to_string_lossy()
                .ends_with(&format!(".{extension}"))
            {
                found.push(path);
            }
        }
    }

    found.sort();
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardbox_core::DegradationEngine;
    use pretty_assertions::assert_eq;

    #[test]
    fn sidecar_path_swaps_extension() {
        let path = sidecar_path(Path::new("/vault/deck/notes.md"));
        assert_eq!(path, Path::new("/vault/deck/notes.cards.json"));
    }

    #[test]
    fn sidecar_round_trips_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("notes.md");
        let store = FsDocumentStore::new();

        let engine = DegradationEngine::default();
        let (result, _) = engine.extract("## Q?\nAn answer.", None);
        let sidecar = Sidecar {
            source_file: md.to_string_lossy().to_string(),
            extracted_at: Utc::now(),
            cards: vec![StoredCard::from_extraction(&result, "## Q?\nAn answer.", 1)],
        };

        write_sidecar(&store, &md, &sidecar).unwrap();
        let loaded = load_sidecar(&store, &sidecar_path(&md)).unwrap();

        assert_eq!(loaded.cards.len(), 1);
        assert_eq!(loaded.cards[0].original_content, "## Q?\nAn answer.");
        assert_eq!(loaded.cards[0].fields, sidecar.cards[0].fields);
    }

    #[test]
    fn collect_files_walks_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("deck");
        fs::create_dir_all(&nested).unwrap();
        fs::write(dir.path().join("a.md"), "x").unwrap();
        fs::write(nested.join("b.md"), "y").unwrap();
        fs::write(nested.join("c.txt"), "z").unwrap();

        let files = collect_files(dir.path(), "md");
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn remove_missing_file_is_ok() {
        let store = FsDocumentStore::new();
        store.remove(Path::new("/nonexistent/file.cards.json")).unwrap();
    }
}
