use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::CredentialEntry;

/// Indentation used when writing the key file, kept stable for diffs
const INDENT: &[u8] = b"    ";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No existing key file found at {}", .path.display())]
    Missing { path: PathBuf },

    #[error("Error parsing key file {}: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not read key file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not write to key file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result of loading the key file. Loading never fails outright; a missing or
/// unreadable file leaves `entries` empty and describes why in `problem`.
#[derive(Debug)]
pub struct LoadOutcome {
    pub entries: Vec<CredentialEntry>,
    /// Objects in the file without a usable key and secret. They are not
    /// offered for selection but are written back on save.
    pub skipped: usize,
    pub problem: Option<StoreError>,
}

/// Stores API key pairs and their last known numbers in a local JSON file.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all stored entries, in file order
    pub fn load(&self) -> LoadOutcome {
        match self.read_objects() {
            Ok(objects) => {
                let (entries, unusable) = split_usable(objects);
                if !unusable.is_empty() {
                    warn!(
                        skipped = unusable.len(),
                        path = %self.path.display(),
                        "Key file has entries without a usable key and secret"
                    );
                }
                debug!(count = entries.len(), path = %self.path.display(), "Loaded key file");
                LoadOutcome {
                    entries,
                    skipped: unusable.len(),
                    problem: None,
                }
            }
            Err(problem) => {
                warn!(error = %problem, "Continuing without stored keys");
                LoadOutcome {
                    entries: Vec::new(),
                    skipped: 0,
                    problem: Some(problem),
                }
            }
        }
    }

    fn read_objects(&self) -> Result<Vec<Value>, StoreError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StoreError::Missing {
                    path: self.path.clone(),
                }
            } else {
                StoreError::Read {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    /// Write all entries back to the key file, replacing its contents.
    ///
    /// Objects already in the file that `load` could not use are kept, after
    /// the entries.
    pub fn save(&self, entries: &[CredentialEntry]) -> Result<(), StoreError> {
        let write_err = |source: io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        let invalid = |e: serde_json::Error| write_err(io::Error::new(io::ErrorKind::InvalidData, e));

        let retained = match self.read_objects() {
            Ok(objects) => split_usable(objects).1,
            Err(_) => Vec::new(),
        };
        let mut objects = entries
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid)?;
        objects.extend(retained);

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        objects.serialize(&mut ser).map_err(invalid)?;
        buf.write_all(b"\n").map_err(write_err)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(&self.path, buf).map_err(write_err)?;

        debug!(count = entries.len(), path = %self.path.display(), "Saved key file");
        Ok(())
    }
}

/// Separate objects that deserialize into entries from those that don't
fn split_usable(objects: Vec<Value>) -> (Vec<CredentialEntry>, Vec<Value>) {
    let mut entries = Vec::new();
    let mut unusable = Vec::new();
    for object in objects {
        match CredentialEntry::deserialize(&object) {
            Ok(entry) => entries.push(entry),
            Err(_) => unusable.push(object),
        }
    }
    (entries, unusable)
}
