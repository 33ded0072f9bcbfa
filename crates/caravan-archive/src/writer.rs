//! Archive writer
//!
//! Append-only during export, then frozen to a single file. Payload order
//! per key is preserved: per-kind modules rely on it (primary record
//! first, child table rows after).

use crate::error::ArchiveError;
use crate::format::{ArchiveDocument, ArchiveEntry, FORMAT_VERSION};
use caravan_model::{Dependency, DependencyKey, Payload};
use indexmap::IndexMap;
use std::fs;
use std::path::Path;

/// Write-once archive builder
#[derive(Debug)]
pub struct ArchiveWriter {
    root: Dependency,
    entries: IndexMap<DependencyKey, Vec<Payload>>,
}

impl ArchiveWriter {
    /// Start an archive for a resolved dependency tree
    #[must_use]
    pub fn new(root: Dependency) -> Self {
        Self {
            root,
            entries: IndexMap::new(),
        }
    }

    /// Append one payload for a key
    ///
    /// Multiple payloads per key are allowed; order is preserved.
    pub fn append(&mut self, key: DependencyKey, payload: Payload) {
        self.entries.entry(key).or_default().push(payload);
    }

    /// Number of keys with at least one payload
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Freeze the archive to a single portable file
    ///
    /// Writes to a sibling temp file and renames into place, so a crashed
    /// export never leaves a half-written archive at the target path.
    ///
    /// # Errors
    /// Returns [`ArchiveError::Io`] on filesystem failure.
    pub fn finish(self, path: &Path) -> Result<(), ArchiveError> {
        let document = ArchiveDocument {
            format_version: FORMAT_VERSION,
            root: self.root,
            entries: self
                .entries
                .into_iter()
                .map(|(key, payloads)| ArchiveEntry { key, payloads })
                .collect(),
        };

        let bytes = serde_json::to_vec_pretty(&document).map_err(|source| {
            ArchiveError::Malformed {
                path: path.to_path_buf(),
                source,
            }
        })?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, &bytes).map_err(|source| ArchiveError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::info!(
            path = %path.display(),
            entries = document.entries.len(),
            "archive written"
        );
        Ok(())
    }
}
