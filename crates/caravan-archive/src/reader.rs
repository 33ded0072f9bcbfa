//! Archive reader
//!
//! Read-only view over one archive file. Lookups fail loudly when an
//! expected payload is absent or mistyped; payloads written by a newer
//! exporter generation are skipped with a warning at open.

use crate::error::ArchiveError;
use crate::format::{ArchiveDocument, FORMAT_VERSION};
use caravan_model::{Dependency, DependencyKey, Payload, PayloadType};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Read-only archive view
#[derive(Debug)]
pub struct ArchiveReader {
    root: Dependency,
    entries: IndexMap<DependencyKey, Vec<Payload>>,
    display_names: HashMap<DependencyKey, String>,
}

impl ArchiveReader {
    /// Open and parse an archive file
    ///
    /// # Errors
    /// - [`ArchiveError::Io`] / [`ArchiveError::Malformed`] if the file
    ///   cannot be read or parsed
    /// - [`ArchiveError::UnsupportedVersion`] if the document was written
    ///   by an incompatible exporter generation
    pub fn open(path: &Path) -> Result<Self, ArchiveError> {
        let bytes = fs::read(path).map_err(|source| ArchiveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let document: ArchiveDocument =
            serde_json::from_slice(&bytes).map_err(|source| ArchiveError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        if document.format_version > FORMAT_VERSION {
            return Err(ArchiveError::UnsupportedVersion {
                found: document.format_version,
                supported: FORMAT_VERSION,
            });
        }

        let mut entries = IndexMap::new();
        let mut skipped = 0usize;
        for entry in document.entries {
            let kept: Vec<Payload> = entry
                .payloads
                .into_iter()
                .filter(|p| {
                    if p.payload_type == PayloadType::Unknown {
                        skipped += 1;
                        false
                    } else {
                        true
                    }
                })
                .collect();
            entries.insert(entry.key, kept);
        }
        if skipped > 0 {
            tracing::warn!(
                path = %path.display(),
                skipped,
                "skipped payloads with unrecognized type"
            );
        }

        let display_names = document
            .root
            .walk()
            .into_iter()
            .map(|dep| (dep.key.clone(), dep.display_name.clone()))
            .collect();

        Ok(Self {
            root: document.root,
            entries,
            display_names,
        })
    }

    /// The serialized dependency tree, re-walked at install time
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Dependency {
        &self.root
    }

    /// Number of keys with payload entries
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Keys with payload entries, in archive order
    pub fn keys(&self) -> impl Iterator<Item = &DependencyKey> {
        self.entries.keys()
    }

    /// Whether at least one payload was written for a key
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &DependencyKey) -> bool {
        self.entries.get(key).is_some_and(|p| !p.is_empty())
    }

    /// All payloads for a key, in write order
    ///
    /// # Errors
    /// Returns [`ArchiveError::MissingPayload`] if no payloads were written
    /// for this key. Always fatal: the archive is incomplete or corrupt.
    pub fn payloads(&self, key: &DependencyKey) -> Result<&[Payload], ArchiveError> {
        match self.entries.get(key) {
            Some(payloads) if !payloads.is_empty() => Ok(payloads),
            _ => Err(ArchiveError::MissingPayload {
                key: key.clone(),
                display_name: self.display_name(key),
            }),
        }
    }

    /// First payload for a key, which must carry the expected type
    ///
    /// # Errors
    /// As [`payloads`](Self::payloads), plus
    /// [`ArchiveError::WrongPayloadType`] on archive-format drift.
    pub fn first_typed(
        &self,
        key: &DependencyKey,
        expected: PayloadType,
    ) -> Result<&Payload, ArchiveError> {
        let first = &self.payloads(key)?[0];
        if first.payload_type != expected {
            return Err(ArchiveError::WrongPayloadType {
                key: key.clone(),
                display_name: self.display_name(key),
                expected,
                actual: first.payload_type,
            });
        }
        Ok(first)
    }

    fn display_name(&self, key: &DependencyKey) -> String {
        self.display_names
            .get(key)
            .cloned()
            .unwrap_or_else(|| key.to_string())
    }
}
