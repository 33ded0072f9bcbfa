//! Object identity and mapping store
//!
//! Bidirectional source-id → target-id associations for one migration
//! session. Entries are created during graph resolution (or loaded from a
//! persisted prior mapping), get their target id on first reservation, and
//! are never deleted within a session; that is what makes re-importing
//! the same archive idempotent.

use crate::error::EngineError;
use caravan_model::{DependencyKey, KindRegistry, ObjectKind};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::sync::Arc;

/// One source→target identifier association
#[derive(Debug, Clone, PartialEq)]
pub struct IdMapping {
    pub key: DependencyKey,
    /// Target-system identifier; `None` until reserved
    pub target_id: Option<String>,
    /// Target-system display name, set once the object is confirmed
    pub target_name: Option<String>,
    /// True until the target object is confirmed to exist or has been
    /// freshly created
    pub is_new_object: bool,
}

impl IdMapping {
    fn new(key: DependencyKey) -> Self {
        Self {
            key,
            target_id: None,
            target_name: None,
            is_new_object: true,
        }
    }
}

/// Flat persistence row, one per mapping
#[derive(Debug, Serialize, Deserialize)]
struct MappingRow {
    source_id: String,
    kind: ObjectKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_kind: Option<ObjectKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_name: Option<String>,
    is_new_object: bool,
}

/// Per-session identifier mapping store
///
/// Strictly sequentially accessed within a session; independent sessions
/// each own their own instance, so no locking exists here.
#[derive(Debug)]
pub struct MappingStore {
    registry: Arc<KindRegistry>,
    entries: IndexMap<DependencyKey, IdMapping>,
}

impl MappingStore {
    /// Create an empty store over a kind catalog
    #[must_use]
    pub fn new(registry: Arc<KindRegistry>) -> Self {
        Self {
            registry,
            entries: IndexMap::new(),
        }
    }

    /// The kind catalog this store consults
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// Return the existing mapping for a key, creating a fresh
    /// `is_new_object` entry if none exists
    ///
    /// # Errors
    /// For parent-scoped kinds, the parent's mapping must already exist;
    /// otherwise [`EngineError::MissingParentMapping`], a fatal
    /// precondition that is never retried.
    pub fn get_or_create(&mut self, key: &DependencyKey) -> Result<&IdMapping, EngineError> {
        self.check_parent_precondition(key)?;
        Ok(self
            .entries
            .entry(key.clone())
            .or_insert_with(|| IdMapping::new(key.clone())))
    }

    /// Look up an existing mapping
    #[inline]
    #[must_use]
    pub fn get(&self, key: &DependencyKey) -> Option<&IdMapping> {
        self.entries.get(key)
    }

    /// The reserved target id for a key
    ///
    /// # Errors
    /// Returns [`EngineError::MissingMapping`] if no target id is reserved.
    pub fn target_id(&self, key: &DependencyKey) -> Result<&str, EngineError> {
        self.entries
            .get(key)
            .and_then(|m| m.target_id.as_deref())
            .ok_or_else(|| EngineError::MissingMapping { key: key.clone() })
    }

    /// Reserve a target identifier, calling the allocator at most once
    ///
    /// Idempotent: if a target id is already set (including one loaded
    /// from a persisted prior mapping) it is returned without invoking
    /// the allocator.
    ///
    /// # Errors
    /// Parent precondition as [`get_or_create`](Self::get_or_create), plus
    /// whatever the allocator returns.
    pub fn reserve_target_id<F>(
        &mut self,
        key: &DependencyKey,
        alloc: F,
    ) -> Result<String, EngineError>
    where
        F: FnOnce(&DependencyKey) -> Result<String, EngineError>,
    {
        self.get_or_create(key)?;
        if let Some(existing) = self.entries.get(key).and_then(|m| m.target_id.clone()) {
            return Ok(existing);
        }
        let id = alloc(key)?;
        if let Some(entry) = self.entries.get_mut(key) {
            entry.target_id = Some(id.clone());
            tracing::debug!(key = %key, target_id = %id, "target identifier reserved");
        }
        Ok(id)
    }

    /// Record that the target object now exists
    ///
    /// Flips `is_new_object` so a later import of the same archive updates
    /// instead of duplicating. No-op for keys without a mapping entry.
    pub fn confirm_installed(&mut self, key: &DependencyKey, target_name: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.is_new_object = false;
            entry.target_name = Some(target_name.to_string());
        }
    }

    /// Number of mappings
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if store is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate mappings in creation order
    pub fn iter(&self) -> impl Iterator<Item = &IdMapping> {
        self.entries.values()
    }

    /// Persist the store as a flat JSON row table
    ///
    /// Lets a mapping chosen during a dry run be reused on a later real
    /// import of the same archive.
    ///
    /// # Errors
    /// Returns [`EngineError::MappingIo`] on filesystem failure.
    pub fn save(&self, path: &Path) -> Result<(), EngineError> {
        let rows: Vec<MappingRow> = self
            .entries
            .values()
            .map(|m| MappingRow {
                source_id: m.key.id.clone(),
                kind: m.key.kind.clone(),
                parent_id: m.key.parent.as_ref().map(|p| p.id.clone()),
                parent_kind: m.key.parent.as_ref().map(|p| p.kind.clone()),
                target_id: m.target_id.clone(),
                target_name: m.target_name.clone(),
                is_new_object: m.is_new_object,
            })
            .collect();
        let bytes = serde_json::to_vec_pretty(&rows).map_err(|source| {
            EngineError::MappingMalformed {
                path: path.to_path_buf(),
                source,
            }
        })?;
        fs::write(path, bytes).map_err(|source| EngineError::MappingIo {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load a store from a flat JSON row table
    ///
    /// # Errors
    /// Returns [`EngineError::MappingIo`] / [`EngineError::MappingMalformed`]
    /// if the file cannot be read or parsed.
    pub fn load(path: &Path, registry: Arc<KindRegistry>) -> Result<Self, EngineError> {
        let bytes = fs::read(path).map_err(|source| EngineError::MappingIo {
            path: path.to_path_buf(),
            source,
        })?;
        let rows: Vec<MappingRow> =
            serde_json::from_slice(&bytes).map_err(|source| EngineError::MappingMalformed {
                path: path.to_path_buf(),
                source,
            })?;

        let mut entries = IndexMap::new();
        for row in rows {
            let key = match (row.parent_kind, row.parent_id) {
                (Some(kind), Some(id)) => DependencyKey::scoped(
                    row.kind,
                    row.source_id,
                    caravan_model::ParentKey::new(kind, id),
                ),
                _ => DependencyKey::new(row.kind, row.source_id),
            };
            entries.insert(
                key.clone(),
                IdMapping {
                    key,
                    target_id: row.target_id,
                    target_name: row.target_name,
                    is_new_object: row.is_new_object,
                },
            );
        }
        Ok(Self { registry, entries })
    }

    fn check_parent_precondition(&self, key: &DependencyKey) -> Result<(), EngineError> {
        let parent_scoped = self
            .registry
            .descriptor(&key.kind)
            .is_some_and(|d| d.parent_scoped);
        if !parent_scoped {
            return Ok(());
        }
        let parent_key = match &key.parent {
            Some(p) => DependencyKey::new(p.kind.clone(), p.id.clone()),
            None => return Err(EngineError::MissingParentMapping { key: key.clone() }),
        };
        if self.entries.contains_key(&parent_key) {
            Ok(())
        } else {
            Err(EngineError::MissingParentMapping { key: key.clone() })
        }
    }
}
