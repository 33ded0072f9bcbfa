//! Testing utilities for the caravan workspace
//!
//! In-memory object stores and scripted per-kind handlers, so engine tests
//! can exercise resolution, packaging, and install ordering without a real
//! content-management backend. One [`MemoryStore`] plays the part of one
//! installation side; handlers for all kinds on that side share it.

#![allow(missing_docs)]

use caravan_archive::ArchiveReader;
use caravan_engine::{
    ChildLink, EngineError, InstallOutcome, KindHandler, MappingStore, ObjectInfo, TransactionLog,
};
use caravan_model::{
    Dependency, DependencyKey, DependencyType, ObjectKind, Payload, PayloadType,
};
use indexmap::IndexMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// One stored object on a fake installation
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub display_name: String,
    pub record: Vec<u8>,
}

/// Shared in-memory object store for one installation side
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<IndexMap<(ObjectKind, String), StoredObject>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        kind: impl Into<ObjectKind>,
        id: impl Into<String>,
        display_name: impl Into<String>,
        record: impl Into<Vec<u8>>,
    ) {
        self.inner.lock().expect("store mutex poisoned").insert(
            (kind.into(), id.into()),
            StoredObject {
                display_name: display_name.into(),
                record: record.into(),
            },
        );
    }

    pub fn get(&self, kind: &ObjectKind, id: &str) -> Option<StoredObject> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .get(&(kind.clone(), id.to_string()))
            .cloned()
    }

    pub fn contains(&self, kind: &ObjectKind, id: &str) -> bool {
        self.get(kind, id).is_some()
    }

    pub fn remove(&self, kind: &ObjectKind, id: &str) -> Option<StoredObject> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .shift_remove(&(kind.clone(), id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Configurable kind handler over a [`MemoryStore`]
///
/// Children and association requirements are scripted per source id;
/// everything else follows the engine contract: one structured-record
/// payload per object, idempotent identifier reservation, install as
/// create-or-update keyed on the reserved target id.
pub struct ScriptedHandler {
    kind: ObjectKind,
    store: MemoryStore,
    defer: bool,
    supports_mapping: bool,
    bubble_missing_associations: bool,
    children: Mutex<IndexMap<String, Vec<ChildLink>>>,
    required_associations: Mutex<IndexMap<String, Vec<DependencyKey>>>,
    sequential_ids: Option<AtomicU64>,
}

impl ScriptedHandler {
    pub fn new(kind: impl Into<ObjectKind>, store: MemoryStore) -> Self {
        Self {
            kind: kind.into(),
            store,
            defer: false,
            supports_mapping: true,
            bubble_missing_associations: false,
            children: Mutex::new(IndexMap::new()),
            required_associations: Mutex::new(IndexMap::new()),
            sequential_ids: None,
        }
    }

    /// Installs of this kind wait for their packaged children
    pub fn deferred(mut self) -> Self {
        self.defer = true;
        self
    }

    /// This kind does not participate in identifier mapping
    pub fn without_mapping(mut self) -> Self {
        self.supports_mapping = false;
        self
    }

    /// Missing associations bubble as errors instead of being nulled
    pub fn bubbling_missing_associations(mut self) -> Self {
        self.bubble_missing_associations = true;
        self
    }

    /// Allocate deterministic `t<N>` target ids instead of uuids
    pub fn with_sequential_ids(mut self, start: u64) -> Self {
        self.sequential_ids = Some(AtomicU64::new(start));
        self
    }

    /// Script a child edge for one source object
    pub fn link_child(&self, parent_id: impl Into<String>, link: ChildLink) {
        self.children
            .lock()
            .expect("children mutex poisoned")
            .entry(parent_id.into())
            .or_default()
            .push(link);
    }

    /// Script a soft reference that must pre-exist on this side
    pub fn require_association(&self, id: impl Into<String>, key: DependencyKey) {
        self.required_associations
            .lock()
            .expect("associations mutex poisoned")
            .entry(id.into())
            .or_default()
            .push(key);
    }

    fn allocate_target_id(&self) -> String {
        match &self.sequential_ids {
            Some(counter) => format!("t{}", counter.fetch_add(1, Ordering::SeqCst)),
            None => uuid::Uuid::new_v4().to_string(),
        }
    }
}

impl KindHandler for ScriptedHandler {
    fn kind(&self) -> ObjectKind {
        self.kind.clone()
    }

    fn find_object(&self, key: &DependencyKey) -> Result<Option<ObjectInfo>, EngineError> {
        Ok(self
            .store
            .get(&key.kind, &key.id)
            .map(|o| ObjectInfo::new(o.display_name)))
    }

    fn discover_children(&self, dep: &Dependency) -> Result<Vec<ChildLink>, EngineError> {
        Ok(self
            .children
            .lock()
            .expect("children mutex poisoned")
            .get(&dep.key.id)
            .cloned()
            .unwrap_or_default())
    }

    fn export_payloads(&self, dep: &Dependency) -> Result<Vec<Payload>, EngineError> {
        let object = self.store.get(&dep.key.kind, &dep.key.id).ok_or_else(|| {
            EngineError::HandlerFailed {
                key: dep.key.clone(),
                reason: "object vanished before export".to_string(),
            }
        })?;
        Ok(vec![Payload::new(PayloadType::StructuredRecord, object.record)])
    }

    fn install(
        &self,
        archive: &ArchiveReader,
        dep: &Dependency,
        mappings: &mut MappingStore,
        _log: &mut TransactionLog,
    ) -> Result<InstallOutcome, EngineError> {
        let payload = archive.first_typed(&dep.key, PayloadType::StructuredRecord)?;

        let required = self
            .required_associations
            .lock()
            .expect("associations mutex poisoned")
            .get(&dep.key.id)
            .cloned()
            .unwrap_or_default();
        for assoc in required {
            if !self.store.contains(&assoc.kind, &assoc.id) {
                if self.bubble_missing_associations {
                    return Err(EngineError::AssociationMissing {
                        display_name: assoc.to_string(),
                        key: assoc,
                    });
                }
                // Reference nulled; object installs without it.
                tracing::warn!(reference = %assoc, object = %dep.key, "soft reference absent; omitted");
            }
        }

        let target_id = mappings
            .get(&dep.key)
            .and_then(|m| m.target_id.clone())
            .unwrap_or_else(|| dep.key.id.clone());
        let existed = self.store.contains(&self.kind, &target_id);
        self.store.insert(
            self.kind.clone(),
            target_id,
            dep.display_name.clone(),
            payload.content.clone(),
        );
        Ok(if existed {
            InstallOutcome::Modified
        } else {
            InstallOutcome::Created
        })
    }

    fn reserve_identifier(
        &self,
        dep: &Dependency,
        mappings: &mut MappingStore,
    ) -> Result<(), EngineError> {
        if self.supports_mapping {
            mappings.reserve_target_id(&dep.key, |_| Ok(self.allocate_target_id()))?;
        }
        Ok(())
    }

    fn defer_installation(&self) -> bool {
        self.defer
    }
}

/// Root reference for a resolve pass; the resolver fills in the display
/// name from the source store
pub fn root_ref(kind: &str, id: &str) -> Dependency {
    Dependency::new(DependencyKey::new(kind, id), DependencyType::Local, "")
}
