//! Per-kind handler contract
//!
//! Each object kind (role, community, workflow, filter, ...) implements
//! [`KindHandler`] in its own module, outside this engine. The engine never
//! inspects kind-specific payload contents; it only sequences calls to this
//! interface: discover children during resolution, export payloads during
//! packaging, reserve identifiers and install during import.

use crate::error::EngineError;
use crate::mapping::MappingStore;
use crate::txlog::TransactionLog;
use caravan_archive::ArchiveReader;
use caravan_model::{Dependency, DependencyKey, DependencyType, ObjectKind, Payload};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Basic facts about an object found on a store
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    pub display_name: String,
}

impl ObjectInfo {
    #[inline]
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
        }
    }
}

/// One discovered child edge
#[derive(Debug, Clone)]
pub struct ChildLink {
    pub key: DependencyKey,
    pub dependency_type: DependencyType,
    /// Soft reference: recorded in the tree, never expanded or packaged
    pub is_association: bool,
}

impl ChildLink {
    /// Hard edge: the child ships with this export
    pub fn hard(key: DependencyKey, dependency_type: DependencyType) -> Self {
        Self {
            key,
            dependency_type,
            is_association: false,
        }
    }

    /// Soft edge: the child must already exist on the target
    pub fn association(key: DependencyKey, dependency_type: DependencyType) -> Self {
        Self {
            key,
            dependency_type,
            is_association: true,
        }
    }
}

/// What an install actually did on the target store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Object did not exist and was created
    Created,
    /// Object existed and was updated in place
    Modified,
    /// Object existed and needed no change; nothing is logged
    SkippedExisting,
}

/// Capability contract one object kind exposes to the engine
///
/// Implementations are bound to one store side: an export session uses
/// handlers over the source installation, an import session uses handlers
/// over the target installation.
pub trait KindHandler: Send + Sync {
    /// The kind this handler owns
    fn kind(&self) -> ObjectKind;

    /// Look up an object on this handler's store
    ///
    /// Absence is a legitimate answer, not an error: concurrent deletion
    /// during export and missing soft references during import both go
    /// through here.
    fn find_object(&self, key: &DependencyKey) -> Result<Option<ObjectInfo>, EngineError>;

    /// Enumerate the child edges of one object
    fn discover_children(&self, dep: &Dependency) -> Result<Vec<ChildLink>, EngineError>;

    /// Serialize one object's payloads for the archive, primary record first
    fn export_payloads(&self, dep: &Dependency) -> Result<Vec<Payload>, EngineError>;

    /// Write one object to the target store
    ///
    /// Reads its payloads from the archive, rewrites source identifiers to
    /// target identifiers via the mapping store, and may append row-level
    /// `Deleted` entries to the log. The node's own Created/Modified entry
    /// is appended by the coordinator from the returned outcome.
    ///
    /// # Errors
    /// [`EngineError::AssociationMissing`] is the only error the
    /// coordinator treats as recoverable.
    fn install(
        &self,
        archive: &ArchiveReader,
        dep: &Dependency,
        mappings: &mut MappingStore,
        log: &mut TransactionLog,
    ) -> Result<InstallOutcome, EngineError>;

    /// Reserve a target identifier for one object
    ///
    /// Must be idempotent across a session. No-op for kinds that do not
    /// participate in identifier mapping.
    fn reserve_identifier(
        &self,
        dep: &Dependency,
        mappings: &mut MappingStore,
    ) -> Result<(), EngineError> {
        let _ = (dep, mappings);
        Ok(())
    }

    /// Whether installs of this kind wait for all packaged non-association
    /// children to be installed first
    fn defer_installation(&self) -> bool {
        false
    }
}

impl fmt::Debug for dyn KindHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KindHandler")
            .field("kind", &self.kind())
            .finish()
    }
}

/// Handler lookup table for one session
///
/// Dynamic dispatch over the ~25 object kinds: the engine depends only on
/// [`KindHandler`], never on concrete kinds.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: IndexMap<ObjectKind, Arc<dyn KindHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own kind tag
    ///
    /// Later registrations for the same kind replace earlier ones.
    pub fn register(&mut self, handler: Arc<dyn KindHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    /// Look up the handler for a kind
    ///
    /// # Errors
    /// Returns [`EngineError::UnknownKind`] if no handler is registered.
    pub fn get(&self, kind: &ObjectKind) -> Result<&Arc<dyn KindHandler>, EngineError> {
        self.handlers
            .get(kind)
            .ok_or_else(|| EngineError::UnknownKind(kind.clone()))
    }

    /// Check if a kind has a handler
    #[inline]
    #[must_use]
    pub fn contains(&self, kind: &ObjectKind) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Number of registered handlers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
