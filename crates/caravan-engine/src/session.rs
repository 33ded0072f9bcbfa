//! Migration session
//!
//! One session = one export or one import, run synchronously to
//! completion. The session owns the per-session mutable state (mapping
//! store, transaction log) and borrows its collaborators: handler
//! registry and kind catalog are constructor arguments, never globals.
//! Independent sessions against different targets may run concurrently
//! because they share nothing.

use crate::error::EngineError;
use crate::export::Exporter;
use crate::handler::HandlerRegistry;
use crate::install::{InstallCoordinator, InstallReport};
use crate::mapping::MappingStore;
use crate::resolver::{GraphResolver, DEFAULT_MAX_DEPTH};
use crate::txlog::TransactionLog;
use caravan_archive::ArchiveReader;
use caravan_model::{Dependency, KindRegistry};
use std::path::Path;
use std::sync::Arc;

/// Session behavior knobs
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Recursion guard for graph resolution
    pub max_resolve_depth: usize,
    /// Treat a missing environment-specific (`Server`) object as fatal
    /// instead of a logged warning
    pub fail_on_missing_server: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_resolve_depth: DEFAULT_MAX_DEPTH,
            fail_on_missing_server: false,
        }
    }
}

/// One export or import run
#[derive(Debug)]
pub struct MigrationSession<'a> {
    handlers: &'a HandlerRegistry,
    config: SessionConfig,
    mappings: MappingStore,
    log: TransactionLog,
}

impl<'a> MigrationSession<'a> {
    /// Start a session with a fresh mapping store
    ///
    /// # Errors
    /// Fails if the kind catalog is inconsistent (unknown child kinds).
    pub fn new(
        handlers: &'a HandlerRegistry,
        registry: Arc<KindRegistry>,
        config: SessionConfig,
    ) -> Result<Self, EngineError> {
        registry.validate()?;
        Ok(Self {
            handlers,
            config,
            mappings: MappingStore::new(registry),
            log: TransactionLog::new(),
        })
    }

    /// Start a session reusing a previously persisted mapping store
    ///
    /// Used to apply a mapping chosen during a dry run to a later real
    /// import of the same archive.
    pub fn with_mappings(
        handlers: &'a HandlerRegistry,
        mappings: MappingStore,
        config: SessionConfig,
    ) -> Result<Self, EngineError> {
        mappings.registry().validate()?;
        Ok(Self {
            handlers,
            config,
            mappings,
            log: TransactionLog::new(),
        })
    }

    /// Export: resolve the closure of `root` and write the archive file
    ///
    /// Returns the resolved tree for inspection/reporting.
    pub fn export(&mut self, root: Dependency, path: &Path) -> Result<Dependency, EngineError> {
        tracing::info!(root = %root.key, path = %path.display(), "export starting");
        let resolver =
            GraphResolver::new(self.handlers).with_max_depth(self.config.max_resolve_depth);
        let tree = resolver.resolve(root, &mut self.mappings)?;
        let writer = Exporter::new(self.handlers).package(&tree)?;
        writer.finish(path)?;
        Ok(tree)
    }

    /// Import: read an archive file and install it on the target
    pub fn import(&mut self, path: &Path) -> Result<InstallReport, EngineError> {
        tracing::info!(path = %path.display(), "import starting");
        let archive = ArchiveReader::open(path)?;
        let coordinator = InstallCoordinator::new(self.handlers, &self.config);
        coordinator.install(&archive, &mut self.mappings, &mut self.log)
    }

    /// Identifier mappings accumulated so far
    #[inline]
    #[must_use]
    pub fn mappings(&self) -> &MappingStore {
        &self.mappings
    }

    /// Mutable mapping access, e.g. for operator overrides before import
    #[inline]
    pub fn mappings_mut(&mut self) -> &mut MappingStore {
        &mut self.mappings
    }

    /// Transaction log of this session
    #[inline]
    #[must_use]
    pub fn log(&self) -> &TransactionLog {
        &self.log
    }

    /// Consume the session, keeping the log for reporting
    #[inline]
    #[must_use]
    pub fn into_log(self) -> TransactionLog {
        self.log
    }

    /// Persist the mapping store (see [`MappingStore::save`])
    pub fn save_mappings(&self, path: &Path) -> Result<(), EngineError> {
        self.mappings.save(path)
    }
}
