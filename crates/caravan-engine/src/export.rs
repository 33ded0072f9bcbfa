//! Export packaging
//!
//! Walks a resolved tree and drives each packaged node's handler to
//! serialize its payloads into the archive writer. System/Server objects
//! and association edges are referenced in the tree but never packaged.

use crate::error::EngineError;
use crate::handler::HandlerRegistry;
use caravan_archive::ArchiveWriter;
use caravan_model::Dependency;
use indexmap::IndexSet;

/// Payload packager for one export pass
#[derive(Debug)]
pub struct Exporter<'a> {
    handlers: &'a HandlerRegistry,
}

impl<'a> Exporter<'a> {
    /// Create an exporter over a handler registry
    #[must_use]
    pub fn new(handlers: &'a HandlerRegistry) -> Self {
        Self { handlers }
    }

    /// Package every hard-edged Local/Shared node of a resolved tree
    ///
    /// Duplicate leaf references to an already-packaged key are skipped,
    /// so each object's payloads appear exactly once.
    pub fn package(&self, root: &Dependency) -> Result<ArchiveWriter, EngineError> {
        let mut writer = ArchiveWriter::new(root.clone());
        let mut packaged = IndexSet::new();

        for dep in root.walk() {
            if !dep.is_packaged() {
                tracing::debug!(key = %dep.key, ty = ?dep.dependency_type, "referenced, not packaged");
                continue;
            }
            if !packaged.insert(dep.key.clone()) {
                continue;
            }

            let handler = self.handlers.get(&dep.key.kind)?;
            for payload in handler.export_payloads(dep)? {
                writer.append(dep.key.clone(), payload);
            }
        }

        tracing::info!(root = %root.key, entries = writer.entry_count(), "export packaged");
        Ok(writer)
    }
}
