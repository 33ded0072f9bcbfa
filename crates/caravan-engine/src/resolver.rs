//! Graph resolver
//!
//! Builds the closure of objects to ship from a root reference. Handlers
//! enumerate child edges; the resolver deduplicates by dependency key,
//! expands hard edges, records soft (association) edges without expanding
//! them, and drops children that no longer exist on the source.
//!
//! Cycle safety: a key already visited is recorded as a leaf reference
//! instead of being expanded again. That prevents infinite *discovery*;
//! install-order deadlock between deferred kinds is a separate concern,
//! detected by the coordinator.

use crate::error::EngineError;
use crate::handler::HandlerRegistry;
use crate::mapping::MappingStore;
use caravan_model::{Dependency, DependencyKey};
use indexmap::IndexSet;

/// Default recursion guard; real trees are a handful of levels deep
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Closure resolver for one export pass
#[derive(Debug)]
pub struct GraphResolver<'a> {
    handlers: &'a HandlerRegistry,
    max_depth: usize,
}

impl<'a> GraphResolver<'a> {
    /// Create a resolver over a handler registry
    #[must_use]
    pub fn new(handlers: &'a HandlerRegistry) -> Self {
        Self {
            handlers,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the recursion depth guard
    #[inline]
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Resolve the dependency closure of a root reference
    ///
    /// Pre-creates one mapping entry per resolved node whose kind supports
    /// identifier mapping, parents before children.
    ///
    /// # Guarantees
    /// The output tree is finite, expands each distinct key exactly once,
    /// and reaches every hard (Local/Shared) edge from the root.
    ///
    /// # Errors
    /// - [`EngineError::ObjectNotFound`] if the root itself is gone
    /// - [`EngineError::DepthExceeded`] past the depth guard
    /// - handler and mapping-precondition errors propagate
    pub fn resolve(
        &self,
        root: Dependency,
        mappings: &mut MappingStore,
    ) -> Result<Dependency, EngineError> {
        let handler = self.handlers.get(&root.key.kind)?;
        let info = handler
            .find_object(&root.key)?
            .ok_or_else(|| EngineError::ObjectNotFound {
                key: root.key.clone(),
            })?;

        let mut node = Dependency::new(root.key, root.dependency_type, info.display_name);
        node.is_association = root.is_association;

        let mut visited = IndexSet::new();
        visited.insert(node.key.clone());
        self.ensure_mapping(&node.key, mappings)?;
        self.expand(&mut node, &mut visited, mappings, 0)?;

        tracing::info!(root = %node.key, nodes = visited.len(), "dependency graph resolved");
        Ok(node)
    }

    fn expand(
        &self,
        node: &mut Dependency,
        visited: &mut IndexSet<DependencyKey>,
        mappings: &mut MappingStore,
        depth: usize,
    ) -> Result<(), EngineError> {
        if depth >= self.max_depth {
            return Err(EngineError::DepthExceeded {
                key: node.key.clone(),
                limit: self.max_depth,
            });
        }

        let handler = self.handlers.get(&node.key.kind)?;
        for link in handler.discover_children(node)? {
            let child_handler = self.handlers.get(&link.key.kind)?;
            let info = match child_handler.find_object(&link.key)? {
                Some(info) => info,
                None => {
                    // Deleted between discovery and resolution; the walk
                    // continues without it.
                    tracing::warn!(child = %link.key, parent = %node.key, "dropping vanished child");
                    continue;
                }
            };

            let mut child = Dependency::new(link.key, link.dependency_type, info.display_name);
            child.is_association = link.is_association;

            if visited.contains(&child.key) {
                // Already expanded elsewhere; keep the edge as a leaf
                // reference so revisits never recurse.
                node.push_child(child);
                continue;
            }
            visited.insert(child.key.clone());
            self.ensure_mapping(&child.key, mappings)?;

            // Association children must already exist on the target; they
            // are recorded but their own closure is not this export's
            // problem.
            if !child.is_association {
                self.expand(&mut child, visited, mappings, depth + 1)?;
            }
            node.push_child(child);
        }
        Ok(())
    }

    fn ensure_mapping(
        &self,
        key: &DependencyKey,
        mappings: &mut MappingStore,
    ) -> Result<(), EngineError> {
        let supports = mappings
            .registry()
            .descriptor(&key.kind)
            .is_some_and(|d| d.supports_mapping);
        if supports {
            mappings.get_or_create(key)?;
        }
        Ok(())
    }
}
