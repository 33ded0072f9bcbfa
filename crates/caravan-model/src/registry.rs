//! Kind descriptor catalog
//!
//! Static, per-session catalog of the object kinds a migration understands:
//! which kinds exist, which may appear as children of which, whether a kind
//! participates in identifier mapping, and whether its identity is scoped
//! under a parent.

use crate::dependency::ObjectKind;
use crate::error::ModelError;
use indexmap::IndexMap;

/// Descriptor of one object kind
#[derive(Debug, Clone)]
pub struct KindDescriptor {
    pub kind: ObjectKind,
    /// Whether objects of this kind get source→target id mappings
    pub supports_mapping: bool,
    /// Whether identity is composite: `(kind, id, parent_kind, parent_id)`
    pub parent_scoped: bool,
    /// Kinds that may appear as children of this kind
    pub child_kinds: Vec<ObjectKind>,
}

impl KindDescriptor {
    /// Descriptor with no mapping, no parent scope, no children
    pub fn new(kind: impl Into<ObjectKind>) -> Self {
        Self {
            kind: kind.into(),
            supports_mapping: false,
            parent_scoped: false,
            child_kinds: Vec::new(),
        }
    }

    /// This kind participates in identifier mapping
    #[inline]
    #[must_use]
    pub fn with_mapping(mut self) -> Self {
        self.supports_mapping = true;
        self
    }

    /// This kind's identity is scoped under a parent object
    #[inline]
    #[must_use]
    pub fn scoped_under_parent(mut self) -> Self {
        self.parent_scoped = true;
        self
    }

    /// Declare the kinds that may appear as children
    #[must_use]
    pub fn with_children<I, K>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<ObjectKind>,
    {
        self.child_kinds = kinds.into_iter().map(Into::into).collect();
        self
    }
}

/// Catalog of kind descriptors for one migration session
#[derive(Debug, Default, Clone)]
pub struct KindRegistry {
    kinds: IndexMap<ObjectKind, KindDescriptor>,
}

impl KindRegistry {
    /// Create an empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor
    ///
    /// # Errors
    /// Returns [`ModelError::DuplicateKind`] if the kind is already present.
    pub fn register(&mut self, descriptor: KindDescriptor) -> Result<(), ModelError> {
        let kind = descriptor.kind.clone();
        if self.kinds.contains_key(&kind) {
            return Err(ModelError::DuplicateKind(kind));
        }
        self.kinds.insert(kind, descriptor);
        Ok(())
    }

    /// Look up a descriptor
    #[inline]
    #[must_use]
    pub fn descriptor(&self, kind: &ObjectKind) -> Option<&KindDescriptor> {
        self.kinds.get(kind)
    }

    /// Check if a kind is cataloged
    #[inline]
    #[must_use]
    pub fn contains(&self, kind: &ObjectKind) -> bool {
        self.kinds.contains_key(kind)
    }

    /// Number of cataloged kinds
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Check if catalog is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Iterate descriptors in registration order
    pub fn iter(&self) -> impl Iterator<Item = &KindDescriptor> {
        self.kinds.values()
    }

    /// Validate catalog consistency
    ///
    /// Every declared child kind must itself be registered. Run once at
    /// session start; a failure here is a catalog defect, not a data defect.
    ///
    /// # Errors
    /// Returns [`ModelError::UnknownChildKind`] naming the offending pair.
    pub fn validate(&self) -> Result<(), ModelError> {
        for descriptor in self.kinds.values() {
            for child in &descriptor.child_kinds {
                if !self.kinds.contains_key(child) {
                    return Err(ModelError::UnknownChildKind {
                        parent: descriptor.kind.clone(),
                        child: child.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_registry() -> KindRegistry {
        let mut registry = KindRegistry::new();
        registry
            .register(
                KindDescriptor::new("community")
                    .with_mapping()
                    .with_children(["role", "workflow"]),
            )
            .unwrap();
        registry
            .register(KindDescriptor::new("role").with_mapping())
            .unwrap();
        registry
            .register(
                KindDescriptor::new("workflow")
                    .with_mapping()
                    .with_children(["workflow_state"]),
            )
            .unwrap();
        registry
            .register(
                KindDescriptor::new("workflow_state")
                    .with_mapping()
                    .scoped_under_parent(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn register_and_lookup() {
        let registry = sample_registry();
        assert_eq!(registry.len(), 4);
        assert!(registry.contains(&ObjectKind::new("role")));

        let desc = registry.descriptor(&ObjectKind::new("workflow_state")).unwrap();
        assert!(desc.parent_scoped);
        assert!(desc.supports_mapping);
    }

    #[test]
    fn duplicate_kind_rejected() {
        let mut registry = sample_registry();
        let err = registry.register(KindDescriptor::new("role")).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateKind(_)));
    }

    #[test]
    fn validate_accepts_consistent_catalog() {
        assert!(sample_registry().validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_child_kind() {
        let mut registry = KindRegistry::new();
        registry
            .register(KindDescriptor::new("community").with_children(["filter"]))
            .unwrap();

        let err = registry.validate().unwrap_err();
        assert!(matches!(err, ModelError::UnknownChildKind { .. }));
    }
}
