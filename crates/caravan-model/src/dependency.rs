//! Dependency references and keys
//!
//! A [`Dependency`] is a reference to one migratable object plus its
//! classification metadata. Its [`DependencyKey`] is the stable identity
//! tuple for one resolution/install pass: duplicates collapse on it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind tag for a migratable object type
///
/// Kinds are an open set (roles, communities, workflows, filters, ...);
/// the catalog of kinds valid for a session lives in
/// [`KindRegistry`](crate::KindRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectKind(String);

impl ObjectKind {
    /// Create a kind tag
    #[inline]
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Kind tag as string slice
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectKind {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Packaging classification of a dependency edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyType {
    /// Packaged and owned by this export
    Local,
    /// Packaged but may be shared by multiple exports
    Shared,
    /// Assumed present on every installation, never packaged
    System,
    /// Environment-specific, never packaged; missing on the target is
    /// warned about or fails the import per session policy
    Server,
}

impl DependencyType {
    /// Whether objects of this classification ship in the archive
    #[inline]
    #[must_use]
    pub fn is_packaged(self) -> bool {
        matches!(self, Self::Local | Self::Shared)
    }
}

/// Identity of the enclosing parent, for parent-scoped kinds
///
/// A workflow state only means something inside its workflow; such kinds
/// carry the parent's kind and id as part of their own identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParentKey {
    pub kind: ObjectKind,
    pub id: String,
}

impl ParentKey {
    #[inline]
    pub fn new(kind: impl Into<ObjectKind>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// Stable identity tuple of one migratable object
///
/// Equality and hashing over `(kind, id, parent)` is what deduplicates
/// nodes during resolution and keys archive entries and id mappings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyKey {
    pub kind: ObjectKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentKey>,
}

impl DependencyKey {
    /// Key for a top-level object
    #[inline]
    pub fn new(kind: impl Into<ObjectKind>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            parent: None,
        }
    }

    /// Key for a parent-scoped object
    #[inline]
    pub fn scoped(
        kind: impl Into<ObjectKind>,
        id: impl Into<String>,
        parent: ParentKey,
    ) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            parent: Some(parent),
        }
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent {
            Some(p) => write!(f, "{}:{} (in {}:{})", self.kind, self.id, p.kind, p.id),
            None => write!(f, "{}:{}", self.kind, self.id),
        }
    }
}

/// A reference to one object to be migrated
///
/// # Invariants
/// - `children` is cycle-free by construction: the resolver never expands
///   an already-visited key, so a child occurring twice in the graph
///   appears as a leaf reference on the second occurrence.
/// - Association children are recorded but carry no payloads and are not
///   expanded further.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub key: DependencyKey,
    pub dependency_type: DependencyType,
    /// Soft reference: the target must already have this object; it is
    /// not bundled even if it otherwise would be
    pub is_association: bool,
    /// Human label for diagnostics and the transaction log
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Dependency>,
}

impl Dependency {
    /// Create a dependency with no children
    pub fn new(
        key: DependencyKey,
        dependency_type: DependencyType,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            key,
            dependency_type,
            is_association: false,
            display_name: display_name.into(),
            children: Vec::new(),
        }
    }

    /// Mark this reference as a soft (association) edge
    #[inline]
    #[must_use]
    pub fn association(mut self) -> Self {
        self.is_association = true;
        self
    }

    /// Append a child reference, preserving order
    #[inline]
    pub fn push_child(&mut self, child: Dependency) {
        self.children.push(child);
    }

    /// Whether this node ships payloads in the archive
    ///
    /// System/Server objects and association edges are referenced in the
    /// tree but never packaged.
    #[inline]
    #[must_use]
    pub fn is_packaged(&self) -> bool {
        self.dependency_type.is_packaged() && !self.is_association
    }

    /// Depth-first iteration over this node and all descendants
    pub fn walk(&self) -> Vec<&Dependency> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            for child in node.children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_equality_collapses_duplicates() {
        let a = DependencyKey::new("role", "77");
        let b = DependencyKey::new("role", "77");
        assert_eq!(a, b);

        let scoped = DependencyKey::scoped("state", "3", ParentKey::new("workflow", "9"));
        assert_ne!(a, scoped);
    }

    #[test]
    fn key_display_includes_parent_scope() {
        let key = DependencyKey::scoped("state", "3", ParentKey::new("workflow", "9"));
        assert_eq!(key.to_string(), "state:3 (in workflow:9)");
    }

    #[test]
    fn system_and_server_never_packaged() {
        for ty in [DependencyType::System, DependencyType::Server] {
            let dep = Dependency::new(DependencyKey::new("role", "1"), ty, "r");
            assert!(!dep.is_packaged());
        }
        let dep = Dependency::new(
            DependencyKey::new("role", "1"),
            DependencyType::Local,
            "r",
        );
        assert!(dep.is_packaged());
    }

    #[test]
    fn association_edge_not_packaged() {
        let dep = Dependency::new(
            DependencyKey::new("community", "10"),
            DependencyType::Shared,
            "Editors",
        )
        .association();
        assert!(!dep.is_packaged());
    }

    #[test]
    fn walk_visits_children_in_order() {
        let mut root = Dependency::new(
            DependencyKey::new("community", "10"),
            DependencyType::Local,
            "Editors",
        );
        root.push_child(Dependency::new(
            DependencyKey::new("role", "77"),
            DependencyType::Local,
            "Contributor",
        ));
        root.push_child(Dependency::new(
            DependencyKey::new("role", "78"),
            DependencyType::Local,
            "Reviewer",
        ));

        let order: Vec<_> = root.walk().iter().map(|d| d.key.id.clone()).collect();
        assert_eq!(order, ["10", "77", "78"]);
    }

    #[test]
    fn dependency_serde_round_trip() {
        let mut root = Dependency::new(
            DependencyKey::new("community", "10"),
            DependencyType::Local,
            "Editors",
        );
        root.push_child(
            Dependency::new(
                DependencyKey::new("format", "5"),
                DependencyType::Shared,
                "Front page",
            )
            .association(),
        );

        let json = serde_json::to_string(&root).unwrap();
        let back: Dependency = serde_json::from_str(&json).unwrap();
        assert_eq!(back, root);
    }
}
