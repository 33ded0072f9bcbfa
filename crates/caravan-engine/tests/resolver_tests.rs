//! Graph resolution properties: cycle termination, deduplication,
//! vanished children, and packaging rules

use caravan_engine::{
    ChildLink, EngineError, GraphResolver, HandlerRegistry, MappingStore, MigrationSession,
    SessionConfig,
};
use caravan_model::{DependencyKey, DependencyType, KindDescriptor, KindRegistry};
use caravan_testkit::{root_ref, MemoryStore, ScriptedHandler};
use indexmap::IndexSet;
use proptest::prelude::*;
use std::sync::Arc;

fn node_registry() -> Arc<KindRegistry> {
    let mut registry = KindRegistry::new();
    registry
        .register(
            KindDescriptor::new("node")
                .with_mapping()
                .with_children(["node"]),
        )
        .unwrap();
    Arc::new(registry)
}

/// Two filters referencing each other as parent/child: resolution
/// terminates and expands each distinct key exactly once.
#[test]
fn cyclic_references_terminate() {
    let registry = node_registry();
    let source = MemoryStore::new();
    source.insert("node", "a", "A", b"<a/>".to_vec());
    source.insert("node", "b", "B", b"<b/>".to_vec());

    let handler = ScriptedHandler::new("node", source);
    handler.link_child(
        "a",
        ChildLink::hard(DependencyKey::new("node", "b"), DependencyType::Local),
    );
    handler.link_child(
        "b",
        ChildLink::hard(DependencyKey::new("node", "a"), DependencyType::Local),
    );
    let mut handlers = HandlerRegistry::new();
    handlers.register(Arc::new(handler));

    let mut mappings = MappingStore::new(registry);
    let tree = GraphResolver::new(&handlers)
        .resolve(root_ref("node", "a"), &mut mappings)
        .unwrap();

    let nodes = tree.walk();
    let distinct: IndexSet<_> = nodes.iter().map(|d| d.key.clone()).collect();
    assert_eq!(distinct.len(), 2);
    // Exactly one occurrence per key carries children (the expanded one).
    let expanded = nodes.iter().filter(|d| !d.children.is_empty()).count();
    assert_eq!(expanded, 2);
    assert_eq!(mappings.len(), 2);
}

/// A child deleted between discovery and resolution is dropped with a
/// warning, not a failure.
#[test]
fn vanished_child_dropped() {
    let registry = node_registry();
    let source = MemoryStore::new();
    source.insert("node", "a", "A", b"<a/>".to_vec());

    let handler = ScriptedHandler::new("node", source);
    handler.link_child(
        "a",
        ChildLink::hard(DependencyKey::new("node", "gone"), DependencyType::Local),
    );
    let mut handlers = HandlerRegistry::new();
    handlers.register(Arc::new(handler));

    let mut mappings = MappingStore::new(registry);
    let tree = GraphResolver::new(&handlers)
        .resolve(root_ref("node", "a"), &mut mappings)
        .unwrap();

    assert_eq!(tree.walk().len(), 1);
    assert!(tree.children.is_empty());
}

/// A vanished root is an error, not a warning.
#[test]
fn missing_root_is_error() {
    let registry = node_registry();
    let mut handlers = HandlerRegistry::new();
    handlers.register(Arc::new(ScriptedHandler::new("node", MemoryStore::new())));

    let mut mappings = MappingStore::new(registry);
    let err = GraphResolver::new(&handlers)
        .resolve(root_ref("node", "a"), &mut mappings)
        .unwrap_err();
    assert!(matches!(err, EngineError::ObjectNotFound { .. }));
}

/// The depth guard converts runaway descriptor misconfiguration into a
/// clean error.
#[test]
fn depth_guard_trips_on_deep_chains() {
    let registry = node_registry();
    let source = MemoryStore::new();
    for i in 0..10u32 {
        source.insert("node", i.to_string(), format!("N{i}"), b"<n/>".to_vec());
    }
    let handler = ScriptedHandler::new("node", source);
    for i in 0..9u32 {
        handler.link_child(
            i.to_string(),
            ChildLink::hard(
                DependencyKey::new("node", (i + 1).to_string()),
                DependencyType::Local,
            ),
        );
    }
    let mut handlers = HandlerRegistry::new();
    handlers.register(Arc::new(handler));

    let mut mappings = MappingStore::new(registry);
    let err = GraphResolver::new(&handlers)
        .with_max_depth(3)
        .resolve(root_ref("node", "0"), &mut mappings)
        .unwrap_err();
    assert!(matches!(err, EngineError::DepthExceeded { .. }));
}

/// System-classified children are referenced in the tree but never get
/// payloads in the archive.
#[test]
fn system_objects_referenced_never_packaged() {
    let mut registry = KindRegistry::new();
    registry
        .register(
            KindDescriptor::new("community")
                .with_mapping()
                .with_children(["role"]),
        )
        .unwrap();
    registry
        .register(KindDescriptor::new("role").with_mapping())
        .unwrap();
    let registry = Arc::new(registry);

    let source = MemoryStore::new();
    source.insert("community", "10", "Editors", b"<community/>".to_vec());
    source.insert("role", "admin", "Administrator", b"<role/>".to_vec());
    let community = ScriptedHandler::new("community", source.clone());
    community.link_child(
        "10",
        ChildLink::hard(DependencyKey::new("role", "admin"), DependencyType::System),
    );
    let mut handlers = HandlerRegistry::new();
    handlers.register(Arc::new(community));
    handlers.register(Arc::new(ScriptedHandler::new("role", source)));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("system.caravan");
    let mut session =
        MigrationSession::new(&handlers, registry, SessionConfig::default()).unwrap();
    let tree = session.export(root_ref("community", "10"), &path).unwrap();

    // Referenced in the tree...
    assert_eq!(tree.walk().len(), 2);
    // ...but absent from the payload entries.
    let archive = caravan_archive::ArchiveReader::open(&path).unwrap();
    assert!(archive.contains(&DependencyKey::new("community", "10")));
    assert!(!archive.contains(&DependencyKey::new("role", "admin")));
}

proptest! {
    /// Resolution terminates and deduplicates on arbitrary child graphs,
    /// cycles included.
    #[test]
    fn resolution_terminates_on_arbitrary_graphs(
        edges in proptest::collection::vec((0u8..8, 0u8..8), 0..32)
    ) {
        let registry = node_registry();
        let source = MemoryStore::new();
        for i in 0..8u8 {
            source.insert("node", i.to_string(), format!("N{i}"), b"<n/>".to_vec());
        }
        let handler = ScriptedHandler::new("node", source);
        for (from, to) in &edges {
            handler.link_child(
                from.to_string(),
                ChildLink::hard(
                    DependencyKey::new("node", to.to_string()),
                    DependencyType::Local,
                ),
            );
        }
        let mut handlers = HandlerRegistry::new();
        handlers.register(Arc::new(handler));

        let mut mappings = MappingStore::new(registry);
        let tree = GraphResolver::new(&handlers)
            .resolve(root_ref("node", "0"), &mut mappings)
            .unwrap();

        let keys: IndexSet<_> = tree.walk().iter().map(|d| d.key.clone()).collect();
        prop_assert!(keys.len() <= 8);
        // Each distinct key expanded at most once.
        let expanded: Vec<_> = tree
            .walk()
            .into_iter()
            .filter(|d| !d.children.is_empty())
            .map(|d| d.key.clone())
            .collect();
        let expanded_set: IndexSet<_> = expanded.iter().cloned().collect();
        prop_assert_eq!(expanded.len(), expanded_set.len());
    }
}
