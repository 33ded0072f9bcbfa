//! Re-import idempotence and mapping reuse

use caravan_engine::{
    ChildLink, HandlerRegistry, MappingStore, MigrationSession, SessionConfig, TxAction,
};
use caravan_model::{DependencyKey, DependencyType, KindDescriptor, KindRegistry, ObjectKind};
use caravan_testkit::{root_ref, MemoryStore, ScriptedHandler};
use std::path::Path;
use std::sync::Arc;

fn registry() -> Arc<KindRegistry> {
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
    Arc::new(registry)
}

fn write_archive(path: &Path, registry: Arc<KindRegistry>) {
    let source = MemoryStore::new();
    source.insert("community", "10", "Editors", b"<community/>".to_vec());
    source.insert("role", "77", "Contributor", b"<role/>".to_vec());

    let community = ScriptedHandler::new("community", source.clone()).deferred();
    community.link_child(
        "10",
        ChildLink::hard(DependencyKey::new("role", "77"), DependencyType::Local),
    );
    let mut handlers = HandlerRegistry::new();
    handlers.register(Arc::new(community));
    handlers.register(Arc::new(ScriptedHandler::new("role", source)));

    let mut export = MigrationSession::new(&handlers, registry, SessionConfig::default()).unwrap();
    export.export(root_ref("community", "10"), path).unwrap();
}

fn target_handlers(target: &MemoryStore) -> HandlerRegistry {
    let mut handlers = HandlerRegistry::new();
    handlers.register(Arc::new(
        ScriptedHandler::new("community", target.clone())
            .deferred()
            .with_sequential_ids(100),
    ));
    handlers.register(Arc::new(
        ScriptedHandler::new("role", target.clone()).with_sequential_ids(500),
    ));
    handlers
}

/// Importing the same archive twice against the same mapping store
/// updates instead of duplicating: the second log is all Modified.
#[test]
fn second_import_modifies_never_duplicates() {
    let registry = registry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("editors.caravan");
    write_archive(&path, registry.clone());

    let target = MemoryStore::new();
    let handlers = target_handlers(&target);
    let mut session = MigrationSession::new(&handlers, registry, SessionConfig::default()).unwrap();

    let first = session.import(&path).unwrap();
    assert_eq!(first.created, 2);
    assert_eq!(target.len(), 2);

    let second = session.import(&path).unwrap();
    assert_eq!(second.created, 0);
    assert_eq!(second.modified, 2);
    // No duplicate objects on the target.
    assert_eq!(target.len(), 2);

    // One Created entry per object across both runs, in session order.
    let entries = session.log().entries();
    assert_eq!(entries.len(), 4);
    let created = entries.iter().filter(|e| e.action == TxAction::Created).count();
    assert_eq!(created, 2);
    assert!(entries[2..].iter().all(|e| e.action == TxAction::Modified));
}

/// A mapping persisted from a dry run drives a later real import: the
/// same target ids are used and the allocator never runs again.
#[test]
fn persisted_mapping_reused_across_sessions() {
    let registry = registry();
    let dir = tempfile::tempdir().unwrap();
    let archive_path = dir.path().join("editors.caravan");
    let mapping_path = dir.path().join("mappings.json");
    write_archive(&archive_path, registry.clone());

    let target = MemoryStore::new();

    // Dry-run session: allocate and persist.
    let handlers = target_handlers(&target);
    let mut dry_run =
        MigrationSession::new(&handlers, registry.clone(), SessionConfig::default()).unwrap();
    dry_run.import(&archive_path).unwrap();
    let role_id = dry_run
        .mappings()
        .target_id(&DependencyKey::new("role", "77"))
        .unwrap()
        .to_string();
    dry_run.save_mappings(&mapping_path).unwrap();

    // Real session with fresh handlers (fresh allocators) but the saved
    // mapping table.
    let handlers = target_handlers(&target);
    let mappings = MappingStore::load(&mapping_path, registry).unwrap();
    let mut real =
        MigrationSession::with_mappings(&handlers, mappings, SessionConfig::default()).unwrap();
    let report = real.import(&archive_path).unwrap();

    assert_eq!(report.created, 0);
    assert_eq!(report.modified, 2);
    assert_eq!(
        real.mappings()
            .target_id(&DependencyKey::new("role", "77"))
            .unwrap(),
        role_id
    );
    let role_kind = ObjectKind::new("role");
    assert!(target.contains(&role_kind, &role_id));
}

/// Reservation is idempotent across repeated coordinator sweeps within
/// one session.
#[test]
fn repeated_imports_keep_reserved_ids_stable() {
    let registry = registry();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("editors.caravan");
    write_archive(&path, registry.clone());

    let target = MemoryStore::new();
    let handlers = target_handlers(&target);
    let mut session = MigrationSession::new(&handlers, registry, SessionConfig::default()).unwrap();

    session.import(&path).unwrap();
    let first_id = session
        .mappings()
        .target_id(&DependencyKey::new("community", "10"))
        .unwrap()
        .to_string();
    session.import(&path).unwrap();
    let second_id = session
        .mappings()
        .target_id(&DependencyKey::new("community", "10"))
        .unwrap()
        .to_string();

    assert_eq!(first_id, second_id);
}
