//! Engine error taxonomy
//!
//! Split along the abort-vs-continue boundary: the install coordinator
//! continues past [`EngineError::AssociationMissing`] (the one sanctioned
//! catch-and-continue path, classified by error kind, never by message
//! text); everything else propagates to the caller with enough context to
//! locate the offending object.

use caravan_archive::ArchiveError;
use caravan_model::{DependencyKey, ModelError, ObjectKind};
use std::path::PathBuf;

/// Main migration-engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// No handler registered for an object kind
    #[error("no handler registered for kind {0}")]
    UnknownKind(ObjectKind),

    /// Root object of a resolve pass does not exist on the source
    #[error("object not found: {key}")]
    ObjectNotFound { key: DependencyKey },

    /// Parent-scoped kind resolved before (or without) its parent
    ///
    /// Fatal precondition failure: the parent was not included in the
    /// export or was resolved in the wrong order.
    #[error("missing parent mapping for {key}")]
    MissingParentMapping { key: DependencyKey },

    /// A target identifier is needed and none is reserved
    #[error("no target identifier reserved for {key}")]
    MissingMapping { key: DependencyKey },

    /// Soft-referenced object absent on the target
    ///
    /// Recoverable: the referencing install proceeds with the reference
    /// omitted and a warning is logged.
    #[error("associated object missing on target: {display_name} ({key})")]
    AssociationMissing {
        key: DependencyKey,
        display_name: String,
    },

    /// Environment-specific object absent on the target
    ///
    /// Raised only when the session is configured to fail instead of warn.
    #[error("server-provided object missing on target: {display_name} ({key})")]
    ServerObjectMissing {
        key: DependencyKey,
        display_name: String,
    },

    /// Install pass 2 made no progress across a full sweep
    ///
    /// Signals a configuration or archive defect: a deferred kind's child
    /// is itself missing from the archive, or two deferred objects depend
    /// on each other.
    #[error("install deadlock; unresolved nodes: {}", format_keys(.remaining))]
    InstallDeadlock { remaining: Vec<DependencyKey> },

    /// Resolution recursed past the session depth guard
    #[error("resolution depth exceeded ({limit}) at {key}")]
    DepthExceeded { key: DependencyKey, limit: usize },

    /// Target-store write failed for one object
    ///
    /// Fatal for the session, but already-installed siblings and the
    /// transaction log are preserved.
    #[error("target write failed for {display_name} ({key}): {reason}")]
    TargetWrite {
        key: DependencyKey,
        display_name: String,
        reason: String,
    },

    /// Per-kind handler failed outside the classified cases
    #[error("handler failed for {key}: {reason}")]
    HandlerFailed { key: DependencyKey, reason: String },

    /// Archive incomplete, corrupt, or produced by an incompatible exporter
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Kind-catalog defect
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Mapping-table persistence i/o failure
    #[error("mapping table i/o failed at {path}: {source}")]
    MappingIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Mapping-table file does not parse
    #[error("malformed mapping table at {path}: {source}")]
    MappingMalformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Illegal per-node install state transition
    #[error("illegal install state transition: {from} -> {to} for {key}")]
    IllegalTransition {
        key: DependencyKey,
        from: &'static str,
        to: &'static str,
    },
}

impl EngineError {
    /// Whether the install coordinator may continue past this error
    #[inline]
    #[must_use]
    pub fn is_association_missing(&self) -> bool {
        matches!(self, Self::AssociationMissing { .. })
    }
}

fn format_keys(keys: &[DependencyKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn association_missing_classified_by_kind() {
        let err = EngineError::AssociationMissing {
            key: DependencyKey::new("community", "10"),
            display_name: "Editors".to_string(),
        };
        assert!(err.is_association_missing());

        let err = EngineError::MissingMapping {
            key: DependencyKey::new("community", "10"),
        };
        assert!(!err.is_association_missing());
    }

    #[test]
    fn deadlock_message_names_stuck_keys() {
        let err = EngineError::InstallDeadlock {
            remaining: vec![
                DependencyKey::new("filter", "1"),
                DependencyKey::new("filter", "2"),
            ],
        };
        let msg = err.to_string();
        assert!(msg.contains("filter:1"));
        assert!(msg.contains("filter:2"));
    }
}
