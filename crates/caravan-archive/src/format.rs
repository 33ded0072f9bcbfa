//! On-disk archive document
//!
//! A single JSON document holding the serialized dependency tree plus the
//! ordered payload entries. The document must stay readable by newer
//! installers: unknown payload types deserialize as
//! [`PayloadType::Unknown`](caravan_model::PayloadType::Unknown) and are
//! skipped, while an unknown `format_version` is fatal.

use caravan_model::{Dependency, DependencyKey, Payload};
use serde::{Deserialize, Serialize};

/// Current archive format version
pub const FORMAT_VERSION: u32 = 1;

/// Payloads for one dependency key, in write order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub key: DependencyKey,
    pub payloads: Vec<Payload>,
}

/// The complete archive document
///
/// Write-once during export; read-only during import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveDocument {
    pub format_version: u32,
    /// Root dependency graph, re-walked at install time
    pub root: Dependency,
    /// Keyed payload entries, in export order
    pub entries: Vec<ArchiveEntry>,
}
