//! Archive errors

use caravan_model::{DependencyKey, PayloadType};
use std::path::PathBuf;

/// Errors from archive writing and reading
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// Filesystem failure while writing or opening the archive file
    #[error("archive i/o failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Document does not parse as an archive
    #[error("malformed archive at {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Archive written by an incompatible exporter generation
    #[error("unsupported archive format version {found} (supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// No payloads were written for a key the importer needs
    ///
    /// Always fatal: the archive is incomplete or corrupt.
    #[error("missing payload for {display_name} ({key})")]
    MissingPayload {
        key: DependencyKey,
        display_name: String,
    },

    /// First payload for a key does not carry the expected type
    ///
    /// Catches archive-format drift between exporter and installer early.
    #[error(
        "wrong payload type for {display_name} ({key}): expected {}, got {}",
        .expected.as_str(),
        .actual.as_str()
    )]
    WrongPayloadType {
        key: DependencyKey,
        display_name: String,
        expected: PayloadType,
        actual: PayloadType,
    },
}
