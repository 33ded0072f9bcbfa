//! Caravan archive format
//!
//! The single portable file an export produces and an import consumes.
//! The document holds the serialized dependency tree plus an ordered
//! sequence of keyed, typed payload blobs; it is independent of either
//! installation's database so it can be moved between systems freely.
//!
//! # Compatibility
//!
//! - Payload types unknown to this reader are skipped with a warning,
//!   never fatal (forward compatibility for the payload-type set).
//! - A `format_version` newer than this crate supports is fatal.

#![warn(unreachable_pub)]

mod error;
mod format;
mod reader;
mod writer;

pub use error::ArchiveError;
pub use format::{ArchiveDocument, ArchiveEntry, FORMAT_VERSION};
pub use reader::ArchiveReader;
pub use writer::ArchiveWriter;
