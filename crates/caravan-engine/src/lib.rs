//! Caravan migration engine
//!
//! The generic dependency-resolution, identifier-remapping, and
//! install-ordering core. Per-kind modules (ACL entries, workflow states,
//! template slots, ...) implement [`KindHandler`]; the engine sequences
//! them:
//!
//! - [`GraphResolver`]: walks handlers to build the closure of objects to
//!   ship, cycle-safe, classifying edges as hard or soft
//! - [`Exporter`] + `caravan-archive`: packages per-object payloads into a
//!   single portable file
//! - [`MappingStore`]: bidirectional source→target identifier mapping with
//!   on-demand, idempotent reservation
//! - [`InstallCoordinator`]: installs in dependency order, honoring
//!   deferred kinds, with a bounded per-node failure boundary
//! - [`TransactionLog`]: append-only audit of what an import applied
//!
//! [`MigrationSession`] ties one export or import run together.

#![warn(unreachable_pub)]

mod error;
mod export;
mod handler;
mod install;
mod mapping;
mod resolver;
mod session;
mod txlog;

pub use error::EngineError;
pub use export::Exporter;
pub use handler::{ChildLink, HandlerRegistry, InstallOutcome, KindHandler, ObjectInfo};
pub use install::{allowed_transitions, InstallCoordinator, InstallReport, NodeState};
pub use mapping::{IdMapping, MappingStore};
pub use resolver::{GraphResolver, DEFAULT_MAX_DEPTH};
pub use session::{MigrationSession, SessionConfig};
pub use txlog::{TransactionLog, TxAction, TxEntry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
