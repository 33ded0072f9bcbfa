//! Caravan data model
//!
//! Shared vocabulary for the migration engine:
//!
//! - [`Dependency`] / [`DependencyKey`]: references to migratable objects
//!   and their stable identity tuples
//! - [`Payload`] / [`PayloadType`]: typed per-object archive blobs
//! - [`KindRegistry`] / [`KindDescriptor`]: the static catalog of object
//!   kinds a session understands
//!
//! The model is purely descriptive; resolution, packaging, and install
//! sequencing live in `caravan-engine` and `caravan-archive`.

#![warn(unreachable_pub)]

mod dependency;
mod error;
mod payload;
mod registry;

pub use dependency::{Dependency, DependencyKey, DependencyType, ObjectKind, ParentKey};
pub use error::ModelError;
pub use payload::{Payload, PayloadType};
pub use registry::{KindDescriptor, KindRegistry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
