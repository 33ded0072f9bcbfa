//! Model-level errors

use crate::dependency::ObjectKind;

/// Errors from the data model and kind catalog
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Kind registered twice in one catalog
    #[error("kind registered twice: {0}")]
    DuplicateKind(ObjectKind),

    /// Descriptor declares a child kind that is not itself cataloged
    #[error("kind {parent} declares unknown child kind {child}")]
    UnknownChildKind { parent: ObjectKind, child: ObjectKind },
}
