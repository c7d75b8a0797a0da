//! Errors raised while building the job registry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("job {name:?} refers to unknown kind {kind:?}")]
    UnknownKind { name: String, kind: String },

    #[error("job {0:?} is defined more than once")]
    Duplicate(String),
}
