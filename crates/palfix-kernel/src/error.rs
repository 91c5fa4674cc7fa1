//! Error types for session operations.

use palfix_tree::{CodecError, FootprintError, TreeError};

/// Hard failures. Per-entity problems (orphans, dangling handles, missing
/// companion files, id collisions) are events, not errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The document does not have an expected field or collection.
    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Footprint(#[from] FootprintError),

    #[error("no backup document is open; run `open-backup <path>` first")]
    NoSourceDocument,

    #[error("invalid identifier `{0}`: expected a UUID")]
    InvalidIdentifier(String),

    #[error("unknown command `{0}`; try `help`")]
    UnknownCommand(String),

    #[error("usage: {0}")]
    Usage(&'static str),

    #[error("unterminated quote in `{0}`")]
    UnterminatedQuote(String),

    #[error("no node at path `{0}`")]
    PathNotFound(String),
}
