use thiserror::Error;

/// Errors raised by document, line-tracker, position, partitioning and
/// find/replace operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
    /// An offset, length or line number lies outside the current buffer.
    #[error("bad location: {0}")]
    BadLocation(String),

    /// The named position category has not been added to the document.
    #[error("unknown position category: {0}")]
    BadPositionCategory(String),

    /// The named partitioning is unknown and is not the default partitioning.
    #[error("unknown partitioning: {0}")]
    BadPartitioning(String),

    /// An operation was issued in a state that does not permit it.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),

    /// A search pattern or replacement template failed to parse.
    #[error("bad pattern: {0}")]
    PatternSyntax(String),
}
