//! Error types for tree construction and insertion.

use std::fmt;

use thiserror::Error;

use crate::key::KeyKind;

/// Result type for fallible tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors reported by the tree.
///
/// Lookups and removals of absent keys are not errors; they return `None`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    // Construction errors
    /// A callback key kind was configured without a comparator.
    #[error("key kind {kind:?} requires a comparator")]
    MissingComparator { kind: KeyKind },

    /// A natively ordered key kind was configured with a comparator.
    #[error("key kind {kind:?} is ordered natively and takes no comparator")]
    UnexpectedComparator { kind: KeyKind },

    /// A native key kind was requested for a key type without a native encoding.
    #[error("key kind {kind:?} needs a natively ordered key type")]
    UnsupportedKey { kind: KeyKind },

    /// The key type cannot be indexed under the requested kind.
    #[error("key type {key_type} cannot be indexed as {kind:?}")]
    KeyKindMismatch {
        kind: KeyKind,
        key_type: &'static str,
    },

    /// No key extractor was supplied.
    #[error("no key extractor configured")]
    MissingKeyExtractor,

    /// The tree configuration is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Insert errors
    /// The tree rejects duplicates and the key is already present.
    #[error("duplicate key")]
    DuplicateKey,

    /// No memory could be obtained for a new node block.
    #[error("out of memory")]
    OutOfMemory,

    /// The tree holds the maximum number of nodes.
    #[error("tree is at capacity")]
    CapacityExhausted,
}

/// A refused insert, handing the record back to the caller.
pub struct Rejected<R> {
    /// Why the record was refused.
    pub reason: TreeError,
    /// The record that was passed to `insert`.
    pub record: R,
}

impl<R> Rejected<R> {
    pub(crate) fn new(reason: TreeError, record: R) -> Self {
        Self { reason, record }
    }

    /// Returns the record, discarding the reason.
    pub fn into_record(self) -> R {
        self.record
    }
}

impl<R> fmt::Debug for Rejected<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("reason", &self.reason)
            .finish_non_exhaustive()
    }
}

impl<R> fmt::Display for Rejected<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "insert rejected: {}", self.reason)
    }
}

impl<R> std::error::Error for Rejected<R> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.reason)
    }
}
