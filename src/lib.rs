//! # GBWT: Graph BWT
//!
//! A compressed, self-indexed collection of paths in a bidirected sequence graph.
//! Each path is a sequence of oriented nodes, and the collection may contain
//! millions of similar paths (e.g. haplotypes over a variation graph).
//!
//! The index is a multi-string BWT partitioned by graph node. The record of a node
//! stores the outgoing edges of the node and a run-length encoded slice of the BWT
//! over those edges. Backward searching maps a pattern of oriented nodes to a range
//! of BWT positions, and sampled sequence identifiers turn the positions into path
//! identifiers.
//!
//! There are three index representations:
//!
//! * [`GBWT`] is the static index: compressed and immutable.
//! * [`DynamicGBWT`] supports the same queries and the insertion of new paths.
//! * [`CachedGBWT`] decorates a static index with a record cache for workloads
//!   that query the same nodes repeatedly.
//!
//! Two static indexes can be combined with [`merge::merge`], which streams insertion
//! positions through disk-backed buffers instead of materialising the union in memory.
//!
//! The implementation builds on the [Simple-SDS](https://github.com/jltsiren/simple-sds)
//! library and uses its serialization conventions: little-endian, 64-bit words.
//!
//! # References
//!
//! Jouni Sirén, Erik Garrison, Adam M. Novak, Benedict Paten, and Richard Durbin:
//! **Haplotype-aware graph indexes**.\
//! Bioinformatics 36(2):400-407, 2020.
//! DOI: [10.1093/bioinformatics/btz575](https://doi.org/10.1093/bioinformatics/btz575)

pub mod algorithms;
pub mod bwt;
pub mod dynamic;
pub mod gbwt;
pub mod headers;
pub mod merge;
pub mod metadata;
pub mod record;
pub mod support;
pub mod utils;

#[cfg(test)]
mod internal;

//-----------------------------------------------------------------------------

pub use crate::algorithms::{SequenceIndex, SearchState, BidirectionalState};
pub use crate::dynamic::DynamicGBWT;
pub use crate::gbwt::{GBWT, CachedGBWT};
pub use crate::merge::MergeParameters;
pub use crate::metadata::{Metadata, PathName};
pub use crate::support::{Orientation, Pos};

use std::io;

use thiserror::Error;

//-----------------------------------------------------------------------------

/// Node identifier `0` is the endmarker that precedes and follows every path.
/// It does not exist in the graph.
pub const ENDMARKER: usize = 0;

//-----------------------------------------------------------------------------

/// Errors from index operations.
///
/// Queries do not use these: an unsuccessful query returns an empty state or
/// [`None`]. Errors are reserved for invalid inputs, corrupt or unreadable
/// files, and failures in the merge pipeline.
#[derive(Debug, Error)]
pub enum GBWTError {
    /// The caller passed invalid data; the operation did not change anything.
    #[error("invalid input: {0}")]
    BadInput(String),

    /// The file does not start with the GBWT magic number.
    #[error("not a GBWT index: invalid magic number")]
    BadMagic,

    /// The file version or a flag bit is not supported by this implementation.
    #[error("unsupported index: {0}")]
    UnsupportedVersion(String),

    /// The input ended in the middle of a section.
    #[error("truncated input: {0}")]
    Truncated(String),

    /// A record could not be decoded.
    #[error("corrupt record {record}: {reason}")]
    CorruptRecord { record: usize, reason: String },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// A temporary file could not be written because the disk is full.
    #[error("out of space: {0}")]
    OutOfSpace(String),

    /// The operation observed the cancellation flag and stopped.
    #[error("the operation was cancelled")]
    Cancelled,

    /// An internal invariant was violated. This is always a bug.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<io::Error> for GBWTError {
    fn from(error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::UnexpectedEof => GBWTError::Truncated(error.to_string()),
            _ => {
                // ENOSPC gets its own variant, because the merge pipeline
                // reports it differently from other I/O failures.
                if error.raw_os_error() == Some(28) {
                    GBWTError::OutOfSpace(error.to_string())
                } else {
                    GBWTError::Io(error)
                }
            }
        }
    }
}

impl GBWTError {
    /// Converts the error into an [`io::Error`] for use with the Simple-SDS
    /// serialization interface.
    pub fn into_io(self) -> io::Error {
        match self {
            GBWTError::Io(error) => error,
            _ => io::Error::new(io::ErrorKind::InvalidData, self.to_string()),
        }
    }
}

//-----------------------------------------------------------------------------
