//! Crate-local error type.
//!
//! The pointer layer distinguishes two failure tiers (see the module-level
//! docs in `lib.rs`): out-of-bounds *reads* never produce an `Error` (they
//! silently yield zero/empty, which is what makes schema evolution free),
//! while structural corruption and write-side failures do.

use std::fmt;

/// The kind of failure that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A write targeted an offset past the end of a struct's data or
    /// pointer section.
    OutOfBounds,
    /// A list operation's element width didn't match the list's actual
    /// element size, or `off + sz` ran past the list's declared length.
    ElementSizeMismatch,
    /// An operation expected a different `Kind` of pointer than it found
    /// (e.g. `getp` on something that isn't a struct or pointer-list).
    WrongPointerKind,
    /// A factory's `create` callback returned `None`.
    AllocationFailed,
    /// A far pointer (or a segment referenced by `setp` across sessions)
    /// named a segment id the session has no record of and whose factory
    /// could not produce one.
    UnknownSegment(u32),
    /// A double-far pointer's landing pad did not start with a (single)
    /// far pointer, or a far pointer's target was not itself a near
    /// pointer.
    MalformedFarPointer,
    /// `append_segment` was called with an id already present in the
    /// session.
    DuplicateSegmentId(u32),
    /// A deep copy recursed past the session's nesting limit. Protects
    /// against cyclic or pathologically deep foreign graphs.
    DepthExceeded,
    /// The packed stream's unpacked side was not a whole number of words
    /// at the point where the codec expected word alignment.
    Misaligned,
    /// The packed stream ran out of input or output space mid-word; the
    /// caller should refill/drain the buffers and resume.
    NeedMore,
    /// Wraps an underlying I/O failure from a `Read`/`Write` collaborator.
    Io,
}

/// An error produced by this crate.
#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub description: String,
}

impl Error {
    pub fn new(kind: ErrorKind, description: impl Into<String>) -> Self {
        Error {
            kind,
            description: description.into(),
        }
    }

    pub(crate) fn out_of_bounds(what: &str) -> Self {
        Error::new(ErrorKind::OutOfBounds, format!("out of bounds: {what}"))
    }

    pub(crate) fn unknown_segment(id: u32) -> Self {
        Error::new(
            ErrorKind::UnknownSegment(id),
            format!("session has no segment with id {id}"),
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.description)
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::new(ErrorKind::Io, e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
