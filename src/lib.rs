//! An untyped, arena-based runtime for a Cap'n-Proto-style message
//! encoding: segments of 8-byte words, 64-bit tagged pointers, lists and
//! structs addressed by explicit byte offset, and a packed wire transport
//! bit-compatible with the reference implementation.
//!
//! This crate deliberately stops below the schema-compiler layer: there
//! is no `.capnp` parser, no generated typed accessors, no RPC. What's
//! here is the pointer/segment substrate those layers would be built on
//! -- allocate a struct, read and write its fields, link it into lists
//! and other structs, copy it across sessions, and serialize the result.
//!
//! # Failure tiers
//!
//! Two tiers of failure run through the whole API, mirroring how real
//! schema evolution needs to behave:
//!
//! - **Reads never fail.** Indexing past a struct's `datasz`/`ptrsz`,
//!   past a list's length, or through pointer corruption produces a
//!   zero value, an empty list, or a null [`Ptr`] -- never a panic,
//!   never an `Err`. A message built against a newer schema stays
//!   readable by older code.
//! - **Writes can fail.** Writing past a struct or list's capacity, or
//!   running out of segment/allocator space, returns [`error::Error`].
//!
//! See `DESIGN.md` for how this maps onto the underlying wire format.

pub mod codec;
pub mod copy;
pub mod data;
pub mod error;
pub mod factory;
pub mod list;
pub mod packed;
mod private;
pub mod ptr;
pub mod segment;
pub mod serialize;
pub mod session;
pub mod text;
mod word;

pub use error::{Error, ErrorKind, Result};
pub use ptr::{Kind, Ptr};
pub use segment::Segment;
pub use session::{Session, SegmentFactory, NullFactory};
pub use word::{Word, BYTES_PER_WORD};
