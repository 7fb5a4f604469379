//! Internals not meant to be used directly by callers: the wire-pointer
//! codec and the placement/allocation policy. Kept separate from the
//! public `Ptr`/`Session` surface the same way the teacher crate keeps a
//! `private::layout` module behind its public accessor types.

pub(crate) mod alloc;
pub(crate) mod wire;
