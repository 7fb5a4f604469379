// Copyright (c) 2013-2015 Sandstorm Development Group, Inc. and contributors
// Licensed under the MIT License:
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN
// THE SOFTWARE.

//! A collection of segments sharing an id-space (`spec.md` §3/§4.2): the
//! `Session` is the arena; [`crate::Ptr`] values are handles into it.

use std::collections::BTreeMap;

use crate::error::{Error, ErrorKind, Result};
use crate::private::{alloc, wire};
use crate::ptr::{Kind, Ptr};
use crate::segment::Segment;

/// Reserved id passed as `requesting_id` to [`SegmentFactory::create`] when
/// the caller just wants scratch space and does not care what id the
/// resulting segment gets (used by the deep-copy path, `spec.md` §4.5).
/// Mirrors `CAPN_SEGID_LOCAL` from the C original.
pub const LOCAL: u32 = 0xFFFF_FFFF;

/// The factory callback pair from `spec.md` §4.2/§6. Either method may be
/// left at its default (`None`), which is the Rust rendition of "either
/// callback may be null": a session with the default `NullFactory` (or any
/// factory that never returns segments) supports neither multi-segment
/// writes nor inter-session copy.
pub trait SegmentFactory {
    /// Looks up a segment this factory knows about but that the session
    /// hasn't attached yet (e.g. a lazily-loaded backing store). Most
    /// factories -- including all three built into this crate -- never
    /// need this, because they attach every segment they know about up
    /// front.
    fn lookup(&mut self, _id: u32) -> Option<Segment<'static>> {
        None
    }

    /// Creates or locates a segment with at least `min_bytes` available.
    /// `requesting_id` is the id of the segment that ran out of room
    /// (or [`LOCAL`] for copy-arena scratch space); it is informational
    /// only. The returned segment is assigned its own id by the factory
    /// and attached to the session under that id, which need not have
    /// any relationship to `requesting_id`.
    fn create(&mut self, _requesting_id: u32, _min_bytes: u32) -> Option<Segment<'static>> {
        None
    }
}

/// A [`SegmentFactory`] that supports neither growth nor copy: the
/// "both callbacks null" case from `spec.md` §4.2.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullFactory;

impl SegmentFactory for NullFactory {}

/// A collection of segments sharing an id-space, plus the factory used to
/// grow it and resolve far pointers. `'a` bounds the lifetime of any
/// borrowed (read-only, memory/file-backed) segments the session holds;
/// owned segments created by a factory are not constrained by it.
pub struct Session<'a, F: SegmentFactory = NullFactory> {
    segments: Vec<Segment<'a>>,
    index: BTreeMap<u32, usize>,
    factory: F,
    next_factory_id: u32,
}

impl<'a> Session<'a, NullFactory> {
    /// A session with a single segment and no factory: no growth, no
    /// cross-session copy. Useful for reading an already-complete,
    /// single-segment message.
    pub fn single(segment: Segment<'a>) -> Result<Self> {
        let mut session = Session::new(NullFactory);
        session.append_segment(segment)?;
        Ok(session)
    }
}

impl<'a, F: SegmentFactory> Session<'a, F> {
    pub fn new(factory: F) -> Self {
        Session {
            segments: Vec::new(),
            index: BTreeMap::new(),
            factory,
            next_factory_id: 0,
        }
    }

    /// Attaches a segment to the session's id index. This is the "(b) the
    /// caller will attach it immediately" half of the factory contract in
    /// `spec.md` §4.2; it runs in `O(log n)`.
    pub fn append_segment(&mut self, segment: Segment<'a>) -> Result<u32> {
        let id = segment.id();
        if self.index.contains_key(&id) {
            return Err(Error::new(
                ErrorKind::DuplicateSegmentId(id),
                format!("segment id {id} is already attached to this session"),
            ));
        }
        let idx = self.segments.len();
        self.segments.push(segment);
        self.index.insert(id, idx);
        Ok(id)
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub(crate) fn segment(&self, id: u32) -> Option<&Segment<'a>> {
        self.index.get(&id).map(|&idx| &self.segments[idx])
    }

    pub(crate) fn segment_mut(&mut self, id: u32) -> Option<&mut Segment<'a>> {
        self.index.get(&id).map(|&idx| &mut self.segments[idx])
    }

    /// Resolves a segment id, consulting the factory's `lookup` as a
    /// fallback when the session doesn't already have it attached
    /// (`spec.md` §4.2/§4.3: "look up the target segment via the
    /// session"). Returns `Err(UnknownSegment)` if neither the index nor
    /// the factory has it; callers on the decode path treat that as
    /// structural corruption and produce a null [`Ptr`] instead of
    /// propagating the error.
    pub(crate) fn resolve_segment(&mut self, id: u32) -> Result<()> {
        if self.index.contains_key(&id) {
            return Ok(());
        }
        if let Some(seg) = self.factory.lookup(id) {
            self.append_segment(seg)?;
            return Ok(());
        }
        Err(Error::unknown_segment(id))
    }

    /// Creates a new segment with room for at least `min_bytes`, attaches
    /// it under whatever id the factory assigns, and returns that id.
    ///
    /// When this mints segment 0 for the first time, it reserves that
    /// segment's first word for the session root pointer (`spec.md` §4.6)
    /// before the caller's own allocation, the same way the teacher's
    /// `get_root_internal` allocates the root word before anything else
    /// -- so the root slot and a struct/list placed at offset 0 can never
    /// collide.
    pub(crate) fn create_segment(&mut self, requesting_id: u32, min_bytes: u32) -> Result<u32> {
        let reserve_root = requesting_id == 0 && self.segment(0).is_none();
        let request_bytes = if reserve_root { min_bytes.saturating_add(8) } else { min_bytes };
        let seg = self
            .factory
            .create(requesting_id, request_bytes)
            .ok_or_else(|| Error::new(ErrorKind::AllocationFailed, "factory.create returned None"))?;
        let id = self.append_segment(seg)?;
        if reserve_root && id == 0 {
            self.segment_mut(0).unwrap().advance_len(8);
        }
        Ok(id)
    }

    /// A spare id a factory can use when minting a brand-new segment, e.g.
    /// in response to a [`LOCAL`] request. Tracks independently of ids the
    /// session didn't mint itself (attached borrowed segments, or ids an
    /// external factory chose), so it never collides with them.
    pub fn next_unused_id(&mut self) -> u32 {
        while self.index.contains_key(&self.next_factory_id) || self.next_factory_id == LOCAL {
            self.next_factory_id = self.next_factory_id.wrapping_add(1);
        }
        let id = self.next_factory_id;
        self.next_factory_id = self.next_factory_id.wrapping_add(1);
        id
    }

    pub(crate) fn bytes(&self, id: u32) -> Option<&[u8]> {
        self.segment(id).map(Segment::as_bytes)
    }

    /// Raw bytes of segment `id`, for introspection/testing against the
    /// wire format directly.
    pub fn segment_bytes(&self, id: u32) -> Option<&[u8]> {
        self.bytes(id)
    }

    pub(crate) fn bytes_mut(&mut self, id: u32) -> Option<&mut [u8]> {
        self.segment_mut(id).and_then(Segment::as_bytes_mut)
    }

    /// Allocates `words` words of zeroed space, preferring `requesting_seg`
    /// if it has room, else asking the factory for a new segment
    /// (`spec.md` §4.2 placement policy, steps 1-2).
    pub(crate) fn allocate(&mut self, requesting_seg: u32, words: u32) -> Result<(u32, u32)> {
        alloc::allocate(self, requesting_seg, words)
    }

    /// Writes `target` into the pointer slot at `(slot_seg, slot_off)`,
    /// choosing near/far/double-far encoding per `spec.md` §4.2/§4.3.
    /// Does not perform cross-session copy -- `target` must already live
    /// in this session; see `crate::copy` for that.
    pub(crate) fn encode_pointer(&mut self, slot_seg: u32, slot_off: u32, target: Ptr) -> Result<()> {
        alloc::encode_pointer(self, slot_seg, slot_off, target)
    }

    /// Decodes the pointer at `(seg, off)`. Never fails: structural
    /// corruption collapses to a null [`Ptr`] per `spec.md` §4.8.
    pub(crate) fn resolve_pointer(&mut self, seg: u32, off: u32) -> Ptr {
        alloc::resolve_pointer(self, seg, off)
    }

    /// Reads the session root: the first pointer (offset 0) in segment 0
    /// (`spec.md` §4.6). Returns a null pointer if segment 0 doesn't
    /// exist yet.
    pub fn root(&mut self) -> Ptr {
        if self.segment(0).is_none() {
            return Ptr::null();
        }
        self.resolve_pointer(0, 0)
    }

    /// Ensures segment 0 exists (creating it via the factory if
    /// necessary) and has its root pointer slot reserved, then writes
    /// `target` into it.
    pub fn set_root(&mut self, target: Ptr) -> Result<()> {
        if self.segment(0).is_none() {
            // `create_segment` reserves segment 0's first word for the root
            // as soon as it mints the segment, so no separate reservation
            // is needed here even if other segments already exist.
            let seg = self.create_segment(0, 8)?;
            // `SegmentFactory::create`'s id "need not have any relationship
            // to `requesting_id`" -- a factory that doesn't honor the id 0
            // request here can't host this session's root, so this has to
            // be a real error rather than an assumption checked only in
            // debug builds.
            if seg != 0 {
                return Err(Error::new(
                    ErrorKind::AllocationFailed,
                    format!("factory created segment {seg} instead of segment 0 for the session root"),
                ));
            }
        } else if self.segment(0).unwrap().len() == 0 {
            // Segment 0 was attached by hand (not through `create_segment`)
            // and its root slot hasn't been reserved yet.
            self.segment_mut(0).unwrap().advance_len(8);
        }
        self.encode_pointer(0, 0, target)
    }

    /// Allocates a brand-new zero-sized struct at the root and returns
    /// it, as a convenience for building a message from scratch. Most
    /// callers will instead build a struct with [`crate::list::new_struct`]
    /// and pass it to [`Session::set_root`].
    pub fn new_root_struct(&mut self, datasz: u32, ptrs: u16) -> Result<Ptr> {
        let p = crate::list::new_struct(self, 0, datasz, ptrs)?;
        self.set_root(p)?;
        Ok(p)
    }

    /// Returns the byte contents of every attached segment, in ascending
    /// id order, suitable for [`crate::serialize::write_message`].
    ///
    /// # Panics
    /// Panics if segment ids are not exactly `0..segment_count()` (the
    /// shape produced by [`crate::factory::HeapFactory`] and by reading a
    /// message with [`crate::serialize::read_message`]). Sessions built by
    /// hand with arbitrary ids should serialize segments themselves.
    pub fn segments_for_output(&self) -> Vec<&[u8]> {
        (0..self.segments.len() as u32)
            .map(|id| self.bytes(id).expect("segment ids must be contiguous from 0 to serialize"))
            .collect()
    }
}

pub(crate) fn classify_list_kind(size: wire::ElementSize) -> Kind {
    match size {
        wire::ElementSize::Pointer => Kind::PtrList,
        _ => Kind::List,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::HeapFactory;

    #[test]
    fn empty_session_root_is_null() {
        let mut s = Session::new(NullFactory);
        assert!(s.root().is_null());
    }

    #[test]
    fn duplicate_segment_id_rejected() {
        let mut s = Session::new(NullFactory);
        s.append_segment(Segment::new_owned(0, 1)).unwrap();
        let err = s.append_segment(Segment::new_owned(0, 1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::DuplicateSegmentId(0));
    }

    #[test]
    fn set_root_creates_segment_zero() {
        let mut s: Session<HeapFactory> = Session::new(HeapFactory::new());
        let p = crate::list::new_struct(&mut s, 0, 8, 0).unwrap();
        crate::list::set_u64(&mut s, p, 0, 0xCAFEBABE).unwrap();
        s.set_root(p).unwrap();
        let root = s.root();
        assert_eq!(crate::list::get_u64(&s, root, 0), 0xCAFEBABE);
    }
}
