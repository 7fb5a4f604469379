//! The three collaborator segment sources from `spec.md` §6: a growable
//! heap arena for building messages, and read-only memory/file-backed
//! segment sets for reading them back.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use crate::segment::Segment;
use crate::session::SegmentFactory;

/// How aggressively [`HeapFactory`] grows when asked for a new segment,
/// mirroring the teacher crate's `message::AllocationStrategy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationStrategy {
    /// Every new segment is exactly as large as requested.
    FixedSize,
    /// Every new segment is at least as large as the previous one, so a
    /// message built from many small allocations converges on a handful
    /// of segments instead of one per allocation.
    GrowHeuristically,
}

/// Options controlling [`HeapFactory`]'s growth, analogous to the
/// teacher's `message::ReaderOptions`/allocator construction knobs.
#[derive(Debug, Clone, Copy)]
pub struct HeapFactoryOptions {
    pub first_segment_words: u32,
    pub allocation_strategy: AllocationStrategy,
}

impl Default for HeapFactoryOptions {
    fn default() -> Self {
        HeapFactoryOptions {
            first_segment_words: 1024,
            allocation_strategy: AllocationStrategy::GrowHeuristically,
        }
    }
}

/// A [`SegmentFactory`] that always creates fresh heap-allocated segments,
/// assigning each the next sequential id starting from 0. This is what
/// you want when building a message from scratch.
pub struct HeapFactory {
    options: HeapFactoryOptions,
    next_id: u32,
    next_size_words: u32,
}

impl HeapFactory {
    pub fn new() -> Self {
        Self::with_options(HeapFactoryOptions::default())
    }

    pub fn with_options(options: HeapFactoryOptions) -> Self {
        HeapFactory {
            next_size_words: options.first_segment_words,
            options,
            next_id: 0,
        }
    }
}

impl Default for HeapFactory {
    fn default() -> Self {
        HeapFactory::new()
    }
}

impl SegmentFactory for HeapFactory {
    fn create(&mut self, _requesting_id: u32, min_bytes: u32) -> Option<Segment<'static>> {
        let min_words = crate::word::Word::round_up_to_words(min_bytes as u64) as u32;
        let words = min_words.max(self.next_size_words);
        let id = self.next_id;
        self.next_id += 1;
        match self.options.allocation_strategy {
            AllocationStrategy::FixedSize => {}
            AllocationStrategy::GrowHeuristically => {
                self.next_size_words = self.next_size_words.saturating_add(words);
            }
        }
        Some(Segment::new_owned(id, words))
    }
}

/// A read-only [`SegmentFactory`] over segments already resident in
/// memory, e.g. a byte buffer received over the network
/// (`spec.md` §6's "memory-backed reader"). Supports neither `create`
/// (the message is already fully built) nor growth.
pub struct MemorySegments<'a> {
    segments: Vec<Option<&'a [u8]>>,
}

impl<'a> MemorySegments<'a> {
    pub fn new(segments: Vec<&'a [u8]>) -> Self {
        MemorySegments {
            segments: segments.into_iter().map(Some).collect(),
        }
    }
}

impl<'a> SegmentFactory for MemorySegments<'a> {
    fn lookup(&mut self, id: u32) -> Option<Segment<'static>> {
        let bytes = (*self.segments.get(id as usize)?)?;
        // `lookup`'s contract returns a `'static`-bound segment, but this
        // reader's own buffer only lives as long as `'a`. Leaked for the
        // same reason as `FileSegments::lookup` below: a session-scoped
        // arena would avoid the copy but adds a lifetime parameter this
        // collaborator doesn't otherwise need.
        let leaked: &'static [u8] = Box::leak(bytes.to_vec().into_boxed_slice());
        Segment::new_borrowed(id, leaked).ok()
    }
}

/// A read-only [`SegmentFactory`] over segments read from a file, used by
/// `spec.md` §6's "file-backed reader" when the whole message shouldn't
/// be paged into memory at once. Segments are read lazily via `lookup`.
pub struct FileSegments {
    file: File,
    /// Byte offset and length of each segment within the file, known up
    /// front from the stream header (`spec.md` §6's framing).
    table: Vec<(u64, u32)>,
}

impl FileSegments {
    pub fn new(file: File, table: Vec<(u64, u32)>) -> Self {
        FileSegments { file, table }
    }

    fn read_segment(&mut self, id: u32) -> io::Result<Vec<u8>> {
        let &(offset, len) = self
            .table
            .get(id as usize)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such segment"))?;
        let mut buf = vec![0u8; len as usize];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

impl SegmentFactory for FileSegments {
    fn lookup(&mut self, id: u32) -> Option<Segment<'static>> {
        let bytes = self.read_segment(id).ok()?;
        // Leaked intentionally: `FileSegments` hands out `'static` segments
        // per the `SegmentFactory` contract, for the lifetime of the
        // session that owns this factory. A session-scoped arena would
        // avoid the leak but adds a lifetime parameter this collaborator
        // doesn't otherwise need; revisit if `FileSegments` is used for
        // long-running processes that churn through many short sessions.
        let leaked: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        Segment::new_borrowed(id, leaked).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;

    #[test]
    fn heap_factory_assigns_sequential_ids() {
        let mut f = HeapFactory::new();
        let s0 = f.create(0, 8).unwrap();
        let s1 = f.create(0, 8).unwrap();
        assert_eq!(s0.id(), 0);
        assert_eq!(s1.id(), 1);
    }

    #[test]
    fn heap_factory_session_round_trip() {
        let mut session: Session<HeapFactory> = Session::new(HeapFactory::new());
        let p = crate::list::new_struct(&mut session, 0, 8, 0).unwrap();
        crate::list::set_u64(&mut session, p, 0, 99).unwrap();
        assert_eq!(crate::list::get_u64(&session, p, 0), 99);
    }

    #[test]
    fn memory_segments_lookup_resolves_a_far_pointer() {
        // Segment 0 holds only a far pointer (kind `10`) at a struct in
        // segment 1; segment 1 is attached lazily via `lookup`, not
        // present in the session up front.
        let mut far: Session<HeapFactory> = Session::new(HeapFactory::new());
        far.append_segment(crate::segment::Segment::new_owned(0, 4)).unwrap();
        far.append_segment(crate::segment::Segment::new_owned(1, 4)).unwrap();
        let target = crate::list::new_struct(&mut far, 1, 8, 0).unwrap();
        crate::list::set_u64(&mut far, target, 0, 0x77).unwrap();
        far.set_root(target).unwrap();
        let seg0 = far.segment_bytes(0).unwrap().to_vec();
        let seg1 = far.segment_bytes(1).unwrap().to_vec();

        // Segment 1 is intentionally absent from the session up front --
        // `resolve_segment` must fall back to the factory's `lookup`.
        let mut reader: Session<MemorySegments> = Session::new(MemorySegments::new(vec![&seg0, &seg1]));
        reader.append_segment(Segment::new_borrowed(0, &seg0).unwrap()).unwrap();

        let root = reader.root();
        assert_eq!(crate::list::get_u64(&reader, root, 0), 0x77);
    }
}
