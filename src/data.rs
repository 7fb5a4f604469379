//! Byte-blob view over a `Byte`-element list (`spec.md` §4.4's "data"
//! accessor).

use crate::error::Result;
use crate::list;
use crate::private::wire::ElementSize;
use crate::ptr::{Kind, Ptr};
use crate::session::{Session, SegmentFactory};

/// Allocates a new data blob containing a copy of `bytes`.
pub fn new_data<F: SegmentFactory>(session: &mut Session<F>, preferred_seg: u32, bytes: &[u8]) -> Result<Ptr> {
    let p = list::new_list(session, preferred_seg, ElementSize::Byte, bytes.len() as u32)?;
    let dest = session
        .bytes_mut(p.segment_id())
        .expect("segment just allocated into");
    let off = p.byte_offset() as usize;
    dest[off..off + bytes.len()].copy_from_slice(bytes);
    Ok(p)
}

/// Borrows the contents of a data blob as a byte slice. Returns an empty
/// slice for anything that isn't a flat byte list (null, wrong element
/// size, ...) -- `spec.md` §4.8's schema-tolerant read behavior.
pub fn as_bytes<'a, F: SegmentFactory>(session: &'a Session<F>, p: Ptr) -> &'a [u8] {
    if !matches!(p.kind(), Kind::List) || p.element_size() != ElementSize::Byte {
        return &[];
    }
    let Some(bytes) = session.bytes(p.segment_id()) else { return &[] };
    let start = p.byte_offset() as usize;
    let end = start + p.len() as usize;
    if end > bytes.len() {
        return &[];
    }
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::HeapFactory;

    #[test]
    fn data_round_trips() {
        let mut s: Session<HeapFactory> = Session::new(HeapFactory::new());
        let p = new_data(&mut s, 0, b"hello").unwrap();
        assert_eq!(as_bytes(&s, p), b"hello");
    }

    #[test]
    fn wrong_kind_reads_as_empty() {
        let mut s: Session<HeapFactory> = Session::new(HeapFactory::new());
        let p = list::new_struct(&mut s, 0, 8, 0).unwrap();
        assert_eq!(as_bytes(&s, p), b"");
    }
}
