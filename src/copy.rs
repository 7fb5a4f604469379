//! Deep copy of a pointer tree across sessions (`spec.md` §4.5).
//!
//! The destination never ends up referencing the source's memory: every
//! struct and list is freshly allocated and its bytes copied. A
//! `(source segment, source offset) -> destination Ptr` map is built for
//! the duration of one top-level call and then dropped; it's what lets
//! two pointers to the same source struct land on one shared destination
//! struct instead of being duplicated, and what turns a cycle in a
//! malformed foreign graph into a repeat visit instead of infinite
//! recursion. Depth is also capped independently, since a long
//! non-repeating chain wouldn't be caught by the sharing map at all.

use std::collections::BTreeMap;

use crate::error::{Error, ErrorKind, Result};
use crate::list;
use crate::private::wire::ElementSize;
use crate::ptr::{Kind, Ptr};
use crate::session::{Session, SegmentFactory};

/// Generous but finite: real message graphs are at most a few hundred
/// levels deep; this exists to bound pathological or cyclic input, not
/// to constrain legitimate use.
const MAX_DEPTH: u32 = 256;

/// Deep-copies `src_ptr` (which must live in `src`) into `dest`,
/// preferring `dest_preferred_seg` for the copy's allocations.
pub fn copy<F1: SegmentFactory, F2: SegmentFactory>(
    dest: &mut Session<F2>,
    dest_preferred_seg: u32,
    src: &mut Session<F1>,
    src_ptr: Ptr,
) -> Result<Ptr> {
    let mut seen = BTreeMap::new();
    copy_inner(dest, dest_preferred_seg, src, src_ptr, &mut seen, 0)
}

fn copy_inner<F1: SegmentFactory, F2: SegmentFactory>(
    dest: &mut Session<F2>,
    dest_seg: u32,
    src: &mut Session<F1>,
    src_ptr: Ptr,
    seen: &mut BTreeMap<(u32, u32), Ptr>,
    depth: u32,
) -> Result<Ptr> {
    if src_ptr.is_null() {
        return Ok(Ptr::null());
    }
    if depth > MAX_DEPTH {
        return Err(Error::new(ErrorKind::DepthExceeded, "copy traversal exceeded maximum depth"));
    }
    let key = (src_ptr.segment_id(), src_ptr.byte_offset());
    if let Some(&already) = seen.get(&key) {
        return Ok(already);
    }

    match src_ptr.kind() {
        Kind::Struct => {
            let ptrs = (src_ptr.ptr_size() / 8) as u16;
            let dst = list::new_struct(dest, dest_seg, src_ptr.data_size(), ptrs)?;
            seen.insert(key, dst);
            copy_struct_body(dest, dst, src, src_ptr, seen, depth)?;
            Ok(dst)
        }
        Kind::List if src_ptr.is_composite() => {
            let ptrs = (src_ptr.ptr_size() / 8) as u16;
            let dst = list::new_composite_list(dest, dest_seg, src_ptr.data_size(), ptrs, src_ptr.len() as u32)?;
            seen.insert(key, dst);
            for i in 0..src_ptr.len() as u32 {
                let src_elem = list::get_composite_element(src_ptr, i);
                let dst_elem = list::get_composite_element(dst, i);
                copy_struct_body(dest, dst_elem, src, src_elem, seen, depth + 1)?;
            }
            Ok(dst)
        }
        Kind::PtrList => {
            let dst = list::new_ptr_list(dest, dest_seg, src_ptr.len() as u32)?;
            seen.insert(key, dst);
            for i in 0..src_ptr.len() as u32 {
                let child = list::get_ptr_list_element(src, src_ptr, i);
                let copied = copy_inner(dest, dest_seg, src, child, seen, depth + 1)?;
                list::set_ptr_list_element(dest, dst, i, copied)?;
            }
            Ok(dst)
        }
        Kind::List => {
            let dst = list::new_list(dest, dest_seg, src_ptr.element_size(), src_ptr.len() as u32)?;
            seen.insert(key, dst);
            copy_raw_list_bytes(dest, dst, src, src_ptr)?;
            Ok(dst)
        }
        Kind::Null => unreachable!("checked above"),
    }
}

fn copy_struct_body<F1: SegmentFactory, F2: SegmentFactory>(
    dest: &mut Session<F2>,
    dst: Ptr,
    src: &mut Session<F1>,
    src_ptr: Ptr,
    seen: &mut BTreeMap<(u32, u32), Ptr>,
    depth: u32,
) -> Result<()> {
    let src_bytes = src
        .bytes(src_ptr.segment_id())
        .ok_or_else(|| Error::unknown_segment(src_ptr.segment_id()))?;
    let start = src_ptr.byte_offset() as usize;
    let data_len = src_ptr.data_size() as usize;
    let data = src_bytes[start..start + data_len].to_vec();
    let dest_bytes = dest
        .bytes_mut(dst.segment_id())
        .ok_or_else(|| Error::unknown_segment(dst.segment_id()))?;
    let dst_start = dst.byte_offset() as usize;
    dest_bytes[dst_start..dst_start + data_len].copy_from_slice(&data);

    let ptr_count = src_ptr.ptr_size() / 8;
    for i in 0..ptr_count {
        let child = list::getp(src, src_ptr, i);
        let copied = copy_inner(dest, dst.segment_id(), src, child, seen, depth + 1)?;
        list::setp(dest, dst, i, copied)?;
    }
    Ok(())
}

fn copy_raw_list_bytes<F1: SegmentFactory, F2: SegmentFactory>(
    dest: &mut Session<F2>,
    dst: Ptr,
    src: &mut Session<F1>,
    src_ptr: Ptr,
) -> Result<()> {
    if src_ptr.element_size() == ElementSize::Void {
        return Ok(());
    }
    let total_bits = src_ptr.element_size().data_bits() as u64 * src_ptr.len() as u64;
    let total_bytes = ((total_bits + 7) / 8) as usize;
    let src_bytes = src
        .bytes(src_ptr.segment_id())
        .ok_or_else(|| Error::unknown_segment(src_ptr.segment_id()))?;
    let start = src_ptr.byte_offset() as usize;
    let data = src_bytes[start..start + total_bytes].to_vec();
    let dest_bytes = dest
        .bytes_mut(dst.segment_id())
        .ok_or_else(|| Error::unknown_segment(dst.segment_id()))?;
    let dst_start = dst.byte_offset() as usize;
    dest_bytes[dst_start..dst_start + total_bytes].copy_from_slice(&data);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::HeapFactory;

    #[test]
    fn copy_struct_does_not_alias_source_segment() {
        let mut src: Session<HeapFactory> = Session::new(HeapFactory::new());
        let p = list::new_struct(&mut src, 0, 8, 1).unwrap();
        list::set_u64(&mut src, p, 0, 7).unwrap();
        let inner = list::new_struct(&mut src, 0, 8, 0).unwrap();
        list::set_u64(&mut src, inner, 0, 9).unwrap();
        list::setp(&mut src, p, 0, inner).unwrap();

        let mut dst: Session<HeapFactory> = Session::new(HeapFactory::new());
        let copied = copy(&mut dst, 0, &mut src, p).unwrap();

        assert_eq!(list::get_u64(&dst, copied, 0), 7);
        let copied_inner = list::getp(&mut dst, copied, 0);
        assert_eq!(list::get_u64(&dst, copied_inner, 0), 9);
    }

    #[test]
    fn copy_preserves_shared_pointee() {
        let mut src: Session<HeapFactory> = Session::new(HeapFactory::new());
        let shared = list::new_struct(&mut src, 0, 8, 0).unwrap();
        list::set_u64(&mut src, shared, 0, 5).unwrap();
        let outer = list::new_struct(&mut src, 0, 0, 2).unwrap();
        list::setp(&mut src, outer, 0, shared).unwrap();
        list::setp(&mut src, outer, 1, shared).unwrap();

        let mut dst: Session<HeapFactory> = Session::new(HeapFactory::new());
        let copied = copy(&mut dst, 0, &mut src, outer).unwrap();
        let a = list::getp(&mut dst, copied, 0);
        let b = list::getp(&mut dst, copied, 1);
        assert_eq!(a.segment_id(), b.segment_id());
        assert_eq!(a.byte_offset(), b.byte_offset());
    }
}
