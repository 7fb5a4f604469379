//! Placement/allocation policy (`spec.md` §4.2) and the pointer
//! encode/decode routines built on top of [`crate::private::wire`].
//!
//! Decoding never fails: any inconsistency found while walking a pointer
//! (unknown segment, a far chain that doesn't bottom out the way it
//! should, a target that runs past its segment) is structural corruption
//! per `spec.md` §4.8 and collapses to [`Ptr::null`], not an `Error`.

use crate::codec;
use crate::error::{Error, ErrorKind, Result};
use crate::ptr::{Kind, Ptr};
use crate::session::{classify_list_kind, Session, SegmentFactory};
use crate::word::BYTES_PER_WORD;

use super::wire::{self, ElementSize, Wire};

/// Finds room for `words` words, preferring to grow `requesting_seg` in
/// place and falling back to the factory for a new segment
/// (`spec.md` §4.2, placement steps 1-2). Returns the segment actually
/// used and the byte offset the new space starts at.
pub(crate) fn allocate<F: SegmentFactory>(
    session: &mut Session<F>,
    requesting_seg: u32,
    words: u32,
) -> Result<(u32, u32)> {
    let bytes_needed = words * BYTES_PER_WORD as u32;
    if let Some(seg) = session.segment_mut(requesting_seg) {
        if seg.is_writable() && seg.free_bytes() >= bytes_needed {
            let off = seg.len();
            seg.advance_len(bytes_needed);
            return Ok((requesting_seg, off));
        }
    }
    let new_id = session.create_segment(requesting_seg, bytes_needed)?;
    let seg = session
        .segment_mut(new_id)
        .expect("segment just created by create_segment");
    if seg.free_bytes() < bytes_needed {
        return Err(Error::new(
            ErrorKind::AllocationFailed,
            format!("factory gave segment {new_id} only {} of {bytes_needed} requested bytes", seg.free_bytes()),
        ));
    }
    let off = seg.len();
    seg.advance_len(bytes_needed);
    Ok((new_id, off))
}

fn near_addr(base_off: u32, offset: i32) -> Option<u32> {
    let addr = base_off as i64 + 8 * (offset as i64 + 1);
    if addr < 0 || addr > u32::MAX as i64 {
        None
    } else {
        Some(addr as u32)
    }
}

/// Builds the runtime [`Ptr`] a struct/list pointer with the given
/// `shape` (and, for a composite list, a tag word at `addr`) denotes,
/// validating that its content fits inside the segment. Returns
/// `Ptr::null()` on any bounds violation.
fn ptr_from_shape<F: SegmentFactory>(session: &Session<F>, seg: u32, addr: u32, shape: Wire) -> Ptr {
    let Some(bytes) = session.bytes(seg) else {
        return Ptr::null();
    };
    let len = bytes.len() as u64;
    match shape {
        Wire::Struct { data_words, ptr_words, .. } => {
            let end = addr as u64 + (data_words as u64 + ptr_words as u64) * 8;
            if end > len {
                return Ptr::null();
            }
            Ptr {
                kind: Kind::Struct,
                is_list_member: false,
                has_ptr_tag: true,
                has_composite_tag: false,
                datasz: data_words as u32 * 8,
                ptrsz: ptr_words as u32 * 8,
                size: 0,
                seg,
                off: addr,
                element_size: ElementSize::Void,
            }
        }
        Wire::List { size: ElementSize::InlineComposite, count: word_count, .. } => {
            let tag_end = addr as u64 + 8;
            if tag_end > len {
                return Ptr::null();
            }
            let tag_word = codec::read_u64(bytes, addr as usize);
            let (elem_count, data_words, ptr_words) = wire::decode_composite_tag(tag_word);
            let content_addr = addr + 8;
            let content_end = content_addr as u64 + word_count as u64 * 8;
            if content_end > len {
                return Ptr::null();
            }
            if elem_count as u64 * (data_words as u64 + ptr_words as u64) != word_count as u64 {
                // Tag's per-element stride disagrees with the pointer's
                // declared payload size: corrupt.
                return Ptr::null();
            }
            Ptr {
                kind: Kind::List,
                is_list_member: false,
                has_ptr_tag: true,
                has_composite_tag: true,
                datasz: data_words as u32 * 8,
                ptrsz: ptr_words as u32 * 8,
                size: elem_count as i32,
                seg,
                off: content_addr,
                element_size: ElementSize::InlineComposite,
            }
        }
        Wire::List { size, count, .. } => {
            let total_bits = size.data_bits() as u64 * count as u64;
            let total_bytes = (total_bits + 7) / 8;
            let end = addr as u64 + total_bytes;
            if end > len {
                return Ptr::null();
            }
            Ptr {
                kind: classify_list_kind(size),
                is_list_member: false,
                has_ptr_tag: true,
                has_composite_tag: false,
                datasz: 0,
                ptrsz: 0,
                size: count as i32,
                seg,
                off: addr,
                element_size: size,
            }
        }
        _ => Ptr::null(),
    }
}

/// Decodes the pointer stored at `(seg, off)`, following far and
/// double-far indirection as needed. Never errors; structural corruption
/// produces `Ptr::null()`.
pub(crate) fn resolve_pointer<F: SegmentFactory>(session: &mut Session<F>, seg: u32, off: u32) -> Ptr {
    let Some(bytes) = session.bytes(seg) else {
        return Ptr::null();
    };
    if off as u64 + 8 > bytes.len() as u64 {
        return Ptr::null();
    }
    let word = codec::read_u64(bytes, off as usize);
    match wire::decode(word) {
        Wire::Null => Ptr::null(),
        Wire::Other(_) => Ptr::null(),
        shape @ (Wire::Struct { offset, .. } | Wire::List { offset, .. }) => {
            let Some(addr) = near_addr(off, offset) else {
                return Ptr::null();
            };
            ptr_from_shape(session, seg, addr, shape)
        }
        Wire::Far { double: false, seg_id, offset } => {
            if session.resolve_segment(seg_id).is_err() {
                return Ptr::null();
            }
            resolve_pointer(session, seg_id, offset * 8)
        }
        Wire::Far { double: true, seg_id, offset } => {
            if session.resolve_segment(seg_id).is_err() {
                return Ptr::null();
            }
            let Some(bytes) = session.bytes(seg_id) else {
                return Ptr::null();
            };
            let pad_off = offset as u64 * 8;
            if pad_off + 16 > bytes.len() as u64 {
                return Ptr::null();
            }
            let word0 = codec::read_u64(bytes, pad_off as usize);
            let word1 = codec::read_u64(bytes, pad_off as usize + 8);
            let (content_seg, content_word_off) = match wire::decode(word0) {
                Wire::Far { double: false, seg_id, offset } => (seg_id, offset),
                _ => return Ptr::null(),
            };
            if session.resolve_segment(content_seg).is_err() {
                return Ptr::null();
            }
            match wire::decode(word1) {
                shape @ (Wire::Struct { .. } | Wire::List { .. }) => {
                    ptr_from_shape(session, content_seg, content_word_off * 8, shape)
                }
                _ => Ptr::null(),
            }
        }
    }
}

/// Writes `target`'s tag word (possibly with far/double-far indirection)
/// into the pointer slot at `(slot_seg, slot_off)`. `target` must already
/// live in `session` -- this never copies bytes, only writes a pointer.
pub(crate) fn encode_pointer<F: SegmentFactory>(
    session: &mut Session<F>,
    slot_seg: u32,
    slot_off: u32,
    target: Ptr,
) -> Result<()> {
    if target.is_null() {
        write_word(session, slot_seg, slot_off, wire::encode_null())?;
        return Ok(());
    }
    let (size, count) = list_wire_shape(&target);
    // For a composite list, `target.byte_offset()` is the *content* address
    // (per `ptr_from_shape`'s `off: content_addr`); the wire pointer has to
    // target the tag word one word before that instead.
    let wire_addr = wire_address(&target);

    if target.segment_id() == slot_seg {
        if let Some(rel) = relative_word_offset(slot_off, wire_addr) {
            if (wire::MIN_NEAR_OFFSET..=wire::MAX_NEAR_OFFSET).contains(&rel) {
                let word = encode_shape_word(&target, rel as i32, size, count);
                write_word(session, slot_seg, slot_off, word)?;
                return Ok(());
            }
        }
    }

    // Out of near range or cross-segment: try a single-far landing pad in
    // the target's own segment first (`spec.md` §4.2 placement step 3).
    // The pad holds a near-style pointer to `target` computed relative to
    // the pad's own address, exactly as if the pad were itself the slot.
    let target_word_off = wire_addr / 8;
    if let Some(seg) = session.segment_mut(target.segment_id()) {
        if seg.is_writable() && seg.free_bytes() >= 8 {
            let pad_off = seg.len();
            let rel = relative_word_offset(pad_off, wire_addr);
            let pad_word_off = pad_off / 8;
            if pad_word_off < (1 << 29) && matches!(rel, Some(r) if (wire::MIN_NEAR_OFFSET..=wire::MAX_NEAR_OFFSET).contains(&r)) {
                seg.advance_len(8);
                let shape_word = encode_shape_word(&target, rel.unwrap() as i32, size, count);
                write_word(session, target.segment_id(), pad_off, shape_word)?;
                let far_word = wire::encode_far(false, target.segment_id(), pad_word_off);
                write_word(session, slot_seg, slot_off, far_word)?;
                return Ok(());
            }
        }
    }

    // A far pointer's word-offset field is 29 bits wide, same as the near
    // pointer field; both `target_word_off` (the far pointer inside the
    // pad) and `pad_word_off` (the far pointer at the slot) need the same
    // guard the single-far path above applies.
    if target_word_off >= (1 << 29) {
        return Err(Error::new(ErrorKind::AllocationFailed, "far pointer target offset exceeds 29 bits"));
    }

    // Fall back to a two-word double-far landing pad allocated via the
    // normal placement policy.
    let (pad_seg, pad_off) = allocate(session, slot_seg, 2)?;
    let word0 = wire::encode_far(false, target.segment_id(), target_word_off);
    let word1 = encode_shape_word(&target, 0, size, count);
    write_word(session, pad_seg, pad_off, word0)?;
    write_word(session, pad_seg, pad_off + 8, word1)?;
    let pad_word_off = pad_off / 8;
    if pad_word_off >= (1 << 29) {
        return Err(Error::new(ErrorKind::AllocationFailed, "double-far landing pad offset exceeds 29 bits"));
    }
    let far_word = wire::encode_far(true, pad_seg, pad_word_off);
    write_word(session, slot_seg, slot_off, far_word)
}

/// The address a wire pointer to `target` must encode. Equal to
/// `target.byte_offset()` except for a composite list, whose `Ptr` stores
/// the *content* address (past the tag word written by
/// `ptr_from_shape`/`new_composite_list`) rather than the tag's own
/// address that a pointer actually names.
fn wire_address(target: &Ptr) -> u32 {
    if target.kind() == Kind::List && target.is_composite() {
        target.byte_offset() - 8
    } else {
        target.byte_offset()
    }
}

fn list_wire_shape(target: &Ptr) -> (ElementSize, u32) {
    if target.is_composite() {
        (ElementSize::InlineComposite, target.len() as u32 * target.struct_words())
    } else {
        (target.element_size(), target.len() as u32)
    }
}

fn encode_shape_word(target: &Ptr, offset: i32, size: ElementSize, count: u32) -> u64 {
    match target.kind() {
        Kind::Struct => wire::encode_struct(offset, (target.data_size() / 8) as u16, (target.ptr_size() / 8) as u16),
        Kind::List | Kind::PtrList => wire::encode_list(offset, size, count),
        Kind::Null => wire::encode_null(),
    }
}

fn relative_word_offset(slot_off: u32, target_off: u32) -> Option<i64> {
    let rel_bytes = target_off as i64 - (slot_off as i64 + 8);
    if rel_bytes % 8 != 0 {
        return None;
    }
    Some(rel_bytes / 8)
}

fn write_word<F: SegmentFactory>(session: &mut Session<F>, seg: u32, off: u32, word: u64) -> Result<()> {
    let bytes = session
        .bytes_mut(seg)
        .ok_or_else(|| Error::unknown_segment(seg))?;
    if off as usize + 8 > bytes.len() {
        return Err(Error::out_of_bounds("pointer slot past end of segment"));
    }
    codec::write_u64(bytes, off as usize, word);
    Ok(())
}
