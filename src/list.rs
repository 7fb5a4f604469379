//! Struct field access and list element access (`spec.md` §4.4).
//!
//! Every read here is schema-tolerant: indexing past a struct's `datasz`/
//! `ptrsz` or a list's length never errors, it returns the type's zero
//! value (`spec.md` §4.8, §7 "reads never fail"). Writes past the end
//! return `Err`.

use crate::codec;
use crate::error::{Error, ErrorKind, Result};
use crate::private::wire::ElementSize;
use crate::ptr::{Kind, Ptr};
use crate::session::{Session, SegmentFactory};

/// Allocates a lone struct with `datasz` bytes of data section and `ptrs`
/// pointer-section slots, zero-initialized, in `preferred_seg` (or
/// wherever the factory puts it if that segment is full).
pub fn new_struct<F: SegmentFactory>(session: &mut Session<F>, preferred_seg: u32, datasz: u32, ptrs: u16) -> Result<Ptr> {
    let datasz = crate::word::Word::round_up_byte_count(datasz as u64) as u32;
    let words = datasz / 8 + ptrs as u32;
    let (seg, off) = session.allocate(preferred_seg, words)?;
    Ok(Ptr {
        kind: Kind::Struct,
        is_list_member: false,
        has_ptr_tag: true,
        has_composite_tag: false,
        datasz,
        ptrsz: ptrs as u32 * 8,
        size: 0,
        seg,
        off,
        element_size: ElementSize::Void,
    })
}

/// A plain (non-composite) list's element count is packed into a 29-bit
/// wire field (`wire::encode_list`); a composite list's into 30 bits
/// (`wire::encode_composite_tag`). Rejecting an oversized count here,
/// before any allocation happens, keeps that a `Result::Err` on the
/// write path instead of a silently truncated count reaching the wire.
fn check_list_count(count: u32, limit_bits: u32) -> Result<()> {
    if count >= (1 << limit_bits) {
        return Err(Error::new(
            ErrorKind::AllocationFailed,
            format!("list element count {count} does not fit in {limit_bits} bits"),
        ));
    }
    Ok(())
}

/// Allocates a list of `count` non-pointer, non-composite elements of
/// `element_size`, zero-initialized. `ElementSize` is crate-private, so
/// this is a building block for the typed constructors below and for
/// `text`/`data`'s byte lists, not itself part of the public API.
pub(crate) fn new_list<F: SegmentFactory>(
    session: &mut Session<F>,
    preferred_seg: u32,
    element_size: ElementSize,
    count: u32,
) -> Result<Ptr> {
    debug_assert!(!matches!(element_size, ElementSize::InlineComposite | ElementSize::Pointer));
    check_list_count(count, 29)?;
    let total_bits = element_size.data_bits() as u64 * count as u64;
    let words = crate::word::Word::round_up_to_words((total_bits + 7) / 8);
    let (seg, off) = session.allocate(preferred_seg, words as u32)?;
    Ok(Ptr {
        kind: Kind::List,
        is_list_member: false,
        has_ptr_tag: true,
        has_composite_tag: false,
        datasz: 0,
        ptrsz: 0,
        size: count as i32,
        seg,
        off,
        element_size,
    })
}

/// Allocates a bit-list: `spec.md` §4.4's note that bulk bit-list access
/// needs byte alignment, but single-element access doesn't -- the list
/// itself is always allocated byte-aligned (rounded up), individual bits
/// within it need not be.
pub fn new_bit_list<F: SegmentFactory>(session: &mut Session<F>, preferred_seg: u32, count: u32) -> Result<Ptr> {
    new_list(session, preferred_seg, ElementSize::Bit, count)
}

/// Allocates a list of `count` pointer-section-slot elements, each
/// initially null.
pub fn new_ptr_list<F: SegmentFactory>(session: &mut Session<F>, preferred_seg: u32, count: u32) -> Result<Ptr> {
    check_list_count(count, 29)?;
    let (seg, off) = session.allocate(preferred_seg, count)?;
    Ok(Ptr {
        kind: Kind::PtrList,
        is_list_member: false,
        has_ptr_tag: true,
        has_composite_tag: false,
        datasz: 0,
        ptrsz: 0,
        size: count as i32,
        seg,
        off,
        element_size: ElementSize::Pointer,
    })
}

/// Allocates a list of `count` structs, each with `datasz` data bytes and
/// `ptrs` pointer slots, preceded by the composite tag word
/// (`spec.md` §4.3's "composite list tag").
pub fn new_composite_list<F: SegmentFactory>(
    session: &mut Session<F>,
    preferred_seg: u32,
    datasz: u32,
    ptrs: u16,
    count: u32,
) -> Result<Ptr> {
    check_list_count(count, 30)?;
    let datasz = crate::word::Word::round_up_byte_count(datasz as u64) as u32;
    let stride_words = datasz as u64 / 8 + ptrs as u64;
    let words = 1 + stride_words * count as u64;
    let words: u32 = words
        .try_into()
        .map_err(|_| Error::new(ErrorKind::AllocationFailed, format!("composite list of {words} words is too large to allocate")))?;
    let (seg, off) = session.allocate(preferred_seg, words)?;
    {
        let bytes = session.bytes_mut(seg).expect("segment just allocated into");
        let tag = crate::private::wire::encode_composite_tag(count, (datasz / 8) as u16, ptrs);
        codec::write_u64(bytes, off as usize, tag);
    }
    Ok(Ptr {
        kind: Kind::List,
        is_list_member: false,
        has_ptr_tag: true,
        has_composite_tag: true,
        datasz,
        ptrsz: ptrs as u32 * 8,
        size: count as i32,
        seg,
        off: off + 8,
        element_size: ElementSize::InlineComposite,
    })
}

fn struct_bytes<'a, F: SegmentFactory>(session: &'a Session<F>, p: Ptr) -> Option<&'a [u8]> {
    session.bytes(p.segment_id())
}

/// Byte offset of field `idx` (in units of its own width) within a
/// struct's data section, or `None` if it falls past `datasz` --
/// schema-tolerant zero-read territory.
fn data_field_offset(p: &Ptr, idx: u32, width_bytes: u32) -> Option<usize> {
    let end = (idx as u64 + 1) * width_bytes as u64;
    if end > p.data_size() as u64 {
        None
    } else {
        Some(p.byte_offset() as usize + (idx * width_bytes) as usize)
    }
}

macro_rules! struct_field_accessors {
    ($get:ident, $set:ident, $ty:ty, $width:expr, $read:path, $write:path) => {
        #[doc = concat!("Reads data-section field `idx` as a `", stringify!($ty), "`. Returns 0 if `idx` is past the struct's `datasz`.")]
        pub fn $get<F: SegmentFactory>(session: &Session<F>, p: Ptr, idx: u32) -> $ty {
            match data_field_offset(&p, idx, $width) {
                None => <$ty>::default(),
                Some(off) => {
                    let Some(bytes) = struct_bytes(session, p) else { return <$ty>::default() };
                    if off + $width as usize > bytes.len() {
                        return <$ty>::default();
                    }
                    $read(bytes, off)
                }
            }
        }

        #[doc = concat!("Writes data-section field `idx` as a `", stringify!($ty), "`. Errors if `idx` is past the struct's `datasz`.")]
        pub fn $set<F: SegmentFactory>(session: &mut Session<F>, p: Ptr, idx: u32, value: $ty) -> Result<()> {
            let off = data_field_offset(&p, idx, $width).ok_or_else(|| Error::out_of_bounds("struct data field"))?;
            let bytes = session.bytes_mut(p.segment_id()).ok_or_else(|| Error::unknown_segment(p.segment_id()))?;
            if off + $width as usize > bytes.len() {
                return Err(Error::out_of_bounds("struct data field"));
            }
            $write(bytes, off, value);
            Ok(())
        }
    };
}

struct_field_accessors!(get_u8, set_u8, u8, 1, codec::read_u8, codec::write_u8);
struct_field_accessors!(get_u16, set_u16, u16, 2, codec::read_u16, codec::write_u16);
struct_field_accessors!(get_u32, set_u32, u32, 4, codec::read_u32, codec::write_u32);
struct_field_accessors!(get_u64, set_u64, u64, 8, codec::read_u64, codec::write_u64);

/// Reads data-section bit field `idx`. Returns `false` if past `datasz`.
pub fn get_bit<F: SegmentFactory>(session: &Session<F>, p: Ptr, idx: u32) -> bool {
    let bit_end = (idx as u64 + 1 + 7) / 8;
    if bit_end > p.data_size() as u64 {
        return false;
    }
    let Some(bytes) = struct_bytes(session, p) else { return false };
    codec::read_bit(bytes, p.byte_offset() as usize * 8 + idx as usize)
}

/// Writes data-section bit field `idx`. Errors if past `datasz`.
pub fn set_bit<F: SegmentFactory>(session: &mut Session<F>, p: Ptr, idx: u32, value: bool) -> Result<()> {
    let bit_end = (idx as u64 + 1 + 7) / 8;
    if bit_end > p.data_size() as u64 {
        return Err(Error::out_of_bounds("struct bit field"));
    }
    let bytes = session.bytes_mut(p.segment_id()).ok_or_else(|| Error::unknown_segment(p.segment_id()))?;
    codec::write_bit(bytes, p.byte_offset() as usize * 8 + idx as usize, value);
    Ok(())
}

pub fn get_f32<F: SegmentFactory>(session: &Session<F>, p: Ptr, idx: u32, default: f32) -> f32 {
    match data_field_offset(&p, idx, 4) {
        None => default,
        Some(off) => match struct_bytes(session, p) {
            Some(bytes) if off + 4 <= bytes.len() => codec::read_f32(bytes, off, default),
            _ => default,
        },
    }
}

pub fn set_f32<F: SegmentFactory>(session: &mut Session<F>, p: Ptr, idx: u32, value: f32, default: f32) -> Result<()> {
    let off = data_field_offset(&p, idx, 4).ok_or_else(|| Error::out_of_bounds("struct data field"))?;
    let bytes = session.bytes_mut(p.segment_id()).ok_or_else(|| Error::unknown_segment(p.segment_id()))?;
    codec::write_f32(bytes, off, value, default);
    Ok(())
}

pub fn get_f64<F: SegmentFactory>(session: &Session<F>, p: Ptr, idx: u32, default: f64) -> f64 {
    match data_field_offset(&p, idx, 8) {
        None => default,
        Some(off) => match struct_bytes(session, p) {
            Some(bytes) if off + 8 <= bytes.len() => codec::read_f64(bytes, off, default),
            _ => default,
        },
    }
}

pub fn set_f64<F: SegmentFactory>(session: &mut Session<F>, p: Ptr, idx: u32, value: f64, default: f64) -> Result<()> {
    let off = data_field_offset(&p, idx, 8).ok_or_else(|| Error::out_of_bounds("struct data field"))?;
    let bytes = session.bytes_mut(p.segment_id()).ok_or_else(|| Error::unknown_segment(p.segment_id()))?;
    codec::write_f64(bytes, off, value, default);
    Ok(())
}

/// Reads pointer-section slot `idx` and resolves it. A slot past `ptrsz`
/// reads as null, same as any other out-of-schema field.
pub fn getp<F: SegmentFactory>(session: &mut Session<F>, p: Ptr, idx: u32) -> Ptr {
    if (idx as u64 + 1) * 8 > p.ptr_size() as u64 {
        return Ptr::null();
    }
    let slot_off = p.byte_offset() + p.data_size() + idx * 8;
    session.resolve_pointer(p.segment_id(), slot_off)
}

/// Writes pointer-section slot `idx`. Errors if `idx` is past `ptrsz`.
/// `target` must already live in `session`; see `crate::copy` to bring in
/// a pointer from elsewhere first.
pub fn setp<F: SegmentFactory>(session: &mut Session<F>, p: Ptr, idx: u32, target: Ptr) -> Result<()> {
    if (idx as u64 + 1) * 8 > p.ptr_size() as u64 {
        return Err(Error::out_of_bounds("struct pointer field"));
    }
    let slot_off = p.byte_offset() + p.data_size() + idx * 8;
    session.encode_pointer(p.segment_id(), slot_off, target)
}

/// Reads element `idx` of a non-pointer, non-composite list as a `u64`,
/// zero-extended/truncated from the list's actual element width. Returns
/// 0 past the list's length.
pub fn get_list_u64<F: SegmentFactory>(session: &Session<F>, p: Ptr, idx: u32) -> u64 {
    if idx as u64 >= p.len() as u64 {
        return 0;
    }
    let Some(bytes) = session.bytes(p.segment_id()) else { return 0 };
    let bits = p.element_size().data_bits();
    if bits == 0 {
        return 0;
    }
    let bit_off = p.byte_offset() as u64 * 8 + idx as u64 * bits as u64;
    let byte_off = (bit_off / 8) as usize;
    match bits {
        1 => codec::read_bit(bytes, bit_off as usize) as u64,
        8 => codec::read_u8(bytes, byte_off) as u64,
        16 => codec::read_u16(bytes, byte_off) as u64,
        32 => codec::read_u32(bytes, byte_off) as u64,
        64 => codec::read_u64(bytes, byte_off),
        _ => 0,
    }
}

/// Writes element `idx` of a non-pointer, non-composite list, truncating
/// `value` to the list's element width. Errors past the list's length or
/// if the element width can't hold a `u64` losslessly larger than itself
/// (truncation is the caller's responsibility; this only range-checks
/// the index).
pub fn set_list_u64<F: SegmentFactory>(session: &mut Session<F>, p: Ptr, idx: u32, value: u64) -> Result<()> {
    if idx as u64 >= p.len() as u64 {
        return Err(Error::out_of_bounds("list element"));
    }
    let bits = p.element_size().data_bits();
    let bit_off = p.byte_offset() as u64 * 8 + idx as u64 * bits as u64;
    let byte_off = (bit_off / 8) as usize;
    let bytes = session.bytes_mut(p.segment_id()).ok_or_else(|| Error::unknown_segment(p.segment_id()))?;
    match bits {
        1 => codec::write_bit(bytes, bit_off as usize, value != 0),
        8 => codec::write_u8(bytes, byte_off, value as u8),
        16 => codec::write_u16(bytes, byte_off, value as u16),
        32 => codec::write_u32(bytes, byte_off, value as u32),
        64 => codec::write_u64(bytes, byte_off, value),
        _ => return Err(Error::out_of_bounds("list element width")),
    }
    Ok(())
}

/// Indexes into a composite list, returning the `idx`th element as a
/// struct `Ptr`. Out-of-range reads return a null-shaped struct with
/// zero `datasz`/`ptrsz` (`spec.md` §4.8's zero-on-OOB-read for lists of
/// structs: the caller still gets a struct-shaped `Ptr`, just one with
/// nothing in it).
pub fn get_composite_element(p: Ptr, idx: u32) -> Ptr {
    if idx as u64 >= p.len() as u64 {
        return Ptr {
            kind: Kind::Struct,
            is_list_member: true,
            has_ptr_tag: false,
            has_composite_tag: false,
            datasz: 0,
            ptrsz: 0,
            size: 0,
            seg: p.segment_id(),
            off: 0,
            element_size: ElementSize::Void,
        };
    }
    let stride = p.struct_words() * 8;
    Ptr {
        kind: Kind::Struct,
        is_list_member: true,
        has_ptr_tag: false,
        has_composite_tag: false,
        datasz: p.data_size(),
        ptrsz: p.ptr_size(),
        size: 0,
        seg: p.segment_id(),
        off: p.byte_offset() + idx * stride,
        element_size: ElementSize::Void,
    }
}

/// Indexes into a pointer-list, resolving the `idx`th element. Returns
/// null past the list's length.
pub fn get_ptr_list_element<F: SegmentFactory>(session: &mut Session<F>, p: Ptr, idx: u32) -> Ptr {
    if idx as u64 >= p.len() as u64 {
        return Ptr::null();
    }
    session.resolve_pointer(p.segment_id(), p.byte_offset() + idx * 8)
}

/// Writes the `idx`th element of a pointer-list. Errors past the list's
/// length.
pub fn set_ptr_list_element<F: SegmentFactory>(session: &mut Session<F>, p: Ptr, idx: u32, target: Ptr) -> Result<()> {
    if idx as u64 >= p.len() as u64 {
        return Err(Error::out_of_bounds("pointer list element"));
    }
    session.encode_pointer(p.segment_id(), p.byte_offset() + idx * 8, target)
}
